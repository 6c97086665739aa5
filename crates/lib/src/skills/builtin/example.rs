use super::{handler, single_string_param, str_arg};
use crate::skills::descriptor::{InvocationError, Operation, SkillDescriptor};

pub(super) fn descriptor() -> SkillDescriptor {
    SkillDescriptor::new(
        "example",
        "An example skill that demonstrates the skill system",
    )
    .with_tags(["example", "demo"])
    .with_operation(Operation::new(
        "example_tool",
        "An example tool that echoes the query",
        single_string_param("query", "The input query"),
        handler(echo),
    ))
}

fn echo(args: &serde_json::Value) -> Result<String, InvocationError> {
    let query = str_arg(args, "query")?;
    Ok(format!("Example tool received: {}", query))
}
