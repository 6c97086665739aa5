//! Text case transforms and counts.

use super::{handler, single_string_param, str_arg};
use crate::skills::descriptor::{InvocationError, Operation, SkillDescriptor};

type TextFn = fn(&serde_json::Value) -> Result<String, InvocationError>;

pub(super) fn descriptor() -> SkillDescriptor {
    let op = |name: &str, description: &str, f: TextFn| {
        Operation::new(
            name,
            description,
            single_string_param("text", "The text to process"),
            handler(f),
        )
    };
    SkillDescriptor::new(
        "text_processor",
        "Process and manipulate text (uppercase, lowercase, reverse, word count, etc.)",
    )
    .with_tags(["text", "processing", "utility"])
    .with_author("Skill System")
    .with_operation(op("text_uppercase", "Convert text to uppercase", uppercase))
    .with_operation(op("text_lowercase", "Convert text to lowercase", lowercase))
    .with_operation(op("text_reverse", "Reverse the text", reverse))
    .with_operation(op("text_word_count", "Count words in the text", word_count))
    .with_operation(op(
        "text_character_count",
        "Count characters in the text",
        character_count,
    ))
}

fn uppercase(args: &serde_json::Value) -> Result<String, InvocationError> {
    Ok(str_arg(args, "text")?.to_uppercase())
}

fn lowercase(args: &serde_json::Value) -> Result<String, InvocationError> {
    Ok(str_arg(args, "text")?.to_lowercase())
}

fn reverse(args: &serde_json::Value) -> Result<String, InvocationError> {
    Ok(str_arg(args, "text")?.chars().rev().collect())
}

fn word_count(args: &serde_json::Value) -> Result<String, InvocationError> {
    let text = str_arg(args, "text")?;
    Ok(format!("Word count: {}", text.split_whitespace().count()))
}

fn character_count(args: &serde_json::Value) -> Result<String, InvocationError> {
    let text = str_arg(args, "text")?;
    Ok(format!("Character count: {}", text.chars().count()))
}
