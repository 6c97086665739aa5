//! Operations backed by an allowlisted command, built from a skill's tools.json.
//! Builds argv from the execution spec's arg mapping and runs via the allowlist.
//! Supports optional content normalization (literal \n/\t -> newline/tab).

use std::sync::Arc;

use crate::exec::Allowlist;
use crate::skills::{
    ArgKind, ArgMapping, ExecutionSpec, InvocationError, Operation, OperationHandler, ToolsManifest,
};

/// Handler for one tools.json tool: the skill's allowlist plus the tool's execution spec.
#[derive(Debug, Clone)]
pub struct CommandOperation {
    allowlist: Arc<Allowlist>,
    spec: ExecutionSpec,
}

impl CommandOperation {
    pub fn new(allowlist: Arc<Allowlist>, spec: ExecutionSpec) -> Self {
        Self { allowlist, spec }
    }
}

impl OperationHandler for CommandOperation {
    fn invoke(&self, args: &serde_json::Value) -> Result<String, InvocationError> {
        let argv = build_argv(&self.spec, args)?;
        log::debug!(
            "running {} {} with {} args",
            self.spec.binary,
            self.spec.subcommand,
            argv.len()
        );
        self.allowlist
            .run(&self.spec.binary, &self.spec.subcommand, &argv)
    }
}

/// Turn a validated tools.json into operations, one per declared tool, in declaration order.
pub fn command_operations(manifest: &ToolsManifest) -> Result<Vec<Operation>, String> {
    manifest.validate()?;
    let allowlist = Arc::new(manifest.to_allowlist());
    let mut ops = Vec::with_capacity(manifest.tools.len());
    for tool in &manifest.tools {
        let Some(spec) = manifest.execution.iter().find(|e| e.tool == tool.name) else {
            return Err(format!("tool {} has no execution entry", tool.name));
        };
        let parameters = if tool.parameters.is_null() {
            serde_json::json!({ "type": "object", "properties": {} })
        } else {
            tool.parameters.clone()
        };
        ops.push(Operation::new(
            tool.name.clone(),
            tool.description.clone().unwrap_or_default(),
            parameters,
            Arc::new(CommandOperation::new(allowlist.clone(), spec.clone())),
        ));
    }
    Ok(ops)
}

/// Normalize string so literal `\n` and `\t` from JSON become real newlines/tabs.
fn normalize_content(s: &str) -> String {
    s.replace("\\n", "\n").replace("\\t", "\t")
}

fn transform_param_value(s: String, arg: &ArgMapping) -> String {
    if arg.normalize_newlines == Some(true) {
        normalize_content(&s)
    } else {
        s
    }
}

/// Build argv from the execution spec's arg mapping and the JSON args object.
pub fn build_argv(
    spec: &ExecutionSpec,
    args: &serde_json::Value,
) -> Result<Vec<String>, InvocationError> {
    let obj = args
        .as_object()
        .ok_or_else(|| InvocationError::InvalidArgument("arguments must be an object".to_string()))?;
    let mut argv = Vec::new();
    for arg in &spec.args {
        match arg.kind {
            ArgKind::Positional => {
                let value = obj.get(&arg.param).ok_or_else(|| {
                    InvocationError::InvalidArgument(format!("missing parameter: {}", arg.param))
                })?;
                let s = json_value_to_string(value).ok_or_else(|| scalar_error(&arg.param))?;
                argv.push(transform_param_value(s, arg));
            }
            ArgKind::Flag => {
                let value = match obj.get(&arg.param) {
                    Some(v) if !v.is_null() => v,
                    _ => continue,
                };
                let s = json_value_to_string(value).ok_or_else(|| scalar_error(&arg.param))?;
                let flag = arg.flag.as_deref().unwrap_or(&arg.param);
                argv.push(format!("--{}", flag));
                argv.push(transform_param_value(s, arg));
            }
            ArgKind::FlagIfBoolean => {
                let flag = match parse_bool(obj.get(&arg.param)) {
                    Some(true) => arg.flag_if_true.as_deref(),
                    _ => arg.flag_if_false.as_deref(),
                };
                if let Some(f) = flag {
                    argv.push(f.to_string());
                }
            }
        }
    }
    Ok(argv)
}

fn scalar_error(param: &str) -> InvocationError {
    InvocationError::InvalidArgument(format!(
        "parameter {} must be a string, number, or boolean",
        param
    ))
}

fn json_value_to_string(v: &serde_json::Value) -> Option<String> {
    match v {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        serde_json::Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn parse_bool(v: Option<&serde_json::Value>) -> Option<bool> {
    match v {
        Some(serde_json::Value::Bool(b)) => Some(*b),
        Some(serde_json::Value::String(s)) => Some(s.eq_ignore_ascii_case("true")),
        Some(serde_json::Value::Number(n)) => n.as_i64().map(|i| i != 0),
        _ => None,
    }
}
