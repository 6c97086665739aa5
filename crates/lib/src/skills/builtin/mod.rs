//! Builtin skill bodies compiled into the binary.
//!
//! Each entry in the catalog is keyed by the name a SKILL.md uses in its `builtin`
//! field and yields a default descriptor with its operations bound. The
//! [`BuiltinSource`] exposes the whole catalog as a skill source so an agent can
//! run without any skill directory.

mod calculator;
mod example;
mod text;
mod time;

use std::sync::Arc;

use super::descriptor::{InvocationError, Operation, OperationHandler, SkillDescriptor};
use super::error::{LoadError, RegistryError};
use super::source::SkillSource;

pub use calculator::evaluate;

/// Catalog keys, in the order [`BuiltinSource`] yields them.
pub const CATALOG: &[&str] = &["calculator", "example", "text_processor", "time"];

/// Default descriptor (metadata and operations) for a catalog key.
pub fn descriptor(key: &str) -> Option<SkillDescriptor> {
    let d = match key {
        "calculator" => calculator::descriptor(),
        "example" => example::descriptor(),
        "text_processor" => text::descriptor(),
        "time" => time::descriptor(),
        _ => return None,
    };
    Some(d.with_origin(format!("builtin:{}", key)))
}

/// Operations for a catalog key (used when a manifest supplies its own metadata).
pub fn operations(key: &str) -> Option<Vec<Operation>> {
    descriptor(key).map(|d| d.operations)
}

/// The builtin catalog as a skill source. Never unreachable.
#[derive(Debug, Clone, Default)]
pub struct BuiltinSource {
    skip: Vec<String>,
}

impl BuiltinSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Leave out the given catalog keys (e.g. ones already provided by a skill directory).
    pub fn without<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.skip.extend(keys.into_iter().map(Into::into));
        self
    }
}

impl SkillSource for BuiltinSource {
    fn label(&self) -> String {
        "builtin".to_string()
    }

    fn scan(&self) -> Result<Vec<Result<SkillDescriptor, LoadError>>, RegistryError> {
        Ok(CATALOG
            .iter()
            .filter(|k| !self.skip.iter().any(|s| s == *k))
            .filter_map(|k| descriptor(k))
            .map(Ok)
            .collect())
    }
}

/// Wrap a plain function as a shared handler.
fn handler(
    f: fn(&serde_json::Value) -> Result<String, InvocationError>,
) -> Arc<dyn OperationHandler> {
    Arc::new(f)
}

/// JSON schema for an operation taking a single required string parameter.
fn single_string_param(name: &str, description: &str) -> serde_json::Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            name: { "type": "string", "description": description }
        },
        "required": [name]
    })
}

fn no_params() -> serde_json::Value {
    serde_json::json!({ "type": "object", "properties": {} })
}

/// Read a required string argument. Models occasionally send the arguments object as a JSON string.
fn str_arg(args: &serde_json::Value, name: &str) -> Result<String, InvocationError> {
    let parsed;
    let obj = match args {
        serde_json::Value::String(raw) => {
            parsed = serde_json::from_str::<serde_json::Value>(raw).map_err(|_| {
                InvocationError::InvalidArgument("arguments must be an object".to_string())
            })?;
            &parsed
        }
        other => other,
    };
    match obj.get(name) {
        Some(serde_json::Value::String(s)) => Ok(s.clone()),
        Some(serde_json::Value::Number(n)) => Ok(n.to_string()),
        Some(_) => Err(InvocationError::InvalidArgument(format!(
            "parameter {} must be a string",
            name
        ))),
        None => Err(InvocationError::InvalidArgument(format!(
            "missing parameter: {}",
            name
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn catalog_descriptors_are_complete() {
        for key in CATALOG {
            let d = descriptor(key).unwrap();
            assert_eq!(&d.name, key);
            assert!(!d.description.is_empty());
            assert!(!d.operations.is_empty());
            assert_eq!(d.origin, format!("builtin:{}", key));
        }
        assert!(descriptor("shell").is_none());
    }

    #[test]
    fn builtin_source_skips_requested_keys() {
        let units = BuiltinSource::new().without(["time"]).scan().unwrap();
        let names: Vec<String> = units.into_iter().map(|u| u.unwrap().name).collect();
        assert_eq!(names, vec!["calculator", "example", "text_processor"]);
    }

    #[test]
    fn str_arg_accepts_stringified_objects() {
        assert_eq!(str_arg(&json!({"text": "hi"}), "text").unwrap(), "hi");
        assert_eq!(str_arg(&json!("{\"text\": \"hi\"}"), "text").unwrap(), "hi");
        assert!(str_arg(&json!({}), "text").is_err());
        assert!(str_arg(&json!({"text": [1]}), "text").is_err());
    }
}
