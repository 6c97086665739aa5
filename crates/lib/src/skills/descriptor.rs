//! Skill descriptor: immutable metadata plus the operations a skill exposes.
//!
//! A descriptor is built once (from a manifest or the builtin catalog) and then
//! shared as `Arc<SkillDescriptor>` by the registry. Nothing mutates it afterwards.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::llm::{ToolDefinition, ToolFunctionDefinition};

/// Who may be offered a skill.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    #[default]
    Public,
    Private,
    Internal,
}

impl Visibility {
    pub const ALL: [Visibility; 3] = [Visibility::Public, Visibility::Private, Visibility::Internal];

    pub fn as_str(&self) -> &'static str {
        match self {
            Visibility::Public => "public",
            Visibility::Private => "private",
            Visibility::Internal => "internal",
        }
    }
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure of a single operation call. Reported back to the model, never fatal to the loop.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvocationError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("{0}")]
    Execution(String),
    #[error("unknown tool: {0}")]
    UnknownTool(String),
}

/// The callable behind an operation. Pure request/response: no access to registry or history.
pub trait OperationHandler: Send + Sync {
    fn invoke(&self, args: &serde_json::Value) -> Result<String, InvocationError>;
}

impl<F> OperationHandler for F
where
    F: Fn(&serde_json::Value) -> Result<String, InvocationError> + Send + Sync,
{
    fn invoke(&self, args: &serde_json::Value) -> Result<String, InvocationError> {
        self(args)
    }
}

/// One named invocable entry of a skill; the unit the model calls.
#[derive(Clone)]
pub struct Operation {
    pub name: String,
    pub description: String,
    /// JSON schema for the arguments object (Ollama function-calling shape).
    pub parameters: serde_json::Value,
    pub handler: Arc<dyn OperationHandler>,
}

impl Operation {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: serde_json::Value,
        handler: Arc<dyn OperationHandler>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
            handler,
        }
    }

    pub fn to_tool_definition(&self) -> ToolDefinition {
        ToolDefinition {
            typ: "function".to_string(),
            function: ToolFunctionDefinition {
                name: self.name.clone(),
                description: if self.description.is_empty() {
                    None
                } else {
                    Some(self.description.clone())
                },
                parameters: self.parameters.clone(),
            },
        }
    }
}

impl fmt::Debug for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Operation")
            .field("name", &self.name)
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

/// Metadata and operations for one skill.
#[derive(Debug, Clone)]
pub struct SkillDescriptor {
    pub name: String,
    pub description: String,
    /// Deduplicated, in order of first appearance.
    pub tags: Vec<String>,
    pub visibility: Visibility,
    pub version: String,
    pub author: String,
    pub dependencies: Vec<String>,
    pub operations: Vec<Operation>,
    /// Where the skill came from: a directory path or `builtin:<key>`.
    pub origin: String,
}

impl SkillDescriptor {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            tags: Vec::new(),
            visibility: Visibility::Public,
            version: "1.0.0".to_string(),
            author: String::new(),
            dependencies: Vec::new(),
            operations: Vec::new(),
            origin: String::new(),
        }
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for t in tags {
            let t = t.into();
            let t = t.trim();
            if !t.is_empty() && !self.tags.iter().any(|x| x == t) {
                self.tags.push(t.to_string());
            }
        }
        self
    }

    pub fn with_visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = author.into();
        self
    }

    pub fn with_dependencies(mut self, deps: Vec<String>) -> Self {
        self.dependencies = deps;
        self
    }

    pub fn with_operation(mut self, op: Operation) -> Self {
        self.operations.push(op);
        self
    }

    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = origin.into();
        self
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t.eq_ignore_ascii_case(tag))
    }

    pub fn operation(&self, name: &str) -> Option<&Operation> {
        self.operations.iter().find(|o| o.name == name)
    }

    pub fn operation_names(&self) -> impl Iterator<Item = &str> {
        self.operations.iter().map(|o| o.name.as_str())
    }

    /// Tool definitions for all operations, in declaration order.
    pub fn to_tool_definitions(&self) -> Vec<ToolDefinition> {
        self.operations
            .iter()
            .map(Operation::to_tool_definition)
            .collect()
    }
}
