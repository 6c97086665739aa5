//! Safe execution layer: run allowlisted binaries with allowlisted subcommands only.
//! No shell is used; arguments are passed as a list to avoid injection.

use std::collections::HashMap;
use std::process::Command;

use crate::skills::InvocationError;

/// Allowlist: binary name -> allowed subcommands (e.g. "notesmd-cli" -> ["search", "create"]).
#[derive(Debug, Clone, Default)]
pub struct Allowlist {
    bins: HashMap<String, Vec<String>>,
}

impl Allowlist {
    pub fn new() -> Self {
        Self {
            bins: HashMap::new(),
        }
    }

    /// Allow a binary to run only the given subcommands. Replaces any previous entry for the binary.
    pub fn allow_subcommands(&mut self, binary: impl Into<String>, subcommands: Vec<String>) {
        self.bins.insert(binary.into(), subcommands);
    }

    pub fn is_allowed(&self, binary: &str, subcommand: &str) -> bool {
        self.bins
            .get(binary)
            .is_some_and(|subs| subs.iter().any(|s| s == subcommand))
    }

    /// Run `binary subcommand args...` if allowed. Returns stdout; on failure stderr is included in the error.
    pub fn run(
        &self,
        binary: &str,
        subcommand: &str,
        args: &[String],
    ) -> Result<String, InvocationError> {
        if !self.bins.contains_key(binary) {
            return Err(InvocationError::Execution(format!(
                "binary not allowlisted: {}",
                binary
            )));
        }
        if !self.is_allowed(binary, subcommand) {
            return Err(InvocationError::Execution(format!(
                "subcommand not allowlisted: {} {}",
                binary, subcommand
            )));
        }
        let output = Command::new(binary)
            .arg(subcommand)
            .args(args)
            .output()
            .map_err(|e| InvocationError::Execution(format!("exec failed: {}", e)))?;
        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        if output.status.success() {
            Ok(stdout)
        } else {
            let mut msg = stdout;
            if !stderr.is_empty() {
                if !msg.is_empty() {
                    msg.push('\n');
                }
                msg.push_str(&stderr);
            }
            Err(InvocationError::Execution(format!(
                "exit {}: {}",
                output.status, msg
            )))
        }
    }
}
