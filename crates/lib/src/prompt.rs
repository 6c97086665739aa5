//! System prompt assembly: date, workspace AGENTS.md, and the skills offered this round.

use std::fs;
use std::path::Path;

use crate::skills::SkillDescriptor;

/// Load agent context from the workspace (AGENTS.md).
///
/// Returns the file contents when AGENTS.md exists and is non-empty; otherwise None.
pub fn load_agent_ctx(workspace_dir: Option<&Path>) -> Option<String> {
    let dir = workspace_dir?;
    let path = dir.join("AGENTS.md");
    match fs::read_to_string(&path) {
        Ok(s) if !s.trim().is_empty() => Some(s),
        Ok(_) => None,
        Err(e) => {
            log::debug!("no agent context at {}: {}", path.display(), e);
            None
        }
    }
}

/// Compact list of skills: name, description and the operations that can be called.
pub fn skill_list(skills: &[&SkillDescriptor]) -> String {
    if skills.is_empty() {
        return "No skills are currently available.\n".to_string();
    }
    let mut out = String::new();
    for s in skills {
        out.push_str("- **");
        out.push_str(&s.name);
        out.push_str("**: ");
        out.push_str(if s.description.is_empty() {
            "(no description)"
        } else {
            s.description.trim()
        });
        let ops: Vec<&str> = s.operation_names().collect();
        if !(ops.len() == 1 && ops[0] == s.name) {
            out.push_str(" (tools: ");
            out.push_str(&ops.join(", "));
            out.push(')');
        }
        out.push('\n');
    }
    out
}

/// Build the system prompt for one model round.
///
/// `instructions` (from AGENTS.md or config) is appended after the skill list.
pub fn generate_system_prompt(skills: &[&SkillDescriptor], instructions: Option<&str>) -> String {
    let mut out = String::new();
    out.push_str("Today's date: ");
    out.push_str(&chrono::Local::now().format("%Y-%m-%d").to_string());
    out.push_str("\n\n");
    out.push_str("You are a helpful AI assistant with access to various skills and tools.\n\n");
    out.push_str("You can use the following skills to help users:\n");
    out.push_str(&skill_list(skills));
    out.push_str(
        "\nWhen a user asks you to do something:\n\
         1. Determine which skill(s) would be most appropriate\n\
         2. Use the skill(s) to accomplish the task\n\
         3. Provide a clear explanation of what you did\n\n\
         If you're unsure which skill to use, you can try multiple skills or ask the user for clarification.\n",
    );
    if let Some(extra) = instructions.map(str::trim).filter(|s| !s.is_empty()) {
        out.push_str("\nAdditional instructions:\n");
        out.push_str(extra);
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::skills::builtin;

    #[test]
    fn lists_skills_with_their_tools() {
        let calc = builtin::descriptor("calculator").unwrap();
        let text = builtin::descriptor("text_processor").unwrap();
        let prompt = generate_system_prompt(&[&calc, &text], Some("  Be brief.  "));
        assert!(prompt.starts_with("Today's date: "));
        assert!(prompt.contains("- **calculator**: Perform basic arithmetic"));
        assert!(!prompt.contains("(tools: calculator)"));
        assert!(prompt.contains("(tools: text_uppercase, text_lowercase"));
        assert!(prompt.ends_with("Additional instructions:\nBe brief.\n"));
    }

    #[test]
    fn empty_skill_list_says_so() {
        let prompt = generate_system_prompt(&[], None);
        assert!(prompt.contains("No skills are currently available."));
        assert!(!prompt.contains("Additional instructions"));
    }

    #[test]
    fn agent_ctx_requires_non_empty_file() {
        let dir = std::env::temp_dir().join(format!("skillful-ctx-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        assert!(load_agent_ctx(Some(&dir)).is_none());
        std::fs::write(dir.join("AGENTS.md"), "  \n").unwrap();
        assert!(load_agent_ctx(Some(&dir)).is_none());
        std::fs::write(dir.join("AGENTS.md"), "# Agent\nUse tools.\n").unwrap();
        assert_eq!(load_agent_ctx(Some(&dir)).as_deref(), Some("# Agent\nUse tools.\n"));
        assert!(load_agent_ctx(None).is_none());
    }
}
