use coderev_core::CoderevError;

use crate::llm::{ChatMessage, Role};

/// Fixed reviewer persona sent as the system message of every request.
pub const SYSTEM_INSTRUCTION: &str = "\
You are a meticulous senior engineer. Provide structured, prioritized code review \
feedback in English. Cover correctness, maintainability, security, and performance. \
For every finding give an actionable fix, the tests that should be added, and call out \
any security or performance problem explicitly.";

const SEVERITY_INSTRUCTION: &str = "\
For each finding, state its severity, the root cause, and a concrete fix. \
Write the entire response in English.";

const CODE_HEADING: &str = "Code bundle:";

/// The two-message request for a single review run.
///
/// Built fresh per run and never mutated afterwards.
///
/// # Examples
///
/// ```
/// use coderev_review::prompt::build_request;
///
/// let request = build_request("security", "// Manual input\nx = 1").unwrap();
/// assert!(request.user_prompt.starts_with("Review focus: security"));
/// assert_eq!(request.messages().len(), 2);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewRequest {
    /// Reviewer persona, always [`SYSTEM_INSTRUCTION`].
    pub system_instruction: String,
    /// Focus line, instructions, and the reviewable unit.
    pub user_prompt: String,
}

impl ReviewRequest {
    /// The request as chat messages, system first.
    pub fn messages(&self) -> Vec<ChatMessage> {
        vec![
            ChatMessage {
                role: Role::System,
                content: self.system_instruction.clone(),
            },
            ChatMessage {
                role: Role::User,
                content: self.user_prompt.clone(),
            },
        ]
    }
}

/// Build the review request from the user's focus and the reviewable unit.
///
/// Sections appear in a fixed order separated by blank lines: the focus
/// line, the per-finding instruction, a heading, and the unit verbatim.
///
/// # Errors
///
/// Returns [`CoderevError::EmptyInput`] if `unit` is empty or whitespace-only.
pub fn build_request(focus: &str, unit: &str) -> Result<ReviewRequest, CoderevError> {
    if unit.trim().is_empty() {
        return Err(CoderevError::EmptyInput);
    }

    let focus_line = format!("Review focus: {focus}");
    let user_prompt = [
        focus_line.as_str(),
        SEVERITY_INSTRUCTION,
        CODE_HEADING,
        unit,
    ]
    .join("\n\n");

    Ok(ReviewRequest {
        system_instruction: SYSTEM_INSTRUCTION.to_string(),
        user_prompt,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_instruction_covers_review_dimensions() {
        for needle in ["correctness", "maintainability", "security", "performance"] {
            assert!(SYSTEM_INSTRUCTION.contains(needle), "missing {needle}");
        }
    }

    #[test]
    fn user_prompt_sections_are_ordered() {
        let unit = "// File: a.py\nx=1";
        let request = build_request("bugs, tests", unit).unwrap();
        let prompt = &request.user_prompt;

        let focus = prompt.find("Review focus: bugs, tests").unwrap();
        let severity = prompt.find("severity").unwrap();
        let code = prompt.find(unit).unwrap();
        assert!(focus < severity);
        assert!(severity < code);
        assert!(prompt.ends_with(unit));
    }

    #[test]
    fn sections_are_separated_by_blank_lines() {
        let request = build_request("perf", "code").unwrap();
        let sections: Vec<&str> = request.user_prompt.split("\n\n").collect();
        assert_eq!(sections.len(), 4);
        assert_eq!(sections[0], "Review focus: perf");
        assert_eq!(sections[2], CODE_HEADING);
        assert_eq!(sections[3], "code");
    }

    #[test]
    fn empty_unit_is_rejected() {
        assert!(matches!(
            build_request("bugs", ""),
            Err(CoderevError::EmptyInput)
        ));
        assert!(matches!(
            build_request("bugs", " \n\t"),
            Err(CoderevError::EmptyInput)
        ));
    }

    #[test]
    fn messages_put_system_first() {
        let request = build_request("bugs", "x").unwrap();
        let messages = request.messages();
        assert_eq!(messages[0].role, Role::System);
        assert_eq!(messages[0].content, SYSTEM_INSTRUCTION);
        assert_eq!(messages[1].role, Role::User);
        assert_eq!(messages[1].content, request.user_prompt);
    }
}
