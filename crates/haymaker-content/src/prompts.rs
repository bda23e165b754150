//! Email generation prompts.

use haymaker_core::Department;

pub const EMAIL_SYSTEM_PROMPT: &str = "You are a corporate email writer generating realistic internal business emails.
Write natural-sounding emails that an employee would send during their work day.
Keep emails concise (2-5 sentences for the body).
Include appropriate greetings and sign-offs.
Do not include any markers, tags, or metadata - just the email content.";

/// Topic hint used when no directive is given.
fn department_topic(department: Department) -> &'static str {
    match department {
        Department::Engineering => "about a code review, sprint update, or technical decision",
        Department::Sales => "about a client meeting, deal progress, or quarterly targets",
        Department::Hr => "about a policy update, onboarding, or team event",
        Department::Finance => "about budget review, expense report, or financial planning",
        Department::Operations => "about process improvement, vendor coordination, or logistics",
        Department::Executive => {
            "about strategic initiative, board preparation, or organizational update"
        }
    }
}

/// Build the user prompt for one email.
pub fn build_email_prompt(
    department: Department,
    worker_name: &str,
    directive: Option<&str>,
) -> String {
    let mut prompt = format!(
        "Write a short internal business email from {worker_name} in the {department} department."
    );

    match directive.map(str::trim).filter(|d| !d.is_empty()) {
        Some(directive) => {
            prompt.push_str(&format!("\n\nAdditional context: {directive}"));
        }
        None => {
            prompt.push_str(&format!(
                "\nThe email should be {}.",
                department_topic(department)
            ));
        }
    }

    prompt.push_str(
        "\n\nReturn ONLY the email content (subject line on first line, then body). No other text.",
    );
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_uses_topic_without_directive() {
        let p = build_email_prompt(Department::Sales, "Haymaker Worker 1", None);
        assert!(p.contains("Haymaker Worker 1"));
        assert!(p.contains("sales department"));
        assert!(p.contains("quarterly targets"));
        assert!(!p.contains("Additional context"));
    }

    #[test]
    fn test_prompt_uses_directive() {
        let p = build_email_prompt(
            Department::Engineering,
            "Haymaker Worker 2",
            Some("Announce the database migration window"),
        );
        assert!(p.contains("Additional context: Announce the database migration window"));
        assert!(!p.contains("code review"));
    }
}
