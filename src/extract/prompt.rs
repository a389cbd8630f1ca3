pub fn build_prompt(merged_text: &str, available_labels: &[String]) -> String {
    let labels = if available_labels.is_empty() {
        "none".to_string()
    } else {
        available_labels.join(", ")
    };

    format!(
        r#"You turn code review discussion into issue tracker tickets.

Read the pull request comments below and list the concrete follow-up work
they ask for. Ignore praise, questions that were answered, and anything
already done in the pull request.

## Comments
{merged_text}

## Output
Reply with a JSON array and nothing else. Each element:
{{
  "title": "short imperative title",
  "description": "what to do and why, in Markdown",
  "priority": "urgent" | "high" | "medium" | "low",
  "effort": "small" | "medium" | "large",            (optional)
  "labels": ["label", ...],                          (optional, prefer: {labels})
  "assignee": "email or name mentioned in the discussion",  (optional)
  "dependencies": [0, ...]                           (optional, indexes of EARLIER elements)
}}

If nothing is actionable, reply with []."#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_includes_comments_and_labels() {
        let prompt = build_prompt("[src/a.rs:3] add a test", &["Bug".into(), "Tests".into()]);
        assert!(prompt.contains("[src/a.rs:3] add a test"));
        assert!(prompt.contains("prefer: Bug, Tests"));
    }

    #[test]
    fn prompt_without_labels_says_none() {
        let prompt = build_prompt("x", &[]);
        assert!(prompt.contains("prefer: none"));
    }
}
