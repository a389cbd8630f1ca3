use serde::Deserialize;

use crate::error::SyncError;
use crate::model::candidate::{CandidateItem, Effort, Priority};

/// One element of the extractor's reply, exactly as it must appear.
#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawCandidate {
    title: String,
    description: String,
    #[serde(default)]
    priority: Priority,
    #[serde(default)]
    effort: Option<Effort>,
    #[serde(default)]
    labels: Vec<String>,
    #[serde(default)]
    assignee: Option<String>,
    #[serde(default)]
    dependencies: Vec<usize>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Reply {
    Items(Vec<RawCandidate>),
    Envelope { items: Vec<RawCandidate> },
}

/// Parse the extractor reply into a candidate batch. The reply may be wrapped
/// in a Markdown code fence; anything else off-shape is rejected whole.
pub fn parse_candidates(reply: &str) -> Result<Vec<CandidateItem>, SyncError> {
    let json = strip_code_fence(reply);
    if json.is_empty() {
        return Err(SyncError::Validation("empty reply".into()));
    }

    let raw = match serde_json::from_str::<Reply>(json) {
        Ok(Reply::Items(items)) | Ok(Reply::Envelope { items }) => items,
        Err(_) => {
            // The untagged error says nothing useful; retry as a bare array for a real message.
            let err = serde_json::from_str::<Vec<RawCandidate>>(json)
                .err()
                .map(|e| e.to_string())
                .unwrap_or_else(|| "unrecognised reply shape".to_string());
            return Err(SyncError::Validation(err));
        }
    };

    raw.into_iter()
        .enumerate()
        .map(|(index, c)| {
            if c.title.trim().is_empty() {
                return Err(SyncError::Validation(format!("item {index} has an empty title")));
            }
            Ok(CandidateItem {
                index,
                title: c.title.trim().to_string(),
                description: c.description,
                priority: c.priority,
                effort: c.effort,
                labels: c.labels,
                assignee: c.assignee,
                dependencies: c.dependencies,
            })
        })
        .collect()
}

fn strip_code_fence(reply: &str) -> &str {
    let trimmed = reply.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string (```json) up to the first newline.
    let body = rest.split_once('\n').map_or("", |(_, body)| body);
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_bare_array_and_assigns_indexes() {
        let reply = r#"[
            {"title": "Add retries", "description": "Retry on 502", "priority": "High"},
            {"title": "Document retries", "description": "README", "priority": "low",
             "effort": "small", "labels": ["Docs"], "assignee": "ada", "dependencies": [0]}
        ]"#;

        let items = parse_candidates(reply).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].index, 0);
        assert_eq!(items[0].priority, Priority::High);
        assert_eq!(items[1].index, 1);
        assert_eq!(items[1].effort, Some(Effort::Small));
        assert_eq!(items[1].dependencies, vec![0]);
        assert_eq!(items[1].assignee.as_deref(), Some("ada"));
    }

    #[test]
    fn accepts_fenced_and_enveloped_replies() {
        let fenced = "```json\n[{\"title\": \"A\", \"description\": \"\", \"priority\": \"medium\"}]\n```";
        assert_eq!(parse_candidates(fenced).unwrap().len(), 1);

        let envelope = r#"{"items": [{"title": "A", "description": "", "priority": "medium"}]}"#;
        assert_eq!(parse_candidates(envelope).unwrap().len(), 1);
    }

    #[test]
    fn empty_array_is_an_empty_batch() {
        assert!(parse_candidates("[]").unwrap().is_empty());
    }

    #[test]
    fn missing_required_field_is_rejected() {
        let err = parse_candidates(r#"[{"title": "A", "priority": "high"}]"#).unwrap_err();
        assert!(matches!(err, SyncError::Validation(ref m) if m.contains("description")));
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let reply = r#"[{"title": "A", "description": "", "priority": "high", "severity": 3}]"#;
        assert!(matches!(parse_candidates(reply), Err(SyncError::Validation(_))));
    }

    #[test]
    fn bad_effort_and_negative_dependency_are_rejected() {
        let effort = r#"[{"title": "A", "description": "", "priority": "high", "effort": "huge"}]"#;
        assert!(parse_candidates(effort).is_err());
        let deps = r#"[{"title": "A", "description": "", "priority": "high", "dependencies": [-1]}]"#;
        assert!(parse_candidates(deps).is_err());
    }

    #[test]
    fn blank_title_and_prose_replies_are_rejected() {
        let blank = r#"[{"title": "  ", "description": "", "priority": "high"}]"#;
        assert!(parse_candidates(blank).is_err());
        assert!(parse_candidates("Sure! Here are the items:").is_err());
        assert!(parse_candidates("").is_err());
    }

    #[test]
    fn unknown_priority_text_falls_back_to_medium() {
        let reply = r#"[{"title": "A", "description": "", "priority": "P1"}]"#;
        assert_eq!(parse_candidates(reply).unwrap()[0].priority, Priority::Medium);
    }

    #[test]
    fn missing_priority_defaults_to_medium() {
        let reply = r#"[{"title": "A", "description": ""}]"#;
        let items = parse_candidates(reply).unwrap();
        assert_eq!(items[0].priority, Priority::Medium);
        assert_eq!(items[0].priority.ordinal(), 2);
    }
}
