use super::pipeline::SyncOutcome;
use crate::error::SyncError;

/// Markdown reply posted back on the pull request.
pub fn format_summary(outcome: &Result<SyncOutcome, SyncError>) -> String {
    match outcome {
        Ok(SyncOutcome::NothingToDo) => {
            "**gitlin:** no open discussion to turn into issues.".to_string()
        }
        Ok(SyncOutcome::NothingNew) => {
            "**gitlin:** nothing new since the last sync.".to_string()
        }
        Ok(SyncOutcome::NoItems) => {
            "**gitlin:** no actionable items found in the new comments.".to_string()
        }
        Ok(SyncOutcome::Synced(result)) => {
            let mut lines = vec![format!(
                "**gitlin:** created {} issue{}.",
                result.issues.len(),
                if result.issues.len() == 1 { "" } else { "s" }
            )];
            if !result.issues.is_empty() {
                lines.push(String::new());
                lines.extend(
                    result
                        .issues
                        .iter()
                        .map(|i| format!("- [{}]({}) {}", i.external_id, i.url, i.title)),
                );
            }
            if !result.errors.is_empty() {
                lines.push(String::new());
                lines.push(format!("{} item(s) failed:", result.errors.len()));
                lines.extend(result.errors.iter().map(|e| format!("- {e}")));
            }
            lines.join("\n")
        }
        Err(e) => format!("**gitlin:** sync failed: {e}"),
    }
}
