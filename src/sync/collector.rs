use std::collections::HashSet;

use tracing::{debug, info};

use crate::error::{SyncError, TransportContext};
use crate::model::comment::{Comment, PullRequestRef};
use crate::providers::CommentSource;

/// Gather the discussion worth extracting from a pull request.
///
/// General comments that contain the trigger phrase are the invocation
/// itself and are skipped. Inline comments are kept only while their review
/// thread is unresolved; a comment missing from the resolution map counts as
/// unresolved. An empty result is a normal outcome.
pub async fn collect(
    source: &dyn CommentSource,
    pr: &PullRequestRef,
    trigger_phrase: &str,
) -> Result<Vec<Comment>, SyncError> {
    let general = source
        .general_comments(pr)
        .await
        .transport("fetching pull request comments")?;
    let review = source
        .review_comments(pr)
        .await
        .transport("fetching review comments")?;
    let resolution = source
        .resolution_map(pr)
        .await
        .transport("fetching review thread resolution")?;

    let mut seen = HashSet::new();
    let mut comments = Vec::with_capacity(general.len() + review.len());

    for comment in general {
        if !trigger_phrase.is_empty() && comment.body.contains(trigger_phrase) {
            debug!(comment_id = comment.id, "Skipping trigger comment");
            continue;
        }
        if comment.body.trim().is_empty() || !seen.insert(comment.id) {
            continue;
        }
        comments.push(comment);
    }

    for mut comment in review {
        comment.thread_resolved = resolution.get(&comment.id).copied().unwrap_or(false);
        if comment.thread_resolved {
            debug!(comment_id = comment.id, "Skipping comment in resolved thread");
            continue;
        }
        if comment.body.trim().is_empty() {
            continue;
        }
        if !seen.insert(comment.id) {
            debug!(comment_id = comment.id, "Skipping review comment with a duplicate id");
            continue;
        }
        comments.push(comment);
    }

    info!(pr = %pr, count = comments.len(), "Collected comments");
    Ok(comments)
}

/// Join comments into the single block of text handed to the extractor.
pub fn merge_text(comments: &[Comment]) -> String {
    comments
        .iter()
        .map(Comment::render)
        .collect::<Vec<_>>()
        .join("\n\n---\n\n")
}
