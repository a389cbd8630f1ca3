use std::collections::HashSet;

use tracing::{debug, info};

use super::markers::{comment_ids_in, contains_marker, pr_marker};
use super::observe::FailureObserver;
use crate::model::comment::{Comment, PullRequestRef};
use crate::providers::Tracker;

/// Comment ids already synchronized for `pr`, recovered from the markers in
/// existing tracker items. A failed lookup counts as "nothing processed":
/// a possible duplicate is preferred over silently dropping new work.
pub async fn already_processed(
    tracker: &dyn Tracker,
    pr: &PullRequestRef,
    observer: &dyn FailureObserver,
) -> HashSet<i64> {
    let marker = pr_marker(pr);
    let issues = match tracker.query_by_substring(&marker).await {
        Ok(issues) => issues,
        Err(e) => {
            observer.absorbed("dedup lookup", &e);
            return HashSet::new();
        }
    };

    let mut processed = HashSet::new();
    for issue in &issues {
        let Some(description) = issue.description.as_deref() else {
            continue;
        };
        if !contains_marker(description, &marker) {
            continue;
        }
        let ids = comment_ids_in(description);
        debug!(issue = %issue.identifier, comments = ids.len(), "Item carries sync markers");
        processed.extend(ids);
    }

    info!(
        pr = %pr,
        issues = issues.len(),
        processed = processed.len(),
        "Loaded processed comment ids"
    );
    processed
}

/// Thread-level check: every collected comment has already been synchronized.
pub async fn is_fully_processed(
    tracker: &dyn Tracker,
    pr: &PullRequestRef,
    comments: &[Comment],
    observer: &dyn FailureObserver,
) -> bool {
    let processed = already_processed(tracker, pr, observer).await;
    filter_new(comments.to_vec(), &processed).is_empty()
}

/// Drop comments whose ids are in `processed`, keeping order.
pub fn filter_new(comments: Vec<Comment>, processed: &HashSet<i64>) -> Vec<Comment> {
    let before = comments.len();
    let fresh: Vec<Comment> = comments
        .into_iter()
        .filter(|c| !processed.contains(&c.id))
        .collect();
    debug!(before, after = fresh.len(), "Filtered processed comments");
    fresh
}
