use std::collections::HashMap;

use anyhow::{bail, Result};
use tracing::{info, warn};

use super::assignee::AssigneeResolver;
use super::labels::{self, LabelCache};
use super::markers::{comment_marker, hidden, pr_marker};
use super::observe::FailureObserver;
use crate::model::candidate::CandidateItem;
use crate::model::comment::PullRequestRef;
use crate::model::tracked::{SyncResult, TrackedItem};
use crate::providers::{NewItem, Tracker};

/// Run-wide inputs shared by every item in a batch.
pub struct BatchContext<'a> {
    pub pr: &'a PullRequestRef,
    pub team_id: &'a str,
    pub label_mapping: &'a HashMap<String, Vec<String>>,
}

/// Create `items` one at a time in batch order.
///
/// A failing item is recorded in `errors` and the batch moves on. Each
/// created item's id is remembered by batch index so later items can name it
/// in their "depends on" note. `comment_ids` is every comment that went into
/// this run's extraction; all of them are stamped on every item.
pub async fn create_batch(
    tracker: &dyn Tracker,
    ctx: &BatchContext<'_>,
    label_cache: &mut LabelCache,
    observer: &dyn FailureObserver,
    items: &[CandidateItem],
    comment_ids: &[i64],
) -> SyncResult {
    let mut result = SyncResult::default();
    let mut created_ids: HashMap<usize, String> = HashMap::new();
    let mut assignees = AssigneeResolver::new(tracker, observer);

    for item in items {
        match create_one(
            tracker,
            ctx,
            label_cache,
            &mut assignees,
            item,
            comment_ids,
            &created_ids,
        )
        .await
        {
            Ok(tracked) => {
                info!(
                    index = item.index,
                    id = %tracked.external_id,
                    title = %tracked.title,
                    "Created tracker item"
                );
                created_ids.insert(item.index, tracked.external_id.clone());
                result.record_created(tracked);
            }
            Err(e) => {
                warn!(index = item.index, title = %item.title, error = %format!("{e:#}"), "Item creation failed");
                result.record_failure(format!("{}: {e:#}", item.title));
            }
        }
    }

    result
}

async fn create_one(
    tracker: &dyn Tracker,
    ctx: &BatchContext<'_>,
    label_cache: &mut LabelCache,
    assignees: &mut AssigneeResolver<'_>,
    item: &CandidateItem,
    comment_ids: &[i64],
    created_ids: &HashMap<usize, String>,
) -> Result<TrackedItem> {
    let label_ids = labels::resolve(
        tracker,
        ctx.team_id,
        label_cache,
        &item.labels,
        ctx.label_mapping,
    )
    .await?;
    let assignee_id = assignees.resolve(item.assignee.as_deref()).await;

    let new_item = NewItem {
        team_id: ctx.team_id.to_string(),
        title: item.title.clone(),
        description: build_description(item, ctx.pr, comment_ids, created_ids),
        priority_ordinal: item.priority.ordinal(),
        label_ids,
        assignee_id,
    };

    let outcome = tracker.create_item(&new_item).await?;
    match outcome.item {
        Some(tracked) if outcome.success => Ok(tracked),
        _ => bail!("{} did not create the item", tracker.name()),
    }
}

/// Description persisted in the tracker: the item text, a link back to the
/// pull request, hidden markers, then optional effort and dependency notes.
pub fn build_description(
    item: &CandidateItem,
    pr: &PullRequestRef,
    comment_ids: &[i64],
    created_ids: &HashMap<usize, String>,
) -> String {
    let mut sections = vec![item.description.trim().to_string()];

    sections.push(format!("Related PR: [{pr}]({})", pr.url()));

    let mut markers = vec![hidden(&pr_marker(pr))];
    markers.extend(comment_ids.iter().map(|id| hidden(&comment_marker(*id))));
    sections.push(markers.join("\n"));

    if let Some(effort) = item.effort {
        sections.push(format!("**Effort:** {effort}"));
    }

    let resolved: Vec<&str> = item
        .dependencies
        .iter()
        .filter(|dep| **dep < item.index)
        .filter_map(|dep| created_ids.get(dep).map(String::as_str))
        .collect();
    if !resolved.is_empty() {
        sections.push(format!("**Depends on:** {}", resolved.join(", ")));
    }

    sections.retain(|s| !s.is_empty());
    sections.join("\n\n")
}
