use std::collections::HashMap;

use tracing::info;

use super::collector::{collect, merge_text};
use super::dedup::{already_processed, filter_new};
use super::labels::LabelCache;
use super::observe::FailureObserver;
use super::orchestrator::{create_batch, BatchContext};
use crate::error::{SyncError, TransportContext};
use crate::extract::Extractor;
use crate::model::comment::PullRequestRef;
use crate::model::tracked::SyncResult;
use crate::providers::{CommentSource, Tracker};

/// Per-invocation settings.
pub struct SyncContext {
    pub pr: PullRequestRef,
    pub team_id: String,
    pub trigger_phrase: String,
    pub label_mapping: HashMap<String, Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The pull request has no eligible discussion.
    NothingToDo,
    /// Every eligible comment was already synchronized by an earlier run.
    NothingNew,
    /// The extractor found nothing actionable in the new comments.
    NoItems,
    Synced(SyncResult),
}

/// One full synchronization pass for a pull request.
pub async fn run(
    source: &dyn CommentSource,
    tracker: &dyn Tracker,
    extractor: &dyn Extractor,
    ctx: &SyncContext,
    observer: &dyn FailureObserver,
) -> Result<SyncOutcome, SyncError> {
    let comments = collect(source, &ctx.pr, &ctx.trigger_phrase).await?;
    if comments.is_empty() {
        info!(pr = %ctx.pr, "No comments to process");
        return Ok(SyncOutcome::NothingToDo);
    }

    let processed = already_processed(tracker, &ctx.pr, observer).await;
    let fresh = filter_new(comments, &processed);
    if fresh.is_empty() {
        info!(pr = %ctx.pr, "All comments already synchronized");
        return Ok(SyncOutcome::NothingNew);
    }

    let merged = merge_text(&fresh);
    let comment_ids: Vec<i64> = fresh.iter().map(|c| c.id).collect();

    let mut label_cache = LabelCache::new();
    label_cache
        .ensure_loaded(tracker, &ctx.team_id)
        .await
        .transport("listing tracker labels")?;

    let items = extractor.extract(&merged, label_cache.names()).await?;
    info!(pr = %ctx.pr, comments = comment_ids.len(), items = items.len(), "Extracted candidate items");
    if items.is_empty() {
        return Ok(SyncOutcome::NoItems);
    }

    let batch = BatchContext {
        pr: &ctx.pr,
        team_id: &ctx.team_id,
        label_mapping: &ctx.label_mapping,
    };
    let result = create_batch(
        tracker,
        &batch,
        &mut label_cache,
        observer,
        &items,
        &comment_ids,
    )
    .await;

    info!(
        pr = %ctx.pr,
        created = result.issues.len(),
        failed = result.errors.len(),
        "Synchronization finished"
    );
    Ok(SyncOutcome::Synced(result))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::comment::Comment;
    use crate::providers::tests::{candidate, MockCommentSource, MockExtractor, MockTracker};
    use crate::sync::observe::RecordingObserver;

    fn ctx() -> SyncContext {
        SyncContext {
            pr: PullRequestRef::new("acme", "widgets", 7),
            team_id: "team-1".into(),
            trigger_phrase: "@gitlin".into(),
            label_mapping: HashMap::new(),
        }
    }

    #[tokio::test]
    async fn second_run_without_new_comments_skips_extraction() {
        let source = MockCommentSource {
            general: vec![Comment::general(1, "Fix bug A")],
            ..Default::default()
        };
        let tracker = MockTracker::default();
        let extractor = MockExtractor::returning(vec![candidate(0, "Fix bug A")]);
        let observer = RecordingObserver::default();

        let first = run(&source, &tracker, &extractor, &ctx(), &observer).await.unwrap();
        let result = match first {
            SyncOutcome::Synced(result) => result,
            other => panic!("expected a synced outcome, got {other:?}"),
        };
        assert!(result.success);
        assert_eq!(result.issues.len(), 1);
        assert!(tracker.created.lock().unwrap()[0]
            .description
            .contains("gitlin:comment:1"));

        let second = run(&source, &tracker, &extractor, &ctx(), &observer).await.unwrap();
        assert_eq!(second, SyncOutcome::NothingNew);
        assert_eq!(extractor.call_count(), 1);
        assert_eq!(tracker.created_count(), 1);
    }

    #[tokio::test]
    async fn only_new_comments_reach_the_extractor() {
        let mut source = MockCommentSource {
            general: vec![Comment::general(1, "Fix bug A")],
            ..Default::default()
        };
        let tracker = MockTracker::default();
        let extractor = MockExtractor::returning(vec![candidate(0, "Item")]);
        let observer = RecordingObserver::default();

        run(&source, &tracker, &extractor, &ctx(), &observer).await.unwrap();
        source.general.push(Comment::general(2, "Also fix bug B"));
        run(&source, &tracker, &extractor, &ctx(), &observer).await.unwrap();

        let seen = extractor.seen_text.lock().unwrap();
        assert_eq!(seen[1], "Also fix bug B");
        let created = tracker.created.lock().unwrap();
        assert!(created[1].description.contains("gitlin:comment:2"));
        assert!(!created[1].description.contains("gitlin:comment:1 "));
    }

    #[tokio::test]
    async fn empty_collection_is_nothing_to_do() {
        let source = MockCommentSource {
            general: vec![Comment::general(1, "@gitlin sync")],
            ..Default::default()
        };
        let tracker = MockTracker::default();
        let extractor = MockExtractor::default();
        let observer = RecordingObserver::default();

        let outcome = run(&source, &tracker, &extractor, &ctx(), &observer).await.unwrap();
        assert_eq!(outcome, SyncOutcome::NothingToDo);
        assert_eq!(extractor.call_count(), 0);
    }

    #[tokio::test]
    async fn validation_failure_persists_nothing() {
        let source = MockCommentSource {
            general: vec![Comment::general(1, "Fix bug A")],
            ..Default::default()
        };
        let tracker = MockTracker::default();
        let extractor = MockExtractor {
            reject: true,
            ..Default::default()
        };
        let observer = RecordingObserver::default();

        let err = run(&source, &tracker, &extractor, &ctx(), &observer)
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Validation(_)));
        assert_eq!(tracker.created_count(), 0);
        assert!(tracker.created_labels.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn empty_batch_is_no_items() {
        let source = MockCommentSource {
            general: vec![Comment::general(1, "LGTM")],
            ..Default::default()
        };
        let tracker = MockTracker::default();
        let extractor = MockExtractor::default();
        let observer = RecordingObserver::default();

        let outcome = run(&source, &tracker, &extractor, &ctx(), &observer).await.unwrap();
        assert_eq!(outcome, SyncOutcome::NoItems);
    }

    #[tokio::test]
    async fn dedup_failure_fails_open() {
        let source = MockCommentSource {
            general: vec![Comment::general(1, "Fix bug A")],
            ..Default::default()
        };
        let tracker = MockTracker {
            fail_query: true,
            ..Default::default()
        };
        let extractor = MockExtractor::returning(vec![candidate(0, "Fix bug A")]);
        let observer = RecordingObserver::default();

        let outcome = run(&source, &tracker, &extractor, &ctx(), &observer).await.unwrap();
        assert!(matches!(outcome, SyncOutcome::Synced(ref r) if r.success));
        assert_eq!(observer.sites.lock().unwrap().as_slice(), &["dedup lookup"]);
    }

    #[tokio::test]
    async fn extractor_sees_tracker_label_names() {
        let source = MockCommentSource {
            general: vec![Comment::general(1, "Fix bug A")],
            ..Default::default()
        };
        let tracker = MockTracker::with_labels(&["Bug", "Docs"]);
        let extractor = MockExtractor::default();
        let observer = RecordingObserver::default();

        run(&source, &tracker, &extractor, &ctx(), &observer).await.unwrap();
        assert_eq!(
            extractor.seen_labels.lock().unwrap()[0],
            vec!["Bug".to_string(), "Docs".to_string()]
        );
    }
}
