use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};

use anyhow::Result;
use tracing::{debug, info, warn};

use crate::providers::Tracker;

/// Label applied to every item this tool creates.
pub const PROVENANCE_LABEL: &str = "gitlin";
pub const PROVENANCE_LABEL_COLOR: &str = "#6366f1";

/// Label name (lowercased) -> tracker id, filled from one full listing on
/// first use and kept for the rest of the run.
#[derive(Debug, Default)]
pub struct LabelCache {
    by_name: Option<HashMap<String, String>>,
    names: Vec<String>,
}

impl LabelCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn ensure_loaded(&mut self, tracker: &dyn Tracker, team_id: &str) -> Result<()> {
        if self.by_name.is_some() {
            return Ok(());
        }
        let labels = tracker.list_labels(team_id).await?;
        debug!(count = labels.len(), "Loaded tracker labels");

        // A team label shadows a workspace label of the same name.
        let mut by_name: HashMap<String, String> = HashMap::with_capacity(labels.len());
        for label in labels {
            match by_name.entry(label.name.to_lowercase()) {
                Entry::Vacant(entry) => {
                    entry.insert(label.id);
                    self.names.push(label.name);
                }
                Entry::Occupied(mut entry) if label.team_id.is_some() => {
                    entry.insert(label.id);
                }
                Entry::Occupied(_) => {}
            }
        }
        self.by_name = Some(by_name);
        Ok(())
    }

    /// Label names as the tracker spells them, in listing order.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    fn get(&self, name: &str) -> Option<&String> {
        self.by_name.as_ref()?.get(&name.to_lowercase())
    }

    fn insert(&mut self, name: &str, id: String) {
        self.names.push(name.to_string());
        self.by_name
            .get_or_insert_with(HashMap::new)
            .insert(name.to_lowercase(), id);
    }
}

/// Expand `requested` through `mapping`, add the provenance label, drop
/// case-insensitive duplicates. Order of first appearance is kept.
pub fn expand_names(requested: &[String], mapping: &HashMap<String, Vec<String>>) -> Vec<String> {
    let lowered: HashMap<String, &Vec<String>> = mapping
        .iter()
        .map(|(k, v)| (k.to_lowercase(), v))
        .collect();

    let mut seen = HashSet::new();
    let mut names = Vec::new();
    let expanded = requested
        .iter()
        .flat_map(|name| match lowered.get(&name.to_lowercase()) {
            Some(targets) => targets.iter().map(String::as_str).collect::<Vec<_>>(),
            None => vec![name.as_str()],
        })
        .chain(std::iter::once(PROVENANCE_LABEL));

    for name in expanded {
        let name = name.trim();
        if !name.is_empty() && seen.insert(name.to_lowercase()) {
            names.push(name.to_string());
        }
    }
    names
}

/// Resolve label names to tracker ids. The provenance label is created once
/// if missing; any other unknown name is dropped with a warning.
pub async fn resolve(
    tracker: &dyn Tracker,
    team_id: &str,
    cache: &mut LabelCache,
    requested: &[String],
    mapping: &HashMap<String, Vec<String>>,
) -> Result<Vec<String>> {
    cache.ensure_loaded(tracker, team_id).await?;

    let mut ids = Vec::new();
    for name in expand_names(requested, mapping) {
        if let Some(id) = cache.get(&name) {
            if !ids.contains(id) {
                ids.push(id.clone());
            }
            continue;
        }

        if name.eq_ignore_ascii_case(PROVENANCE_LABEL) {
            let id = tracker
                .create_label(PROVENANCE_LABEL, PROVENANCE_LABEL_COLOR, team_id)
                .await?;
            info!(label = PROVENANCE_LABEL, "Created provenance label");
            cache.insert(PROVENANCE_LABEL, id.clone());
            ids.push(id);
            continue;
        }

        warn!(label = %name, "Label not found in tracker, skipping");
    }
    Ok(ids)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::tests::MockTracker;
    use std::sync::atomic::Ordering;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn expansion_dedups_case_insensitively_and_adds_provenance() {
        let mapping = HashMap::from([(
            "Bug".to_string(),
            names(&["Defect", "Needs Triage"]),
        )]);
        let expanded = expand_names(&names(&["bug", "SECURITY", "security", "defect"]), &mapping);
        assert_eq!(expanded, names(&["Defect", "Needs Triage", "SECURITY", "gitlin"]));
    }

    #[tokio::test]
    async fn duplicate_requests_resolve_to_one_id_plus_provenance() {
        let tracker = MockTracker::with_labels(&["Security", "gitlin"]);
        let mut cache = LabelCache::new();

        let ids = resolve(
            &tracker,
            "team-1",
            &mut cache,
            &names(&["security", "security"]),
            &HashMap::new(),
        )
        .await
        .unwrap();

        assert_eq!(ids, names(&["label-0", "label-1"]));
    }

    #[tokio::test]
    async fn provenance_label_is_created_once_per_run() {
        let tracker = MockTracker::with_labels(&["Bug"]);
        let mut cache = LabelCache::new();

        let first = resolve(&tracker, "team-1", &mut cache, &names(&["bug"]), &HashMap::new())
            .await
            .unwrap();
        let second = resolve(&tracker, "team-1", &mut cache, &[], &HashMap::new())
            .await
            .unwrap();

        assert_eq!(first, names(&["label-0", "label-1"]));
        assert_eq!(second, names(&["label-1"]));
        assert_eq!(tracker.created_labels.lock().unwrap().as_slice(), &["gitlin"]);
        assert_eq!(tracker.label_list_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unknown_labels_are_dropped() {
        let tracker = MockTracker::with_labels(&["gitlin"]);
        let mut cache = LabelCache::new();

        let ids = resolve(
            &tracker,
            "team-1",
            &mut cache,
            &names(&["does-not-exist"]),
            &HashMap::new(),
        )
        .await
        .unwrap();

        assert_eq!(ids, names(&["label-0"]));
        assert!(tracker.created_labels.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn cache_exposes_names_for_extraction() {
        let tracker = MockTracker::with_labels(&["Bug", "Performance"]);
        let mut cache = LabelCache::new();

        cache.ensure_loaded(&tracker, "team-1").await.unwrap();
        cache.ensure_loaded(&tracker, "team-1").await.unwrap();

        assert_eq!(cache.names(), names(&["Bug", "Performance"]).as_slice());
        assert_eq!(tracker.label_list_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn team_label_wins_over_workspace_label_and_other_teams_are_ignored() {
        let tracker = MockTracker::with_labels(&["Bug", "gitlin"]);
        tracker.add_team_label("other-bug", "Bug", "team-2");
        tracker.add_team_label("team-bug", "bug", "team-1");
        tracker.add_team_label("other-perf", "Performance", "team-2");
        let mut cache = LabelCache::new();

        let ids = resolve(
            &tracker,
            "team-1",
            &mut cache,
            &names(&["BUG", "performance"]),
            &HashMap::new(),
        )
        .await
        .unwrap();

        assert_eq!(ids, names(&["team-bug", "label-1"]));
        assert_eq!(cache.names(), names(&["Bug", "gitlin"]).as_slice());
        assert!(tracker.created_labels.lock().unwrap().is_empty());
    }
}
