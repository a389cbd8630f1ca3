use serde::{Deserialize, Serialize};

/// An item that now exists in the tracker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedItem {
    /// Human-readable tracker identifier, e.g. `ENG-42`.
    pub external_id: String,
    pub url: String,
    pub title: String,
}

/// Outcome of one batch creation. `success` is false as soon as one item failed;
/// items created before and after the failure are still listed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncResult {
    pub success: bool,
    pub issues: Vec<TrackedItem>,
    pub errors: Vec<String>,
}

impl Default for SyncResult {
    fn default() -> Self {
        Self {
            success: true,
            issues: Vec::new(),
            errors: Vec::new(),
        }
    }
}

impl SyncResult {
    pub fn record_created(&mut self, item: TrackedItem) {
        self.issues.push(item);
    }

    pub fn record_failure(&mut self, message: String) {
        self.success = false;
        self.errors.push(message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_flips_success_but_keeps_created_items() {
        let mut result = SyncResult::default();
        result.record_created(TrackedItem {
            external_id: "ENG-1".into(),
            url: "https://linear.app/acme/issue/ENG-1".into(),
            title: "First".into(),
        });
        assert!(result.success);

        result.record_failure("Second: boom".into());
        assert!(!result.success);
        assert_eq!(result.issues.len(), 1);
        assert_eq!(result.errors, vec!["Second: boom".to_string()]);
    }
}
