use tracing::{debug, warn};

use super::observe::FailureObserver;
use crate::providers::{Tracker, TrackerUser};

/// Maps free-text assignee hints to tracker user ids. The user directory is
/// fetched on the first hint that needs it and reused for the run.
pub struct AssigneeResolver<'a> {
    tracker: &'a dyn Tracker,
    observer: &'a dyn FailureObserver,
    users: Option<Vec<TrackerUser>>,
}

impl<'a> AssigneeResolver<'a> {
    pub fn new(tracker: &'a dyn Tracker, observer: &'a dyn FailureObserver) -> Self {
        Self {
            tracker,
            observer,
            users: None,
        }
    }

    /// `None` for empty hints, "unassigned", no match, or an unreachable
    /// directory. Never an error: a missing assignee must not block creation.
    pub async fn resolve(&mut self, hint: Option<&str>) -> Option<String> {
        let hint = hint?.trim().trim_start_matches('@').trim();
        if hint.is_empty() || hint.eq_ignore_ascii_case("unassigned") {
            return None;
        }

        if self.users.is_none() {
            match self.tracker.list_users().await {
                Ok(users) => self.users = Some(users),
                Err(e) => {
                    self.observer.absorbed("user directory", &e);
                    return None;
                }
            }
        }

        let users = self.users.as_deref().unwrap_or_default();
        match find_user(users, hint) {
            Some(user) => {
                debug!(hint, user_id = %user.id, "Resolved assignee");
                Some(user.id.clone())
            }
            None => {
                warn!(hint, "No tracker user matches assignee hint");
                None
            }
        }
    }
}

/// First user, in directory order, whose email, display name or full name
/// equals or contains the hint, ignoring case.
pub fn find_user<'u>(users: &'u [TrackerUser], hint: &str) -> Option<&'u TrackerUser> {
    let needle = hint.to_lowercase();
    users.iter().find(|user| {
        [&user.email, &user.display_name, &user.name]
            .into_iter()
            .flatten()
            .any(|field| field.to_lowercase().contains(&needle))
    })
}
