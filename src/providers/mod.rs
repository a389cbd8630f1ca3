pub mod github;
pub mod linear;

use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;

use crate::config::AppConfig;
use crate::model::comment::{Comment, PullRequestRef};
use crate::model::tracked::TrackedItem;

/// Reaction emoji GitHub accepts on comments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reaction {
    Eyes,
    Rocket,
    Confused,
}

impl Reaction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Reaction::Eyes => "eyes",
            Reaction::Rocket => "rocket",
            Reaction::Confused => "confused",
        }
    }
}

/// Where discussion comes from. Each method is one independent retrieval.
#[async_trait]
pub trait CommentSource: Send + Sync {
    /// Conversation comments on the pull request.
    async fn general_comments(&self, pr: &PullRequestRef) -> Result<Vec<Comment>>;
    /// Inline review comments. `thread_resolved` is left false here.
    async fn review_comments(&self, pr: &PullRequestRef) -> Result<Vec<Comment>>;
    /// Review comment id -> whether its owning thread is resolved.
    async fn resolution_map(&self, pr: &PullRequestRef) -> Result<HashMap<i64, bool>>;
    async fn post_comment(&self, pr: &PullRequestRef, body: &str) -> Result<()>;
    async fn react_to(&self, pr: &PullRequestRef, comment_id: i64, reaction: Reaction)
        -> Result<()>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackerIssue {
    /// Human-facing key, e.g. `ENG-42`.
    pub identifier: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackerLabel {
    pub id: String,
    pub name: String,
    /// `None` for workspace-wide labels.
    pub team_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackerUser {
    pub id: String,
    pub email: Option<String>,
    pub name: Option<String>,
    pub display_name: Option<String>,
}

/// Everything needed to create one item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewItem {
    pub team_id: String,
    pub title: String,
    pub description: String,
    pub priority_ordinal: u8,
    pub label_ids: Vec<String>,
    pub assignee_id: Option<String>,
}

/// The tracker's own verdict on a create call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemCreateOutcome {
    pub success: bool,
    pub item: Option<TrackedItem>,
}

#[async_trait]
pub trait Tracker: Send + Sync {
    fn name(&self) -> &str;
    /// Issues whose description contains `text`, archived ones included.
    async fn query_by_substring(&self, text: &str) -> Result<Vec<TrackerIssue>>;
    /// Every label usable by `team_id`: the team's own plus workspace labels.
    async fn list_labels(&self, team_id: &str) -> Result<Vec<TrackerLabel>>;
    async fn create_label(&self, name: &str, color: &str, team_id: &str) -> Result<String>;
    /// The full user directory.
    async fn list_users(&self) -> Result<Vec<TrackerUser>>;
    async fn create_item(&self, item: &NewItem) -> Result<ItemCreateOutcome>;
}


pub fn create_comment_source(config: &AppConfig) -> Result<Box<dyn CommentSource>> {
    let cfg = config
        .github
        .as_ref()
        .ok_or_else(|| anyhow::anyhow!("GitHub token missing: set GITHUB_TOKEN or [github] token"))?;
    Ok(Box::new(github::GitHubProvider::new(&cfg.token)?))
}

pub fn create_tracker(config: &AppConfig) -> Result<Box<dyn Tracker>> {
    let cfg = config.linear.as_ref().ok_or_else(|| {
        anyhow::anyhow!("Linear API key missing: set LINEAR_API_KEY or [linear] api_key")
    })?;
    Ok(Box::new(linear::LinearProvider::new(&cfg.api_key)?))
}
