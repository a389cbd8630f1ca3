use serde::{Deserialize, Serialize};
use std::fmt;

/// Which GitHub channel a comment came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommentOrigin {
    /// Conversation tab comment on the pull request as a whole.
    General,
    /// Inline review comment anchored to a file (and usually a line).
    Located,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: i64,
    pub body: String,
    pub origin: CommentOrigin,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    #[serde(default)]
    pub thread_resolved: bool,
}

impl Comment {
    pub fn general(id: i64, body: impl Into<String>) -> Self {
        Self {
            id,
            body: body.into(),
            origin: CommentOrigin::General,
            path: None,
            line: None,
            thread_resolved: false,
        }
    }

    pub fn located(id: i64, body: impl Into<String>, path: &str, line: Option<u32>) -> Self {
        Self {
            id,
            body: body.into(),
            origin: CommentOrigin::Located,
            path: Some(path.to_string()),
            line,
            thread_resolved: false,
        }
    }

    /// Text used when merging comments for extraction. Inline comments carry
    /// their file/line so the extractor knows what code they talk about.
    pub fn render(&self) -> String {
        match (self.origin, self.path.as_deref()) {
            (CommentOrigin::Located, Some(path)) => match self.line {
                Some(line) => format!("[{path}:{line}] {}", self.body),
                None => format!("[{path}] {}", self.body),
            },
            _ => self.body.clone(),
        }
    }
}

/// A reference to one pull request, the "thread" every run is scoped to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PullRequestRef {
    pub owner: String,
    pub repo: String,
    pub number: u64,
}

impl PullRequestRef {
    pub fn new(owner: impl Into<String>, repo: impl Into<String>, number: u64) -> Self {
        Self {
            owner: owner.into(),
            repo: repo.into(),
            number,
        }
    }

    pub fn url(&self) -> String {
        format!(
            "https://github.com/{}/{}/pull/{}",
            self.owner, self.repo, self.number
        )
    }
}

impl fmt::Display for PullRequestRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}#{}", self.owner, self.repo, self.number)
    }
}
