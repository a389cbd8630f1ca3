//! Hidden marker tokens embedded in tracker descriptions.
//!
//! The tracker is the only state that survives between runs, so these tokens
//! are the idempotency ledger: `gitlin:pr:<owner>/<repo>/pull/<n>` ties an
//! item to its pull request and `gitlin:comment:<id>` records each comment
//! that fed into it. Both must survive the tracker verbatim and be findable
//! with a plain substring search.

use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;

use crate::model::comment::PullRequestRef;

pub const MARKER_PREFIX: &str = "gitlin";

static COMMENT_MARKER_REGEX: OnceLock<Regex> = OnceLock::new();

pub fn pr_marker(pr: &PullRequestRef) -> String {
    format!(
        "{MARKER_PREFIX}:pr:{}/{}/pull/{}",
        pr.owner, pr.repo, pr.number
    )
}

pub fn comment_marker(id: i64) -> String {
    format!("{MARKER_PREFIX}:comment:{id}")
}

/// Wrap a token in an HTML comment so it does not render.
pub fn hidden(token: &str) -> String {
    format!("<!-- {token} -->")
}

/// True when `text` carries `marker` as a whole token. Plain substring
/// search would let the marker for PR 4 match PR 42.
pub fn contains_marker(text: &str, marker: &str) -> bool {
    text.match_indices(marker).any(|(start, _)| {
        text[start + marker.len()..]
            .chars()
            .next()
            .map_or(true, |c| !c.is_ascii_digit())
    })
}

/// Every comment id recorded in `text`.
pub fn comment_ids_in(text: &str) -> HashSet<i64> {
    let re = COMMENT_MARKER_REGEX.get_or_init(|| {
        Regex::new(r"gitlin:comment:(\d+)").expect("comment marker regex is valid")
    });
    re.captures_iter(text)
        .filter_map(|caps| caps.get(1)?.as_str().parse().ok())
        .collect()
}
