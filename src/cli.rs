use anyhow::{bail, Context, Result};
use tracing::info;

use crate::config;
use crate::extract::{ClaudeExtractor, Extractor};
use crate::model::comment::PullRequestRef;
use crate::providers::{self, CommentSource, Reaction, Tracker};
use crate::sync::observe::{best_effort, FailureObserver, LogObserver};
use crate::sync::pipeline::{self, SyncContext, SyncOutcome};
use crate::sync::report::format_summary;

#[derive(Debug, PartialEq, Eq)]
pub struct SyncArgs {
    pub pr: PullRequestRef,
    pub trigger_comment: Option<i64>,
}

/// Run `gitlin sync`. Returns whether every item was created.
pub async fn handle_sync(args: &[String]) -> Result<bool> {
    let args = parse_sync_args(args)?;

    let config = config::load_config()?;
    let team_id = config
        .linear
        .as_ref()
        .map(|l| l.team_id.clone())
        .filter(|t| !t.is_empty())
        .context("Linear team id missing: set LINEAR_TEAM_ID or [linear] team_id")?;

    let source = providers::create_comment_source(&config)?;
    let tracker = providers::create_tracker(&config)?;
    let extractor = ClaudeExtractor::new(config.extract.command.clone());

    let ctx = SyncContext {
        pr: args.pr,
        team_id,
        trigger_phrase: config.sync.trigger_phrase.clone(),
        label_mapping: config.labels,
    };
    info!(pr = %ctx.pr, tracker = tracker.name(), "Starting sync");
    run_with_feedback(
        source.as_ref(),
        tracker.as_ref(),
        &extractor,
        &ctx,
        args.trigger_comment,
        &LogObserver,
    )
    .await
}

/// Run the pipeline with feedback on the pull request: eyes on the trigger
/// comment, a summary reply, then rocket or confused. Feedback never changes
/// the result. Returns whether every item was created.
pub async fn run_with_feedback(
    source: &dyn CommentSource,
    tracker: &dyn Tracker,
    extractor: &dyn Extractor,
    ctx: &SyncContext,
    trigger_comment: Option<i64>,
    observer: &dyn FailureObserver,
) -> Result<bool> {
    if let Some(id) = trigger_comment {
        best_effort(observer, "reaction", source.react_to(&ctx.pr, id, Reaction::Eyes)).await;
    }

    let outcome = pipeline::run(source, tracker, extractor, ctx, observer).await;

    let summary = format_summary(&outcome);
    println!("{summary}");
    best_effort(observer, "summary reply", source.post_comment(&ctx.pr, &summary)).await;

    let succeeded = match &outcome {
        Ok(SyncOutcome::Synced(result)) => result.success,
        Ok(_) => true,
        Err(_) => false,
    };

    if let Some(id) = trigger_comment {
        let reaction = if succeeded {
            Reaction::Rocket
        } else {
            Reaction::Confused
        };
        best_effort(observer, "reaction", source.react_to(&ctx.pr, id, reaction)).await;
    }

    outcome?;
    Ok(succeeded)
}

/// Parse `gitlin sync` arguments.
///
/// Supported forms:
///   gitlin sync owner/repo 42
///   gitlin sync owner/repo#42
///   gitlin sync https://github.com/owner/repo/pull/42
///   gitlin sync owner/repo 42 --trigger-comment 123456
pub fn parse_sync_args(args: &[String]) -> Result<SyncArgs> {
    let mut positional: Vec<&str> = Vec::new();
    let mut trigger_comment = None;
    let mut i = 0;

    while i < args.len() {
        match args[i].as_str() {
            "-c" | "--trigger-comment" => {
                i += 1;
                let value = args
                    .get(i)
                    .context("Missing value for --trigger-comment flag")?;
                trigger_comment = Some(
                    value
                        .parse::<i64>()
                        .with_context(|| format!("Invalid comment id: {value}"))?,
                );
            }
            other => positional.push(other),
        }
        i += 1;
    }

    let pr = match positional.as_slice() {
        [target] => parse_pr_target(target, None)?,
        [target, number] => parse_pr_target(target, Some(*number))?,
        _ => bail!(
            "Usage: gitlin sync <owner>/<repo> <number> [--trigger-comment <id>]\n\nExamples:\n  gitlin sync acme/widgets 42\n  gitlin sync https://github.com/acme/widgets/pull/42"
        ),
    };

    Ok(SyncArgs {
        pr,
        trigger_comment,
    })
}

fn parse_pr_target(target: &str, number: Option<&str>) -> Result<PullRequestRef> {
    let target = target
        .trim_start_matches("https://")
        .trim_start_matches("github.com/")
        .trim_end_matches('/');

    let (repo_part, number) = match (target.split_once("/pull/"), target.split_once('#'), number)
    {
        (Some((repo, n)), _, None) => (repo, n),
        (None, Some((repo, n)), None) => (repo, n),
        (None, None, Some(n)) => (target, n),
        _ => bail!("Cannot parse pull request reference: {target}"),
    };

    let (owner, repo) = repo_part
        .split_once('/')
        .filter(|(o, r)| !o.is_empty() && !r.is_empty() && !r.contains('/'))
        .with_context(|| format!("Expected <owner>/<repo>, got {repo_part}"))?;
    let number: u64 = number
        .parse()
        .with_context(|| format!("Invalid pull request number: {number}"))?;

    Ok(PullRequestRef::new(owner, repo, number))
}

pub fn print_help() {
    println!("gitlin — turn pull request discussion into Linear issues\n");
    println!("USAGE:");
    println!("  gitlin sync <owner>/<repo> <number>  Sync new review comments into Linear");
    println!("  gitlin help                          Show this help");
    println!();
    println!("SYNC OPTIONS:");
    println!("  -c, --trigger-comment <id>  Comment that triggered the run (gets reactions)");
    println!();
    println!("CONFIGURATION:");
    println!("  ~/.gitlin/config.toml, overridden by GITHUB_TOKEN, LINEAR_API_KEY,");
    println!("  LINEAR_TEAM_ID and GITLIN_TRIGGER");
}
