pub mod parse;
pub mod prompt;

use std::process::Stdio;

use anyhow::Context;
use async_trait::async_trait;
use tracing::{debug, instrument};

use crate::error::{SyncError, TransportContext};
use crate::model::candidate::CandidateItem;

/// Turns merged discussion text into an ordered batch of candidate items.
/// Output that does not match the candidate shape is a `Validation` error.
#[async_trait]
pub trait Extractor: Send + Sync {
    async fn extract(
        &self,
        merged_text: &str,
        available_labels: &[String],
    ) -> Result<Vec<CandidateItem>, SyncError>;
}

/// Runs the `claude` CLI in print mode and parses its reply.
pub struct ClaudeExtractor {
    command: String,
}

impl ClaudeExtractor {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }

    async fn ask(&self, prompt: &str) -> anyhow::Result<String> {
        let output = tokio::process::Command::new(&self.command)
            .args(["-p", prompt, "--output-format", "text"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .with_context(|| format!("Failed to spawn {} for extraction", self.command))?;

        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("Extraction failed: {stderr}")
        }
    }
}

#[async_trait]
impl Extractor for ClaudeExtractor {
    #[instrument(skip_all, fields(text_len = merged_text.len()))]
    async fn extract(
        &self,
        merged_text: &str,
        available_labels: &[String],
    ) -> Result<Vec<CandidateItem>, SyncError> {
        let prompt = prompt::build_prompt(merged_text, available_labels);
        let reply = self
            .ask(&prompt)
            .await
            .transport("running extraction")?;
        debug!(reply_len = reply.len(), "Extractor replied");
        parse::parse_candidates(&reply)
    }
}
