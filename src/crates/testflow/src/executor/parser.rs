//! JSON extraction from free-form LLM output
//!
//! Models wrap their JSON in prose or markdown fences more often than not.
//! Extraction tries, in order: the whole text, the first ```json fenced block,
//! then the widest `{ ... }` span. When all three fail the raw response can be
//! persisted to a side log for later inspection.

use super::ExecutorError;
use chrono::Utc;
use regex::Regex;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::{debug, error, warn};

/// Which strategy recovered the JSON value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionPath {
    Direct,
    FencedBlock,
    BraceSpan,
}

fn fenced_block() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"```json\s*([\s\S]*?)\s*```").ok())
        .as_ref()
}

fn brace_span() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\{[\s\S]*\}").ok()).as_ref()
}

/// Extracts JSON values from LLM responses.
#[derive(Debug, Clone, Default)]
pub struct JsonExtractor {
    failure_log_dir: Option<PathBuf>,
}

impl JsonExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Persist unparseable responses as `failed_response_<timestamp>.txt` under `dir`.
    pub fn with_failure_log_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.failure_log_dir = Some(dir.into());
        self
    }

    pub fn failure_log_dir(&self) -> Option<&Path> {
        self.failure_log_dir.as_deref()
    }

    /// Try the three strategies without side effects.
    pub fn try_extract(text: &str) -> Option<(Value, ExtractionPath)> {
        match serde_json::from_str::<Value>(text.trim()) {
            Ok(value) => return Some((value, ExtractionPath::Direct)),
            Err(e) => debug!(error = %e, "Direct JSON parse failed"),
        }

        if let Some(captures) = fenced_block().and_then(|re| re.captures(text)) {
            if let Some(block) = captures.get(1) {
                match serde_json::from_str::<Value>(block.as_str()) {
                    Ok(value) => return Some((value, ExtractionPath::FencedBlock)),
                    Err(e) => debug!(error = %e, "Fenced block JSON parse failed"),
                }
            }
        }

        if let Some(span) = brace_span().and_then(|re| re.find(text)) {
            match serde_json::from_str::<Value>(span.as_str()) {
                Ok(value) => return Some((value, ExtractionPath::BraceSpan)),
                Err(e) => debug!(error = %e, "Brace span JSON parse failed"),
            }
        }

        None
    }

    /// Extract a JSON value or fail with [`ExecutorError::Parse`].
    pub async fn extract(&self, text: &str) -> Result<Value, ExecutorError> {
        if let Some((value, path)) = Self::try_extract(text) {
            if path != ExtractionPath::Direct {
                debug!(path = ?path, "Recovered JSON from wrapped response");
            }
            return Ok(value);
        }

        if let Some(dir) = &self.failure_log_dir {
            match write_failure_log(dir, text).await {
                Ok(file) => warn!(path = %file.display(), "Saved unparseable response"),
                Err(e) => error!(error = %e, "Failed to save unparseable response"),
            }
        }

        let preview: String = text.chars().take(200).collect();
        Err(ExecutorError::Parse(format!("no JSON found in response: {}...", preview)))
    }
}

async fn write_failure_log(dir: &Path, response: &str) -> std::io::Result<PathBuf> {
    tokio::fs::create_dir_all(dir).await?;
    let timestamp = Utc::now().format("%Y%m%d_%H%M%S_%6f");
    let file = dir.join(format!("failed_response_{}.txt", timestamp));
    let rule = "=".repeat(80);
    let thin = "-".repeat(80);
    let body = format!(
        "{rule}\nJSON extraction failed\n{rule}\n\nResponse length: {} chars\n\n\
         Full response:\n{thin}\n{response}\n{thin}\n",
        response.chars().count(),
    );
    tokio::fs::write(&file, body).await?;
    Ok(file)
}
