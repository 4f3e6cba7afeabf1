//! Result records produced by a submission.

use crate::error::AgentError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Token counts reported by the provider.
///
/// Each counter is 0 when the provider omitted it; see
/// [`crate::pipeline::openai`] for where that normalisation happens.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

/// A successful completion: generated text plus usage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionResult {
    /// Message content returned by the provider, verbatim. Never empty.
    pub content: String,
    pub usage: TokenUsage,
}

/// Everything a finished submission reports; serialised by `--json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionReport {
    /// Name of the submitted file.
    pub file_name: String,
    /// Model that produced the answer.
    pub model: String,
    /// Characters of extracted document text sent to the model.
    pub document_chars: usize,
    #[serde(flatten)]
    pub result: CompletionResult,
    /// Wall-clock time spent extracting text.
    pub extraction_ms: u64,
    /// Wall-clock time spent waiting on the provider.
    pub completion_ms: u64,
}

/// Write a response to `path` atomically (temp file in the same directory,
/// then rename), so a failed write never leaves a truncated file behind.
pub async fn write_response(path: impl AsRef<Path>, content: &str) -> Result<(), AgentError> {
    let path = path.as_ref().to_path_buf();
    let content = content.to_string();

    tokio::task::spawn_blocking(move || {
        let fail = |e: std::io::Error| AgentError::OutputWriteFailed {
            path: path.clone(),
            source: Arc::new(e),
        };
        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir).map_err(fail)?;

        let mut tmp = tempfile::NamedTempFile::new_in(&dir).map_err(fail)?;
        std::io::Write::write_all(&mut tmp, content.as_bytes()).map_err(fail)?;
        tmp.persist(&path).map_err(|e| fail(e.error))?;
        Ok(())
    })
    .await
    .map_err(|e| AgentError::Internal(format!("Write task panicked: {}", e)))?
}
