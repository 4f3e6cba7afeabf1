//! Interaction controller: form state plus a single explicit phase.
//!
//! A [`Session`] owns what the user typed (instruction, selected file,
//! auxiliary message) and one [`Phase`] value. Everything the surface needs
//! to render (loading flag, error banner, response panel, whether submit and
//! reset are enabled) is derived from that phase, so "disabled while a
//! request is in flight" cannot drift out of sync with the work itself.
//!
//! ```text
//!  Idle ──submit──▶ Validating ──ok──▶ Extracting ──ok──▶ Completing ──ok──▶ Displaying(Success)
//!   ▲                  │                   │                   │
//!   └── rejected ──────┘                   └────── error ──────┴──────────▶ Displaying(Error)
//! ```
//!
//! Only one submission can be in flight per session: [`Session::submit`]
//! takes `&mut self`, and every mutating call is refused with
//! [`AgentError::Busy`] while the phase is `Validating`, `Extracting` or
//! `Completing`. A submission whose future is dropped before it finishes
//! puts the session back in `Idle`.
//!
//! A rejected file selection is a notice of its own: it clears the file and
//! is shown next to whatever the phase displays, without discarding a
//! response already on screen.

use crate::config::AgentConfig;
use crate::error::AgentError;
use crate::output::{CompletionResult, SubmissionReport, TokenUsage};
use crate::pipeline::extract::extract_text_async;
use crate::pipeline::input::SelectedFile;
use crate::pipeline::llm::{complete, ChatBackend, CompletionRequest};
use crate::pipeline::openai::OpenAiBackend;
use crate::progress::ObserverHandle;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Fallback shown when an error carries no message of its own.
pub const GENERIC_ERROR_MESSAGE: &str = "Ocurrió un error desconocido";

/// How a submission ended.
#[derive(Debug, Clone)]
pub enum Outcome {
    Success(SubmissionReport),
    Error(AgentError),
}

/// Where the session is in the submit flow.
#[derive(Debug, Clone)]
pub enum Phase {
    /// Waiting for input. `notice` holds a rejected submit.
    Idle { notice: Option<AgentError> },
    /// Checking the form before any work starts.
    Validating,
    /// Extracting text from the selected PDF.
    Extracting,
    /// Waiting on the completion provider.
    Completing,
    /// Showing the result of the last submission.
    Displaying(Outcome),
}

impl Default for Phase {
    fn default() -> Self {
        Phase::Idle { notice: None }
    }
}

impl Phase {
    /// Whether an async step is outstanding.
    pub fn is_in_flight(&self) -> bool {
        matches!(self, Phase::Validating | Phase::Extracting | Phase::Completing)
    }

    /// Short label for logs and progress displays.
    pub fn label(&self) -> &'static str {
        match self {
            Phase::Idle { .. } => "idle",
            Phase::Validating => "validating",
            Phase::Extracting => "extracting",
            Phase::Completing => "completing",
            Phase::Displaying(Outcome::Success(_)) => "success",
            Phase::Displaying(Outcome::Error(_)) => "error",
        }
    }
}

/// What the user has entered.
#[derive(Debug, Clone, Default)]
pub struct FormState {
    pub instruction: String,
    pub file: Option<SelectedFile>,
    pub auxiliary_message: String,
}

/// The message to show for an error: its own text, or the generic fallback.
pub fn error_message(err: &AgentError) -> String {
    let msg = err.to_string();
    if msg.trim().is_empty() {
        GENERIC_ERROR_MESSAGE.to_string()
    } else {
        msg
    }
}

/// One user's form and the state of their current submission.
pub struct Session {
    config: AgentConfig,
    backend: Arc<dyn ChatBackend>,
    observer: Option<ObserverHandle>,
    form: FormState,
    phase: Phase,
    selection_notice: Option<AgentError>,
}

impl Session {
    /// Create a session over an explicit backend.
    pub fn new(config: AgentConfig, backend: Arc<dyn ChatBackend>) -> Self {
        Self {
            config,
            backend,
            observer: None,
            form: FormState::default(),
            phase: Phase::default(),
            selection_notice: None,
        }
    }

    /// Create a session talking to the configured OpenAI-compatible endpoint.
    pub fn from_config(config: AgentConfig) -> Result<Self, AgentError> {
        let backend = OpenAiBackend::new(&config)?;
        Ok(Self::new(config, Arc::new(backend)))
    }

    /// Attach an observer for phase events.
    pub fn with_observer(mut self, observer: ObserverHandle) -> Self {
        self.observer = Some(observer);
        self
    }

    // ── Accessors ────────────────────────────────────────────────────────

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    pub fn form(&self) -> &FormState {
        &self.form
    }

    pub fn is_loading(&self) -> bool {
        self.phase.is_in_flight()
    }

    /// Submit is enabled when there is an instruction, a file, and no work
    /// in flight.
    pub fn can_submit(&self) -> bool {
        !self.is_loading() && !self.form.instruction.trim().is_empty() && self.form.file.is_some()
    }

    /// Reset is enabled whenever nothing is in flight.
    pub fn can_reset(&self) -> bool {
        !self.is_loading()
    }

    /// The last successful submission, if it is still displayed.
    pub fn report(&self) -> Option<&SubmissionReport> {
        match &self.phase {
            Phase::Displaying(Outcome::Success(report)) => Some(report),
            _ => None,
        }
    }

    pub fn result(&self) -> Option<&CompletionResult> {
        self.report().map(|r| &r.result)
    }

    pub fn usage(&self) -> Option<&TokenUsage> {
        self.result().map(|r| &r.usage)
    }

    /// The error currently shown, if any. A rejected file selection takes
    /// precedence over the phase's own error.
    pub fn last_error(&self) -> Option<&AgentError> {
        if let Some(ref notice) = self.selection_notice {
            return Some(notice);
        }
        match &self.phase {
            Phase::Idle { notice } => notice.as_ref(),
            Phase::Displaying(Outcome::Error(e)) => Some(e),
            _ => None,
        }
    }

    // ── Form edits ───────────────────────────────────────────────────────

    pub fn set_instruction(&mut self, instruction: impl Into<String>) -> Result<(), AgentError> {
        self.ensure_idle()?;
        self.form.instruction = instruction.into();
        Ok(())
    }

    pub fn set_auxiliary_message(&mut self, message: impl Into<String>) -> Result<(), AgentError> {
        self.ensure_idle()?;
        self.form.auxiliary_message = message.into();
        Ok(())
    }

    /// Select a file. Only files declaring the PDF media type are kept; any
    /// other file clears the current selection and shows an error. The phase
    /// is left alone, so a displayed response stays on screen.
    pub fn select_file(&mut self, file: SelectedFile) -> Result<(), AgentError> {
        self.ensure_idle()?;
        if !file.is_pdf() {
            warn!("Rejected {} ({})", file.name, file.media_type);
            let err = AgentError::NotAPdf {
                name: file.name,
                media_type: file.media_type,
            };
            self.form.file = None;
            self.selection_notice = Some(err.clone());
            return Err(err);
        }

        debug!("Selected {} ({} bytes)", file.name, file.size());
        self.form.file = Some(file);
        self.selection_notice = None;
        if matches!(self.phase, Phase::Idle { notice: Some(_) }) {
            self.transition(Phase::default());
        }
        Ok(())
    }

    pub fn clear_file(&mut self) -> Result<(), AgentError> {
        self.ensure_idle()?;
        self.form.file = None;
        Ok(())
    }

    /// Clear every field and return to `Idle`.
    pub fn reset(&mut self) -> Result<(), AgentError> {
        self.ensure_idle()?;
        self.form = FormState::default();
        self.selection_notice = None;
        self.transition(Phase::default());
        Ok(())
    }

    // ── Submission ───────────────────────────────────────────────────────

    /// Validate the form, extract the PDF's text, and ask the provider.
    ///
    /// On return the phase is `Idle` with a notice (validation failed),
    /// `Displaying(Error)`, or `Displaying(Success)`. The returned value
    /// mirrors what the phase now shows.
    ///
    /// Dropping the future before it completes (for example under
    /// `tokio::time::timeout`) abandons the submission and returns the
    /// session to `Idle` with no result; the provider call is not cancelled
    /// server-side.
    pub async fn submit(&mut self) -> Result<CompletionResult, AgentError> {
        self.ensure_idle()?;
        let mut guard = InFlightGuard(self);
        guard.0.run_submission().await
    }

    async fn run_submission(&mut self) -> Result<CompletionResult, AgentError> {
        self.selection_notice = None;
        self.transition(Phase::Validating);

        let (instruction, file) = match self.validate() {
            Ok(parts) => parts,
            Err(err) => {
                self.transition(Phase::Idle {
                    notice: Some(err.clone()),
                });
                return Err(err);
            }
        };
        let auxiliary = self.form.auxiliary_message.trim().to_string();

        // ── Step 1: Extract ──────────────────────────────────────────────
        self.transition(Phase::Extracting);
        info!("Extracting text from {}", file.name);
        let extract_start = Instant::now();
        let extracted = extract_text_async(Arc::clone(&file.bytes)).await;
        let document_text = match extracted {
            Ok(text) => text,
            Err(err) => return Err(self.fail(err)),
        };
        let extraction_ms = extract_start.elapsed().as_millis() as u64;
        if let Some(ref o) = self.observer {
            o.on_extracted(document_text.chars().count());
        }

        // ── Step 2: Complete ─────────────────────────────────────────────
        self.transition(Phase::Completing);
        let request = match CompletionRequest::new(
            instruction,
            document_text,
            Some(auxiliary.as_str()),
        ) {
            Ok(r) => r,
            Err(err) => return Err(self.fail(err)),
        };
        let completion_start = Instant::now();
        let completed = complete(self.backend.as_ref(), &self.config, &request).await;
        let result = match completed {
            Ok(r) => r,
            Err(err) => return Err(self.fail(err)),
        };
        let completion_ms = completion_start.elapsed().as_millis() as u64;
        if let Some(ref o) = self.observer {
            o.on_completed(&result.usage);
        }

        info!(
            "Completion received: {} chars, {} total tokens",
            result.content.len(),
            result.usage.total_tokens
        );

        let report = SubmissionReport {
            file_name: file.name.clone(),
            model: self.config.model.clone(),
            document_chars: request.document_text().chars().count(),
            result: result.clone(),
            extraction_ms,
            completion_ms,
        };
        self.transition(Phase::Displaying(Outcome::Success(report)));
        Ok(result)
    }

    // ── Internals ────────────────────────────────────────────────────────

    fn ensure_idle(&self) -> Result<(), AgentError> {
        if self.phase.is_in_flight() {
            return Err(AgentError::Busy);
        }
        Ok(())
    }

    /// Check the form; returns the instruction and the file to process.
    fn validate(&self) -> Result<(String, SelectedFile), AgentError> {
        if self.form.instruction.trim().is_empty() {
            return Err(AgentError::EmptyInstruction);
        }
        let file = self.form.file.clone().ok_or(AgentError::MissingFile)?;
        Ok((self.form.instruction.clone(), file))
    }

    /// Enter `Displaying(Error)`; the previous result is dropped with the
    /// old phase.
    fn fail(&mut self, err: AgentError) -> AgentError {
        warn!("Submission failed: {}", err);
        self.transition(Phase::Displaying(Outcome::Error(err.clone())));
        err
    }

    fn transition(&mut self, phase: Phase) {
        debug!("Phase {} → {}", self.phase.label(), phase.label());
        self.phase = phase;
        if let Some(ref o) = self.observer {
            o.on_phase_change(&self.phase);
        }
    }
}

/// Returns the session to `Idle` when a submission is dropped mid-flight.
struct InFlightGuard<'a>(&'a mut Session);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        if self.0.phase.is_in_flight() {
            warn!("Submission abandoned while {}", self.0.phase.label());
            self.0.transition(Phase::default());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::llm::{ChatRequest, ChatResponse};
    use async_trait::async_trait;

    struct Fixed(Result<ChatResponse, AgentError>);

    #[async_trait]
    impl ChatBackend for Fixed {
        async fn chat(&self, _request: &ChatRequest) -> Result<ChatResponse, AgentError> {
            self.0.clone()
        }
    }

    fn session(response: Result<ChatResponse, AgentError>) -> Session {
        Session::new(AgentConfig::default(), Arc::new(Fixed(response)))
    }

    fn ok_response() -> Result<ChatResponse, AgentError> {
        Ok(ChatResponse {
            content: Some("ok".into()),
            usage: TokenUsage::default(),
        })
    }

    #[test]
    fn starts_idle_without_error() {
        let s = session(ok_response());
        assert!(matches!(s.phase(), Phase::Idle { notice: None }));
        assert!(!s.is_loading());
        assert!(!s.can_submit());
        assert!(s.can_reset());
        assert!(s.last_error().is_none());
    }

    #[test]
    fn non_pdf_selection_clears_file_and_sets_error() {
        let mut s = session(ok_response());
        s.select_file(SelectedFile::new("a.pdf", "application/pdf", vec![]))
            .unwrap();
        assert!(s.form().file.is_some());

        let err = s
            .select_file(SelectedFile::new("notes.txt", "text/plain", vec![]))
            .unwrap_err();
        assert!(matches!(err, AgentError::NotAPdf { .. }));
        assert!(s.form().file.is_none());
        assert_eq!(
            s.last_error().map(error_message).as_deref(),
            Some("Por favor, selecciona un archivo PDF válido")
        );
    }

    #[test]
    fn valid_selection_clears_notice() {
        let mut s = session(ok_response());
        let _ = s.select_file(SelectedFile::new("x.doc", "application/msword", vec![]));
        assert!(s.last_error().is_some());
        s.select_file(SelectedFile::new("a.pdf", "application/pdf", vec![]))
            .unwrap();
        assert!(s.last_error().is_none());
    }

    #[test]
    fn can_submit_requires_instruction_and_file() {
        let mut s = session(ok_response());
        s.set_instruction("Resume").unwrap();
        assert!(!s.can_submit());
        s.select_file(SelectedFile::new("a.pdf", "application/pdf", vec![]))
            .unwrap();
        assert!(s.can_submit());
        s.set_instruction("   ").unwrap();
        assert!(!s.can_submit());
    }

    #[tokio::test]
    async fn empty_instruction_is_rejected_before_extraction() {
        let mut s = session(ok_response());
        s.select_file(SelectedFile::new("a.pdf", "application/pdf", b"garbage".to_vec()))
            .unwrap();
        let err = s.submit().await.unwrap_err();
        assert!(matches!(err, AgentError::EmptyInstruction));
        // Extraction of "garbage" would have produced an extraction error.
        assert!(matches!(
            s.phase(),
            Phase::Idle {
                notice: Some(AgentError::EmptyInstruction)
            }
        ));
    }

    #[tokio::test]
    async fn missing_file_is_rejected() {
        let mut s = session(ok_response());
        s.set_instruction("Resume").unwrap();
        let err = s.submit().await.unwrap_err();
        assert!(matches!(err, AgentError::MissingFile));
        assert_eq!(
            s.last_error().map(error_message).as_deref(),
            Some("Por favor, selecciona un archivo PDF")
        );
    }

    #[tokio::test]
    async fn corrupt_pdf_displays_extraction_error() {
        let mut s = session(ok_response());
        s.set_instruction("Resume").unwrap();
        s.select_file(SelectedFile::new("a.pdf", "application/pdf", b"nope".to_vec()))
            .unwrap();
        let err = s.submit().await.unwrap_err();
        assert!(matches!(err, AgentError::Extraction { .. }));
        assert!(matches!(s.phase(), Phase::Displaying(Outcome::Error(_))));
        assert!(s.result().is_none());
        assert!(s.usage().is_none());
    }

    #[tokio::test]
    async fn rejected_selection_leaves_displayed_outcome() {
        let mut s = session(ok_response());
        s.set_instruction("Resume").unwrap();
        s.select_file(SelectedFile::new("a.pdf", "application/pdf", b"nope".to_vec()))
            .unwrap();
        let _ = s.submit().await;

        let _ = s.select_file(SelectedFile::new("b.txt", "text/plain", vec![]));
        assert!(matches!(s.phase(), Phase::Displaying(Outcome::Error(_))));
        assert!(matches!(s.last_error(), Some(AgentError::NotAPdf { .. })));

        s.select_file(SelectedFile::new("c.pdf", "application/pdf", vec![]))
            .unwrap();
        assert!(matches!(s.last_error(), Some(AgentError::Extraction { .. })));
    }

    #[test]
    fn generic_message_for_empty_error_text() {
        assert_eq!(
            error_message(&AgentError::Transport(String::new())),
            GENERIC_ERROR_MESSAGE
        );
        assert_eq!(
            error_message(&AgentError::Transport("connection refused".into())),
            "connection refused"
        );
    }

    #[test]
    fn busy_phase_refuses_edits_and_reset() {
        let mut s = session(ok_response());
        s.phase = Phase::Extracting;
        assert!(s.is_loading());
        assert!(!s.can_reset());
        assert!(matches!(s.reset(), Err(AgentError::Busy)));
        assert!(matches!(s.set_instruction("x"), Err(AgentError::Busy)));
        assert!(matches!(
            tokio_test::block_on(s.submit()),
            Err(AgentError::Busy)
        ));
    }

    #[test]
    fn reset_clears_everything() {
        let mut s = session(ok_response());
        s.set_instruction("Resume").unwrap();
        s.set_auxiliary_message("¿Total?").unwrap();
        let _ = s.select_file(SelectedFile::new("x.txt", "text/plain", vec![]));
        s.reset().unwrap();
        assert!(s.form().instruction.is_empty());
        assert!(s.form().auxiliary_message.is_empty());
        assert!(s.form().file.is_none());
        assert!(s.last_error().is_none());
        assert!(matches!(s.phase(), Phase::Idle { notice: None }));
    }
}
