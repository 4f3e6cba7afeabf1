//! # pdf-agent
//!
//! Ask a language model about a PDF: extract the document's text, send it
//! with your instruction to an OpenAI-compatible chat endpoint, and get the
//! answer back together with token usage.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Input     local file or URL, with its declared media type
//!  ├─ 2. Extract   page text runs → "--- Página N ---" blocks (lopdf, spawn_blocking)
//!  ├─ 3. Prompt    system = instruction, user = document text (+ optional message)
//!  ├─ 4. Complete  one awaited chat-completions call, no retries
//!  └─ 5. Output    response text + prompt/completion/total tokens
//! ```
//!
//! The [`Session`] type sequences these steps for one user, holding the form
//! fields and a single [`Phase`] value that says whether work is in flight.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pdf_agent::{resolve_input, AgentConfig, Session};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // API key read from OPENAI_API_KEY on the first call
//!     let mut session = Session::from_config(AgentConfig::default())?;
//!     session.set_instruction("Eres un asistente experto en análisis de gastos.")?;
//!     session.select_file(resolve_input("resumen.pdf", 120).await?)?;
//!     session.set_auxiliary_message("¿Cuáles son mis gastos más altos?")?;
//!
//!     let result = session.submit().await?;
//!     println!("{}", result.content);
//!     eprintln!("tokens: {} total", result.usage.total_tokens);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdf-agent` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! pdf-agent = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod session;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{AgentConfig, AgentConfigBuilder};
pub use error::{AgentError, ErrorKind};
pub use output::{write_response, CompletionResult, SubmissionReport, TokenUsage};
pub use pipeline::extract::{extract_text, extract_text_async};
pub use pipeline::input::{resolve_input, SelectedFile};
pub use pipeline::llm::{complete, ChatBackend, ChatMessage, ChatRequest, ChatResponse, CompletionRequest, Role};
pub use pipeline::openai::OpenAiBackend;
pub use progress::{NoopObserver, ObserverHandle, SessionObserver};
pub use session::{error_message, FormState, Outcome, Phase, Session};
