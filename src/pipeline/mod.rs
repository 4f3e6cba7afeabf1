//! Pipeline stages for answering a question about a PDF.
//!
//! Each submodule implements exactly one step; the controller in
//! [`crate::session`] runs them in order, one at a time.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ extract ──▶ llm ──▶ openai
//! (path/URL)  (lopdf)   (prompt)  (HTTP)
//! ```
//!
//! 1. [`input`]: load a local path or URL into memory with its declared
//!    media type
//! 2. [`extract`]: flatten page text runs into one string with page headers;
//!    runs in `spawn_blocking`
//! 3. [`llm`]: build the two-message prompt and validate the answer
//! 4. [`openai`]: the HTTP [`llm::ChatBackend`]; the only stage that talks
//!    to the provider

pub mod extract;
pub mod input;
pub mod llm;
pub mod openai;
