//! Error types for the pdf-agent library.
//!
//! Every failure a submission can hit is one variant of [`AgentError`]. The
//! variants are grouped by [`ErrorKind`] so the controller and the CLI can
//! treat a whole family alike (for example, validation errors never reach
//! the extractor) while still showing the user a specific message.
//!
//! User-facing messages are in Spanish, matching the prompts sent to the
//! model and the page headers produced by the extractor.

use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

/// Coarse classification of an [`AgentError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Bad or missing user input; reported immediately, nothing was sent.
    Validation,
    /// The PDF could not be parsed or a page yielded no decodable content.
    Extraction,
    /// The completion provider failed or returned nothing usable.
    Completion,
    /// The configuration was rejected by the builder.
    Config,
    /// Local I/O or an unexpected internal failure.
    Io,
}

/// All errors returned by the pdf-agent library.
///
/// Cheap to clone: the session keeps the last error for display while also
/// handing it back to the caller.
#[derive(Debug, Clone, Error)]
pub enum AgentError {
    // ── Validation ────────────────────────────────────────────────────────
    /// Submit was attempted with an empty or blank instruction.
    #[error("Por favor, ingresa un system prompt")]
    EmptyInstruction,

    /// Submit was attempted without a selected file.
    #[error("Por favor, selecciona un archivo PDF")]
    MissingFile,

    /// The selected file does not declare the PDF media type.
    #[error("Por favor, selecciona un archivo PDF válido")]
    NotAPdf { name: String, media_type: String },

    /// A submission is already in flight on this session.
    #[error("Hay una solicitud en curso; espera a que termine")]
    Busy,

    /// Input file was not found at the given path.
    #[error("Archivo no encontrado: '{path}'")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permiso denegado al leer '{path}'")]
    PermissionDenied { path: PathBuf },

    /// The input string is neither a readable path nor an HTTP/HTTPS URL.
    #[error("Entrada inválida '{input}': no es una ruta ni una URL HTTP/HTTPS")]
    InvalidInput { input: String },

    /// URL download failed.
    #[error("No se pudo descargar '{url}': {reason}")]
    DownloadFailed { url: String, reason: String },

    /// URL download exceeded the configured timeout.
    #[error("La descarga de '{url}' superó el tiempo límite de {secs}s")]
    DownloadTimeout { url: String, secs: u64 },

    // ── Extraction ────────────────────────────────────────────────────────
    /// The payload is not a parseable PDF, or a page's content is unreadable.
    #[error("No se pudo extraer el texto del PDF: {detail}")]
    Extraction { detail: String },

    // ── Completion ────────────────────────────────────────────────────────
    /// The provider answered but the message carried no content.
    #[error("No se recibió respuesta del agente")]
    NoResponse,

    /// No API key was configured and `OPENAI_API_KEY` is unset.
    #[error("No hay una API key configurada. Define OPENAI_API_KEY.")]
    MissingApiKey,

    /// The provider rejected the credentials (HTTP 401/403).
    #[error("{message}")]
    AuthFailed { status: u16, message: String },

    /// The provider returned a non-success status.
    #[error("{message}")]
    ApiError { status: u16, message: String },

    /// The request never produced an HTTP response (DNS, TLS, timeout…).
    #[error("{0}")]
    Transport(String),

    /// The response body could not be decoded.
    #[error("Respuesta inválida del proveedor: {0}")]
    InvalidResponse(String),

    // ── Config ────────────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Configuración inválida: {0}")]
    InvalidConfig(String),

    // ── I/O ───────────────────────────────────────────────────────────────
    /// Could not write the response to the requested output file.
    #[error("No se pudo escribir '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: Arc<std::io::Error>,
    },

    /// Unexpected internal error.
    #[error("Error interno: {0}")]
    Internal(String),
}

impl AgentError {
    /// The family this error belongs to.
    pub fn kind(&self) -> ErrorKind {
        match self {
            AgentError::EmptyInstruction
            | AgentError::MissingFile
            | AgentError::NotAPdf { .. }
            | AgentError::Busy
            | AgentError::FileNotFound { .. }
            | AgentError::PermissionDenied { .. }
            | AgentError::InvalidInput { .. }
            | AgentError::DownloadFailed { .. }
            | AgentError::DownloadTimeout { .. } => ErrorKind::Validation,
            AgentError::Extraction { .. } => ErrorKind::Extraction,
            AgentError::NoResponse
            | AgentError::MissingApiKey
            | AgentError::AuthFailed { .. }
            | AgentError::ApiError { .. }
            | AgentError::Transport(_)
            | AgentError::InvalidResponse(_) => ErrorKind::Completion,
            AgentError::InvalidConfig(_) => ErrorKind::Config,
            AgentError::OutputWriteFailed { .. } | AgentError::Internal(_) => ErrorKind::Io,
        }
    }

    /// Wrap a parser failure as an extraction error.
    pub(crate) fn extraction(detail: impl std::fmt::Display) -> Self {
        AgentError::Extraction {
            detail: detail.to_string(),
        }
    }
}
