//! Observer trait for submission progress.
//!
//! Inject an [`Arc<dyn SessionObserver>`] via
//! [`crate::session::Session::with_observer`] to be told when a submission
//! moves between steps. The CLI uses it to drive a spinner; a GUI could
//! disable its buttons on [`SessionObserver::on_phase_change`].
//!
//! # Example
//!
//! ```rust
//! use pdf_agent::{Phase, SessionObserver};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingObserver {
//!     transitions: AtomicUsize,
//! }
//!
//! impl SessionObserver for CountingObserver {
//!     fn on_phase_change(&self, _phase: &Phase) {
//!         self.transitions.fetch_add(1, Ordering::SeqCst);
//!     }
//! }
//!
//! let observer: Arc<dyn SessionObserver> = Arc::new(CountingObserver {
//!     transitions: AtomicUsize::new(0),
//! });
//! ```

use crate::output::TokenUsage;
use crate::session::Phase;
use std::sync::Arc;

/// Called by the session as a submission progresses.
///
/// All methods have default no-op implementations so callers only override
/// what they care about.
pub trait SessionObserver: Send + Sync {
    /// Called after every phase transition, with the new phase.
    fn on_phase_change(&self, phase: &Phase) {
        let _ = phase;
    }

    /// Called when extraction finished.
    ///
    /// # Arguments
    /// * `document_chars`: number of characters in the extracted text
    fn on_extracted(&self, document_chars: usize) {
        let _ = document_chars;
    }

    /// Called when the provider answered with content.
    fn on_completed(&self, usage: &TokenUsage) {
        let _ = usage;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopObserver;

impl SessionObserver for NoopObserver {}

/// Convenience alias matching the type stored in a session.
pub type ObserverHandle = Arc<dyn SessionObserver>;
