//! Session engine for the symptom triage loop.
//!
//! [`Orchestrator`] owns a [`Session`] and drives it through the analysis
//! state machine, talking to the backend through the [`triage_core::TriageApi`]
//! seam so callers can swap in the HTTP client or a scripted mock.

pub mod error;
pub mod orchestrator;
pub mod session;

pub use error::EngineError;
pub use orchestrator::{Orchestrator, TickOutcome};
pub use session::Session;
