//! Collaborator contracts
//!
//! The pipeline consumes external knowledge sources through the traits in
//! this module. Implementations live with the caller (HTTP clients, local
//! indexes, fixtures); the engine only sees the trait objects and treats
//! every failure as a degrade signal, never as a pipeline abort.

pub mod guidelines;
pub mod inference;
pub mod trials;

pub use guidelines::{GuidelineHit, GuidelineSearch};
pub use inference::{DiagnosisInference, InferredDiagnosis};
pub use trials::{ClinicalTrialSearch, TrialRecord};

use thiserror::Error;

/// Errors a collaborator call can surface
///
/// The engine never propagates these to its caller; each component maps them
/// to its own neutral value (empty source list, rule-table fallback, empty
/// trial matches) at the point of use.
#[derive(Error, Debug)]
pub enum CollaboratorError {
    /// The request was made but failed (network, upstream 5xx, ...)
    #[error("Collaborator request failed: {0}")]
    RequestFailed(String),

    /// The collaborator answered with something the caller cannot use
    #[error("Collaborator returned a malformed response: {0}")]
    MalformedResponse(String),

    /// The collaborator is not reachable at all
    #[error("Collaborator unavailable: {0}")]
    Unavailable(String),
}
