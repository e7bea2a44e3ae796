//! Error types and error handling for the engine
//!
//! This module defines the caller-visible error surface of the pipeline.
//! Almost everything inside the pipeline degrades instead of failing: a
//! collaborator outage becomes an empty source list, an unmatchable evidence
//! corpus becomes a low-confidence placeholder diagnosis. The variants here
//! are the few conditions that genuinely abort a run.

use thiserror::Error;

/// Engine-level error types
///
/// Only two classes of failure reach the caller: invalid input identity
/// (nothing has run yet) and contract violations that indicate a programming
/// defect rather than an operational hiccup.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Patient identity is missing or disagrees with the supplied record
    #[error("Invalid patient identity: {0}")]
    InvalidPatientIdentity(String),

    /// Diagnostic plan violates structural contracts (duplicate ids, etc.)
    #[error("Invalid diagnostic plan: {0}")]
    InvalidPlan(String),

    /// Internal engine error (catch-all for unexpected defects)
    #[error("Internal engine error: {0}")]
    Internal(#[from] anyhow::Error),
}
