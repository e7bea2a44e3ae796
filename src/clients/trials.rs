//! Clinical trial search collaborator contract
//!
//! Trial matching is an enrichment step: it runs once, after synthesis, and
//! only for a non-placeholder diagnosis. A failing or slow trial backend
//! costs the result its `clinical_trial_matches` list and nothing else.

use crate::clients::CollaboratorError;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

/// One raw trial record from the trial registry
///
/// Mirrors the registry's shape rather than the engine's: all fields
/// optional, normalized into `ClinicalTrialMatch` during enrichment.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TrialRecord {
    /// Registry identifier (e.g. an NCT number)
    pub id: Option<String>,
    /// Trial title
    pub title: Option<String>,
    /// Trial phase (e.g. "Phase 3")
    pub phase: Option<String>,
    /// Recruiting location(s)
    pub location: Option<String>,
    /// Contact point for enrollment
    pub contact: Option<String>,
    /// Eligibility criteria summary
    pub eligibility: Option<String>,
}

/// Clinical trial search collaborator
#[async_trait]
pub trait ClinicalTrialSearch: Send + Sync {
    /// Search trials recruiting for `diagnosis`, returning at most
    /// `max_results` records. `patient_context` is the raw patient record
    /// for backends that pre-filter on eligibility; it may be ignored.
    async fn search(
        &self,
        diagnosis: &str,
        patient_context: Option<&Value>,
        max_results: usize,
    ) -> Result<Vec<TrialRecord>, CollaboratorError>;
}
