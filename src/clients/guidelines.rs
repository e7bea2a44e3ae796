//! Guideline search collaborator contract
//!
//! Clinical guideline lookup is the evidence backbone of every diagnostic
//! step. The engine sends the step's query verbatim and caps the result
//! count; whatever comes back is wrapped into `ClinicalSource` records by the
//! step runner.

use crate::clients::CollaboratorError;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

/// One raw result from a guideline search
///
/// All fields are optional: real guideline backends routinely return
/// partially-populated records, and the step runner fills positional
/// defaults for anything missing.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GuidelineHit {
    /// Backend-assigned identifier, if any
    pub id: Option<String>,
    /// Human-readable guideline title
    pub title: Option<String>,
    /// Guideline excerpt or full text
    pub content: Option<String>,
    /// Backend relevance estimate in [0,1]
    pub relevance_score: Option<f64>,
}

/// Clinical guideline search collaborator
///
/// Implementations must not block indefinitely; the engine additionally
/// enforces its own per-call timeout and treats an `Err` as "no evidence
/// available for this step".
#[async_trait]
pub trait GuidelineSearch: Send + Sync {
    /// Search guidelines matching `query`, returning at most `max_results`
    /// hits. `patient_context` is the raw patient record, available for
    /// backends that personalize ranking; it may be ignored.
    async fn search(
        &self,
        query: &str,
        patient_context: Option<&Value>,
        max_results: usize,
    ) -> Result<Vec<GuidelineHit>, CollaboratorError>;
}
