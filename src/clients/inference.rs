//! Diagnosis inference collaborator contract
//!
//! Optional seam for replacing the built-in rule table with a real inference
//! engine (an LLM, a bayesian model, ...). When configured, the synthesizer
//! consults it first and falls back to the rule table on any failure, so a
//! flaky inference backend can only ever downgrade result quality, never
//! break a run.

use crate::clients::CollaboratorError;
use crate::engine::types::DifferentialDiagnosis;
use async_trait::async_trait;

/// Structured diagnosis fields produced by an inference collaborator
///
/// The synthesizer normalizes these before they reach the caller: confidence
/// is clamped to [0,1], differentials are re-sorted by likelihood, and an
/// empty evidence list is backfilled.
#[derive(Debug, Clone)]
pub struct InferredDiagnosis {
    /// Primary diagnosis name
    pub diagnosis_name: String,
    /// ICD-10 code, if the collaborator assigns one
    pub diagnosis_code: Option<String>,
    /// Collaborator confidence estimate
    pub confidence: f64,
    /// Evidence statements backing the diagnosis
    pub supporting_evidence: Vec<String>,
    /// Alternative diagnoses considered
    pub differential_diagnoses: Vec<DifferentialDiagnosis>,
    /// Recommended follow-up tests
    pub recommended_tests: Vec<String>,
    /// Recommended treatments
    pub recommended_treatments: Vec<String>,
}

/// Diagnosis inference collaborator
#[async_trait]
pub trait DiagnosisInference: Send + Sync {
    /// Infer a diagnosis from the extracted symptoms and the aggregated
    /// evidence corpus built from all completed steps' findings.
    async fn infer(
        &self,
        symptoms: &[String],
        evidence: &str,
    ) -> Result<InferredDiagnosis, CollaboratorError>;
}
