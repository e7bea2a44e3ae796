//! Diagnostic pipeline engine
//!
//! Contains the pipeline stages (symptom extraction, plan generation, step
//! execution, plan execution, result synthesis, trial enrichment) and the
//! orchestrator that sequences them with a per-stage degrade policy.
//!
//! The stages are intentionally small, separately-testable functions; the
//! `ClinicalEngine` struct wires them to the caller-supplied collaborators
//! and configuration.

pub mod executor;
pub mod plan_utils;
pub mod planner;
pub mod runner;
pub mod symptoms;
pub mod synthesis;
pub mod trials;
pub mod types;

pub use executor::ProgressObserver;
pub use runner::{FINDINGS_TIMED_OUT, NO_FINDINGS};
pub use symptoms::extract_symptoms;
pub use synthesis::{UNABLE_TO_PROCESS_DIAGNOSIS, UNDIFFERENTIATED_DIAGNOSIS};
pub use types::{
    ClinicalSource, ClinicalTrialMatch, DiagnosticPlan, DiagnosticResult, DiagnosticStep,
    DifferentialDiagnosis, Likelihood, Patient, SourceKind,
};

use crate::clients::{ClinicalTrialSearch, DiagnosisInference, GuidelineSearch};
use crate::config::EngineConfig;
use crate::error::EngineError;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::Instrument;
use uuid::Uuid;

/// The clinical decision support engine
///
/// Holds the configuration and the collaborator handles; one instance serves
/// any number of diagnostic runs, each correlated by its own session id.
pub struct ClinicalEngine {
    config: EngineConfig,
    guidelines: Arc<dyn GuidelineSearch>,
    trials: Arc<dyn ClinicalTrialSearch>,
    inference: Option<Arc<dyn DiagnosisInference>>,
}

impl ClinicalEngine {
    /// Create an engine from configuration and the required collaborators
    pub fn new(
        config: EngineConfig,
        guidelines: Arc<dyn GuidelineSearch>,
        trials: Arc<dyn ClinicalTrialSearch>,
    ) -> Self {
        Self {
            config,
            guidelines,
            trials,
            inference: None,
        }
    }

    /// Attach an optional diagnosis inference collaborator
    ///
    /// When present it is consulted before the built-in rule table; any
    /// failure degrades back to the table.
    pub fn with_inference(mut self, inference: Arc<dyn DiagnosisInference>) -> Self {
        self.inference = Some(inference);
        self
    }

    /// Extract recognized symptoms from a clinical narrative
    pub fn extract_symptoms(&self, narrative: &str) -> Vec<String> {
        symptoms::extract_symptoms(narrative)
    }

    /// Generate a diagnostic plan for the given symptoms
    pub fn generate_plan(
        &self,
        symptoms: &[String],
        patient: Option<&Patient>,
    ) -> DiagnosticPlan {
        planner::generate_diagnostic_plan(symptoms, patient)
    }

    /// Execute a diagnostic plan under the configured concurrency cap
    ///
    /// See [`ProgressObserver`] for the snapshot delivery contract. Errors
    /// only on structural plan contract violations.
    pub async fn execute_plan(
        &self,
        plan: DiagnosticPlan,
        patient: Option<&Patient>,
        observer: Option<&dyn ProgressObserver>,
    ) -> Result<(DiagnosticPlan, Vec<ClinicalSource>), EngineError> {
        executor::execute_diagnostic_plan(
            &self.config,
            self.guidelines.as_ref(),
            plan,
            patient,
            observer,
        )
        .await
    }

    /// Synthesize a diagnostic result from an executed plan
    pub async fn synthesize(
        &self,
        symptoms: &[String],
        plan: &DiagnosticPlan,
        sources: &[ClinicalSource],
        patient: Option<&Patient>,
    ) -> DiagnosticResult {
        synthesis::synthesize_diagnostic_result(
            symptoms,
            plan,
            sources,
            patient,
            self.inference.as_deref(),
        )
        .await
    }

    /// Run the full diagnostic pipeline for one patient encounter
    ///
    /// Sequences input validation, symptom extraction, planning, execution,
    /// synthesis, and trial enrichment. Only invalid patient identity is a
    /// caller-visible error; every other failure surfaces as a result with
    /// reduced confidence and explanatory text.
    ///
    /// # Arguments
    /// * `patient_id` - Identifier of the patient under evaluation
    /// * `narrative` - Free-form clinical narrative (transcript, note)
    /// * `observations` - Supplementary structured symptom observations
    /// * `patient_record` - The patient's raw record, keyed by domain
    /// * `observer` - Optional per-batch progress observer
    pub async fn run_full_diagnostic(
        &self,
        patient_id: &str,
        narrative: &str,
        observations: &[String],
        patient_record: Value,
        observer: Option<&dyn ProgressObserver>,
    ) -> Result<DiagnosticResult, EngineError> {
        let session_id = Uuid::new_v4();
        let span = tracing::info_span!(
            "diagnostic_session",
            session_id = %session_id,
            patient_id = %patient_id,
        );
        self.run_pipeline(patient_id, narrative, observations, patient_record, observer)
            .instrument(span)
            .await
    }

    async fn run_pipeline(
        &self,
        patient_id: &str,
        narrative: &str,
        observations: &[String],
        patient_record: Value,
        observer: Option<&dyn ProgressObserver>,
    ) -> Result<DiagnosticResult, EngineError> {
        // Stage 1: input validation (the only fatal stage)
        if patient_id.trim().is_empty() {
            return Err(EngineError::InvalidPatientIdentity(
                "patient id is empty".to_string(),
            ));
        }
        if let Some(record_id) = patient_record
            .get("patient")
            .and_then(|p| p.get("id"))
            .and_then(Value::as_str)
        {
            if record_id != patient_id {
                return Err(EngineError::InvalidPatientIdentity(format!(
                    "patient id '{patient_id}' does not match record id '{record_id}'"
                )));
            }
        }
        let patient = Patient::from_record(patient_id, patient_record);

        // Stage 2: extraction, merged with supplementary observations
        let symptoms = merge_symptoms(self.extract_symptoms(narrative), observations);
        if symptoms.is_empty() {
            tracing::info!("No symptoms extracted and none supplied, ending run");
            return Ok(synthesis::unable_to_process_result());
        }
        tracing::info!(num_symptoms = symptoms.len(), "Symptoms identified");

        // Stages 3-5: planning, execution, synthesis
        let plan = self.generate_plan(&symptoms, Some(&patient));
        let (plan, sources) = self.execute_plan(plan, Some(&patient), observer).await?;
        let mut result = self
            .synthesize(&symptoms, &plan, &sources, Some(&patient))
            .await;

        // Stage 6: enrichment, gated on a non-placeholder diagnosis. The
        // diagnosis fields are settled by now; only trial matches may be
        // appended.
        if !result.is_placeholder() {
            result.clinical_trial_matches = trials::match_clinical_trials(
                &self.config,
                self.trials.as_ref(),
                &result.diagnosis_name,
                Some(&patient),
            )
            .await;
        }

        tracing::info!(
            diagnosis = %result.diagnosis_name,
            confidence = result.confidence,
            trial_matches = result.clinical_trial_matches.len(),
            "Diagnostic run complete"
        );
        Ok(result)
    }
}

/// Merge extracted symptoms with supplementary observations
///
/// Observations are trimmed and lowercased before deduplication so a
/// caller-supplied "Fatigue" cannot duplicate an extracted "fatigue".
fn merge_symptoms(extracted: Vec<String>, observations: &[String]) -> Vec<String> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut merged = Vec::new();
    for symptom in extracted
        .into_iter()
        .chain(observations.iter().map(|o| o.trim().to_lowercase()))
    {
        if symptom.is_empty() {
            continue;
        }
        if seen.insert(symptom.clone()) {
            merged.push(symptom);
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::{CollaboratorError, GuidelineHit, TrialRecord};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingGuidelines {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl GuidelineSearch for CountingGuidelines {
        async fn search(
            &self,
            _query: &str,
            _patient_context: Option<&Value>,
            _max_results: usize,
        ) -> Result<Vec<GuidelineHit>, CollaboratorError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Vec::new())
        }
    }

    #[derive(Default)]
    struct CountingTrials {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ClinicalTrialSearch for CountingTrials {
        async fn search(
            &self,
            _diagnosis: &str,
            _patient_context: Option<&Value>,
            _max_results: usize,
        ) -> Result<Vec<TrialRecord>, CollaboratorError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Vec::new())
        }
    }

    fn engine() -> (
        ClinicalEngine,
        Arc<CountingGuidelines>,
        Arc<CountingTrials>,
    ) {
        let guidelines = Arc::new(CountingGuidelines::default());
        let trials = Arc::new(CountingTrials::default());
        let engine = ClinicalEngine::new(
            EngineConfig::default(),
            guidelines.clone(),
            trials.clone(),
        );
        (engine, guidelines, trials)
    }

    #[tokio::test]
    async fn test_blank_patient_id_is_fatal() {
        let (engine, guidelines, _) = engine();
        let result = engine
            .run_full_diagnostic("  ", "fatigue", &[], json!({}), None)
            .await;
        assert!(matches!(
            result,
            Err(EngineError::InvalidPatientIdentity(_))
        ));
        // Nothing ran
        assert_eq!(guidelines.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_mismatched_record_id_is_fatal() {
        let (engine, _, _) = engine();
        let record = json!({"patient": {"id": "someone-else"}});
        let result = engine
            .run_full_diagnostic("patient-1", "fatigue", &[], record, None)
            .await;
        assert!(matches!(
            result,
            Err(EngineError::InvalidPatientIdentity(_))
        ));
    }

    #[tokio::test]
    async fn test_no_symptoms_short_circuits() {
        let (engine, guidelines, trials) = engine();
        let result = engine
            .run_full_diagnostic(
                "patient-1",
                "Nothing recognizable in this narrative.",
                &[],
                json!({"patient": {"id": "patient-1"}}),
                None,
            )
            .await
            .unwrap();

        assert_eq!(result.diagnosis_name, UNABLE_TO_PROCESS_DIAGNOSIS);
        assert_eq!(result.confidence, 0.0);
        assert_eq!(guidelines.calls.load(Ordering::SeqCst), 0);
        assert_eq!(trials.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_observations_substitute_for_narrative() {
        let (engine, guidelines, _) = engine();
        let observations = vec!["  Fatigue ".to_string(), "joint pain".to_string()];
        let result = engine
            .run_full_diagnostic(
                "patient-1",
                "Nothing recognizable in this narrative.",
                &observations,
                json!({"patient": {"id": "patient-1"}}),
                None,
            )
            .await
            .unwrap();

        // The pipeline proceeded past extraction: a plan was generated and
        // executed against the guideline collaborator.
        assert_ne!(result.diagnosis_name, UNABLE_TO_PROCESS_DIAGNOSIS);
        assert!(guidelines.calls.load(Ordering::SeqCst) > 0);
    }

    #[test]
    fn test_merge_symptoms_deduplicates_normalized_observations() {
        let merged = merge_symptoms(
            vec!["fatigue".to_string()],
            &[
                " Fatigue ".to_string(),
                "FEVER".to_string(),
                String::new(),
            ],
        );
        assert_eq!(merged, vec!["fatigue", "fever"]);
    }
}
