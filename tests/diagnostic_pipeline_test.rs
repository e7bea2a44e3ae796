//! Integration tests for the diagnostic pipeline end-to-end flow
//!
//! These tests verify the complete pipeline against instrumented mock
//! collaborators:
//! 1. Symptom extraction feeding plan generation
//! 2. Bounded-concurrency plan execution with progress snapshots
//! 3. Result synthesis and trial-match enrichment gating
//! 4. Degrade behavior for empty, failing, and hung collaborators

use async_trait::async_trait;
use clinical_engine::clients::{
    ClinicalTrialSearch, CollaboratorError, GuidelineHit, GuidelineSearch, TrialRecord,
};
use clinical_engine::config::EngineConfig;
use clinical_engine::engine::{
    ClinicalEngine, DiagnosticPlan, DiagnosticStep, ProgressObserver, SourceKind, NO_FINDINGS,
    UNABLE_TO_PROCESS_DIAGNOSIS, UNDIFFERENTIATED_DIAGNOSIS,
};
use clinical_engine::error::EngineError;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// Guideline mock that tracks concurrent entries and answers one hit per
/// query after a per-query delay
struct InstrumentedGuidelines {
    content: String,
    delay: Duration,
    current: AtomicUsize,
    peak: AtomicUsize,
    calls: AtomicUsize,
}

impl InstrumentedGuidelines {
    fn new(content: &str, delay: Duration) -> Self {
        Self {
            content: content.to_string(),
            delay,
            current: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl GuidelineSearch for InstrumentedGuidelines {
    async fn search(
        &self,
        query: &str,
        _patient_context: Option<&Value>,
        _max_results: usize,
    ) -> Result<Vec<GuidelineHit>, CollaboratorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        // Vary the delay per query so completion order differs from
        // submission order
        let jitter = Duration::from_millis((query.len() % 7) as u64 * 3);
        tokio::time::sleep(self.delay + jitter).await;

        self.current.fetch_sub(1, Ordering::SeqCst);
        Ok(vec![GuidelineHit {
            id: Some(format!("hit_for:{query}")),
            title: Some("Mock Guideline".to_string()),
            content: Some(self.content.clone()),
            relevance_score: Some(0.9),
        }])
    }
}

/// Guideline mock that always comes back empty-handed
struct EmptyGuidelines;

#[async_trait]
impl GuidelineSearch for EmptyGuidelines {
    async fn search(
        &self,
        _query: &str,
        _patient_context: Option<&Value>,
        _max_results: usize,
    ) -> Result<Vec<GuidelineHit>, CollaboratorError> {
        Ok(Vec::new())
    }
}

/// Guideline mock that never answers
struct HangingGuidelines;

#[async_trait]
impl GuidelineSearch for HangingGuidelines {
    async fn search(
        &self,
        _query: &str,
        _patient_context: Option<&Value>,
        _max_results: usize,
    ) -> Result<Vec<GuidelineHit>, CollaboratorError> {
        tokio::time::sleep(Duration::from_secs(86_400)).await;
        Ok(Vec::new())
    }
}

/// Trial mock recording every diagnosis it is asked about
#[derive(Default)]
struct RecordingTrials {
    diagnoses: Mutex<Vec<String>>,
}

#[async_trait]
impl ClinicalTrialSearch for RecordingTrials {
    async fn search(
        &self,
        diagnosis: &str,
        _patient_context: Option<&Value>,
        _max_results: usize,
    ) -> Result<Vec<TrialRecord>, CollaboratorError> {
        self.diagnoses.lock().await.push(diagnosis.to_string());
        Ok(vec![TrialRecord {
            id: Some("NCT04134728".to_string()),
            title: Some(format!("Trial for {diagnosis}")),
            phase: Some("Phase 3".to_string()),
            location: Some("Multiple locations".to_string()),
            contact: Some("research@example.org".to_string()),
            eligibility: Some("Adults with confirmed diagnosis".to_string()),
        }])
    }
}

/// Observer recording every snapshot it is handed
#[derive(Default)]
struct RecordingObserver {
    snapshots: Mutex<Vec<DiagnosticPlan>>,
}

#[async_trait]
impl ProgressObserver for RecordingObserver {
    async fn on_plan_update(&self, snapshot: &DiagnosticPlan) {
        self.snapshots.lock().await.push(snapshot.clone());
    }
}

/// Install a test subscriber once so `RUST_LOG=debug` surfaces pipeline
/// tracing during test runs
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn sample_record(patient_id: &str) -> Value {
    json!({
        "patient": {
            "id": patient_id,
            "gender": "Female",
            "date_of_birth": "1985-05-15",
            "race": "Caucasian",
            "marital_status": "Married",
            "language": "English",
            "poverty_percentage": 120.5
        },
        "encounters": [
            {"id": "visit1", "reason": "Routine checkup"}
        ],
        "lab_results": [
            {"name": "CBC", "value": "Normal", "date_time": "2023-01-15T09:15:00Z"}
        ]
    })
}

fn manual_plan(n: usize) -> DiagnosticPlan {
    DiagnosticPlan {
        steps: (1..=n)
            .map(|i| {
                DiagnosticStep::new(
                    format!("step{i}"),
                    format!("Inquiry {i}"),
                    format!("question {i}{}", "y".repeat(i % 5)),
                )
            })
            .collect(),
        rationale: "manually sequenced inquiries".to_string(),
    }
}

/// Test 1: happy path: recognized symptoms, evidence naming a specific
/// condition, trial enrichment invoked exactly once with that diagnosis
#[tokio::test]
async fn test_full_pipeline_reaches_specific_diagnosis() {
    init_tracing();
    let guidelines = Arc::new(InstrumentedGuidelines::new(
        "Seropositive rheumatoid arthritis is supported by symmetrical small-joint \
         polyarthritis, prolonged morning stiffness, and strongly positive anti-CCP antibodies.",
        Duration::from_millis(2),
    ));
    let trials = Arc::new(RecordingTrials::default());
    let engine = ClinicalEngine::new(
        EngineConfig::default(),
        guidelines.clone(),
        trials.clone(),
    );

    let result = engine
        .run_full_diagnostic(
            "patient-1",
            "Patient reports fatigue and joint pain and occasional low-grade fever",
            &[],
            sample_record("patient-1"),
            None,
        )
        .await
        .unwrap();

    assert_eq!(result.diagnosis_name, "Rheumatoid Arthritis");
    assert!(result.confidence > 0.0);
    assert!(!result.supporting_evidence.is_empty());
    assert!(!result.differential_diagnoses.is_empty());

    // Enrichment ran exactly once, with the synthesized diagnosis name
    let diagnoses = trials.diagnoses.lock().await;
    assert_eq!(diagnoses.as_slice(), ["Rheumatoid Arthritis"]);
    assert_eq!(result.clinical_trial_matches.len(), 1);
    assert_eq!(result.clinical_trial_matches[0].id, "NCT04134728");

    // One guideline call per plan step (autoimmune work-up: 7 steps)
    assert_eq!(guidelines.calls.load(Ordering::SeqCst), 7);
}

/// Test 2: unrecognized narrative with no observations ends in the terminal
/// zero-confidence result without touching any collaborator
#[tokio::test]
async fn test_unrecognized_narrative_is_terminal_but_normal() {
    init_tracing();
    let guidelines = Arc::new(InstrumentedGuidelines::new("n/a", Duration::ZERO));
    let trials = Arc::new(RecordingTrials::default());
    let engine = ClinicalEngine::new(
        EngineConfig::default(),
        guidelines.clone(),
        trials.clone(),
    );

    let result = engine
        .run_full_diagnostic(
            "patient-1",
            "Administrative note with no clinical content.",
            &[],
            sample_record("patient-1"),
            None,
        )
        .await
        .unwrap();

    assert_eq!(result.diagnosis_name, UNABLE_TO_PROCESS_DIAGNOSIS);
    assert_eq!(result.confidence, 0.0);
    assert_eq!(guidelines.calls.load(Ordering::SeqCst), 0);
    assert!(trials.diagnoses.lock().await.is_empty());
}

/// Test 3: a guideline backend with zero results still lets the plan run to
/// completion, every step carrying the fixed no-evidence sentinel
#[tokio::test]
async fn test_zero_guideline_results_complete_with_sentinel() {
    init_tracing();
    let engine = ClinicalEngine::new(
        EngineConfig::default(),
        Arc::new(EmptyGuidelines),
        Arc::new(RecordingTrials::default()),
    );

    let symptoms = vec!["headache".to_string(), "nausea".to_string()];
    let plan = engine.generate_plan(&symptoms, None);
    let (done, sources) = engine.execute_plan(plan, None, None).await.unwrap();

    assert!(done.steps.iter().all(|s| s.completed));
    assert!(done.steps.iter().all(|s| s.findings == NO_FINDINGS));
    assert!(sources.is_empty());
}

/// Test 4: at no point do more step tasks run concurrently than the
/// configured cap, while batching still overlaps work within a batch
#[tokio::test]
async fn test_concurrency_cap_is_respected() {
    init_tracing();
    let config = EngineConfig {
        max_parallel_steps: 4,
        ..EngineConfig::default()
    };
    let guidelines = Arc::new(InstrumentedGuidelines::new(
        "generic guidance",
        Duration::from_millis(25),
    ));
    let engine = ClinicalEngine::new(
        config,
        guidelines.clone(),
        Arc::new(RecordingTrials::default()),
    );

    let (done, _) = engine
        .execute_plan(manual_plan(12), None, None)
        .await
        .unwrap();

    assert!(done.steps.iter().all(|s| s.completed));
    let peak = guidelines.peak.load(Ordering::SeqCst);
    assert!(peak <= 4, "peak concurrency {peak} exceeded the cap");
    assert!(peak >= 2, "steps did not overlap at all (peak {peak})");
    assert_eq!(guidelines.calls.load(Ordering::SeqCst), 12);
}

/// Test 5: aggregated sources follow the plan's step order even though
/// completion order differs under concurrency
#[tokio::test]
async fn test_sources_follow_plan_order_not_completion_order() {
    init_tracing();
    let guidelines = Arc::new(InstrumentedGuidelines::new(
        "generic guidance",
        Duration::from_millis(1),
    ));
    let engine = ClinicalEngine::new(
        EngineConfig::default(),
        guidelines,
        Arc::new(RecordingTrials::default()),
    );

    let plan = manual_plan(10);
    let expected: Vec<String> = plan
        .steps
        .iter()
        .map(|s| format!("hit_for:{}", s.query))
        .collect();

    let (_, sources) = engine.execute_plan(plan, None, None).await.unwrap();
    let actual: Vec<String> = sources.iter().map(|s| s.id.clone()).collect();
    assert_eq!(actual, expected);
    assert!(sources.iter().all(|s| s.kind == SourceKind::Guideline));
}

/// Test 6: the observer receives one snapshot per batch, each a completed
/// prefix of the plan in original order
#[tokio::test]
async fn test_progress_snapshots_are_monotonic_batches() {
    init_tracing();
    let config = EngineConfig {
        max_parallel_steps: 5,
        ..EngineConfig::default()
    };
    let guidelines = Arc::new(InstrumentedGuidelines::new(
        "anti-CCP antibodies strongly positive, consistent with rheumatoid arthritis",
        Duration::from_millis(1),
    ));
    let engine = ClinicalEngine::new(
        config,
        guidelines,
        Arc::new(RecordingTrials::default()),
    );
    let observer = RecordingObserver::default();

    let result = engine
        .run_full_diagnostic(
            "patient-1",
            "Patient reports fatigue and joint pain.",
            &[],
            sample_record("patient-1"),
            Some(&observer),
        )
        .await
        .unwrap();
    assert_eq!(result.diagnosis_name, "Rheumatoid Arthritis");

    // Autoimmune work-up has 7 steps: two batches at a cap of 5
    let snapshots = observer.snapshots.lock().await;
    assert_eq!(snapshots.len(), 2);
    let counts: Vec<usize> = snapshots.iter().map(|p| p.completed_count()).collect();
    assert_eq!(counts, vec![5, 7]);
    for snapshot in snapshots.iter() {
        let first_pending = snapshot
            .steps
            .iter()
            .position(|s| !s.completed)
            .unwrap_or(snapshot.steps.len());
        assert!(snapshot.steps[..first_pending].iter().all(|s| s.completed));
        assert!(snapshot.steps[first_pending..].iter().all(|s| !s.completed));
    }
}

/// Test 7: an evidence corpus that matches no rule yields the generic
/// fallback diagnosis and suppresses trial enrichment
#[tokio::test]
async fn test_enrichment_skipped_for_generic_diagnosis() {
    init_tracing();
    let guidelines = Arc::new(InstrumentedGuidelines::new(
        "No condition-specific guidance available.",
        Duration::ZERO,
    ));
    let trials = Arc::new(RecordingTrials::default());
    let engine = ClinicalEngine::new(EngineConfig::default(), guidelines, trials.clone());

    let result = engine
        .run_full_diagnostic(
            "patient-1",
            "Patient mentions a headache and some nausea.",
            &[],
            sample_record("patient-1"),
            None,
        )
        .await
        .unwrap();

    assert_eq!(result.diagnosis_name, UNDIFFERENTIATED_DIAGNOSIS);
    assert!(result.clinical_trial_matches.is_empty());
    assert!(trials.diagnoses.lock().await.is_empty());
}

/// Test 8: a hung guideline backend is cut off by the per-step timeout and
/// the plan still completes without hanging
#[tokio::test(start_paused = true)]
async fn test_hung_collaborator_is_bounded_by_step_timeout() {
    init_tracing();
    let config = EngineConfig {
        max_parallel_steps: 3,
        step_timeout_secs: 5,
        ..EngineConfig::default()
    };
    let engine = ClinicalEngine::new(
        config,
        Arc::new(HangingGuidelines),
        Arc::new(RecordingTrials::default()),
    );

    let (done, sources) = engine
        .execute_plan(manual_plan(6), None, None)
        .await
        .unwrap();

    assert!(done.steps.iter().all(|s| s.completed));
    assert!(done
        .steps
        .iter()
        .all(|s| s.findings.contains("timed out")));
    assert!(sources.is_empty());
}

/// Test 9: structural plan defects fail fast instead of degrading
#[tokio::test]
async fn test_duplicate_step_ids_fail_fast() {
    init_tracing();
    let engine = ClinicalEngine::new(
        EngineConfig::default(),
        Arc::new(EmptyGuidelines),
        Arc::new(RecordingTrials::default()),
    );

    let mut plan = manual_plan(3);
    plan.steps[2].id = "step1".to_string();

    let result = engine.execute_plan(plan, None, None).await;
    assert!(matches!(result, Err(EngineError::InvalidPlan(_))));
}

/// Test 10: supplementary observations stand in for an uninformative
/// narrative and still drive a full run
#[tokio::test]
async fn test_observations_drive_pipeline_when_narrative_is_silent() {
    init_tracing();
    let guidelines = Arc::new(InstrumentedGuidelines::new(
        "generic guidance",
        Duration::ZERO,
    ));
    let trials = Arc::new(RecordingTrials::default());
    let engine = ClinicalEngine::new(
        EngineConfig::default(),
        guidelines.clone(),
        trials,
    );

    let observations = vec!["Fatigue".to_string(), "Joint Pain".to_string()];
    let result = engine
        .run_full_diagnostic(
            "patient-1",
            "Dictation failed; see structured observations.",
            &observations,
            sample_record("patient-1"),
            None,
        )
        .await
        .unwrap();

    assert_ne!(result.diagnosis_name, UNABLE_TO_PROCESS_DIAGNOSIS);
    assert!(guidelines.calls.load(Ordering::SeqCst) > 0);
}
