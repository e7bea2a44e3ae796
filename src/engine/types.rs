//! Clinical data model
//!
//! The types that flow through the pipeline: the patient context the caller
//! owns, the plan/step/source records the engine builds and fills in, and the
//! diagnostic result handed back at the end.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Patient context supplied by the caller
///
/// Identity plus demographic attributes, with the full raw record kept as an
/// opaque JSON bag (`encounters`, `lab_results`, `conditions`, ... keyed by
/// domain). The pipeline only ever reads it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Patient {
    /// Caller-assigned patient identifier
    pub id: String,
    /// Administrative gender, if recorded
    #[serde(default)]
    pub gender: Option<String>,
    /// Date of birth, as recorded
    #[serde(default)]
    pub date_of_birth: Option<String>,
    /// Race, as recorded
    #[serde(default)]
    pub race: Option<String>,
    /// Marital status, as recorded
    #[serde(default)]
    pub marital_status: Option<String>,
    /// Preferred language, as recorded
    #[serde(default)]
    pub language: Option<String>,
    /// Population percentage below poverty for the patient's area
    #[serde(default)]
    pub poverty_percentage: Option<f64>,
    /// Full raw record as supplied by the caller
    #[serde(default)]
    pub raw_data: Value,
}

impl Patient {
    /// Build a patient from an identifier and a raw record
    ///
    /// Demographics are read from `record["patient"]` when present; anything
    /// missing stays `None`. The whole record is retained as `raw_data`.
    pub fn from_record(id: impl Into<String>, record: Value) -> Self {
        let demo = record.get("patient").cloned().unwrap_or(Value::Null);
        let field = |name: &str| {
            demo.get(name)
                .and_then(Value::as_str)
                .map(|s| s.to_string())
        };
        Self {
            id: id.into(),
            gender: field("gender"),
            date_of_birth: field("date_of_birth"),
            race: field("race"),
            marital_status: field("marital_status"),
            language: field("language"),
            poverty_percentage: demo.get("poverty_percentage").and_then(Value::as_f64),
            raw_data: record,
        }
    }
}

/// Kind of evidence backing a diagnostic step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Excerpt from the patient's own record
    PatientData,
    /// Clinical guideline excerpt
    Guideline,
    /// Clinical trial record
    ClinicalTrial,
    /// Research literature excerpt
    Research,
}

/// One piece of external evidence attached to a diagnostic step
///
/// Immutable once attached; created by the step runner when a collaborator
/// returns raw results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClinicalSource {
    /// Evidence kind
    #[serde(rename = "type")]
    pub kind: SourceKind,
    /// Source identifier (backend-assigned or positional)
    pub id: String,
    /// Human-readable title
    pub title: String,
    /// Source content
    pub content: String,
    /// Relevance to the step's query, in [0,1]
    #[serde(default)]
    pub relevance_score: Option<f64>,
    /// When the source was retrieved
    pub access_time: DateTime<Utc>,
}

/// One unit of diagnostic inquiry
///
/// Created pending by the plan generator; completed exactly once by the step
/// runner, which fills in `sources` and `findings` atomically with
/// `completed = true`. Never mutated again afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagnosticStep {
    /// Stable step identifier, unique within its plan
    pub id: String,
    /// Human-readable description of the inquiry
    pub description: String,
    /// Query string sent verbatim to the guideline collaborator
    pub query: String,
    /// Whether the step has been executed
    #[serde(default)]
    pub completed: bool,
    /// Evidence collected for this step, in retrieval order
    #[serde(default)]
    pub sources: Vec<ClinicalSource>,
    /// Synthesized textual conclusion for this step
    #[serde(default)]
    pub findings: String,
}

impl DiagnosticStep {
    /// Create a pending step
    pub fn new(
        id: impl Into<String>,
        description: impl Into<String>,
        query: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            query: query.into(),
            completed: false,
            sources: Vec::new(),
            findings: String::new(),
        }
    }
}

/// An ordered diagnostic plan plus the rationale behind its sequencing
///
/// Step order is significant and preserved end-to-end: it is the canonical
/// diagnostic narrative presented to a clinician. The executor fills in
/// per-step fields but never reorders, adds, or removes steps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagnosticPlan {
    /// Ordered diagnostic steps
    pub steps: Vec<DiagnosticStep>,
    /// Why this diagnostic approach was chosen
    pub rationale: String,
}

impl DiagnosticPlan {
    /// Number of completed steps
    pub fn completed_count(&self) -> usize {
        self.steps.iter().filter(|s| s.completed).count()
    }
}

/// Ordinal likelihood of a differential diagnosis
///
/// Declared in descending order so an ascending sort puts the most likely
/// differential first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Likelihood {
    /// Strongly consistent with the evidence
    High,
    /// Plausible but incompletely supported
    Medium,
    /// Considered and largely argued against
    Low,
    /// Effectively excluded
    #[serde(rename = "Very Low")]
    VeryLow,
}

/// An alternative diagnosis considered and ranked against the primary one
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DifferentialDiagnosis {
    /// Condition name
    pub name: String,
    /// How likely the condition remains given the evidence
    pub likelihood: Likelihood,
    /// The factors that raise or lower it
    pub key_factors: String,
}

/// A clinical trial the patient may be eligible for
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClinicalTrialMatch {
    /// Registry identifier
    pub id: String,
    /// Trial title
    pub title: String,
    /// Trial phase
    pub phase: String,
    /// Recruiting location(s)
    pub location: String,
    /// Contact point for enrollment
    pub contact: String,
    /// Eligibility criteria summary
    pub eligibility: String,
}

/// The synthesized outcome of a full diagnostic run
///
/// Created once per run by the synthesizer. The orchestrator may later
/// append trial matches, but the diagnosis fields are never altered after
/// creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagnosticResult {
    /// Primary diagnosis name
    pub diagnosis_name: String,
    /// ICD-10 code, when one applies
    #[serde(default)]
    pub diagnosis_code: Option<String>,
    /// Confidence in the primary diagnosis, always populated, in [0,1]
    pub confidence: f64,
    /// Evidence statements backing the diagnosis (never empty)
    pub supporting_evidence: Vec<String>,
    /// Alternative diagnoses, ordered by descending likelihood
    #[serde(default)]
    pub differential_diagnoses: Vec<DifferentialDiagnosis>,
    /// Recommended follow-up tests
    #[serde(default)]
    pub recommended_tests: Vec<String>,
    /// Recommended treatments
    #[serde(default)]
    pub recommended_treatments: Vec<String>,
    /// Matched clinical trials (filled by enrichment, possibly empty)
    #[serde(default)]
    pub clinical_trial_matches: Vec<ClinicalTrialMatch>,
}

impl DiagnosticResult {
    /// Whether this result is one of the placeholder outcomes
    /// ("Unable to Process", undifferentiated fallback) that must not
    /// trigger trial-match enrichment.
    pub fn is_placeholder(&self) -> bool {
        self.diagnosis_name == crate::engine::synthesis::UNABLE_TO_PROCESS_DIAGNOSIS
            || self.diagnosis_name == crate::engine::synthesis::UNDIFFERENTIATED_DIAGNOSIS
    }
}
