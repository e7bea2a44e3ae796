//! Diagnostic result synthesis
//!
//! Aggregates all completed steps' findings into one evidence corpus and maps
//! it to a ranked diagnosis. The reference mapping is a priority-ordered rule
//! table over condition-indicative terms, producing one of a small set of
//! diagnosis templates; an optional inference collaborator can replace the
//! table and degrades back to it on any failure.
//!
//! Whatever path produces the result, the same post-conditions hold:
//! confidence in [0,1], at least one supporting-evidence string, and
//! differentials ordered by descending likelihood.

use crate::clients::{DiagnosisInference, InferredDiagnosis};
use crate::engine::plan_utils::joined_symptoms;
use crate::engine::types::{
    ClinicalSource, DiagnosticPlan, DiagnosticResult, DifferentialDiagnosis, Likelihood, Patient,
};

/// Diagnosis name of the terminal no-symptom outcome
pub const UNABLE_TO_PROCESS_DIAGNOSIS: &str = "Unable to Process";

/// Diagnosis name of the generic fallback outcome
pub const UNDIFFERENTIATED_DIAGNOSIS: &str = "Undifferentiated Inflammatory Condition";

/// One entry in the diagnosis rule table
///
/// Matches when any trigger term appears in the lowercased evidence corpus.
/// Table order is priority order; the first matching rule wins.
struct DiagnosisRule {
    trigger_terms: &'static [&'static str],
    build: fn() -> DiagnosticResult,
}

/// The built-in rule table, the extension point for a real inference engine
const DIAGNOSIS_RULES: &[DiagnosisRule] = &[
    DiagnosisRule {
        trigger_terms: &["rheumatoid arthritis", "anti-ccp"],
        build: rheumatoid_arthritis_result,
    },
    DiagnosisRule {
        trigger_terms: &["leukemia", "philadelphia chromosome"],
        build: chronic_myeloid_leukemia_result,
    },
];

/// Outcome of scanning the rule table against an evidence corpus
pub(crate) enum RuleOutcome {
    /// A rule fired and produced a diagnosis template
    Matched(DiagnosticResult),
    /// No rule fired; callers fall back to the undifferentiated result
    Unmatched,
}

/// Scan the rule table against the evidence corpus
pub(crate) fn match_diagnosis_rules(evidence: &str) -> RuleOutcome {
    let lowered = evidence.to_lowercase();
    for rule in DIAGNOSIS_RULES {
        if rule.trigger_terms.iter().any(|term| lowered.contains(term)) {
            return RuleOutcome::Matched((rule.build)());
        }
    }
    RuleOutcome::Unmatched
}

/// Synthesize a diagnostic result from an executed plan
///
/// Infallible: every failure path inside (inference collaborator errors,
/// unmatched evidence) resolves to a well-formed result with reduced
/// confidence rather than an error.
pub(crate) async fn synthesize_diagnostic_result(
    symptoms: &[String],
    plan: &DiagnosticPlan,
    sources: &[ClinicalSource],
    patient: Option<&Patient>,
    inference: Option<&dyn DiagnosisInference>,
) -> DiagnosticResult {
    let corpus = build_evidence_corpus(plan);
    tracing::debug!(
        corpus_len = corpus.len(),
        num_sources = sources.len(),
        patient_id = patient.map(|p| p.id.as_str()).unwrap_or("none"),
        "Synthesizing diagnostic result"
    );

    if let Some(inference) = inference {
        match inference.infer(symptoms, &corpus).await {
            Ok(inferred) => {
                tracing::debug!(
                    diagnosis = %inferred.diagnosis_name,
                    "Diagnosis produced by inference collaborator"
                );
                return normalize(from_inferred(inferred), symptoms);
            }
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    "Inference collaborator failed, falling back to rule table"
                );
            }
        }
    }

    let result = match match_diagnosis_rules(&corpus) {
        RuleOutcome::Matched(result) => result,
        RuleOutcome::Unmatched => undifferentiated_result(symptoms, sources.len()),
    };
    normalize(result, symptoms)
}

/// Concatenate step findings into one evidence corpus, step descriptions as
/// section headers, skipping steps with empty findings
fn build_evidence_corpus(plan: &DiagnosticPlan) -> String {
    plan.steps
        .iter()
        .filter(|step| !step.findings.is_empty())
        .map(|step| format!("## {}\n\n{}", step.description, step.findings))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Enforce the synthesis post-conditions on any result, whichever path
/// produced it
fn normalize(mut result: DiagnosticResult, symptoms: &[String]) -> DiagnosticResult {
    result.confidence = result.confidence.clamp(0.0, 1.0);
    if result.supporting_evidence.is_empty() {
        result.supporting_evidence.push(format!(
            "Clinical presentation: {}",
            joined_symptoms(symptoms)
        ));
    }
    result
        .differential_diagnoses
        .sort_by_key(|d| d.likelihood);
    result
}

/// Map an inference collaborator's output onto the result type
fn from_inferred(inferred: InferredDiagnosis) -> DiagnosticResult {
    DiagnosticResult {
        diagnosis_name: inferred.diagnosis_name,
        diagnosis_code: inferred.diagnosis_code,
        confidence: inferred.confidence,
        supporting_evidence: inferred.supporting_evidence,
        differential_diagnoses: inferred.differential_diagnoses,
        recommended_tests: inferred.recommended_tests,
        recommended_treatments: inferred.recommended_treatments,
        clinical_trial_matches: Vec::new(),
    }
}

fn rheumatoid_arthritis_result() -> DiagnosticResult {
    DiagnosticResult {
        diagnosis_name: "Rheumatoid Arthritis".to_string(),
        diagnosis_code: Some("M05.79".to_string()),
        confidence: 0.92,
        supporting_evidence: vec![
            "Symmetrical polyarthritis affecting small joints of hands".to_string(),
            "Morning stiffness lasting > 1 hour".to_string(),
            "Elevated inflammatory markers (ESR, CRP)".to_string(),
            "Strongly positive RF and anti-CCP antibodies".to_string(),
            "Family history of autoimmune conditions".to_string(),
        ],
        differential_diagnoses: vec![
            DifferentialDiagnosis {
                name: "Systemic Lupus Erythematosus".to_string(),
                likelihood: Likelihood::Low,
                key_factors: "Positive ANA but negative anti-dsDNA, normal complement levels, \
                              absence of typical organ involvement"
                    .to_string(),
            },
            DifferentialDiagnosis {
                name: "Psoriatic Arthritis".to_string(),
                likelihood: Likelihood::VeryLow,
                key_factors: "No skin or nail changes, no DIP joint involvement".to_string(),
            },
            DifferentialDiagnosis {
                name: "Viral Arthritis".to_string(),
                likelihood: Likelihood::VeryLow,
                key_factors: "Chronic progressive course rather than acute onset".to_string(),
            },
        ],
        recommended_tests: vec![
            "Hand/wrist X-rays to assess for erosions".to_string(),
            "Ultrasound of affected joints to evaluate synovitis".to_string(),
            "HLA-B27 to help rule out seronegative spondyloarthropathies".to_string(),
            "Hepatitis B and C serology prior to immunosuppressive therapy".to_string(),
        ],
        recommended_treatments: vec![
            "Methotrexate 15 mg weekly with folic acid 1 mg daily".to_string(),
            "Prednisone 10 mg daily for 4 weeks, then taper and discontinue".to_string(),
            "NSAIDs as needed for pain with appropriate GI prophylaxis".to_string(),
            "Referral to rheumatology for ongoing management".to_string(),
            "Physical therapy for joint protection techniques and exercises".to_string(),
        ],
        clinical_trial_matches: Vec::new(),
    }
}

fn chronic_myeloid_leukemia_result() -> DiagnosticResult {
    DiagnosticResult {
        diagnosis_name: "Chronic Myeloid Leukemia".to_string(),
        diagnosis_code: Some("C92.10".to_string()),
        confidence: 0.88,
        supporting_evidence: vec![
            "Fatigue and unintentional weight loss".to_string(),
            "Splenomegaly on physical examination".to_string(),
            "Leukocytosis with left shift".to_string(),
            "Presence of Philadelphia chromosome on cytogenetic testing".to_string(),
            "Elevated LDH and uric acid".to_string(),
        ],
        differential_diagnoses: vec![
            DifferentialDiagnosis {
                name: "Acute Myeloid Leukemia".to_string(),
                likelihood: Likelihood::Medium,
                key_factors: "Absence of blast crisis, chronic rather than acute presentation"
                    .to_string(),
            },
            DifferentialDiagnosis {
                name: "Myelofibrosis".to_string(),
                likelihood: Likelihood::Low,
                key_factors: "No significant bone marrow fibrosis on biopsy".to_string(),
            },
            DifferentialDiagnosis {
                name: "Reactive Leukocytosis".to_string(),
                likelihood: Likelihood::VeryLow,
                key_factors: "Presence of Philadelphia chromosome confirms neoplastic process"
                    .to_string(),
            },
        ],
        recommended_tests: vec![
            "BCR-ABL PCR quantification".to_string(),
            "Bone marrow biopsy with cytogenetics".to_string(),
            "HLA typing for potential stem cell transplant".to_string(),
            "Cardiac evaluation prior to TKI therapy".to_string(),
        ],
        recommended_treatments: vec![
            "Tyrosine kinase inhibitor therapy (imatinib 400 mg daily)".to_string(),
            "Allopurinol for tumor lysis prophylaxis".to_string(),
            "Referral to hematology-oncology".to_string(),
            "Genetic counseling".to_string(),
        ],
        clinical_trial_matches: Vec::new(),
    }
}

/// Generic result when no rule fires on the evidence corpus
fn undifferentiated_result(symptoms: &[String], source_count: usize) -> DiagnosticResult {
    DiagnosticResult {
        diagnosis_name: UNDIFFERENTIATED_DIAGNOSIS.to_string(),
        diagnosis_code: Some("M06.9".to_string()),
        confidence: 0.65,
        supporting_evidence: vec![
            format!("Presenting symptoms: {}", joined_symptoms(symptoms)),
            format!(
                "{source_count} evidence source{} reviewed without a definitive pattern",
                if source_count == 1 { "" } else { "s" }
            ),
            "Absence of definitive diagnostic criteria for specific conditions".to_string(),
        ],
        differential_diagnoses: vec![
            DifferentialDiagnosis {
                name: "Early Rheumatoid Arthritis".to_string(),
                likelihood: Likelihood::Medium,
                key_factors: "Joint symptoms but incomplete criteria".to_string(),
            },
            DifferentialDiagnosis {
                name: "Undifferentiated Connective Tissue Disease".to_string(),
                likelihood: Likelihood::Medium,
                key_factors: "Mixed features of several autoimmune conditions".to_string(),
            },
            DifferentialDiagnosis {
                name: "Viral Syndrome".to_string(),
                likelihood: Likelihood::Low,
                key_factors: "Chronic rather than self-limited course".to_string(),
            },
        ],
        recommended_tests: vec![
            "Complete autoimmune panel".to_string(),
            "Imaging of affected joints/organs".to_string(),
            "Consider referral to rheumatology".to_string(),
        ],
        recommended_treatments: vec![
            "NSAIDs for symptomatic relief".to_string(),
            "Close monitoring for evolution of symptoms".to_string(),
            "Consider hydroxychloroquine if symptoms persist".to_string(),
        ],
        clinical_trial_matches: Vec::new(),
    }
}

/// Terminal result when no structured symptom signal could be extracted
pub(crate) fn unable_to_process_result() -> DiagnosticResult {
    DiagnosticResult {
        diagnosis_name: UNABLE_TO_PROCESS_DIAGNOSIS.to_string(),
        diagnosis_code: None,
        confidence: 0.0,
        supporting_evidence: vec![
            "No recognized symptoms could be extracted from the narrative, and no \
             supplementary observations were supplied."
                .to_string(),
        ],
        differential_diagnoses: Vec::new(),
        recommended_tests: vec![
            "Collect a structured symptom history and resubmit for evaluation".to_string(),
        ],
        recommended_treatments: vec![
            "Clinical review of the source narrative is recommended".to_string(),
        ],
        clinical_trial_matches: Vec::new(),
    }
}
