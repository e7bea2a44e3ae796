//! Clinical trial matching enrichment
//!
//! Runs once per diagnostic run, after synthesis, and only for a
//! non-placeholder diagnosis. Failure of the trial collaborator (error or
//! timeout) degrades to an empty match list and never affects the
//! diagnosis itself.

use crate::clients::ClinicalTrialSearch;
use crate::config::EngineConfig;
use crate::engine::types::{ClinicalTrialMatch, Patient};
use tokio::time::timeout;

/// Match clinical trials for a synthesized diagnosis
///
/// Returns normalized matches, or an empty list on any collaborator failure.
pub(crate) async fn match_clinical_trials(
    config: &EngineConfig,
    trials: &dyn ClinicalTrialSearch,
    diagnosis: &str,
    patient: Option<&Patient>,
) -> Vec<ClinicalTrialMatch> {
    tracing::debug!(diagnosis = %diagnosis, "Matching clinical trials");

    let patient_context = patient.map(|p| &p.raw_data);
    let search = trials.search(diagnosis, patient_context, config.max_sources_per_step);

    let records = match timeout(config.step_timeout(), search).await {
        Ok(Ok(records)) => records,
        Ok(Err(e)) => {
            tracing::warn!(
                diagnosis = %diagnosis,
                error = %e,
                "Trial search failed, continuing without trial matches"
            );
            return Vec::new();
        }
        Err(_) => {
            tracing::warn!(
                diagnosis = %diagnosis,
                timeout_secs = config.step_timeout_secs,
                "Trial search timed out"
            );
            return Vec::new();
        }
    };

    records
        .into_iter()
        .enumerate()
        .map(|(i, record)| ClinicalTrialMatch {
            id: record.id.unwrap_or_else(|| format!("trial_{i}")),
            title: record.title.unwrap_or_else(|| "Clinical Trial".to_string()),
            phase: record.phase.unwrap_or_else(|| "Unknown".to_string()),
            location: record.location.unwrap_or_default(),
            contact: record.contact.unwrap_or_default(),
            eligibility: record.eligibility.unwrap_or_default(),
        })
        .collect()
}
