//! Plan manipulation utilities
//!
//! Common helpers for working with diagnostic plans: structural validation
//! shared by the generator and executor, and order-preserving aggregation
//! over executed steps.

use crate::engine::types::{ClinicalSource, DiagnosticPlan, DiagnosticStep};
use std::collections::HashSet;

/// Validate a plan's structural contracts
///
/// A plan is well-formed when it has at least one step and every step has a
/// unique, non-blank id and a non-blank query. Violations indicate a defect
/// in whatever produced the plan, so callers fail fast instead of degrading.
///
/// # Arguments
/// * `plan` - The plan to validate
///
/// # Returns
/// * `Ok(())` - Plan is structurally sound
/// * `Err(String)` - Description of the first violation found
pub fn validate_plan(plan: &DiagnosticPlan) -> Result<(), String> {
    if plan.steps.is_empty() {
        return Err("plan has no steps".to_string());
    }

    let mut seen = HashSet::new();
    for step in &plan.steps {
        if step.id.trim().is_empty() {
            return Err("step with blank id".to_string());
        }
        if !seen.insert(step.id.as_str()) {
            return Err(format!("duplicate step id '{}'", step.id));
        }
        if step.query.trim().is_empty() {
            return Err(format!("step '{}' has a blank query", step.id));
        }
    }

    Ok(())
}

/// Aggregate all steps' sources in original step order
///
/// The executor guarantees this is the order the caller sees regardless of
/// which step finished first.
pub fn collect_sources_in_step_order(steps: &[DiagnosticStep]) -> Vec<ClinicalSource> {
    steps
        .iter()
        .flat_map(|step| step.sources.iter().cloned())
        .collect()
}

/// Render a symptom list for use inside descriptions and queries
pub fn joined_symptoms(symptoms: &[String]) -> String {
    symptoms.join(", ")
}
