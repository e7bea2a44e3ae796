//! Diagnostic plan execution
//!
//! Runs a plan's steps through the step runner in contiguous, order-
//! preserving batches bounded by the configured concurrency cap. The batch
//! boundary is the sole synchronization point: within a batch every step task
//! owns its own step record and runs concurrently; between batches the
//! executor alone writes results back into the canonical step array and
//! publishes an immutable snapshot to the optional progress observer.
//!
//! Step execution is non-throwing, so the only error this module can return
//! is a structural contract violation in the plan itself, raised before any
//! step runs.

use crate::clients::GuidelineSearch;
use crate::config::EngineConfig;
use crate::engine::plan_utils::{collect_sources_in_step_order, validate_plan};
use crate::engine::runner::{execute_diagnostic_step, FINDINGS_TIMED_OUT};
use crate::engine::types::{ClinicalSource, DiagnosticPlan, DiagnosticStep, Patient};
use crate::error::EngineError;
use async_trait::async_trait;
use futures_util::future::join_all;
use std::time::Instant;

/// Observer for progressive plan snapshots
///
/// Invoked once per completed batch with an immutable snapshot in which the
/// completed steps form a prefix of the original order and pending steps are
/// untouched. No step of the next batch starts before the delivery await
/// returns, so observers always see monotonically-progressing,
/// non-overlapping states.
#[async_trait]
pub trait ProgressObserver: Send + Sync {
    /// Receive a plan snapshot after a batch completes
    async fn on_plan_update(&self, snapshot: &DiagnosticPlan);
}

/// Execute a diagnostic plan under the configured concurrency cap
///
/// Returns the plan with every step completed, in the original order and
/// with the original ids, plus all collected sources concatenated in step
/// order (never completion order).
///
/// Once the plan deadline has elapsed, remaining steps are completed locally
/// with the timed-out findings sentinel and no collaborator calls, so the
/// caller still receives a fully-completed plan rather than a hang or a
/// truncation.
pub(crate) async fn execute_diagnostic_plan(
    config: &EngineConfig,
    guidelines: &dyn GuidelineSearch,
    plan: DiagnosticPlan,
    patient: Option<&Patient>,
    observer: Option<&dyn ProgressObserver>,
) -> Result<(DiagnosticPlan, Vec<ClinicalSource>), EngineError> {
    validate_plan(&plan).map_err(EngineError::InvalidPlan)?;

    let started = Instant::now();
    let rationale = plan.rationale;
    let mut steps = plan.steps;
    let total = steps.len();
    let batch_size = config.max_parallel_steps.max(1);

    tracing::debug!(
        total_steps = total,
        batch_size,
        "Starting diagnostic plan execution"
    );

    let mut batch_start = 0usize;
    while batch_start < total {
        let deadline_hit = started.elapsed() >= config.plan_deadline();
        let batch_end = if deadline_hit {
            total
        } else {
            (batch_start + batch_size).min(total)
        };

        if deadline_hit {
            tracing::warn!(
                pending_steps = total - batch_start,
                deadline_secs = config.plan_deadline_secs,
                "Plan deadline elapsed, completing remaining steps without evidence"
            );
            for step in steps[batch_start..].iter_mut() {
                step.completed = true;
                step.findings = FINDINGS_TIMED_OUT.to_string();
            }
        } else {
            // Each task owns a clone of its step; results come back in
            // submission order, which is the original index order.
            let batch: Vec<DiagnosticStep> = steps[batch_start..batch_end].to_vec();
            let tasks = batch
                .into_iter()
                .map(|step| execute_diagnostic_step(config, guidelines, step, patient));
            let results = join_all(tasks).await;
            for (offset, updated) in results.into_iter().enumerate() {
                steps[batch_start + offset] = updated;
            }
        }

        tracing::debug!(
            completed_steps = batch_end,
            total_steps = total,
            "Batch completed"
        );

        if let Some(observer) = observer {
            let snapshot = DiagnosticPlan {
                steps: steps.clone(),
                rationale: rationale.clone(),
            };
            observer.on_plan_update(&snapshot).await;
        }

        batch_start = batch_end;
    }

    let sources = collect_sources_in_step_order(&steps);
    tracing::debug!(
        total_steps = total,
        total_sources = sources.len(),
        "Diagnostic plan execution finished"
    );

    Ok((DiagnosticPlan { steps, rationale }, sources))
}
