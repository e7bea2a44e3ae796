//! Diagnostic plan generation
//!
//! Turns a symptom list (plus optional patient context) into an ordered
//! diagnostic plan. Plans follow a fixed clinical-reasoning sequence: initial
//! assessment, history, examination, labs, imaging/specialized tests,
//! differential evaluation, treatment considerations. Trailing steps may be
//! omitted, but the relative order never changes.
//!
//! Generation is infallible by contract: if the selected plan somehow fails
//! structural validation, a context-free fallback plan referencing the input
//! symptoms verbatim is returned instead.

use crate::engine::plan_utils::{joined_symptoms, validate_plan};
use crate::engine::types::{DiagnosticPlan, DiagnosticStep, Patient};

/// Generate a diagnostic plan for the given symptoms
///
/// Template selection keys off symptom combinations with a well-known
/// work-up (autoimmune, malignancy); everything else gets the general
/// work-up. Never errors and never returns an empty plan.
pub fn generate_diagnostic_plan(symptoms: &[String], patient: Option<&Patient>) -> DiagnosticPlan {
    let has = |name: &str| symptoms.iter().any(|s| s == name);

    let mut plan = if has("fatigue") && has("joint pain") {
        autoimmune_plan(symptoms)
    } else if has("weight loss") && has("abdominal pain") {
        malignancy_plan(symptoms)
    } else {
        general_plan(symptoms)
    };

    if patient.is_some() {
        plan.rationale
            .push_str(" Patient history from the on-file record is weighed at each step.");
    }

    if let Err(reason) = validate_plan(&plan) {
        tracing::warn!(
            reason = %reason,
            "Generated plan failed validation, using fallback plan"
        );
        return fallback_plan(symptoms);
    }

    tracing::debug!(
        num_steps = plan.steps.len(),
        symptoms = %joined_symptoms(symptoms),
        "Generated diagnostic plan"
    );
    plan
}

/// Work-up for symptom combinations suggesting an autoimmune process
fn autoimmune_plan(symptoms: &[String]) -> DiagnosticPlan {
    let listed = joined_symptoms(symptoms);
    DiagnosticPlan {
        steps: vec![
            DiagnosticStep::new(
                "step1",
                "Initial symptom assessment",
                format!("Evaluate {listed} characteristics, duration, and pattern"),
            ),
            DiagnosticStep::new(
                "step2",
                "Medical history review",
                "Review patient history for autoimmune risk factors",
            ),
            DiagnosticStep::new(
                "step3",
                "Physical examination",
                "Assess joints, skin, and lymph nodes",
            ),
            DiagnosticStep::new(
                "step4",
                "Initial laboratory testing",
                "CBC, CMP, ESR, CRP, ANA, RF",
            ),
            DiagnosticStep::new(
                "step5",
                "Specialized autoimmune testing",
                "Anti-CCP, anti-dsDNA, complement levels",
            ),
            DiagnosticStep::new(
                "step6",
                "Differential diagnosis",
                "Evaluate for rheumatoid arthritis, SLE, and fibromyalgia",
            ),
            DiagnosticStep::new(
                "step7",
                "Treatment considerations",
                "DMARD options and symptom management",
            ),
        ],
        rationale: "This diagnostic plan focuses on evaluating fatigue and joint pain with an \
                    emphasis on autoimmune conditions, which are common causes of these symptoms. \
                    The plan moves systematically from initial assessment to specialized testing \
                    and treatment considerations."
            .to_string(),
    }
}

/// Work-up for symptom combinations concerning for malignancy
fn malignancy_plan(symptoms: &[String]) -> DiagnosticPlan {
    let listed = joined_symptoms(symptoms);
    DiagnosticPlan {
        steps: vec![
            DiagnosticStep::new(
                "step1",
                "Initial symptom assessment",
                format!("Evaluate {listed} amount, timeline, and characteristics"),
            ),
            DiagnosticStep::new(
                "step2",
                "Medical history review",
                "Review patient history for cancer risk factors",
            ),
            DiagnosticStep::new(
                "step3",
                "Physical examination",
                "Abdominal exam, lymph node assessment",
            ),
            DiagnosticStep::new(
                "step4",
                "Initial laboratory testing",
                "CBC, CMP, tumor markers (CA-19-9, CEA)",
            ),
            DiagnosticStep::new(
                "step5",
                "Imaging studies",
                "Abdominal CT scan with contrast",
            ),
            DiagnosticStep::new(
                "step6",
                "Endoscopic evaluation",
                "Upper endoscopy and colonoscopy",
            ),
            DiagnosticStep::new(
                "step7",
                "Differential diagnosis",
                "Evaluate for pancreatic cancer, colorectal cancer, and IBD",
            ),
        ],
        rationale: "This diagnostic plan addresses the concerning combination of weight loss and \
                    abdominal pain, which can indicate malignancy. It sequences laboratory \
                    testing, imaging, and endoscopic procedures to evaluate for gastrointestinal \
                    or pancreatic cancer."
            .to_string(),
    }
}

/// General-purpose work-up when no focused template applies
fn general_plan(symptoms: &[String]) -> DiagnosticPlan {
    let listed = joined_symptoms(symptoms);
    DiagnosticPlan {
        steps: vec![
            DiagnosticStep::new(
                "step1",
                "Initial symptom assessment",
                format!("Evaluate {listed} characteristics, duration, and pattern"),
            ),
            DiagnosticStep::new(
                "step2",
                "Medical history review",
                "Review patient history for relevant risk factors",
            ),
            DiagnosticStep::new(
                "step3",
                "Physical examination",
                "Focused physical exam based on symptoms",
            ),
            DiagnosticStep::new(
                "step4",
                "Initial laboratory testing",
                "CBC, CMP, and symptom-specific tests",
            ),
            DiagnosticStep::new(
                "step5",
                "Imaging if indicated",
                "Determine appropriate imaging based on symptoms",
            ),
            DiagnosticStep::new(
                "step6",
                "Differential diagnosis",
                format!("Evaluate common causes of {listed}"),
            ),
        ],
        rationale: format!(
            "This diagnostic plan provides a systematic approach to evaluating {listed}. It \
             includes a thorough history, physical examination, and appropriate testing to \
             narrow the differential diagnosis."
        ),
    }
}

/// Context-free fallback plan, the degrade path when template generation
/// produces something unusable
fn fallback_plan(symptoms: &[String]) -> DiagnosticPlan {
    let listed = joined_symptoms(symptoms);
    DiagnosticPlan {
        steps: vec![
            DiagnosticStep::new(
                "step1",
                "Initial symptom assessment",
                format!("Evaluate {listed} characteristics"),
            ),
            DiagnosticStep::new("step2", "Medical history review", "Review patient history"),
            DiagnosticStep::new(
                "step3",
                "Physical examination",
                "Perform focused physical exam",
            ),
            DiagnosticStep::new("step4", "Basic laboratory testing", "Order CBC and CMP"),
            DiagnosticStep::new(
                "step5",
                "Differential diagnosis",
                format!("Consider common causes of {listed}"),
            ),
        ],
        rationale: format!("Fallback diagnostic plan to evaluate {listed} systematically"),
    }
}
