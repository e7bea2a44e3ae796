//! Symptom extraction from clinical narrative
//!
//! Turns free-form narrative (a visit transcript, a triage note) into a
//! normalized, deduplicated list of recognized symptom tokens. Matching is
//! case-insensitive and whole-phrase: a vocabulary entry only fires when the
//! occurrence is not flanked by alphanumeric characters, so "rash" never
//! fires inside "brash" and "cough" never fires inside "coughing".
//!
//! An empty result on non-empty input means "insufficient structured signal",
//! not an error; the orchestrator decides what to do with it.

/// Recognized symptom phrases, lowercase
///
/// Extraction output preserves this order, which keeps results deterministic
/// for callers that display them.
const SYMPTOM_VOCABULARY: &[&str] = &[
    "fatigue",
    "joint pain",
    "joint swelling",
    "morning stiffness",
    "fever",
    "chills",
    "night sweats",
    "weight loss",
    "weight gain",
    "headache",
    "dizziness",
    "nausea",
    "vomiting",
    "diarrhea",
    "abdominal pain",
    "chest pain",
    "palpitations",
    "shortness of breath",
    "cough",
    "sore throat",
    "rash",
    "easy bruising",
    "numbness",
    "blurred vision",
    "back pain",
    "malaise",
];

/// Extract recognized symptoms from a clinical narrative
///
/// Returns a deduplicated list in vocabulary order. Never errors; an
/// unrecognized narrative simply yields an empty list.
pub fn extract_symptoms(narrative: &str) -> Vec<String> {
    let lowered = narrative.to_lowercase();
    SYMPTOM_VOCABULARY
        .iter()
        .filter(|phrase| contains_whole_phrase(&lowered, phrase))
        .map(|phrase| phrase.to_string())
        .collect()
}

/// Whole-phrase containment check over an already-lowercased haystack
///
/// An occurrence counts only when the characters immediately before and
/// after it are absent or non-alphanumeric.
fn contains_whole_phrase(haystack: &str, phrase: &str) -> bool {
    haystack.match_indices(phrase).any(|(idx, matched)| {
        let before_ok = haystack[..idx]
            .chars()
            .next_back()
            .map_or(true, |c| !c.is_alphanumeric());
        let after_ok = haystack[idx + matched.len()..]
            .chars()
            .next()
            .map_or(true, |c| !c.is_alphanumeric());
        before_ok && after_ok
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extracts_multiple_symptoms() {
        let symptoms = extract_symptoms("Patient complains of fatigue and joint pain.");
        assert_eq!(symptoms, vec!["fatigue", "joint pain"]);
    }

    #[test]
    fn test_case_insensitive() {
        let upper = extract_symptoms("FATIGUE and JOINT PAIN all caps");
        let lower = extract_symptoms("fatigue and joint pain all caps");
        assert_eq!(upper, lower);
        assert_eq!(upper, vec!["fatigue", "joint pain"]);
    }

    #[test]
    fn test_idempotent_on_repeated_mentions() {
        let symptoms = extract_symptoms("Complaining of fatigue, fatigue, and more fatigue.");
        assert_eq!(symptoms, vec!["fatigue"]);
    }

    #[test]
    fn test_whole_phrase_boundaries() {
        // "rash" must not fire inside "brash", "cough" not inside "coughing"
        assert!(extract_symptoms("a brash remark while coughing").is_empty());
        assert_eq!(extract_symptoms("a rash on the forearm"), vec!["rash"]);
    }

    #[test]
    fn test_phrase_adjacent_to_punctuation() {
        let symptoms = extract_symptoms("Shortness of breath noted, also a cough.");
        assert_eq!(symptoms, vec!["shortness of breath", "cough"]);
    }

    #[test]
    fn test_fever_matches_inside_low_grade_fever() {
        let symptoms =
            extract_symptoms("Patient reports fatigue and joint pain and occasional low-grade fever");
        assert_eq!(symptoms, vec!["fatigue", "joint pain", "fever"]);
    }

    #[test]
    fn test_unrecognized_narrative_yields_empty() {
        let symptoms = extract_symptoms("No specific symptoms, patient feels generally fine.");
        assert!(symptoms.is_empty());
    }

    #[test]
    fn test_empty_narrative_yields_empty() {
        assert!(extract_symptoms("").is_empty());
    }
}
