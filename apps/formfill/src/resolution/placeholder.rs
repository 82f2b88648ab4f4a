//! Detection of placeholder text: dropdown prompts like "-- Select --" and
//! non-answers like "[Your name]" or "I don't know" coming back from the AI tier.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::matching::text::normalize_text;

/// Normalized option labels that only prompt for a choice.
const PLACEHOLDER_LABELS: &[&str] = &[
    "select",
    "select one",
    "select an option",
    "select option",
    "please select",
    "please choose",
    "choose",
    "choose one",
    "choose an option",
    "wybierz",
    "wybierz opcję",
    "wybierz z listy",
    "proszę wybrać",
    "auswählen",
    "bitte wählen",
    "sélectionner",
    "choisir",
    "seleccionar",
    "none selected",
];

/// Normalized answers that mean "no answer".
const NON_ANSWERS: &[&str] = &[
    "n a",
    "na",
    "null",
    "undefined",
    "unknown",
    "not provided",
    "not specified",
    "not available",
    "no information",
    "no data",
    "i don t know",
    "i do not know",
    "not sure",
    "cannot determine",
    "brak",
    "brak danych",
    "nie wiem",
    "nie dotyczy",
];

static BRACKETED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*[\[<{].*[\]>}]\s*$").expect("bracket regex is valid"));

/// Whether an option label is a prompt rather than a real choice.
pub fn is_placeholder_label(label: &str) -> bool {
    let normalized = normalize_text(label);
    if normalized.is_empty() {
        return true;
    }
    PLACEHOLDER_LABELS.contains(&normalized.as_str())
        || PLACEHOLDER_LABELS
            .iter()
            .any(|p| normalized.starts_with(p) && label.contains("..."))
}

/// Whether a resolved answer is empty or placeholder-shaped and must not be written.
pub fn is_placeholder_answer(answer: &str) -> bool {
    let trimmed = answer.trim();
    if trimmed.is_empty() || BRACKETED.is_match(trimmed) {
        return true;
    }
    let normalized = normalize_text(trimmed);
    normalized.is_empty()
        || NON_ANSWERS.contains(&normalized.as_str())
        || is_placeholder_label(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholder_labels() {
        assert!(is_placeholder_label("-- Select --"));
        assert!(is_placeholder_label("Please select..."));
        assert!(is_placeholder_label("Wybierz"));
        assert!(is_placeholder_label("   "));
        assert!(is_placeholder_label("Select country..."));
        assert!(!is_placeholder_label("Poland"));
        assert!(!is_placeholder_label("Selected works"));
    }

    #[test]
    fn test_placeholder_answers() {
        assert!(is_placeholder_answer(""));
        assert!(is_placeholder_answer("[Your name]"));
        assert!(is_placeholder_answer("<email>"));
        assert!(is_placeholder_answer("I don't know"));
        assert!(is_placeholder_answer("N/A"));
        assert!(is_placeholder_answer("Nie wiem"));
        assert!(!is_placeholder_answer("Jan Kowalski"));
        assert!(!is_placeholder_answer("No"));
        assert!(!is_placeholder_answer("5"));
    }
}
