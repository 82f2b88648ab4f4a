//! Profile-data heuristic match: maps a question to a value in the user's
//! free-form profile without calling the AI.
//!
//! Lookup order:
//! 1. the first concept whose question keywords appear in the question decides
//!    the intent; its profile keys are tried exact-key first, then substring-key
//! 2. any profile key mentioned directly in the question (longest key wins)
//!
//! Consent and notification defaults are a separate, last-resort step
//! (`default_answer`) that the pipeline only applies after the AI tier.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::matching::fuzzy::match_option;
use crate::matching::text::{contains_term, normalize_text};

/// Profile keys shorter than this are never matched by mention or substring.
const MIN_KEY_CHARS: usize = 4;

/// Caller-owned profile: free-form key (any language) to scalar value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProfileData(BTreeMap<String, Value>);

impl ProfileData {
    pub fn is_empty(&self) -> bool {
        self.entries().next().is_none()
    }

    /// Non-empty entries with values rendered to strings.
    pub fn entries(&self) -> impl Iterator<Item = (&str, String)> {
        self.0
            .iter()
            .filter_map(|(k, v)| render(v).map(|s| (k.as_str(), s)))
    }

    /// Whether `answer` equals a profile value, or one contains the other and
    /// the shorter side has at least `min_chars` characters.
    pub fn contains_related(&self, answer: &str, min_chars: usize) -> bool {
        let answer = normalize_text(answer);
        if answer.is_empty() {
            return false;
        }
        self.entries().any(|(_, value)| {
            let value = normalize_text(&value);
            if value.is_empty() {
                return false;
            }
            if value == answer {
                return true;
            }
            let shorter = value.chars().count().min(answer.chars().count());
            shorter >= min_chars && (value.contains(&answer) || answer.contains(&value))
        })
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for ProfileData {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

fn render(value: &Value) -> Option<String> {
    let s = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(true) => "Yes".to_string(),
        Value::Bool(false) => "No".to_string(),
        Value::Array(items) => items
            .iter()
            .filter(|v| !v.is_array() && !v.is_object())
            .filter_map(render)
            .collect::<Vec<_>>()
            .join(", "),
        Value::Null | Value::Object(_) => return None,
    };
    (!s.is_empty()).then_some(s)
}

// ────────────────────────────────────────────────────────────────────────────
// Concept table
// ────────────────────────────────────────────────────────────────────────────

struct ProfileConcept {
    key: &'static str,
    /// Normalized phrases that signal the concept in a question.
    question_terms: &'static [&'static str],
    /// Normalized profile key names that hold the concept's value.
    profile_keys: &'static [&'static str],
}

/// Specific concepts precede the generic ones that share words with them
/// (full name before first name, email before address).
const CONCEPTS: &[ProfileConcept] = &[
    ProfileConcept {
        key: "full_name",
        question_terms: &["full name", "your name", "name and surname", "imię i nazwisko", "vollständiger name", "nom complet", "nombre completo"],
        profile_keys: &["full name", "fullname", "name", "imię i nazwisko"],
    },
    ProfileConcept {
        key: "first_name",
        question_terms: &["first name", "given name", "forename", "imię", "vorname", "prénom", "nombre"],
        profile_keys: &["first name", "firstname", "given name", "imię", "imie", "vorname"],
    },
    ProfileConcept {
        key: "last_name",
        question_terms: &["last name", "surname", "family name", "nazwisko", "nachname", "nom de famille", "apellido"],
        profile_keys: &["last name", "lastname", "surname", "family name", "nazwisko", "nachname"],
    },
    ProfileConcept {
        key: "email",
        question_terms: &["email", "e mail", "mail"],
        profile_keys: &["email", "e mail", "mail", "email address"],
    },
    ProfileConcept {
        key: "phone",
        question_terms: &["phone", "telephone", "mobile", "telefon", "numer telefonu", "tel", "handy", "téléphone", "teléfono"],
        profile_keys: &["phone", "phone number", "telephone", "mobile", "telefon"],
    },
    ProfileConcept {
        key: "linkedin",
        question_terms: &["linkedin"],
        profile_keys: &["linkedin", "linkedin url", "linkedin profile"],
    },
    ProfileConcept {
        key: "github",
        question_terms: &["github"],
        profile_keys: &["github", "github url", "github profile"],
    },
    ProfileConcept {
        key: "portfolio",
        question_terms: &["portfolio", "website", "personal site", "strona www", "strona internetowa"],
        profile_keys: &["portfolio", "website", "portfolio url", "strona www"],
    },
    ProfileConcept {
        key: "postal_code",
        question_terms: &["postal code", "zip", "postcode", "kod pocztowy", "plz", "code postal"],
        profile_keys: &["postal code", "zip", "zip code", "postcode", "kod pocztowy"],
    },
    ProfileConcept {
        key: "address",
        question_terms: &["address", "street", "adres", "ulica", "anschrift", "adresse", "dirección"],
        profile_keys: &["address", "street", "street address", "adres", "ulica"],
    },
    ProfileConcept {
        key: "city",
        question_terms: &["city", "town", "location", "miasto", "miejscowość", "lokalizacja", "stadt", "ville", "ciudad", "where are you based"],
        profile_keys: &["city", "location", "town", "miasto", "lokalizacja"],
    },
    ProfileConcept {
        key: "country",
        question_terms: &["country", "kraj", "pays", "país"],
        profile_keys: &["country", "kraj", "country of residence"],
    },
    ProfileConcept {
        key: "education",
        question_terms: &["education", "degree", "university", "wykształcenie", "uczelnia", "studia", "ausbildung"],
        profile_keys: &["education", "degree", "university", "wykształcenie"],
    },
    ProfileConcept {
        key: "experience",
        question_terms: &["years of experience", "experience in years", "how many years", "lata doświadczenia", "lat doświadczenia", "doświadczenie zawodowe", "berufserfahrung"],
        profile_keys: &["years of experience", "experience", "experience years", "doświadczenie"],
    },
    ProfileConcept {
        key: "current_position",
        question_terms: &["current position", "current role", "current title", "job title", "obecne stanowisko", "aktualne stanowisko"],
        profile_keys: &["current position", "position", "job title", "title", "stanowisko"],
    },
    ProfileConcept {
        key: "current_company",
        question_terms: &["current company", "current employer", "obecny pracodawca", "aktualny pracodawca"],
        profile_keys: &["current company", "company", "employer", "firma", "pracodawca"],
    },
    ProfileConcept {
        key: "salary",
        question_terms: &["salary", "compensation", "pay", "wynagrodzenie", "oczekiwania finansowe", "gehalt", "salaire", "salario"],
        profile_keys: &["salary", "expected salary", "salary expectations", "wynagrodzenie"],
    },
    ProfileConcept {
        key: "notice_period",
        question_terms: &["notice period", "availability", "available from", "start date", "when can you start", "okres wypowiedzenia", "dostępność", "kiedy możesz zacząć", "kündigungsfrist", "préavis"],
        profile_keys: &["notice period", "availability", "start date", "okres wypowiedzenia", "dostępność"],
    },
    ProfileConcept {
        key: "languages",
        question_terms: &["language", "languages", "english level", "język", "języki", "sprache", "langue", "idioma"],
        profile_keys: &["languages", "language", "english", "english level", "języki"],
    },
];

const NOTIFICATION_TERMS: &[&str] = &[
    "newsletter",
    "notifications",
    "marketing",
    "job alerts",
    "future recruitment",
    "powiadomienia",
    "informacje handlowe",
    "przyszłych rekrutacji",
];

const CONSENT_TERMS: &[&str] = &[
    "consent",
    "i agree",
    "agree to",
    "privacy policy",
    "personal data",
    "gdpr",
    "rodo",
    "zgoda",
    "zgodę",
    "przetwarzanie danych",
    "terms and conditions",
    "regulamin",
    "datenschutz",
    "einwilligung",
];

/// Looks `question` up in `profile`. When `options` is non-empty the value must
/// match one of them through the fuzzy matcher.
pub fn match_profile(question: &str, profile: &ProfileData, options: Option<&[String]>) -> Option<String> {
    let normalized = normalize_text(question);
    if normalized.is_empty() || profile.is_empty() {
        return None;
    }

    let value = concept_lookup(&normalized, profile).or_else(|| mentioned_key(&normalized, profile))?;
    fit_options(value, options)
}

/// Consent questions default to "Yes", marketing and notification opt-ins to "No".
pub fn default_answer(question: &str, options: Option<&[String]>) -> Option<String> {
    let normalized = normalize_text(question);
    let answer = if NOTIFICATION_TERMS.iter().any(|t| contains_term(&normalized, t)) {
        "No"
    } else if CONSENT_TERMS.iter().any(|t| contains_term(&normalized, t)) {
        "Yes"
    } else {
        return None;
    };
    debug!(question, answer, "Applied default answer");
    fit_options(answer.to_string(), options)
}

fn fit_options(value: String, options: Option<&[String]>) -> Option<String> {
    match options {
        Some(options) if !options.is_empty() => match_option(&value, options),
        _ => Some(value),
    }
}

fn concept_lookup(question: &str, profile: &ProfileData) -> Option<String> {
    let concept = CONCEPTS
        .iter()
        .find(|c| c.question_terms.iter().any(|t| contains_term(question, t)))?;

    let entries: Vec<(String, String)> = profile
        .entries()
        .map(|(k, v)| (compact(&normalize_text(k)), v))
        .collect();
    let keys: Vec<String> = concept.profile_keys.iter().map(|k| compact(k)).collect();

    let exact = keys
        .iter()
        .find_map(|key| entries.iter().find(|(k, _)| k == key));
    if let Some((_, value)) = exact {
        debug!(concept = concept.key, "Profile concept matched on key");
        return Some(value.clone());
    }

    // "name" would otherwise substring-match "first name" alone.
    if concept.key == "full_name" {
        if let Some(name) = composed_full_name(profile) {
            return Some(name);
        }
    }

    let partial = keys
        .iter()
        .filter(|key| key.chars().count() >= MIN_KEY_CHARS)
        .find_map(|key| entries.iter().find(|(k, _)| k.contains(key.as_str())));
    partial.map(|(_, value)| {
        debug!(concept = concept.key, "Profile concept matched on partial key");
        value.clone()
    })
}

/// "First Last" when the profile only stores the parts.
fn composed_full_name(profile: &ProfileData) -> Option<String> {
    let first = concept_lookup("first name", profile)?;
    let last = concept_lookup("last name", profile)?;
    Some(format!("{first} {last}"))
}

fn mentioned_key(question: &str, profile: &ProfileData) -> Option<String> {
    profile
        .entries()
        .map(|(k, v)| (normalize_text(k), v))
        .filter(|(k, _)| k.chars().count() >= MIN_KEY_CHARS && contains_term(question, k))
        .max_by_key(|(k, _)| k.chars().count())
        .map(|(_, v)| v)
}

fn compact(s: &str) -> String {
    s.chars().filter(|c| !c.is_whitespace()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn profile() -> ProfileData {
        [
            ("firstName", json!("Anna")),
            ("last_name", json!("Nowak")),
            ("Email", json!("anna@example.com")),
            ("phone number", json!("+48 600 100 200")),
            ("miasto", json!("Kraków")),
            ("country", json!("Poland")),
            ("linkedinUrl", json!("https://linkedin.com/in/anna")),
            ("years_of_experience", json!(6)),
            ("willing_to_relocate", json!(false)),
            ("github_profile_link", json!("https://github.com/anna")),
            ("Preferred work mode", json!("Remote")),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn test_concept_exact_key() {
        let p = profile();
        assert_eq!(match_profile("First name", &p, None).as_deref(), Some("Anna"));
        assert_eq!(match_profile("Nazwisko", &p, None).as_deref(), Some("Nowak"));
        assert_eq!(match_profile("E-mail address", &p, None).as_deref(), Some("anna@example.com"));
        assert_eq!(match_profile("Miejscowość", &p, None).as_deref(), Some("Kraków"));
    }

    #[test]
    fn test_concept_substring_key() {
        let p = profile();
        assert_eq!(
            match_profile("LinkedIn profile", &p, None).as_deref(),
            Some("https://linkedin.com/in/anna")
        );
        assert_eq!(match_profile("Mobile", &p, None).as_deref(), Some("+48 600 100 200"));
        assert_eq!(
            match_profile("GitHub", &p, None).as_deref(),
            Some("https://github.com/anna")
        );
    }

    #[test]
    fn test_numbers_and_booleans_render_as_strings() {
        let p = profile();
        assert_eq!(match_profile("How many years of experience do you have?", &p, None).as_deref(), Some("6"));
        assert_eq!(match_profile("Willing to relocate?", &p, None).as_deref(), Some("No"));
    }

    #[test]
    fn test_full_name_is_composed_from_parts() {
        let p = profile();
        assert_eq!(match_profile("Imię i nazwisko", &p, None).as_deref(), Some("Anna Nowak"));
    }

    #[test]
    fn test_direct_key_mention() {
        let p = profile();
        assert_eq!(
            match_profile("What is your preferred work mode?", &p, None).as_deref(),
            Some("Remote")
        );
    }

    #[test]
    fn test_value_goes_through_option_matcher() {
        let p = profile();
        let options = vec!["Germany (+49)".to_string(), "Polska (+48)".to_string()];
        assert_eq!(
            match_profile("Country of residence", &p, Some(&options)).as_deref(),
            Some("Polska (+48)")
        );
        let unrelated = vec!["Red".to_string(), "Blue".to_string()];
        assert_eq!(match_profile("Country", &p, Some(&unrelated)), None);
    }

    #[test]
    fn test_unknown_question_or_empty_profile() {
        assert_eq!(match_profile("Favourite colour?", &profile(), None), None);
        assert_eq!(match_profile("First name", &ProfileData::default(), None), None);
    }

    #[test]
    fn test_default_answers() {
        assert_eq!(
            default_answer("I consent to the processing of my personal data", None).as_deref(),
            Some("Yes")
        );
        assert_eq!(
            default_answer("Subscribe to our newsletter and marketing", None).as_deref(),
            Some("No")
        );
        let options = vec!["Tak".to_string(), "Nie".to_string()];
        assert_eq!(
            default_answer("Wyrażam zgodę na przetwarzanie danych", Some(&options)).as_deref(),
            Some("Tak")
        );
        assert_eq!(default_answer("Expected salary", None), None);
    }

    #[test]
    fn test_contains_related() {
        let p = profile();
        assert!(p.contains_related("anna@example.com", 3));
        assert!(p.contains_related("Kraków, Poland", 3));
        assert!(!p.contains_related("Berlin", 3));
        assert!(!p.contains_related("", 3));
    }
}
