//! Fuzzy Option Matcher: picks the option a free-text answer refers to.
//!
//! Four passes, each short-circuiting on a hit:
//! 1. exact (case-sensitive, then case-insensitive, then via country localization)
//! 2. substring containment on normalized text, shortest option wins
//! 3. word-overlap score on words longer than two characters
//! 4. semantic concept dictionary (work mode, contract type, yes/no, countries)
//!
//! `None` means "do not write anything": the caller leaves the field empty.

use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use crate::matching::dictionary::{canonical_country, concepts_in};
use crate::matching::text::{normalize_text, significant_words};

/// Minimum length (chars) of the contained string in the substring pass.
const MIN_SUBSTRING_CHARS: usize = 4;

/// Minimum length of a calling-code fragment such as "+48".
const MIN_CALLING_CODE_CHARS: usize = 3;

static CALLING_CODE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\+\d{1,4}$").expect("calling code regex is valid"));

/// Returns the option `answer` refers to, or `None` when no pass finds one.
pub fn match_option<S: AsRef<str>>(answer: &str, options: &[S]) -> Option<String> {
    if options.is_empty() {
        return None;
    }
    let options: Vec<&str> = options.iter().map(|o| o.as_ref()).collect();

    if let Some(i) = exact_pass(answer, &options) {
        return Some(options[i].to_string());
    }
    if answer.trim().is_empty() {
        return None;
    }

    let candidates = answer_candidates(answer);

    let hit = substring_pass(&candidates, &options)
        .map(|i| (i, "substring"))
        .or_else(|| word_overlap_pass(&candidates, &options).map(|i| (i, "word_overlap")))
        .or_else(|| semantic_pass(answer, &options).map(|i| (i, "semantic")));

    match hit {
        Some((i, pass)) => {
            debug!(answer, option = options[i], pass, "Option matched");
            Some(options[i].to_string())
        }
        None => {
            debug!(answer, option_count = options.len(), "No option matched");
            None
        }
    }
}

/// Multi-select matching: each comma/semicolon-separated part of `answer` is
/// matched on its own; distinct hits come back in option order. An answer that
/// does not split into any hit is tried whole.
pub fn match_many<S: AsRef<str>>(answer: &str, options: &[S]) -> Vec<String> {
    let mut picked: Vec<String> = Vec::new();
    for part in answer.split([',', ';']).map(str::trim).filter(|p| !p.is_empty()) {
        if let Some(option) = match_option(part, options) {
            if !picked.contains(&option) {
                picked.push(option);
            }
        }
    }
    if picked.is_empty() {
        picked.extend(match_option(answer, options));
    }
    picked.sort_by_key(|p| options.iter().position(|o| o.as_ref() == p));
    picked
}

/// Fits `answer` to `options`: one option, or for multi-select the matched
/// options joined with ", ". `None` when nothing fits.
pub fn fit_answer<S: AsRef<str>>(answer: &str, options: &[S], multiple: bool) -> Option<String> {
    if !multiple {
        return match_option(answer, options);
    }
    let picked = match_many(answer, options);
    (!picked.is_empty()).then(|| picked.join(", "))
}

/// The raw answer plus its canonical country translation, when one exists.
fn answer_candidates(answer: &str) -> Vec<String> {
    let mut candidates = vec![answer.trim().to_string()];
    if let Some(canonical) = canonical_country(answer) {
        if !canonical.eq_ignore_ascii_case(answer.trim()) {
            candidates.push(canonical.to_string());
        }
    }
    candidates
}

// ────────────────────────────────────────────────────────────────────────────
// Pass 1: exact
// ────────────────────────────────────────────────────────────────────────────

fn exact_pass(answer: &str, options: &[&str]) -> Option<usize> {
    if let Some(i) = options.iter().position(|o| *o == answer) {
        return Some(i);
    }

    let trimmed = answer.trim();
    if trimmed.is_empty() {
        return None;
    }
    let lower = trimmed.to_lowercase();
    if let Some(i) = options.iter().position(|o| o.trim().to_lowercase() == lower) {
        return Some(i);
    }

    // "Polska" vs "Poland", in either direction.
    let canonical = canonical_country(trimmed)?;
    options
        .iter()
        .position(|o| canonical_country(o) == Some(canonical))
}

// ────────────────────────────────────────────────────────────────────────────
// Pass 2: substring
// ────────────────────────────────────────────────────────────────────────────

fn substring_pass(candidates: &[String], options: &[&str]) -> Option<usize> {
    candidates.iter().find_map(|candidate| {
        if is_calling_code(candidate) {
            return shortest(options, |o| contains_calling_code(o, candidate));
        }

        let needle = normalize_text(candidate);
        shortest(options, |o| {
            let hay = normalize_text(o);
            if hay.is_empty() || needle.is_empty() {
                return false;
            }
            let contained_len = hay.chars().count().min(needle.chars().count());
            contained_len >= MIN_SUBSTRING_CHARS && (hay.contains(&needle) || needle.contains(&hay))
        })
    })
}

fn is_calling_code(text: &str) -> bool {
    text.chars().count() >= MIN_CALLING_CODE_CHARS && CALLING_CODE.is_match(text)
}

/// "+48" must be followed by a non-digit so it does not hit "+480".
fn contains_calling_code(option: &str, code: &str) -> bool {
    option.match_indices(code).any(|(start, _)| {
        option[start + code.len()..]
            .chars()
            .next()
            .map_or(true, |c| !c.is_ascii_digit())
    })
}

/// Index of the shortest option satisfying `pred`; ties keep list order.
fn shortest(options: &[&str], pred: impl Fn(&str) -> bool) -> Option<usize> {
    options
        .iter()
        .enumerate()
        .filter(|(_, o)| pred(**o))
        .min_by_key(|(i, o)| (o.chars().count(), *i))
        .map(|(i, _)| i)
}

// ────────────────────────────────────────────────────────────────────────────
// Pass 3: word overlap
// ────────────────────────────────────────────────────────────────────────────

fn word_overlap_pass(candidates: &[String], options: &[&str]) -> Option<usize> {
    candidates.iter().find_map(|candidate| {
        let answer_words: HashSet<String> = significant_words(candidate).into_iter().collect();
        if answer_words.is_empty() {
            return None;
        }

        let mut best: Option<(usize, usize)> = None;
        for (i, option) in options.iter().enumerate() {
            let option_words: HashSet<String> = significant_words(option).into_iter().collect();
            let score = answer_words.intersection(&option_words).count();
            if score > 0 && best.map_or(true, |(_, s)| score > s) {
                best = Some((i, score));
            }
        }
        best.map(|(i, _)| i)
    })
}

// ────────────────────────────────────────────────────────────────────────────
// Pass 4: semantic dictionary
// ────────────────────────────────────────────────────────────────────────────

fn semantic_pass(answer: &str, options: &[&str]) -> Option<usize> {
    let answer_concepts = concepts_in(answer);
    if answer_concepts.is_empty() {
        return None;
    }
    options.iter().position(|option| {
        concepts_in(option)
            .iter()
            .any(|key| answer_concepts.contains(key))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opts(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_every_option_matches_itself() {
        let options = opts(&["Yes", "yes", " No ", "Remote work", "Poland (+48)", "+48"]);
        for s in &options {
            assert_eq!(match_option(s, &options).as_deref(), Some(s.as_str()));
        }
    }

    #[test]
    fn test_calling_code_fragment() {
        let options = opts(&["Poland (+48)", "Germany (+49)"]);
        assert_eq!(match_option("+48", &options).as_deref(), Some("Poland (+48)"));
    }

    #[test]
    fn test_calling_code_needs_digit_boundary() {
        let options = opts(&["Somewhere (+480)", "Poland (+48)"]);
        assert_eq!(match_option("+48", &options).as_deref(), Some("Poland (+48)"));
    }

    #[test]
    fn test_localized_country_name() {
        let options = opts(&["France (+33)", "Poland (+48)"]);
        assert_eq!(match_option("Polska", &options).as_deref(), Some("Poland (+48)"));
    }

    #[test]
    fn test_localized_option_exact() {
        let options = opts(&["Niemcy", "Polska"]);
        assert_eq!(match_option("Poland", &options).as_deref(), Some("Polska"));
    }

    #[test]
    fn test_substring_prefers_shortest_option() {
        let options = opts(&["Remote work", "I want to work here because of growth"]);
        assert_eq!(match_option("work", &options).as_deref(), Some("Remote work"));
    }

    #[test]
    fn test_short_fragments_do_not_substring_match() {
        let options = opts(&["Dutch", "Swedish"]);
        assert_eq!(match_option("sw", &options), None);
    }

    #[test]
    fn test_option_contained_in_answer() {
        let options = opts(&["Bachelor", "Master", "PhD"]);
        assert_eq!(
            match_option("Master of Science in Computer Science", &options).as_deref(),
            Some("Master")
        );
    }

    #[test]
    fn test_word_overlap_picks_highest_score() {
        let options = opts(&[
            "Less than one year of experience",
            "Between three and five years of professional experience",
        ]);
        assert_eq!(
            match_option("five years professional experience", &options).as_deref(),
            Some("Between three and five years of professional experience")
        );
    }

    #[test]
    fn test_word_overlap_tie_keeps_first() {
        let options = opts(&["Senior backend engineer", "Senior frontend engineer"]);
        assert_eq!(
            match_option("engineer senior", &options).as_deref(),
            Some("Senior backend engineer")
        );
    }

    #[test]
    fn test_semantic_work_mode() {
        let options = opts(&["Stacjonarnie", "Hybrydowo", "Zdalnie"]);
        assert_eq!(match_option("Remote", &options).as_deref(), Some("Zdalnie"));
    }

    #[test]
    fn test_semantic_yes_no_across_locales() {
        let options = opts(&["Tak", "Nie"]);
        assert_eq!(match_option("Yes", &options).as_deref(), Some("Tak"));
        assert_eq!(match_option("No", &options).as_deref(), Some("Nie"));
    }

    #[test]
    fn test_empty_options_or_answer() {
        let empty: Vec<String> = vec![];
        assert_eq!(match_option("anything", &empty), None);
        assert_eq!(match_option("   ", &opts(&["A", "B"])), None);
    }

    #[test]
    fn test_no_pass_matches() {
        let options = opts(&["Red", "Green"]);
        assert_eq!(match_option("Quantum chromodynamics", &options), None);
    }

    #[test]
    fn test_match_many_splits_parts() {
        let options = opts(&["English", "German", "Polish"]);
        assert_eq!(match_many("Polish; english", &options), opts(&["English", "Polish"]));
        assert_eq!(match_many("Polish, Polish", &options), opts(&["Polish"]));
        assert!(match_many("Klingon", &options).is_empty());
    }

    #[test]
    fn test_fit_answer_joins_multiple() {
        let options = opts(&["English", "German", "Polish"]);
        assert_eq!(
            fit_answer("English, Polish", &options, true).as_deref(),
            Some("English, Polish")
        );
        assert_eq!(fit_answer("German", &options, false).as_deref(), Some("German"));
        assert_eq!(fit_answer("Klingon", &options, true), None);
    }
}
