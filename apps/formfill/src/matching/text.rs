/// Lowercases, replaces punctuation with spaces and collapses whitespace.
/// Letters outside ASCII (ą, é, ß, ...) are kept as-is.
pub fn normalize_text(text: &str) -> String {
    let cleaned: String = text
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() || c.is_whitespace() { c } else { ' ' })
        .collect();
    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Normalized words longer than two characters.
pub fn significant_words(text: &str) -> Vec<String> {
    normalize_text(text)
        .split(' ')
        .filter(|w| w.chars().count() > 2)
        .map(String::from)
        .collect()
}

/// Whether `term` occurs in `haystack` (both normalized).
/// Terms shorter than four characters must match whole words so "no"
/// does not hit "notice" and "ja" does not hit "java".
pub fn contains_term(haystack: &str, term: &str) -> bool {
    if term.is_empty() {
        return false;
    }
    if term.chars().count() < 4 {
        let padded = format!(" {haystack} ");
        padded.contains(&format!(" {term} "))
    } else {
        haystack.contains(term)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_strips_punctuation_keeps_accents() {
        assert_eq!(normalize_text("  Jaki jest Twój  e-mail? "), "jaki jest twój e mail");
        assert_eq!(normalize_text("Poland (+48)"), "poland 48");
        assert_eq!(normalize_text("Zażółć gęślą jaźń!"), "zażółć gęślą jaźń");
    }

    #[test]
    fn test_significant_words_drops_short_tokens() {
        assert_eq!(
            significant_words("Are you OK to work on-site?"),
            vec!["are", "you", "work", "site"]
        );
    }

    #[test]
    fn test_short_terms_need_whole_words() {
        assert!(contains_term("yes i do", "yes"));
        assert!(!contains_term("notice period", "no"));
        assert!(contains_term("praca zdalna", "zdalna"));
        assert!(contains_term("fully remote work", "remote"));
    }
}
