use std::collections::HashSet;

use sha2::{Digest, Sha256};

use crate::matching::text::{normalize_text, significant_words};

/// Number of digest bytes kept in a question hash.
const HASH_BYTES: usize = 8;

/// Canonical form of a question: lowercase, punctuation stripped,
/// accented letters kept, whitespace collapsed.
pub fn normalize_question(text: &str) -> String {
    normalize_text(text)
}

/// Stable hash of an already-normalized question.
pub fn question_hash(normalized: &str) -> String {
    let digest = Sha256::digest(normalized.as_bytes());
    hex::encode(&digest[..HASH_BYTES])
}

pub fn word_set(text: &str) -> HashSet<String> {
    significant_words(text).into_iter().collect()
}

/// Jaccard similarity of two word sets. Two empty sets score 0.
pub fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(b).count() as f64 / union as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_is_stable_across_formatting() {
        let a = question_hash(&normalize_question("What is your expected salary?"));
        let b = question_hash(&normalize_question("  what is your EXPECTED salary "));
        assert_eq!(a, b);
        assert_eq!(a.len(), HASH_BYTES * 2);
    }

    #[test]
    fn test_hash_differs_for_different_questions() {
        let a = question_hash(&normalize_question("Expected salary"));
        let b = question_hash(&normalize_question("Current salary"));
        assert_ne!(a, b);
    }

    #[test]
    fn test_jaccard() {
        let a = word_set("expected monthly salary gross");
        let b = word_set("expected salary gross");
        assert!((jaccard(&a, &b) - 0.75).abs() < f64::EPSILON);
        assert_eq!(jaccard(&HashSet::new(), &HashSet::new()), 0.0);
    }
}
