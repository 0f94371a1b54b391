//! Action descriptor similarity
//!
//! Descriptors are free text produced by an LLM ("search_flights(origin=SFO)",
//! "Search flights from SFO"), so comparison is done over normalized word
//! tokens rather than exact strings.

use std::collections::BTreeSet;

/// Lowercase, turn punctuation into spaces, collapse whitespace
pub fn normalize_descriptor(descriptor: &str) -> String {
    descriptor
        .chars()
        .map(|c| if c.is_alphanumeric() { c.to_ascii_lowercase() } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn tokens(descriptor: &str) -> BTreeSet<String> {
    normalize_descriptor(descriptor)
        .split(' ')
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Jaccard similarity of the token sets of two descriptors, in [0, 1]
///
/// Two empty descriptors are considered identical.
pub fn similarity(a: &str, b: &str) -> f64 {
    let ta = tokens(a);
    let tb = tokens(b);
    if ta.is_empty() && tb.is_empty() {
        return 1.0;
    }
    let intersection = ta.intersection(&tb).count();
    let union = ta.union(&tb).count();
    intersection as f64 / union as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_normalize() {
        assert_eq!(normalize_descriptor("Search_Flights(origin=SFO)"), "search flights origin sfo");
        assert_eq!(normalize_descriptor("  a   b  "), "a b");
    }

    #[test]
    fn test_identical_is_one() {
        assert_eq!(similarity("book_flight(SFO)", "book flight sfo"), 1.0);
    }

    #[test]
    fn test_disjoint_is_zero() {
        assert_eq!(similarity("book_flight", "send_email"), 0.0);
    }

    #[test]
    fn test_partial_overlap() {
        // {search, flights, sfo} vs {search, flights, lax} -> 2 / 4
        assert!((similarity("search_flights(SFO)", "search_flights(LAX)") - 0.5).abs() < 1e-9);
    }

    proptest! {
        #[test]
        fn prop_similarity_bounded_and_symmetric(a in ".{0,40}", b in ".{0,40}") {
            let s = similarity(&a, &b);
            prop_assert!((0.0..=1.0).contains(&s));
            prop_assert!((s - similarity(&b, &a)).abs() < 1e-12);
        }
    }
}
