//! Lightweight lexical context signals.
//!
//! Pure function of the message text plus small fixed keyword/negation
//! tables. No I/O, no rule store, no failure mode: a message without any
//! indicators yields zero counts.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

/// Negation constructions checked against the lower-cased message.
static NEGATION_RES: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"\b(?:not|never|no longer)\s+(?:going to|gonna|planning)\b",
        r"\bdon'?t\s+(?:want|plan|intend)\b",
        r"\bwould\s+never\b",
        r"\b(?:not|never)\s+(?:really|actually|seriously)\b",
        r"\bused\s+to\s+(?:feel|think|want)\b",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("negation regex"))
    .collect()
});

/// Substring-counted keyword tables. Matching is deliberately substring-based
/// rather than word-boundary-exact; indicator counts feed soft score boosts,
/// not hard triggers.
const ISOLATION_KEYWORDS: &[&str] = &[
    "alone",
    "lonely",
    "nobody",
    "no one cares",
    "no friends",
    "isolated",
    "abandoned",
    "by myself",
];

const HOPELESSNESS_KEYWORDS: &[&str] = &[
    "hopeless",
    "pointless",
    "worthless",
    "no way out",
    "give up",
    "giving up",
    "can't go on",
    "no future",
    "nothing matters",
];

const TEMPORAL_KEYWORDS: &[&str] = &[
    "today",
    "tonight",
    "now",
    "right now",
    "urgent",
    "immediately",
    "soon",
    "this time",
];

/// Per-message lexical signals derived without any external state.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ContextSignals {
    pub message_length: usize,
    pub word_count: usize,
    pub has_question_mark: bool,
    pub has_exclamation: bool,
    pub negation_detected: bool,
    pub isolation_indicator_count: usize,
    pub hopelessness_indicator_count: usize,
    pub temporal_indicators: Vec<String>,
}

/// Extract context signals from the raw message. Deterministic, no I/O.
pub fn extract(message: &str) -> ContextSignals {
    let lower = message.to_lowercase();

    let negation_detected = NEGATION_RES.iter().any(|re| re.is_match(&lower));

    let isolation_indicator_count = count_occurrences(&lower, ISOLATION_KEYWORDS);
    let hopelessness_indicator_count = count_occurrences(&lower, HOPELESSNESS_KEYWORDS);

    // Temporal indicators keep identity (which ones fired), not just a count.
    let mut temporal_indicators = Vec::new();
    for kw in TEMPORAL_KEYWORDS {
        if lower.contains(kw) {
            temporal_indicators.push((*kw).to_string());
        }
    }
    // "right now" also matches "now"; dedupe the substring shadow.
    if temporal_indicators.iter().any(|t| t == "right now") {
        temporal_indicators.retain(|t| t != "now");
    }

    ContextSignals {
        message_length: message.chars().count(),
        word_count: lower.split_whitespace().filter(|w| !w.is_empty()).count(),
        has_question_mark: message.contains('?'),
        has_exclamation: message.contains('!'),
        negation_detected,
        isolation_indicator_count,
        hopelessness_indicator_count,
        temporal_indicators,
    }
}

/// Total occurrence count across a keyword table (overlap-free per keyword).
fn count_occurrences(lower: &str, table: &[&str]) -> usize {
    table.iter().map(|kw| lower.matches(kw).count()).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn neutral_message_has_zero_indicators() {
        let c = extract("What's the weather like?");
        assert_eq!(c.isolation_indicator_count, 0);
        assert_eq!(c.hopelessness_indicator_count, 0);
        assert!(c.temporal_indicators.is_empty());
        assert!(!c.negation_detected);
        assert!(c.has_question_mark);
        assert_eq!(c.word_count, 4);
    }

    #[test]
    fn counts_isolation_and_hopelessness() {
        let c = extract("I feel so alone and hopeless, nobody would notice");
        assert!(c.isolation_indicator_count >= 2); // alone + nobody
        assert_eq!(c.hopelessness_indicator_count, 1);
    }

    #[test]
    fn temporal_vocabulary_keeps_identity() {
        let c = extract("I need help RIGHT NOW, tonight");
        assert!(c.temporal_indicators.contains(&"right now".to_string()));
        assert!(c.temporal_indicators.contains(&"tonight".to_string()));
        // "now" is shadowed by "right now".
        assert!(!c.temporal_indicators.contains(&"now".to_string()));
    }

    #[test]
    fn negation_patterns_fire_case_insensitively() {
        assert!(extract("I'm NOT going to hurt myself").negation_detected);
        assert!(extract("I would never do that").negation_detected);
        assert!(extract("I used to feel hopeless").negation_detected);
        assert!(!extract("I am going to do it").negation_detected);
    }

    #[test]
    fn empty_message_is_all_zero() {
        let c = extract("");
        assert_eq!(c, ContextSignals::default());
    }
}
