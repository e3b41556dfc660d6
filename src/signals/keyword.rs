//! Embedded keyword heuristic signal.
//!
//! Always-available fallback scorer: a small crisis lexicon with integer
//! severities, near-token negation inversion, and a normalized [0,1] output.
//! Runs in microseconds, so it survives any timeout budget.

use std::future::Future;
use std::pin::Pin;

use super::{Signal, SignalScore};

/// Severity cap for normalization: a raw sum at or above this maps to 1.0.
const SEVERITY_CAP: i32 = 6;

/// Lexicon severity for a token (0 if not a crisis term).
#[inline]
fn term_severity(w: &str) -> i32 {
    match w {
        "suicide" | "suicidal" | "overdose" => 3,
        "die" | "dying" | "dead" | "pills" | "knife" => 2,
        "hopeless" | "worthless" | "trapped" | "unbearable" | "goodbye" => 2,
        "hurt" | "pain" | "alone" | "scared" | "crying" | "help" => 1,
        _ => 0,
    }
}

/// Simple negator set; tokenization splits "no longer" so "no" covers it.
fn is_negator(tok: &str) -> bool {
    matches!(
        tok,
        "not"
            | "no"
            | "never"
            | "isn't"
            | "wasn't"
            | "aren't"
            | "won't"
            | "don't"
            | "can't"
            | "cannot"
            | "without"
    )
}

/// Alphanumeric tokens, lower-cased.
fn tokenize(s: &str) -> impl Iterator<Item = String> + '_ {
    s.split(|c: char| !c.is_alphanumeric() && c != '\'')
        .filter(|t| !t.is_empty())
        .map(|t| t.to_ascii_lowercase())
}

/// Keyword fallback scorer. Stateless and cheap to share.
#[derive(Debug, Clone, Default)]
pub struct KeywordSignal;

impl KeywordSignal {
    pub fn new() -> Self {
        Self
    }

    /// Returns (raw severity sum, crisis-term hits, negated crisis-term hits).
    fn score_tokens(&self, text: &str) -> (i32, usize, usize) {
        let tokens: Vec<String> = tokenize(text).collect();
        let mut raw = 0i32;
        let mut hits = 0usize;
        let mut negated_hits = 0usize;

        for i in 0..tokens.len() {
            let sev = term_severity(tokens[i].as_str());
            if sev == 0 {
                continue;
            }
            hits += 1;

            // Negator within the previous 1..=3 tokens suppresses the term.
            let negated = (1..=3).any(|k| i >= k && is_negator(tokens[i - k].as_str()));
            if negated {
                negated_hits += 1;
            } else {
                raw += sev;
            }
        }

        (raw, hits, negated_hits)
    }
}

impl Signal for KeywordSignal {
    fn evaluate<'a>(
        &'a self,
        text: &'a str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<SignalScore>> + Send + 'a>> {
        Box::pin(async move {
            let (raw, hits, negated_hits) = self.score_tokens(text);

            let score = (raw as f64 / SEVERITY_CAP as f64).clamp(0.0, 1.0);
            // Confidence grows with corroborating hits; floor keeps a lone
            // strong term from looking authoritative.
            let confidence = if hits == 0 {
                0.3
            } else {
                (0.4 + 0.15 * hits as f64).min(0.9)
            };

            Ok(SignalScore {
                score,
                confidence,
                method: "keyword_fallback",
                flip_candidate: negated_hits > 0,
            })
        })
    }

    fn name(&self) -> &'static str {
        "keyword"
    }
}
