//! crates/interview_core/src/similarity.rs
//!
//! Pure text-similarity and fingerprinting used for question-bank
//! admission control. No side effects, deterministic, symmetric.

use sha2::{Digest, Sha256};
use std::collections::HashSet;

/// Tokens removed before comparing question texts. Kept small on purpose:
/// the goal is to stop filler words from inflating similarity, not to do
/// real NLP.
const STOP_WORDS: &[&str] = &[
    "a", "an", "the", "is", "are", "was", "were", "be", "been", "do", "does", "did", "can",
    "could", "would", "should", "will", "of", "in", "on", "at", "to", "for", "with", "and",
    "or", "but", "about", "what", "when", "where", "which", "who", "how", "why", "you",
    "your", "please", "describe", "explain", "tell", "me", "us", "it", "its", "this",
    "that", "these", "those",
];

/// Lowercases, strips punctuation, splits on whitespace, and drops stop
/// words. Shared by the similarity score and the dedup fingerprint so both
/// see the same notion of "content".
fn content_tokens(text: &str) -> Vec<String> {
    text.to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .filter(|t| !STOP_WORDS.contains(t))
        .map(|t| t.to_string())
        .collect()
}

/// Jaccard index of the two texts' content-token sets, in `[0, 1]`.
/// Returns `0.0` when both token sets are empty after stop-word removal.
pub fn similarity(a: &str, b: &str) -> f64 {
    let set_a: HashSet<String> = content_tokens(a).into_iter().collect();
    let set_b: HashSet<String> = content_tokens(b).into_iter().collect();
    if set_a.is_empty() && set_b.is_empty() {
        return 0.0;
    }
    let intersection = set_a.intersection(&set_b).count();
    let union = set_a.union(&set_b).count();
    intersection as f64 / union as f64
}

/// Content hash over the normalized token sequence. Two questions that
/// differ only in case, punctuation, or filler words collide here, which is
/// exactly what the bank's uniqueness invariant wants.
pub fn dedup_fingerprint(text: &str) -> String {
    let normalized = content_tokens(text).join(" ");
    let digest = Sha256::digest(normalized.as_bytes());
    format!("{:x}", digest)
}
