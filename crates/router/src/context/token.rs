//! Token estimation utilities.
//!
//! Character heuristic: ~4 characters per token. Close enough for BPE
//! tokenizers on English text and keeps history trimming deterministic.

use pmos_core::context::TurnDigest;

/// Estimate the token count for a string. Rounds up.
pub fn estimate_tokens(text: &str) -> usize {
    if text.is_empty() {
        return 0;
    }
    text.len().div_ceil(4)
}

/// Tokens for one history entry, including ~4 tokens of role/label overhead
/// per rendered line.
pub fn estimate_digest_tokens(digest: &TurnDigest) -> usize {
    8 + estimate_tokens(&digest.input) + estimate_tokens(&digest.rendering)
}
