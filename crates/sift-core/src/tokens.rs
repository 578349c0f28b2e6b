//! Token estimation heuristics.
//!
//! Both estimators are approximations of the generation model's tokenizer.
//! They round up so that sizing and budget decisions err towards
//! overestimating, never underestimating.

/// Approximate characters per token.
pub const CHARS_PER_TOKEN: usize = 4;

/// Approximate tokens per whitespace-separated word, expressed as a ratio
/// of `TOKENS_PER_WORD_NUM / TOKENS_PER_WORD_DEN` (1.3).
const TOKENS_PER_WORD_NUM: usize = 13;
const TOKENS_PER_WORD_DEN: usize = 10;

/// Character-ratio estimate (~4 characters per token).
///
/// Cheap enough for every chunk-sizing decision. Monotonic in the number of
/// characters.
#[must_use]
pub fn estimate_tokens(text: &str) -> usize {
    tokens_for_chars(text.chars().count())
}

/// Token estimate for a known character count.
#[must_use]
pub fn tokens_for_chars(chars: usize) -> usize {
    chars.div_ceil(CHARS_PER_TOKEN)
}

/// Word-ratio estimate (~1.3 tokens per word), used for cost accounting.
///
/// Takes the larger of the word-based and character-based figures so that
/// text with long words or little whitespace is not underestimated.
#[must_use]
pub fn estimate_tokens_by_words(text: &str) -> usize {
    let words = text.split_whitespace().count();
    let by_words = (words * TOKENS_PER_WORD_NUM).div_ceil(TOKENS_PER_WORD_DEN);
    by_words.max(estimate_tokens(text))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_text_is_zero_tokens() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens_by_words(""), 0);
    }

    #[test]
    fn character_estimate_rounds_up() {
        assert_eq!(estimate_tokens("a"), 1);
        assert_eq!(estimate_tokens("abcd"), 1);
        assert_eq!(estimate_tokens("abcde"), 2);
    }

    #[test]
    fn counts_chars_not_bytes() {
        // Four two-byte characters.
        assert_eq!(estimate_tokens("éééé"), 1);
    }

    #[test]
    fn word_estimate_uses_ratio() {
        // 10 words × 1.3 = 13 tokens; 10 × "a " is 20 chars = 5 tokens.
        let text = "a ".repeat(10);
        assert_eq!(estimate_tokens_by_words(&text), 13);
    }

    #[test]
    fn word_estimate_never_below_char_estimate() {
        let text = "supercalifragilisticexpialidocious";
        assert!(estimate_tokens_by_words(text) >= estimate_tokens(text));
    }

    #[test]
    fn estimators_are_monotonic() {
        let mut text = String::new();
        let mut last_chars = 0;
        let mut last_words = 0;
        for word in ["alpha", "beta", "gamma", "delta", "epsilon", "zeta"] {
            text.push_str(word);
            text.push(' ');
            let chars = estimate_tokens(&text);
            let words = estimate_tokens_by_words(&text);
            assert!(chars >= last_chars);
            assert!(words >= last_words);
            last_chars = chars;
            last_words = words;
        }
    }
}
