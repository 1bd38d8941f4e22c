//! Text tokenization for the lexical index

use lazy_static::lazy_static;
use regex::Regex;

/// Lowercase a text and split it into alphanumeric terms.
///
/// Apostrophes inside words are kept (`agent's` is one term); every other
/// punctuation character separates terms.
pub fn tokenize(text: &str) -> Vec<String> {
    lazy_static! {
        static ref TOKEN_REGEX: Regex = Regex::new(r"[\p{L}\p{N}]+(?:'[\p{L}\p{N}]+)*").unwrap();
    }

    let lowered = text.to_lowercase();
    TOKEN_REGEX
        .find_iter(&lowered)
        .map(|m| m.as_str().to_string())
        .collect()
}
