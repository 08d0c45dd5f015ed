use lazy_static::lazy_static;
use regex::Regex;
use strsim::jaro_winkler;

lazy_static! {
    /// One token per ideograph/kana, one token per run of other letters and digits
    static ref TOKEN_RE: Regex = Regex::new(
        r"[\p{Han}\p{Hiragana}\p{Katakana}]|[[\p{L}\p{N}]--[\p{Han}\p{Hiragana}\p{Katakana}]]+"
    )
    .expect("token pattern is valid");
}

/// A token of a text with its position, in both char and byte offsets
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    /// Lowercased token text
    pub text: String,
    pub char_start: usize,
    pub char_end: usize,
    pub byte_start: usize,
    pub byte_end: usize,
}

/// Split text into tokens
///
/// Han ideographs and kana become single-character tokens since those
/// scripts do not separate words with whitespace. Runs of any other letters
/// or digits form one token. Punctuation and whitespace separate tokens.
pub fn tokenize(text: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut byte_cursor = 0;
    let mut char_cursor = 0;

    for m in TOKEN_RE.find_iter(text) {
        char_cursor += text[byte_cursor..m.start()].chars().count();
        let char_len = m.as_str().chars().count();
        tokens.push(Token {
            text: m.as_str().to_lowercase(),
            char_start: char_cursor,
            char_end: char_cursor + char_len,
            byte_start: m.start(),
            byte_end: m.end(),
        });
        char_cursor += char_len;
        byte_cursor = m.end();
    }

    tokens
}

/// Case- and punctuation-insensitive form of a string
///
/// `"Little-Apple!"` and `"little apple"` both normalize to `"little apple"`;
/// `"小 苹果"` and `"小苹果"` both normalize to `"小 苹 果"`.
pub fn normalize_string(s: &str) -> String {
    tokenize(s)
        .into_iter()
        .map(|t| t.text)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Token-overlap matcher for entity values
#[derive(Debug, Clone)]
pub struct FuzzyMatcher {
    /// Jaro-Winkler similarity (0.0-1.0) at which two tokens are considered equal
    pub token_threshold: f64,
}

impl Default for FuzzyMatcher {
    fn default() -> Self {
        Self {
            token_threshold: 0.9,
        }
    }
}

impl FuzzyMatcher {
    pub fn new(token_threshold: f64) -> Self {
        Self { token_threshold }
    }

    /// Whether two already-lowercased tokens count as the same token
    pub fn tokens_match(&self, a: &str, b: &str) -> bool {
        if a == b {
            return true;
        }
        // Single characters (ideographs included) only match exactly
        if a.chars().count() < 2 || b.chars().count() < 2 {
            return false;
        }
        jaro_winkler(a, b) >= self.token_threshold
    }

    /// Fraction of tokens shared by both sides, relative to the longer side
    ///
    /// Each token on the right can be claimed once. Returns a score in 0.0-1.0.
    pub fn token_overlap(&self, left: &[String], right: &[String]) -> f64 {
        let longest = left.len().max(right.len());
        if longest == 0 {
            return 0.0;
        }

        let mut claimed = vec![false; right.len()];
        let mut shared = 0usize;
        for token in left {
            let hit = right
                .iter()
                .enumerate()
                .find(|(idx, candidate)| !claimed[*idx] && self.tokens_match(token, candidate));
            if let Some((idx, _)) = hit {
                claimed[idx] = true;
                shared += 1;
            }
        }

        shared as f64 / longest as f64
    }
}
