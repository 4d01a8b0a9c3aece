//! Deterministic clinical-text normalization.
//!
//! Training and inference must run the exact same steps, so both go through
//! [`Normalizer::normalize`]. The pipeline is:
//!
//! 1. lowercase;
//! 2. replace every character outside `[a-z]` and whitespace with a space
//!    (digits, punctuation and accented letters are dropped on purpose);
//! 3. collapse whitespace runs and trim;
//! 4. split on Unicode word boundaries;
//! 5. drop stopwords and tokens of length <= 2;
//! 6. lemmatize each remaining token as a noun;
//! 7. join with single spaces.
//!
//! An input that normalizes to the empty string is valid.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use unicode_segmentation::UnicodeSegmentation;

use crate::lemma::Lemmatizer;
use crate::stopwords;

/// Bumped whenever a step above changes behaviour. Part of the fingerprint.
pub const NORMALIZER_VERSION: &str = "notedx-normalizer/1";

/// Tokens of this many characters or fewer are discarded.
const MAX_DISCARDED_LEN: usize = 2;

static NON_ALPHA: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-z\s]").expect("static regex is valid"));
static WHITESPACE_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("static regex is valid"));
static DEFAULT: LazyLock<Normalizer> = LazyLock::new(Normalizer::english);

/// Normalize with the built-in English configuration.
pub fn normalize(raw: &str) -> String {
    DEFAULT.normalize(raw)
}

/// Stopword set plus lemmatizer. Pure: no state changes after construction.
#[derive(Debug, Clone)]
pub struct Normalizer {
    stopwords: HashSet<&'static str>,
    lemmatizer: Lemmatizer,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::english()
    }
}

impl Normalizer {
    pub fn english() -> Self {
        Self {
            stopwords: stopwords::ENGLISH.iter().copied().collect(),
            lemmatizer: Lemmatizer::english(),
        }
    }

    /// Process-wide instance used by [`normalize`].
    pub fn shared() -> &'static Normalizer {
        &DEFAULT
    }

    /// Steps 1 to 3: lowercase, strip non-letters, collapse whitespace.
    pub fn clean(&self, raw: &str) -> String {
        let lowered = raw.to_lowercase();
        let letters_only = NON_ALPHA.replace_all(&lowered, " ");
        WHITESPACE_RUN
            .replace_all(&letters_only, " ")
            .trim()
            .to_string()
    }

    /// Steps 1 to 6: the surviving lemmas in input order.
    pub fn tokens(&self, raw: &str) -> Vec<String> {
        let cleaned = self.clean(raw);
        cleaned
            .unicode_words()
            .filter(|token| token.len() > MAX_DISCARDED_LEN && !self.stopwords.contains(token))
            .map(|token| self.lemmatizer.lemmatize(token))
            .collect()
    }

    pub fn normalize(&self, raw: &str) -> String {
        self.tokens(raw).join(" ")
    }

    pub fn is_stopword(&self, token: &str) -> bool {
        self.stopwords.contains(token)
    }

    /// CRC32 over the version tag, the sorted stopword set and the
    /// lemmatizer tables. Two normalizers with equal fingerprints produce the
    /// same output for every input.
    pub fn fingerprint(&self) -> u32 {
        let mut hasher = crc32fast::Hasher::new();
        hasher.update(NORMALIZER_VERSION.as_bytes());
        hasher.update(b"\n");

        let mut words: Vec<&str> = self.stopwords.iter().copied().collect();
        words.sort_unstable();
        for word in words {
            hasher.update(word.as_bytes());
            hasher.update(b"\n");
        }

        self.lemmatizer.update_fingerprint(&mut hasher);
        hasher.finalize()
    }
}
