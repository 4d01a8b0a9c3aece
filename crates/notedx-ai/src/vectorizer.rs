//! TF-IDF vectorization over word n-grams.
//!
//! Input documents are already normalized, so tokens are split on
//! whitespace only. Rows come out L2-normalized as sparse `(index, weight)`
//! pairs sorted by index.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::PipelineError;

/// Sparse row: `(feature index, weight)` sorted by index.
pub type SparseVec = Vec<(usize, f64)>;

/// Fitted TF-IDF vectorizer. Frozen after [`fit`](Self::fit).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TfidfVectorizer {
    ngram_range: (usize, usize),
    max_features: usize,
    /// Term → feature index. Indices follow lexicographic term order.
    vocabulary: BTreeMap<String, usize>,
    idf: Vec<f64>,
}

impl TfidfVectorizer {
    /// Learn the vocabulary and IDF weights from `docs`.
    ///
    /// When there are more distinct terms than `max_features`, the most
    /// frequent terms across the corpus are kept, ties broken
    /// lexicographically.
    pub fn fit(
        docs: &[String],
        ngram_range: (usize, usize),
        max_features: usize,
    ) -> Result<Self, PipelineError> {
        let (min_n, max_n) = ngram_range;
        if min_n == 0 || min_n > max_n {
            return Err(PipelineError::Fit(format!(
                "invalid n-gram range ({min_n}, {max_n})"
            )));
        }
        if max_features == 0 {
            return Err(PipelineError::Fit("max_features must be positive".into()));
        }

        let mut term_freq: HashMap<String, usize> = HashMap::new();
        let mut doc_freq: HashMap<String, usize> = HashMap::new();
        for doc in docs {
            let counts = count_terms(doc, ngram_range);
            for (term, count) in counts {
                *term_freq.entry(term.clone()).or_default() += count;
                *doc_freq.entry(term).or_default() += 1;
            }
        }

        if term_freq.is_empty() {
            return Err(PipelineError::Fit(
                "empty vocabulary: every training document normalized to nothing".into(),
            ));
        }

        let mut ranked: Vec<(&String, usize)> = term_freq.iter().map(|(t, c)| (t, *c)).collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        ranked.truncate(max_features);

        let kept: BTreeSet<String> = ranked.into_iter().map(|(t, _)| t.clone()).collect();
        let vocabulary: BTreeMap<String, usize> = kept
            .into_iter()
            .enumerate()
            .map(|(index, term)| (term, index))
            .collect();

        let n_docs = docs.len() as f64;
        let mut idf = vec![0.0; vocabulary.len()];
        for (term, &index) in &vocabulary {
            let df = doc_freq.get(term).copied().unwrap_or(0) as f64;
            idf[index] = ((1.0 + n_docs) / (1.0 + df)).ln() + 1.0;
        }

        debug!(
            distinct_terms = term_freq.len(),
            vocabulary = vocabulary.len(),
            "fitted tf-idf vocabulary"
        );

        Ok(Self {
            ngram_range,
            max_features,
            vocabulary,
            idf,
        })
    }

    /// Vectorize one document. Unknown terms are ignored; an empty document
    /// gives an empty row.
    pub fn transform(&self, doc: &str) -> SparseVec {
        let mut row: BTreeMap<usize, f64> = BTreeMap::new();
        for (term, count) in count_terms(doc, self.ngram_range) {
            if let Some(&index) = self.vocabulary.get(&term) {
                row.insert(index, count as f64 * self.idf[index]);
            }
        }

        let norm = row.values().map(|w| w * w).sum::<f64>().sqrt();
        if norm > 0.0 {
            for weight in row.values_mut() {
                *weight /= norm;
            }
        }
        row.into_iter().collect()
    }

    pub fn transform_many(&self, docs: &[String]) -> Vec<SparseVec> {
        docs.iter().map(|doc| self.transform(doc)).collect()
    }

    pub fn n_features(&self) -> usize {
        self.vocabulary.len()
    }

    pub fn vocabulary(&self) -> &BTreeMap<String, usize> {
        &self.vocabulary
    }

    pub fn ngram_range(&self) -> (usize, usize) {
        self.ngram_range
    }

    pub fn max_features(&self) -> usize {
        self.max_features
    }
}

/// Occurrence counts of every n-gram in `doc` for n in the inclusive range.
fn count_terms(doc: &str, (min_n, max_n): (usize, usize)) -> HashMap<String, usize> {
    let tokens: Vec<&str> = doc.split_whitespace().collect();
    let mut counts: HashMap<String, usize> = HashMap::new();
    for n in min_n..=max_n {
        for window in tokens.windows(n) {
            *counts.entry(window.join(" ")).or_default() += 1;
        }
    }
    counts
}
