use std::collections::{BTreeMap, BTreeSet};
use std::sync::OnceLock;

use regex::Regex;

use super::stop_words::is_stop_word;

/// Sparse vector as `(dimension, weight)` pairs sorted by dimension
pub type SparseVector = Vec<(usize, f64)>;

fn token_pattern() -> &'static Regex {
    static TOKEN: OnceLock<Regex> = OnceLock::new();
    TOKEN.get_or_init(|| Regex::new(r"\b\w\w+\b").expect("valid token regex"))
}

/// Term-frequency / inverse-document-frequency weighting over a fixed corpus.
///
/// Tokens are lowercase runs of two or more word characters. IDF is smoothed
/// as `ln((1 + n) / (1 + df)) + 1` and every output vector is L2-normalized.
#[derive(Debug, Clone, Default)]
pub struct TfidfVectorizer {
    stop_words: bool,
    vocabulary: BTreeMap<String, usize>,
    idf: Vec<f64>,
}

impl TfidfVectorizer {
    pub fn new(stop_words: bool) -> Self {
        Self {
            stop_words,
            ..Self::default()
        }
    }

    pub fn vocabulary(&self) -> &BTreeMap<String, usize> {
        &self.vocabulary
    }

    fn tokenize(&self, document: &str) -> Vec<String> {
        let lowered = document.to_lowercase();
        token_pattern()
            .find_iter(&lowered)
            .map(|m| m.as_str().to_string())
            .filter(|token| !(self.stop_words && is_stop_word(token)))
            .collect()
    }

    /// Learns the vocabulary and IDF weights, then vectorizes every document.
    pub fn fit_transform(&mut self, documents: &[String]) -> Vec<SparseVector> {
        let tokenized: Vec<Vec<String>> = documents.iter().map(|d| self.tokenize(d)).collect();

        let terms: BTreeSet<&String> = tokenized.iter().flatten().collect();
        self.vocabulary = terms
            .into_iter()
            .enumerate()
            .map(|(index, term)| (term.clone(), index))
            .collect();

        let mut document_frequency = vec![0usize; self.vocabulary.len()];
        for tokens in &tokenized {
            let unique: BTreeSet<usize> = tokens.iter().map(|t| self.vocabulary[t]).collect();
            for index in unique {
                document_frequency[index] += 1;
            }
        }

        let n = documents.len() as f64;
        self.idf = document_frequency
            .iter()
            .map(|&df| ((1.0 + n) / (1.0 + df as f64)).ln() + 1.0)
            .collect();

        tokenized.iter().map(|tokens| self.weigh(tokens)).collect()
    }

    fn weigh(&self, tokens: &[String]) -> SparseVector {
        let mut counts: BTreeMap<usize, f64> = BTreeMap::new();
        for token in tokens {
            if let Some(&index) = self.vocabulary.get(token) {
                *counts.entry(index).or_insert(0.0) += 1.0;
            }
        }

        let mut vector: SparseVector = counts
            .into_iter()
            .map(|(index, tf)| (index, tf * self.idf[index]))
            .collect();

        let norm = vector.iter().map(|(_, w)| w * w).sum::<f64>().sqrt();
        if norm > 0.0 {
            for (_, weight) in &mut vector {
                *weight /= norm;
            }
        }
        vector
    }
}

/// Dot product of two sorted sparse vectors
pub fn sparse_dot(a: &SparseVector, b: &SparseVector) -> f64 {
    let (mut i, mut j, mut sum) = (0, 0, 0.0);
    while i < a.len() && j < b.len() {
        match a[i].0.cmp(&b[j].0) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                sum += a[i].1 * b[j].1;
                i += 1;
                j += 1;
            }
        }
    }
    sum
}
