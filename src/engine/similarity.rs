//! Content-based item similarity.
//!
//! Each movie's tags become a TF-IDF vector and every pair of movies gets a
//! cosine similarity. The table is keyed by item identity; title lookups go
//! through [`crate::models::Catalog`].

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::models::{Item, ItemId};

use super::tfidf::{sparse_dot, TfidfVectorizer};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimilarityParams {
    pub stop_words: bool,
}

impl Default for SimilarityParams {
    fn default() -> Self {
        Self { stop_words: true }
    }
}

/// Symmetric item-item cosine similarity matrix.
///
/// Only the strict upper triangle is stored; the diagonal is always 1.0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarityTable {
    item_ids: Vec<ItemId>,
    positions: HashMap<ItemId, usize>,
    upper: Vec<f32>,
}

impl SimilarityTable {
    /// Vectorizes every item's tags and computes all pairwise similarities.
    pub fn fit(items: &[Item], params: &SimilarityParams) -> Self {
        let documents: Vec<String> = items.iter().map(Item::document).collect();
        let mut vectorizer = TfidfVectorizer::new(params.stop_words);
        let vectors = vectorizer.fit_transform(&documents);

        let n = items.len();
        let mut upper = Vec::with_capacity(n * n.saturating_sub(1) / 2);
        for i in 0..n {
            for j in (i + 1)..n {
                // empty vectors dot to 0, never NaN
                let score = sparse_dot(&vectors[i], &vectors[j]).clamp(0.0, 1.0);
                upper.push(score as f32);
            }
        }

        tracing::info!(
            items = n,
            vocabulary = vectorizer.vocabulary().len(),
            "Built similarity table"
        );

        Self {
            item_ids: items.iter().map(|item| item.id).collect(),
            positions: items.iter().enumerate().map(|(pos, item)| (item.id, pos)).collect(),
            upper,
        }
    }

    pub fn len(&self) -> usize {
        self.item_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.item_ids.is_empty()
    }

    /// Item identities in the order the table was built
    pub fn item_ids(&self) -> &[ItemId] {
        &self.item_ids
    }

    fn at(&self, a: usize, b: usize) -> f64 {
        if a == b {
            return 1.0;
        }
        let (i, j) = if a < b { (a, b) } else { (b, a) };
        let n = self.item_ids.len();
        let offset = i * n - i * (i + 1) / 2;
        f64::from(self.upper[offset + (j - i - 1)])
    }

    /// Similarity of two items, `None` if either is not in the table
    pub fn similarity(&self, a: ItemId, b: ItemId) -> Option<f64> {
        let a = *self.positions.get(&a)?;
        let b = *self.positions.get(&b)?;
        Some(self.at(a, b))
    }

    /// Similarities of `item` against every item, in table order
    pub fn row(&self, item: ItemId) -> Option<Vec<f64>> {
        let a = *self.positions.get(&item)?;
        Some((0..self.len()).map(|b| self.at(a, b)).collect())
    }
}
