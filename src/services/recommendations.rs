use std::collections::{HashMap, HashSet};

use crate::{
    engine::{RatingPredictor, SimilarityTable},
    error::{AppError, AppResult},
    models::{Catalog, Interaction, ItemId, UserId},
};

/// Default number of recommendations returned by a query
pub const DEFAULT_TOP_K: usize = 10;

/// Items each user has rated, grouped once from the interaction table
#[derive(Debug, Clone, Default)]
pub struct WatchedIndex {
    by_user: HashMap<UserId, Vec<ItemId>>,
}

impl WatchedIndex {
    pub fn new(interactions: &[Interaction]) -> Self {
        let mut by_user: HashMap<UserId, Vec<ItemId>> = HashMap::new();
        for interaction in interactions {
            by_user
                .entry(interaction.user_id)
                .or_default()
                .push(interaction.item_id);
        }
        Self { by_user }
    }

    /// Distinct items the user has at least one interaction with
    pub fn watched(&self, user_id: UserId) -> HashSet<ItemId> {
        self.by_user
            .get(&user_id)
            .map(|items| items.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn users(&self) -> usize {
        self.by_user.len()
    }
}

/// Answers recommendation queries over immutable, fully loaded artifacts.
///
/// Every query is a pure read, so one engine can be shared by any number of
/// concurrent requests.
pub struct Recommender {
    catalog: Catalog,
    similarity: SimilarityTable,
    predictor: Box<dyn RatingPredictor>,
    watched: WatchedIndex,
}

fn check_top_k(top_k: usize) -> AppResult<()> {
    if top_k == 0 {
        return Err(AppError::InvalidInput(
            "top_k must be a positive integer".to_string(),
        ));
    }
    Ok(())
}

/// Sorts descending by score; ties keep catalog order.
fn rank(mut scored: Vec<(usize, f64)>, top_k: usize) -> Vec<usize> {
    scored.sort_by(|a, b| b.1.total_cmp(&a.1));
    scored.into_iter().take(top_k).map(|(pos, _)| pos).collect()
}

impl Recommender {
    /// Assembles the engine, checking the similarity table was built from this catalog.
    pub fn new(
        catalog: Catalog,
        similarity: SimilarityTable,
        predictor: Box<dyn RatingPredictor>,
        watched: WatchedIndex,
    ) -> AppResult<Self> {
        let catalog_ids: Vec<ItemId> = catalog.items().iter().map(|item| item.id).collect();
        if catalog_ids.as_slice() != similarity.item_ids() {
            return Err(AppError::ArtifactLoad(
                "Similarity table was built from a different catalog".to_string(),
            ));
        }

        Ok(Self {
            catalog,
            similarity,
            predictor,
            watched,
        })
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// All titles in catalog order
    pub fn list_titles(&self) -> Vec<String> {
        self.catalog.titles()
    }

    /// Titles most similar to `title`.
    ///
    /// Every item sharing the query's title is left out, so other releases
    /// of the same name never come back under it.
    pub fn recommend_by_item(&self, title: &str, top_k: usize) -> AppResult<Vec<String>> {
        check_top_k(top_k)?;
        let not_found = || AppError::NotFound(format!("Movie '{}' not found", title));
        let item_id = self.catalog.id_for_title(title).ok_or_else(not_found)?;
        let query_title = &self.catalog.get(item_id).ok_or_else(not_found)?.title;
        let row = self.similarity.row(item_id).ok_or_else(not_found)?;

        let candidates: Vec<(usize, f64)> = self
            .catalog
            .items()
            .iter()
            .enumerate()
            .filter(|(_, item)| item.title != *query_title)
            .map(|(pos, _)| (pos, row[pos]))
            .collect();

        Ok(self.titles_at(rank(candidates, top_k)))
    }

    /// Unwatched titles with the highest predicted rating for `user_id`.
    ///
    /// Users unknown to the model get the bias-only ranking; a user who has
    /// watched everything gets an empty list.
    pub fn recommend_for_user(&self, user_id: UserId, top_k: usize) -> AppResult<Vec<String>> {
        check_top_k(top_k)?;
        let watched = self.watched.watched(user_id);

        let candidates: Vec<(usize, f64)> = self
            .catalog
            .items()
            .iter()
            .enumerate()
            .filter(|(_, item)| !watched.contains(&item.id))
            .map(|(pos, item)| (pos, self.predictor.predict(user_id, item.id).estimate))
            .collect();

        tracing::debug!(
            user_id,
            watched = watched.len(),
            candidates = candidates.len(),
            "Ranking unwatched movies"
        );

        Ok(self.titles_at(rank(candidates, top_k)))
    }

    fn titles_at(&self, positions: Vec<usize>) -> Vec<String> {
        let items = self.catalog.items();
        positions
            .into_iter()
            .map(|pos| items[pos].title.clone())
            .collect()
    }
}
