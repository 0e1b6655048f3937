use std::sync::Arc;

use crate::{
    artifacts::{self, ArtifactPaths},
    config::Config,
    data,
    engine::{SimilarityTable, SvdModel},
    error::AppResult,
    models::Catalog,
    services::{Recommender, WatchedIndex},
};

/// Shared application state.
///
/// Built once at startup and never mutated, so handlers read it without locking.
#[derive(Clone)]
pub struct AppState {
    pub recommender: Arc<Recommender>,
}

impl AppState {
    pub fn new(recommender: Recommender) -> Self {
        Self {
            recommender: Arc::new(recommender),
        }
    }

    /// Loads every trained artifact plus the interaction history.
    ///
    /// Any missing or corrupt artifact is an error; the server must not start
    /// with partial state.
    pub fn load(config: &Config) -> AppResult<Self> {
        let paths = ArtifactPaths::in_dir(&config.artifacts_dir);
        let catalog: Catalog = artifacts::load(&paths.catalog)?;
        let similarity: SimilarityTable = artifacts::load(&paths.similarity)?;
        let model: SvdModel = artifacts::load(&paths.rating_model)?;

        let interactions = data::read_interactions(&config.ratings_path())?;
        let watched = WatchedIndex::new(&interactions.records);

        tracing::info!(
            movies = catalog.len(),
            users_with_history = watched.users(),
            "Serving state loaded"
        );

        let recommender = Recommender::new(catalog, similarity, Box::new(model), watched)?;
        Ok(Self::new(recommender))
    }
}
