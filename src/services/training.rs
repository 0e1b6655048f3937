use std::path::Path;

use serde::Serialize;

use crate::{
    artifacts::{self, ArtifactPaths},
    config::Config,
    data,
    engine::{cross_validate, CrossValidation, SimilarityParams, SimilarityTable, SvdModel, SvdParams},
    error::AppResult,
    models::{Catalog, Interaction, Item},
};

/// Summary of a training run
#[derive(Debug, Clone, Serialize)]
pub struct TrainingReport {
    pub items: usize,
    pub interactions: usize,
    pub skipped_rows: usize,
    pub validation: Option<CrossValidation>,
}

#[derive(Debug, Clone, Copy)]
pub struct TrainingOptions {
    pub validate: bool,
    pub folds: usize,
}

/// Everything a training run produces, before it is written out
pub struct TrainedArtifacts {
    pub catalog: Catalog,
    pub similarity: SimilarityTable,
    pub model: SvdModel,
}

/// Fits both engines on in-memory records.
pub fn fit_artifacts(
    items: Vec<Item>,
    interactions: &[Interaction],
    similarity_params: &SimilarityParams,
    svd_params: &SvdParams,
) -> AppResult<TrainedArtifacts> {
    tracing::info!("Training content-based model");
    let similarity = SimilarityTable::fit(&items, similarity_params);

    tracing::info!("Training collaborative filtering model");
    let model = SvdModel::fit(interactions, svd_params)?;

    Ok(TrainedArtifacts {
        catalog: Catalog::new(items),
        similarity,
        model,
    })
}

/// Writes all three artifacts into `dir`, replacing any previous run.
pub fn save_artifacts(dir: &Path, trained: &TrainedArtifacts) -> AppResult<()> {
    let paths = ArtifactPaths::in_dir(dir);
    artifacts::save(&paths.catalog, &trained.catalog)?;
    artifacts::save(&paths.similarity, &trained.similarity)?;
    artifacts::save(&paths.rating_model, &trained.model)?;
    Ok(())
}

/// Full offline run: read the dataset, fit, persist, then cross-validate.
pub fn train(config: &Config, options: TrainingOptions) -> AppResult<TrainingReport> {
    tracing::info!(data_dir = %config.data_dir.display(), "Starting training run");

    let items = data::read_items(&config.movies_path())?;
    let interactions = data::read_interactions(&config.ratings_path())?;
    let skipped_rows = items.skipped + interactions.skipped;
    let item_count = items.len();

    let svd_params = config.svd_params();
    let trained = fit_artifacts(
        items.records,
        &interactions.records,
        &config.similarity_params(),
        &svd_params,
    )?;
    save_artifacts(&config.artifacts_dir, &trained)?;

    let validation = if options.validate {
        tracing::info!(folds = options.folds, "Evaluating rating model");
        let report = cross_validate(&interactions.records, &svd_params, options.folds)?;
        tracing::info!(
            mean_rmse = report.mean_rmse,
            mean_mae = report.mean_mae,
            "Cross-validation finished"
        );
        Some(report)
    } else {
        None
    };

    tracing::info!(
        artifacts_dir = %config.artifacts_dir.display(),
        "Training run complete"
    );

    Ok(TrainingReport {
        items: item_count,
        interactions: interactions.len(),
        skipped_rows,
        validation,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts;
    use crate::engine::RatingPredictor;
    use crate::services::{Recommender, WatchedIndex};

    const MOVIES: &str = "movie_id\ttitle\tgenres\n\
        1\tToy Story (1995)\tAnimation|Children's|Comedy\n\
        2\tJumanji (1995)\tAdventure|Children's|Fantasy\n\
        3\tHeat (1995)\tAction|Crime|Thriller\n\
        x\tBroken Row\tDrama\n";

    const RATINGS: &str = "user_id\tmovie_id\trating\ttimestamp\n\
        1\t1\t5\t978300760\n\
        1\t2\t3\t978302109\n\
        2\t1\t4\t978301968\n\
        2\t3\t2\t978300275\n\
        3\t2\t4\t978824291\n\
        3\t3\t5\t978302268\n";

    fn config_for(dir: &tempfile::TempDir) -> Config {
        let data_dir = dir.path().join("dataset");
        std::fs::create_dir_all(&data_dir).unwrap();
        std::fs::write(data_dir.join("movies.csv"), MOVIES).unwrap();
        std::fs::write(data_dir.join("ratings.csv"), RATINGS).unwrap();

        let mut config: Config = envy::from_iter(Vec::<(String, String)>::new()).unwrap();
        config.data_dir = data_dir;
        config.artifacts_dir = dir.path().join("artifacts");
        config.n_factors = 4;
        config.n_epochs = 5;
        config
    }

    #[test]
    fn test_train_writes_loadable_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_for(&dir);

        let report = train(&config, TrainingOptions { validate: true, folds: 3 }).unwrap();
        assert_eq!(report.items, 3);
        assert_eq!(report.interactions, 6);
        assert_eq!(report.skipped_rows, 1);
        assert_eq!(report.validation.unwrap().folds.len(), 3);

        let paths = ArtifactPaths::in_dir(&config.artifacts_dir);
        let catalog: Catalog = artifacts::load(&paths.catalog).unwrap();
        let table: SimilarityTable = artifacts::load(&paths.similarity).unwrap();
        let model: SvdModel = artifacts::load(&paths.rating_model).unwrap();
        assert_eq!(catalog.len(), 3);
        assert_eq!(table.similarity(1, 1), Some(1.0));
        assert!(model.predict(1, 3).estimate.is_finite());
    }

    #[test]
    fn test_reloaded_artifacts_give_identical_recommendations() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_for(&dir);
        let items = data::read_items(&config.movies_path()).unwrap();
        let ratings = data::read_interactions(&config.ratings_path()).unwrap();

        let trained = fit_artifacts(
            items.records,
            &ratings.records,
            &config.similarity_params(),
            &config.svd_params(),
        )
        .unwrap();
        save_artifacts(&config.artifacts_dir, &trained).unwrap();

        let paths = ArtifactPaths::in_dir(&config.artifacts_dir);
        let reloaded = Recommender::new(
            artifacts::load(&paths.catalog).unwrap(),
            artifacts::load(&paths.similarity).unwrap(),
            Box::new(artifacts::load::<SvdModel>(&paths.rating_model).unwrap()),
            WatchedIndex::new(&ratings.records),
        )
        .unwrap();
        let fresh = Recommender::new(
            trained.catalog,
            trained.similarity,
            Box::new(trained.model),
            WatchedIndex::new(&ratings.records),
        )
        .unwrap();

        for title in ["Toy Story", "Jumanji", "Heat"] {
            assert_eq!(
                reloaded.recommend_by_item(title, 2).unwrap(),
                fresh.recommend_by_item(title, 2).unwrap()
            );
        }
        for user in [1, 2, 3, 99] {
            assert_eq!(
                reloaded.recommend_for_user(user, 3).unwrap(),
                fresh.recommend_for_user(user, 3).unwrap()
            );
        }
    }

    #[test]
    fn test_train_without_validation() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_for(&dir);
        let report = train(&config, TrainingOptions { validate: false, folds: 5 }).unwrap();
        assert!(report.validation.is_none());
    }
}
