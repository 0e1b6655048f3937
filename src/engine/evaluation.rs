use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};
use serde::Serialize;

use crate::error::{AppError, AppResult};
use crate::models::Interaction;

use super::factorization::{RatingPredictor, SvdModel, SvdParams};

/// Held-out accuracy of one fold
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FoldMetrics {
    pub fold: usize,
    pub train_size: usize,
    pub test_size: usize,
    pub rmse: f64,
    pub mae: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CrossValidation {
    pub folds: Vec<FoldMetrics>,
    pub mean_rmse: f64,
    pub mean_mae: f64,
}

/// Root mean squared error over `(estimate, actual)` pairs
pub fn rmse(pairs: &[(f64, f64)]) -> f64 {
    if pairs.is_empty() {
        return 0.0;
    }
    let sum: f64 = pairs.iter().map(|(est, actual)| (est - actual).powi(2)).sum();
    (sum / pairs.len() as f64).sqrt()
}

/// Mean absolute error over `(estimate, actual)` pairs
pub fn mae(pairs: &[(f64, f64)]) -> f64 {
    if pairs.is_empty() {
        return 0.0;
    }
    let sum: f64 = pairs.iter().map(|(est, actual)| (est - actual).abs()).sum();
    sum / pairs.len() as f64
}

/// K-fold cross-validation of [`SvdModel`].
///
/// Interactions are shuffled with the model seed and cut into `folds`
/// contiguous parts; the first `n % folds` parts get one extra rating.
/// Estimates are clipped to the rating scale before scoring.
pub fn cross_validate(
    interactions: &[Interaction],
    params: &SvdParams,
    folds: usize,
) -> AppResult<CrossValidation> {
    if folds < 2 {
        return Err(AppError::InvalidInput(format!(
            "Cross-validation needs at least 2 folds, got {}",
            folds
        )));
    }
    if folds > interactions.len() {
        return Err(AppError::InvalidInput(format!(
            "Cannot split {} interactions into {} folds",
            interactions.len(),
            folds
        )));
    }

    let mut order: Vec<usize> = (0..interactions.len()).collect();
    order.shuffle(&mut StdRng::seed_from_u64(params.seed));

    let n = order.len();
    let mut results = Vec::with_capacity(folds);
    let mut start = 0;
    for fold in 0..folds {
        let stop = start + n / folds + usize::from(fold < n % folds);
        let test: Vec<Interaction> = order[start..stop].iter().map(|&i| interactions[i]).collect();
        let train: Vec<Interaction> = order[..start]
            .iter()
            .chain(&order[stop..])
            .map(|&i| interactions[i])
            .collect();

        let model = SvdModel::fit(&train, params)?;
        let pairs: Vec<(f64, f64)> = test
            .iter()
            .map(|r| {
                let prediction = model.predict(r.user_id, r.item_id);
                (prediction.clipped(), f64::from(r.rating))
            })
            .collect();

        let metrics = FoldMetrics {
            fold: fold + 1,
            train_size: train.len(),
            test_size: test.len(),
            rmse: rmse(&pairs),
            mae: mae(&pairs),
        };
        tracing::info!(
            fold = metrics.fold,
            rmse = metrics.rmse,
            mae = metrics.mae,
            "Evaluated fold"
        );
        results.push(metrics);
        start = stop;
    }

    let mean_rmse = results.iter().map(|m| m.rmse).sum::<f64>() / folds as f64;
    let mean_mae = results.iter().map(|m| m.mae).sum::<f64>() / folds as f64;

    Ok(CrossValidation {
        folds: results,
        mean_rmse,
        mean_mae,
    })
}
