//! Biased matrix factorization for rating prediction.
//!
//! Users and items get a bias and a latent vector each; the estimate for a
//! pair is `mu + b_u + b_i + q_i . p_u`. Parameters are learned by stochastic
//! gradient descent over the training ratings in input order.

use std::collections::HashMap;

use ndarray::{Array1, Array2};
use rand::{rngs::StdRng, SeedableRng};
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::models::{Interaction, ItemId, UserId, MAX_RATING, MIN_RATING};

/// Hyperparameters for [`SvdModel::fit`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SvdParams {
    pub n_factors: usize,
    pub n_epochs: usize,
    pub learning_rate: f64,
    pub regularization: f64,
    pub init_mean: f64,
    pub init_std_dev: f64,
    pub seed: u64,
}

impl Default for SvdParams {
    fn default() -> Self {
        Self {
            n_factors: 100,
            n_epochs: 20,
            learning_rate: 0.005,
            regularization: 0.02,
            init_mean: 0.0,
            init_std_dev: 0.1,
            seed: 42,
        }
    }
}

/// Why a prediction fell back to biases
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ColdStart {
    UnknownUser,
    UnknownItem,
    UnknownUserAndItem,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Prediction {
    pub user_id: UserId,
    pub item_id: ItemId,
    /// Raw model output, not clipped to the rating scale
    pub estimate: f64,
    pub cold_start: Option<ColdStart>,
}

impl Prediction {
    /// Estimate clamped to the rating scale
    pub fn clipped(&self) -> f64 {
        self.estimate
            .clamp(f64::from(MIN_RATING), f64::from(MAX_RATING))
    }
}

/// Anything that can estimate a user's rating for an item.
///
/// Implementations must answer for any pair, falling back to a global
/// estimate for users or items they have never seen.
#[cfg_attr(test, mockall::automock)]
pub trait RatingPredictor: Send + Sync {
    fn predict(&self, user_id: UserId, item_id: ItemId) -> Prediction;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SvdModel {
    params: SvdParams,
    global_mean: f64,
    user_index: HashMap<UserId, usize>,
    item_index: HashMap<ItemId, usize>,
    user_bias: Array1<f64>,
    item_bias: Array1<f64>,
    user_factors: Array2<f64>,
    item_factors: Array2<f64>,
}

impl SvdModel {
    /// Fits the model on every interaction given.
    pub fn fit(interactions: &[Interaction], params: &SvdParams) -> AppResult<Self> {
        if interactions.is_empty() {
            return Err(AppError::Training(
                "Cannot fit rating model on zero interactions".to_string(),
            ));
        }

        let mut user_index: HashMap<UserId, usize> = HashMap::new();
        let mut item_index: HashMap<ItemId, usize> = HashMap::new();
        let mut triples = Vec::with_capacity(interactions.len());
        for interaction in interactions {
            let next_user = user_index.len();
            let u = *user_index.entry(interaction.user_id).or_insert(next_user);
            let next_item = item_index.len();
            let i = *item_index.entry(interaction.item_id).or_insert(next_item);
            triples.push((u, i, f64::from(interaction.rating)));
        }

        let global_mean = triples.iter().map(|(_, _, r)| r).sum::<f64>() / triples.len() as f64;

        let normal = Normal::new(params.init_mean, params.init_std_dev)
            .map_err(|e| AppError::Training(format!("Invalid factor initialisation: {}", e)))?;
        let mut rng = StdRng::seed_from_u64(params.seed);
        let k = params.n_factors;

        let mut model = Self {
            params: params.clone(),
            global_mean,
            user_bias: Array1::zeros(user_index.len()),
            item_bias: Array1::zeros(item_index.len()),
            user_factors: Array2::from_shape_fn((user_index.len(), k), |_| normal.sample(&mut rng)),
            item_factors: Array2::from_shape_fn((item_index.len(), k), |_| normal.sample(&mut rng)),
            user_index,
            item_index,
        };

        tracing::info!(
            ratings = triples.len(),
            users = model.user_index.len(),
            items = model.item_index.len(),
            factors = k,
            epochs = params.n_epochs,
            "Fitting rating model"
        );

        let (lr, reg) = (params.learning_rate, params.regularization);
        for epoch in 0..params.n_epochs {
            let mut squared_error = 0.0;
            for &(u, i, rating) in &triples {
                let dot = model.user_factors.row(u).dot(&model.item_factors.row(i));
                let err = rating - (global_mean + model.user_bias[u] + model.item_bias[i] + dot);
                squared_error += err * err;

                model.user_bias[u] += lr * (err - reg * model.user_bias[u]);
                model.item_bias[i] += lr * (err - reg * model.item_bias[i]);

                let mut pu = model.user_factors.row_mut(u);
                let mut qi = model.item_factors.row_mut(i);
                for f in 0..k {
                    let (puf, qif) = (pu[f], qi[f]);
                    pu[f] += lr * (err * qif - reg * puf);
                    qi[f] += lr * (err * puf - reg * qif);
                }
            }
            tracing::debug!(
                epoch = epoch + 1,
                train_rmse = (squared_error / triples.len() as f64).sqrt(),
                "Finished epoch"
            );
        }

        Ok(model)
    }

    pub fn params(&self) -> &SvdParams {
        &self.params
    }

    pub fn global_mean(&self) -> f64 {
        self.global_mean
    }

    pub fn knows_user(&self, user_id: UserId) -> bool {
        self.user_index.contains_key(&user_id)
    }

    pub fn knows_item(&self, item_id: ItemId) -> bool {
        self.item_index.contains_key(&item_id)
    }

    /// Learned bias of a known item
    pub fn item_bias(&self, item_id: ItemId) -> Option<f64> {
        self.item_index.get(&item_id).map(|&i| self.item_bias[i])
    }
}

impl RatingPredictor for SvdModel {
    fn predict(&self, user_id: UserId, item_id: ItemId) -> Prediction {
        let user = self.user_index.get(&user_id).copied();
        let item = self.item_index.get(&item_id).copied();

        let (estimate, cold_start) = match (user, item) {
            (Some(u), Some(i)) => (
                self.global_mean
                    + self.user_bias[u]
                    + self.item_bias[i]
                    + self.user_factors.row(u).dot(&self.item_factors.row(i)),
                None,
            ),
            (None, Some(i)) => (self.global_mean + self.item_bias[i], Some(ColdStart::UnknownUser)),
            (Some(u), None) => (self.global_mean + self.user_bias[u], Some(ColdStart::UnknownItem)),
            (None, None) => (self.global_mean, Some(ColdStart::UnknownUserAndItem)),
        };

        Prediction {
            user_id,
            item_id,
            estimate,
            cold_start,
        }
    }
}
