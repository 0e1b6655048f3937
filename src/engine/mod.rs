//! Offline model fitting: item similarity and rating prediction.

pub mod evaluation;
pub mod factorization;
pub mod similarity;
mod stop_words;
mod tfidf;

pub use evaluation::{cross_validate, CrossValidation, FoldMetrics};
pub use factorization::{ColdStart, Prediction, RatingPredictor, SvdModel, SvdParams};
pub use similarity::{SimilarityParams, SimilarityTable};

#[cfg(test)]
pub use factorization::MockRatingPredictor;
