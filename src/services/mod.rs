pub mod recommendations;
pub mod training;

pub use recommendations::{Recommender, WatchedIndex, DEFAULT_TOP_K};
pub use training::{train, TrainingOptions, TrainingReport};
