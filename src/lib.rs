//! Movie recommendation service: content-based similarity over genre tags and
//! a latent-factor rating model, trained offline and served over HTTP.

pub mod api;
pub mod artifacts;
pub mod config;
pub mod data;
pub mod db;
pub mod engine;
pub mod error;
pub mod middleware;
pub mod models;
pub mod services;
