use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use serde::{Deserialize, Serialize};

use crate::{
    error::AppResult,
    middleware::request_id::RequestId,
    models::UserId,
    services::DEFAULT_TOP_K,
};

use super::AppState;

// Request/Response types

#[derive(Debug, Deserialize)]
pub struct TopKQuery {
    pub top_k: Option<usize>,
}

impl TopKQuery {
    fn top_k(&self) -> usize {
        self.top_k.unwrap_or(DEFAULT_TOP_K)
    }
}

#[derive(Debug, Serialize)]
pub struct WelcomeResponse {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct MoviesResponse {
    pub movies: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct RecommendationsResponse {
    pub recommendations: Vec<String>,
}

// Handlers

/// Landing endpoint
pub async fn root() -> Json<WelcomeResponse> {
    Json(WelcomeResponse {
        message: "Welcome to the movie recommendation API".to_string(),
    })
}

/// Health check endpoint
pub async fn health_check() -> StatusCode {
    StatusCode::OK
}

/// List every movie title in catalog order
pub async fn list_movies(State(state): State<AppState>) -> Json<MoviesResponse> {
    Json(MoviesResponse {
        movies: state.recommender.list_titles(),
    })
}

/// Movies with tags most similar to the given title
pub async fn content_based(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Path(title): Path<String>,
    Query(query): Query<TopKQuery>,
) -> AppResult<Json<RecommendationsResponse>> {
    let top_k = query.top_k();
    tracing::info!(request_id = %request_id, title = %title, top_k, "Content-based request");

    let recommendations = state.recommender.recommend_by_item(&title, top_k)?;
    Ok(Json(RecommendationsResponse { recommendations }))
}

/// Unwatched movies with the highest predicted rating for a user
pub async fn collaborative(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Path(user_id): Path<UserId>,
    Query(query): Query<TopKQuery>,
) -> AppResult<Json<RecommendationsResponse>> {
    let top_k = query.top_k();
    tracing::info!(request_id = %request_id, user_id, top_k, "Collaborative request");

    let recommendations = state.recommender.recommend_for_user(user_id, top_k)?;
    Ok(Json(RecommendationsResponse { recommendations }))
}
