use std::sync::Arc;

use axum::{
    extract::{Extension, Query},
    routing::get,
    Json, Router,
};

use crate::{
    api::rest::{to_response, ApiError},
    domain::earnings::EarningsHistory,
    infrastructure::{auth::AuthenticatedUser, state::AppState},
    services::earnings::{EarningsQuery, EarningsService},
};

pub fn router() -> Router {
    Router::new().route("/", get(history))
}

async fn history(
    Extension(state): Extension<Arc<AppState>>,
    user: AuthenticatedUser,
    Query(query): Query<EarningsQuery>,
) -> Result<Json<EarningsHistory>, ApiError> {
    let service = EarningsService::new(state);
    let history = service.history(&user, query).await.map_err(to_response)?;
    Ok(Json(history))
}
