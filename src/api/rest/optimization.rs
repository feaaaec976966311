use std::sync::Arc;

use axum::{extract::Extension, routing::get, Json, Router};
use serde::Serialize;

use crate::{
    api::rest::{to_response, ApiError},
    domain::optimizer::OptimizationReport,
    infrastructure::{auth::AuthenticatedUser, state::AppState},
    services::optimization::OptimizationService,
};

pub fn router() -> Router {
    Router::new().route("/", get(optimize))
}

#[derive(Serialize)]
struct OptimizationResponse {
    status: &'static str,
    data: OptimizationReport,
}

async fn optimize(
    Extension(state): Extension<Arc<AppState>>,
    user: AuthenticatedUser,
) -> Result<Json<OptimizationResponse>, ApiError> {
    let service = OptimizationService::new(state);
    let report = service.recommend(&user).await.map_err(to_response)?;
    Ok(Json(OptimizationResponse {
        status: "success",
        data: report,
    }))
}
