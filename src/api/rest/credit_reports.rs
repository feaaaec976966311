use std::sync::Arc;

use axum::{extract::Extension, http::StatusCode, routing::post, Json, Router};

use crate::{
    api::rest::{to_response, ApiError},
    infrastructure::{auth::AuthenticatedUser, state::AppState},
    services::credit_reports::{CreditReportReceipt, CreditReportRequest, CreditReportService},
};

pub fn router() -> Router {
    Router::new().route("/", post(ingest))
}

async fn ingest(
    Extension(state): Extension<Arc<AppState>>,
    user: AuthenticatedUser,
    Json(payload): Json<CreditReportRequest>,
) -> Result<(StatusCode, Json<CreditReportReceipt>), ApiError> {
    let service = CreditReportService::new(state);
    let receipt = service.ingest(&user, payload).await.map_err(to_response)?;
    Ok((StatusCode::CREATED, Json(receipt)))
}
