use axum::{http::StatusCode, routing::get, Json, Router};
use tracing::error;

use crate::{
    api::rest::{
        auth::router as auth_router, credit_reports::router as credit_reports_router,
        distributors::router as distributors_router, earnings::router as earnings_router,
        optimization::router as optimization_router, products::router as products_router,
    },
    services::errors::ServiceError,
};

pub mod auth;
pub mod credit_reports;
pub mod distributors;
pub mod earnings;
pub mod health;
pub mod optimization;
pub mod products;

pub type ApiError = (StatusCode, Json<serde_json::Value>);

pub fn router() -> Router {
    Router::new()
        .route("/health", get(health::healthcheck))
        .nest("/auth", auth_router())
        .nest("/optimization", optimization_router())
        .nest("/products", products_router())
        .nest("/credit-reports", credit_reports_router())
        .nest("/earnings", earnings_router())
        .nest("/distributors", distributors_router())
}

pub(crate) fn to_response(err: ServiceError) -> ApiError {
    if let ServiceError::Internal(detail) = &err {
        error!(error = %detail, "request failed");
    }
    (
        err.status_code(),
        Json(serde_json::json!({ "error": err.public_message() })),
    )
}
