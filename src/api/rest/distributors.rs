use std::sync::Arc;

use axum::{extract::Extension, routing::get, Json, Router};

use crate::{
    api::rest::{to_response, ApiError},
    infrastructure::{auth::AuthenticatedUser, state::AppState},
    services::errors::ServiceError,
};

pub fn router() -> Router {
    Router::new().route("/", get(list_distributors))
}

async fn list_distributors(
    Extension(state): Extension<Arc<AppState>>,
    _user: AuthenticatedUser,
) -> Result<Json<serde_json::Value>, ApiError> {
    let distributors = state
        .store
        .list_distributors()
        .await
        .map_err(|err| to_response(ServiceError::from(err)))?;
    Ok(Json(serde_json::json!({ "distributors": distributors })))
}
