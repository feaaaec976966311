use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    routing::{delete, get},
    Json, Router,
};
use uuid::Uuid;

use crate::{
    api::rest::{to_response, ApiError},
    infrastructure::{auth::AuthenticatedUser, state::AppState},
    services::products::{AddProductRequest, ProductService},
};

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_products).post(add_product))
        .route("/:id", delete(remove_product))
}

async fn list_products(
    Extension(state): Extension<Arc<AppState>>,
    user: AuthenticatedUser,
) -> Result<Json<serde_json::Value>, ApiError> {
    let service = ProductService::new(state);
    let products = service.list(&user).await.map_err(to_response)?;
    Ok(Json(serde_json::json!({ "products": products })))
}

async fn add_product(
    Extension(state): Extension<Arc<AppState>>,
    user: AuthenticatedUser,
    Json(payload): Json<AddProductRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    let service = ProductService::new(state);
    let product = service.add(&user, payload).await.map_err(to_response)?;
    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({ "product": product })),
    ))
}

async fn remove_product(
    Extension(state): Extension<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let service = ProductService::new(state);
    service.remove(&user, id).await.map_err(to_response)?;
    Ok(StatusCode::NO_CONTENT)
}
