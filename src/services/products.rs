use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::{
    domain::models::ProductListItem,
    infrastructure::{auth::AuthenticatedUser, state::AppState},
    validation::rules::{check, normalize_ndc, validate_ndc},
};

use super::errors::ServiceError;

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AddProductRequest {
    #[validate(custom = "validate_ndc")]
    pub ndc: String,
    #[validate(length(min = 1, max = 200))]
    pub product_name: String,
    #[validate(range(min = 0, max = 100000))]
    pub quantity: i32,
    #[validate(length(max = 64))]
    pub lot_number: Option<String>,
    pub expiration_date: Option<NaiveDate>,
}

pub struct ProductService {
    pub state: Arc<AppState>,
}

impl ProductService {
    pub fn new(state: Arc<AppState>) -> Self {
        Self { state }
    }

    pub async fn list(&self, actor: &AuthenticatedUser) -> Result<Vec<ProductListItem>, ServiceError> {
        Ok(self.state.store.list_products(actor.pharmacy_id).await?)
    }

    pub async fn add(
        &self,
        actor: &AuthenticatedUser,
        payload: AddProductRequest,
    ) -> Result<ProductListItem, ServiceError> {
        check(&payload)?;
        let ndc = normalize_ndc(&payload.ndc)
            .ok_or_else(|| ServiceError::Validation("ndc: ndc_format".into()))?;

        let item = ProductListItem {
            id: Uuid::new_v4(),
            pharmacy_id: actor.pharmacy_id,
            ndc,
            product_name: payload.product_name.trim().to_string(),
            quantity: payload.quantity,
            lot_number: payload
                .lot_number
                .map(|lot| lot.trim().to_string())
                .filter(|lot| !lot.is_empty()),
            expiration_date: payload.expiration_date,
            created_at: Utc::now(),
        };
        self.state.store.insert_product(&item).await?;

        info!(pharmacy_id = %actor.pharmacy_id, item_id = %item.id, ndc = %item.ndc, "product added");
        Ok(item)
    }

    pub async fn remove(&self, actor: &AuthenticatedUser, item_id: Uuid) -> Result<(), ServiceError> {
        let removed = self
            .state
            .store
            .delete_product(actor.pharmacy_id, item_id)
            .await?;
        if !removed {
            return Err(ServiceError::NotFound);
        }
        info!(pharmacy_id = %actor.pharmacy_id, item_id = %item_id, "product removed");
        Ok(())
    }
}
