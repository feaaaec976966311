use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use crate::{
    domain::models::{
        CreditReport, CreditReportLine, CreditedLine, Distributor, PharmacyUser,
        PriceObservation, ProductListItem, Subscription,
    },
    infrastructure::{config::Config, db},
};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("duplicate {0}")]
    Duplicate(String),
    #[error("corrupt row: {0}")]
    Corrupt(String),
}

/// Persistence seam for everything the HTTP services read and write.
///
/// Price observations are append-only: the only write path is
/// [`ReturnsStore::record_credit_report`].
#[async_trait]
pub trait ReturnsStore: Send + Sync {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<PharmacyUser>, StoreError>;

    async fn list_products(&self, pharmacy_id: Uuid) -> Result<Vec<ProductListItem>, StoreError>;
    async fn insert_product(&self, item: &ProductListItem) -> Result<(), StoreError>;
    /// Returns `false` when no item with that id belongs to the pharmacy.
    async fn delete_product(&self, pharmacy_id: Uuid, item_id: Uuid) -> Result<bool, StoreError>;

    async fn list_distributors(&self) -> Result<Vec<Distributor>, StoreError>;
    async fn observations_for(&self, ndcs: &[String]) -> Result<Vec<PriceObservation>, StoreError>;
    /// Distinct distributors on the pharmacy's credit reports dated in
    /// `[from, until)`.
    async fn distributors_used_between(
        &self,
        pharmacy_id: Uuid,
        from: NaiveDate,
        until: NaiveDate,
    ) -> Result<Vec<Uuid>, StoreError>;
    async fn subscription(&self, pharmacy_id: Uuid) -> Result<Option<Subscription>, StoreError>;

    /// Stores a credit report with its lines and appends the derived price
    /// observations atomically.
    async fn record_credit_report(
        &self,
        report: &CreditReport,
        lines: &[CreditReportLine],
        observations: &[PriceObservation],
    ) -> Result<(), StoreError>;
    async fn credited_lines_since(
        &self,
        pharmacy_id: Uuid,
        since: NaiveDate,
    ) -> Result<Vec<CreditedLine>, StoreError>;
}

pub async fn build_store(config: &Config) -> anyhow::Result<Arc<dyn ReturnsStore>> {
    match config.store.provider.as_str() {
        "postgres" => {
            let pool = db::connect(&config.database).await?;
            db::run_migrations(&pool).await?;
            info!("database migrations completed successfully");
            Ok(Arc::new(PgStore::new(pool)))
        }
        "memory" => Ok(Arc::new(MemoryStore::default())),
        other => anyhow::bail!("unsupported store provider: {other}"),
    }
}
