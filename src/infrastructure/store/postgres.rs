use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::{postgres::PgRow, FromRow, Row};
use uuid::Uuid;

use crate::{
    domain::models::{
        CreditReport, CreditReportLine, CreditedLine, Distributor, PharmacyUser,
        PriceObservation, ProductListItem, Subscription, SubscriptionPlan,
    },
    infrastructure::db::PgPool,
};

use super::{ReturnsStore, StoreError};

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ReturnsStore for PgStore {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<PharmacyUser>, StoreError> {
        let user = sqlx::query_as::<_, PharmacyUser>(
            r#"
            SELECT id, pharmacy_id, email, role, created_at
            FROM pharmacy_users
            WHERE lower(email) = lower($1)
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn list_products(&self, pharmacy_id: Uuid) -> Result<Vec<ProductListItem>, StoreError> {
        let items = sqlx::query_as::<_, ProductListItem>(
            r#"
            SELECT id, pharmacy_id, ndc, product_name, quantity, lot_number, expiration_date, created_at
            FROM product_list_items
            WHERE pharmacy_id = $1
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(pharmacy_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(items)
    }

    async fn insert_product(&self, item: &ProductListItem) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO product_list_items (id, pharmacy_id, ndc, product_name, quantity, lot_number, expiration_date, created_at)
             VALUES ($1,$2,$3,$4,$5,$6,$7,$8)",
        )
        .bind(item.id)
        .bind(item.pharmacy_id)
        .bind(&item.ndc)
        .bind(&item.product_name)
        .bind(item.quantity)
        .bind(&item.lot_number)
        .bind(item.expiration_date)
        .bind(item.created_at)
        .execute(&self.pool)
        .await
        .map_err(|err| map_unique_violation(err, "product list item"))?;
        Ok(())
    }

    async fn delete_product(&self, pharmacy_id: Uuid, item_id: Uuid) -> Result<bool, StoreError> {
        let result =
            sqlx::query("DELETE FROM product_list_items WHERE id = $1 AND pharmacy_id = $2")
                .bind(item_id)
                .bind(pharmacy_id)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_distributors(&self) -> Result<Vec<Distributor>, StoreError> {
        let distributors = sqlx::query_as::<_, Distributor>(
            "SELECT id, name, active FROM distributors ORDER BY name ASC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(distributors)
    }

    async fn observations_for(&self, ndcs: &[String]) -> Result<Vec<PriceObservation>, StoreError> {
        if ndcs.is_empty() {
            return Ok(Vec::new());
        }
        let observations = sqlx::query_as::<_, PriceObservation>(
            r#"
            SELECT ndc, distributor_id, unit_price, observed_at
            FROM price_observations
            WHERE ndc = ANY($1)
            "#,
        )
        .bind(ndcs)
        .fetch_all(&self.pool)
        .await?;
        Ok(observations)
    }

    async fn distributors_used_between(
        &self,
        pharmacy_id: Uuid,
        from: NaiveDate,
        until: NaiveDate,
    ) -> Result<Vec<Uuid>, StoreError> {
        let used = sqlx::query_scalar::<_, Uuid>(
            r#"
            SELECT DISTINCT distributor_id
            FROM credit_reports
            WHERE pharmacy_id = $1 AND report_date >= $2 AND report_date < $3
            "#,
        )
        .bind(pharmacy_id)
        .bind(from)
        .bind(until)
        .fetch_all(&self.pool)
        .await?;
        Ok(used)
    }

    async fn subscription(&self, pharmacy_id: Uuid) -> Result<Option<Subscription>, StoreError> {
        let row = sqlx::query("SELECT pharmacy_id, plan, status FROM subscriptions WHERE pharmacy_id = $1")
            .bind(pharmacy_id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(map_subscription).transpose()
    }

    async fn record_credit_report(
        &self,
        report: &CreditReport,
        lines: &[CreditReportLine],
        observations: &[PriceObservation],
    ) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO credit_reports (id, pharmacy_id, distributor_id, report_date, created_at)
             VALUES ($1,$2,$3,$4,$5)",
        )
        .bind(report.id)
        .bind(report.pharmacy_id)
        .bind(report.distributor_id)
        .bind(report.report_date)
        .bind(report.created_at)
        .execute(&mut *tx)
        .await
        .map_err(|err| map_unique_violation(err, "credit report"))?;

        for line in lines {
            sqlx::query(
                "INSERT INTO credit_report_lines (id, report_id, ndc, product_name, quantity, unit_price)
                 VALUES ($1,$2,$3,$4,$5,$6)",
            )
            .bind(line.id)
            .bind(line.report_id)
            .bind(&line.ndc)
            .bind(&line.product_name)
            .bind(line.quantity)
            .bind(line.unit_price)
            .execute(&mut *tx)
            .await?;
        }

        for observation in observations {
            sqlx::query(
                "INSERT INTO price_observations (ndc, distributor_id, unit_price, observed_at)
                 VALUES ($1,$2,$3,$4)",
            )
            .bind(&observation.ndc)
            .bind(observation.distributor_id)
            .bind(observation.unit_price)
            .bind(observation.observed_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn credited_lines_since(
        &self,
        pharmacy_id: Uuid,
        since: NaiveDate,
    ) -> Result<Vec<CreditedLine>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT r.distributor_id, r.report_date, l.quantity, l.unit_price
            FROM credit_report_lines l
            JOIN credit_reports r ON r.id = l.report_id
            WHERE r.pharmacy_id = $1 AND r.report_date >= $2
            ORDER BY r.report_date ASC
            "#,
        )
        .bind(pharmacy_id)
        .bind(since)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| CreditedLine::from_row(row).map_err(StoreError::from))
            .collect()
    }
}

fn map_subscription(row: PgRow) -> Result<Subscription, StoreError> {
    let plan = row
        .try_get::<String, _>("plan")?
        .parse::<SubscriptionPlan>()
        .map_err(|err| StoreError::Corrupt(err.to_string()))?;
    Ok(Subscription {
        pharmacy_id: row.try_get("pharmacy_id")?,
        plan,
        status: row.try_get("status")?,
    })
}

fn map_unique_violation(err: sqlx::Error, entity: &str) -> StoreError {
    match &err {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
            StoreError::Duplicate(entity.to_string())
        }
        _ => StoreError::Database(err),
    }
}
