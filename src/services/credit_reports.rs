//! Ingests credit reports that have already been parsed into line items.
//!
//! Each accepted line also becomes a [`PriceObservation`] stamped with the
//! report date, which is how the price history behind the optimizer grows.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::{
    domain::models::{CreditReport, CreditReportLine, PriceObservation, Role},
    infrastructure::{auth::AuthenticatedUser, state::AppState},
    validation::rules::{check, normalize_ndc, validate_ndc},
};

use super::errors::ServiceError;

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreditReportRequest {
    pub distributor_id: Uuid,
    pub report_date: NaiveDate,
    #[validate(length(min = 1, max = 1000))]
    pub items: Vec<CreditLineRequest>,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreditLineRequest {
    #[validate(custom = "validate_ndc")]
    pub ndc: String,
    #[validate(length(max = 200))]
    pub product_name: Option<String>,
    #[validate(range(min = 1))]
    pub quantity: i32,
    #[validate(range(min = 0.0))]
    pub unit_price: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreditReportReceipt {
    pub report: CreditReport,
    pub lines_recorded: usize,
    pub total_credit: f64,
}

pub struct CreditReportService {
    pub state: Arc<AppState>,
}

impl CreditReportService {
    pub fn new(state: Arc<AppState>) -> Self {
        Self { state }
    }

    /// Only owners and admins may record credit; staff manage product lists.
    pub async fn ingest(
        &self,
        actor: &AuthenticatedUser,
        payload: CreditReportRequest,
    ) -> Result<CreditReportReceipt, ServiceError> {
        actor.ensure_role(&[Role::Owner, Role::Admin])?;
        check(&payload)?;
        for line in &payload.items {
            check(line)?;
        }
        if payload.report_date > Utc::now().date_naive() {
            return Err(ServiceError::Validation(
                "report_date: must not be in the future".into(),
            ));
        }

        let distributors = self.state.store.list_distributors().await?;
        let known = distributors
            .iter()
            .any(|distributor| distributor.id == payload.distributor_id);
        if !known {
            return Err(ServiceError::Validation("distributor_id: unknown distributor".into()));
        }

        let report = CreditReport {
            id: Uuid::new_v4(),
            pharmacy_id: actor.pharmacy_id,
            distributor_id: payload.distributor_id,
            report_date: payload.report_date,
            created_at: Utc::now(),
        };
        let observed_at = payload.report_date.and_time(chrono::NaiveTime::MIN).and_utc();

        let mut lines = Vec::with_capacity(payload.items.len());
        let mut observations = Vec::with_capacity(payload.items.len());
        for item in payload.items {
            let ndc = normalize_ndc(&item.ndc)
                .ok_or_else(|| ServiceError::Validation("ndc: ndc_format".into()))?;
            observations.push(PriceObservation {
                ndc: ndc.clone(),
                distributor_id: report.distributor_id,
                unit_price: item.unit_price,
                observed_at,
            });
            lines.push(CreditReportLine {
                id: Uuid::new_v4(),
                report_id: report.id,
                ndc,
                product_name: item.product_name,
                quantity: item.quantity,
                unit_price: item.unit_price,
            });
        }

        self.state
            .store
            .record_credit_report(&report, &lines, &observations)
            .await?;

        let total_credit = lines
            .iter()
            .map(|line| f64::from(line.quantity) * line.unit_price)
            .sum();
        info!(
            pharmacy_id = %actor.pharmacy_id,
            report_id = %report.id,
            lines = lines.len(),
            "credit report recorded"
        );

        Ok(CreditReportReceipt {
            report,
            lines_recorded: lines.len(),
            total_credit,
        })
    }
}
