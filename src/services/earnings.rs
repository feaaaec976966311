use std::sync::Arc;

use chrono::Utc;
use serde::Deserialize;

use crate::{
    domain::earnings::{aggregate_earnings, months_back, EarningsHistory},
    infrastructure::{auth::AuthenticatedUser, state::AppState},
};

use super::errors::ServiceError;

pub const DEFAULT_MONTHS: u32 = 12;
pub const MAX_MONTHS: u32 = 24;

#[derive(Debug, Deserialize, Default)]
pub struct EarningsQuery {
    pub months: Option<u32>,
}

pub struct EarningsService {
    pub state: Arc<AppState>,
}

impl EarningsService {
    pub fn new(state: Arc<AppState>) -> Self {
        Self { state }
    }

    /// Credit received per month and distributor over the trailing window.
    pub async fn history(
        &self,
        actor: &AuthenticatedUser,
        query: EarningsQuery,
    ) -> Result<EarningsHistory, ServiceError> {
        let months = query.months.unwrap_or(DEFAULT_MONTHS);
        if !(1..=MAX_MONTHS).contains(&months) {
            return Err(ServiceError::Validation(format!(
                "months: must be between 1 and {MAX_MONTHS}"
            )));
        }

        let today = Utc::now().date_naive();
        let since = months_back(today, months - 1);
        let (lines, distributors) = futures::try_join!(
            self.state.store.credited_lines_since(actor.pharmacy_id, since),
            self.state.store.list_distributors(),
        )?;

        Ok(aggregate_earnings(&lines, &distributors, months, today))
    }
}
