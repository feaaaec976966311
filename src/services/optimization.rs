//! Builds distributor recommendations for the caller's pharmacy.
//!
//! Backing service for `GET /api/optimization`. All reads happen up front;
//! the allocation itself is the pure [`optimize`] function.

use std::{collections::BTreeSet, sync::Arc};

use chrono::Utc;
use tracing::{debug, info};

use crate::{
    domain::{
        earnings::{first_day_of_month, next_month_start},
        models::SubscriptionPlan,
        optimizer::{optimize, MarketSnapshot, OptimizationReport, UsageContext},
    },
    infrastructure::{auth::AuthenticatedUser, state::AppState},
};

use super::errors::ServiceError;

pub struct OptimizationService {
    state: Arc<AppState>,
}

impl OptimizationService {
    pub fn new(state: Arc<AppState>) -> Self {
        Self { state }
    }

    /// Recommends a reverse distributor for every product-list line that has
    /// price history. Never writes.
    ///
    /// An empty product list, or one without any priced NDC, yields an empty
    /// report rather than an error. Store failures surface as
    /// `ServiceError::Internal`.
    pub async fn recommend(
        &self,
        actor: &AuthenticatedUser,
    ) -> Result<OptimizationReport, ServiceError> {
        let store = &self.state.store;
        let now = Utc::now();
        let month_start = first_day_of_month(now.date_naive());
        let month_end = next_month_start(month_start);

        let items = store.list_products(actor.pharmacy_id).await?;
        let ndcs: Vec<String> = items
            .iter()
            .filter(|item| item.quantity > 0)
            .map(|item| item.ndc.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let (observations, distributors, used, subscription) = futures::try_join!(
            store.observations_for(&ndcs),
            store.list_distributors(),
            store.distributors_used_between(actor.pharmacy_id, month_start, month_end),
            store.subscription(actor.pharmacy_id),
        )?;

        let plan = subscription
            .map(|subscription| subscription.effective_plan())
            .unwrap_or(SubscriptionPlan::Free);
        let usage = UsageContext {
            used_this_month: used.into_iter().collect(),
            monthly_cap: self.state.config.plans.monthly_cap(plan),
        };
        debug!(
            pharmacy_id = %actor.pharmacy_id,
            items = items.len(),
            observations = observations.len(),
            plan = plan.as_str(),
            "loaded optimization inputs"
        );

        let market = MarketSnapshot {
            observations: &observations,
            distributors: &distributors,
        };
        let report = optimize(
            &items,
            &market,
            &usage,
            &self.state.optimizer_settings(),
            now,
        );

        info!(
            pharmacy_id = %actor.pharmacy_id,
            recommendations = report.recommendations.len(),
            total_potential_savings = report.total_potential_savings,
            "generated distributor recommendations"
        );

        Ok(report)
    }
}
