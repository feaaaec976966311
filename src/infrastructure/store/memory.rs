use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;
use chrono::NaiveDate;
use parking_lot::RwLock;
use uuid::Uuid;

use crate::domain::models::{
    CreditReport, CreditReportLine, CreditedLine, Distributor, PharmacyUser, PriceObservation,
    ProductListItem, Subscription,
};

use super::{ReturnsStore, StoreError};

/// In-process store for local runs and tests. Not durable.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

#[derive(Default)]
struct Tables {
    users: Vec<PharmacyUser>,
    products: Vec<ProductListItem>,
    distributors: Vec<Distributor>,
    observations: Vec<PriceObservation>,
    subscriptions: HashMap<Uuid, Subscription>,
    credit_reports: Vec<CreditReport>,
    credit_lines: Vec<CreditReportLine>,
}

impl MemoryStore {
    pub fn seed_user(&self, user: PharmacyUser) {
        self.tables.write().users.push(user);
    }

    pub fn seed_distributor(&self, distributor: Distributor) {
        self.tables.write().distributors.push(distributor);
    }

    pub fn seed_subscription(&self, subscription: Subscription) {
        self.tables
            .write()
            .subscriptions
            .insert(subscription.pharmacy_id, subscription);
    }

    pub fn seed_observation(&self, observation: PriceObservation) {
        self.tables.write().observations.push(observation);
    }
}

#[async_trait]
impl ReturnsStore for MemoryStore {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<PharmacyUser>, StoreError> {
        Ok(self
            .tables
            .read()
            .users
            .iter()
            .find(|user| user.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn list_products(&self, pharmacy_id: Uuid) -> Result<Vec<ProductListItem>, StoreError> {
        let mut items: Vec<ProductListItem> = self
            .tables
            .read()
            .products
            .iter()
            .filter(|item| item.pharmacy_id == pharmacy_id)
            .cloned()
            .collect();
        items.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(items)
    }

    async fn insert_product(&self, item: &ProductListItem) -> Result<(), StoreError> {
        let mut tables = self.tables.write();
        if tables.products.iter().any(|existing| existing.id == item.id) {
            return Err(StoreError::Duplicate("product list item".into()));
        }
        tables.products.push(item.clone());
        Ok(())
    }

    async fn delete_product(&self, pharmacy_id: Uuid, item_id: Uuid) -> Result<bool, StoreError> {
        let mut tables = self.tables.write();
        let before = tables.products.len();
        tables
            .products
            .retain(|item| !(item.id == item_id && item.pharmacy_id == pharmacy_id));
        Ok(tables.products.len() != before)
    }

    async fn list_distributors(&self) -> Result<Vec<Distributor>, StoreError> {
        let mut distributors = self.tables.read().distributors.clone();
        distributors.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(distributors)
    }

    async fn observations_for(&self, ndcs: &[String]) -> Result<Vec<PriceObservation>, StoreError> {
        Ok(self
            .tables
            .read()
            .observations
            .iter()
            .filter(|observation| ndcs.contains(&observation.ndc))
            .cloned()
            .collect())
    }

    async fn distributors_used_between(
        &self,
        pharmacy_id: Uuid,
        from: NaiveDate,
        until: NaiveDate,
    ) -> Result<Vec<Uuid>, StoreError> {
        let used: BTreeSet<Uuid> = self
            .tables
            .read()
            .credit_reports
            .iter()
            .filter(|report| {
                report.pharmacy_id == pharmacy_id
                    && report.report_date >= from
                    && report.report_date < until
            })
            .map(|report| report.distributor_id)
            .collect();
        Ok(used.into_iter().collect())
    }

    async fn subscription(&self, pharmacy_id: Uuid) -> Result<Option<Subscription>, StoreError> {
        Ok(self.tables.read().subscriptions.get(&pharmacy_id).cloned())
    }

    async fn record_credit_report(
        &self,
        report: &CreditReport,
        lines: &[CreditReportLine],
        observations: &[PriceObservation],
    ) -> Result<(), StoreError> {
        let mut tables = self.tables.write();
        if tables.credit_reports.iter().any(|existing| existing.id == report.id) {
            return Err(StoreError::Duplicate("credit report".into()));
        }
        tables.credit_reports.push(report.clone());
        tables.credit_lines.extend_from_slice(lines);
        tables.observations.extend_from_slice(observations);
        Ok(())
    }

    async fn credited_lines_since(
        &self,
        pharmacy_id: Uuid,
        since: NaiveDate,
    ) -> Result<Vec<CreditedLine>, StoreError> {
        let tables = self.tables.read();
        let reports: HashMap<Uuid, &CreditReport> = tables
            .credit_reports
            .iter()
            .filter(|report| report.pharmacy_id == pharmacy_id && report.report_date >= since)
            .map(|report| (report.id, report))
            .collect();

        Ok(tables
            .credit_lines
            .iter()
            .filter_map(|line| {
                reports.get(&line.report_id).map(|report| CreditedLine {
                    distributor_id: report.distributor_id,
                    report_date: report.report_date,
                    quantity: line.quantity,
                    unit_price: line.unit_price,
                })
            })
            .collect())
    }
}
