use std::collections::{BTreeMap, HashMap};

use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use uuid::Uuid;

use crate::domain::models::{CreditedLine, Distributor};

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EarningsHistory {
    pub months: Vec<MonthlyEarnings>,
    pub total_earnings: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyEarnings {
    /// `YYYY-MM`
    pub month: String,
    pub total: f64,
    pub by_distributor: Vec<DistributorEarnings>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DistributorEarnings {
    pub distributor: String,
    pub amount: f64,
}

pub fn first_day_of_month(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

/// First day of the month `months` calendar months before `date`'s month.
pub fn months_back(date: NaiveDate, months: u32) -> NaiveDate {
    shift_months(date, -(months as i32))
}

/// First day of the month following `date`'s month.
pub fn next_month_start(date: NaiveDate) -> NaiveDate {
    shift_months(date, 1)
}

fn shift_months(date: NaiveDate, delta: i32) -> NaiveDate {
    let index = date.year() * 12 + date.month0() as i32 + delta;
    let year = index.div_euclid(12);
    let month = index.rem_euclid(12) as u32 + 1;
    NaiveDate::from_ymd_opt(year, month, 1).unwrap_or_else(|| first_day_of_month(date))
}

/// Monthly credit totals for the `months` calendar months ending with the
/// month of `today`, oldest first. Months without credit are reported as
/// zero so charts get a continuous series.
pub fn aggregate_earnings(
    lines: &[CreditedLine],
    distributors: &[Distributor],
    months: u32,
    today: NaiveDate,
) -> EarningsHistory {
    let months = months.max(1);
    let start = months_back(today, months - 1);
    let end = first_day_of_month(today);

    let names: HashMap<Uuid, &str> = distributors
        .iter()
        .map(|distributor| (distributor.id, distributor.name.as_str()))
        .collect();

    let mut buckets: BTreeMap<NaiveDate, BTreeMap<String, f64>> = BTreeMap::new();
    for offset in 0..months {
        buckets.insert(months_back(today, offset), BTreeMap::new());
    }

    for line in lines {
        let month = first_day_of_month(line.report_date);
        if month < start || month > end {
            continue;
        }
        let name = names
            .get(&line.distributor_id)
            .map(|name| name.to_string())
            .unwrap_or_else(|| line.distributor_id.to_string());
        *buckets.entry(month).or_default().entry(name).or_default() +=
            f64::from(line.quantity) * line.unit_price;
    }

    let months: Vec<MonthlyEarnings> = buckets
        .into_iter()
        .map(|(month, per_distributor)| {
            let total = per_distributor.values().sum();
            MonthlyEarnings {
                month: month.format("%Y-%m").to_string(),
                total,
                by_distributor: per_distributor
                    .into_iter()
                    .map(|(distributor, amount)| DistributorEarnings {
                        distributor,
                        amount,
                    })
                    .collect(),
            }
        })
        .collect();

    let total_earnings = months.iter().map(|month| month.total).sum();

    EarningsHistory {
        months,
        total_earnings,
    }
}
