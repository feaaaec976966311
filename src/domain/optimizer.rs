//! Reverse-distributor recommendation allocator.
//!
//! For every line of a pharmacy's product list the allocator ranks the
//! distributors that have quoted the NDC, picks the cheapest one with fresh
//! data and reports how much the pharmacy saves against the worst quote.
//! It also compares two portfolio strategies: shipping everything to one
//! distributor versus splitting lines across distributors while honouring
//! the plan's monthly distributor allowance.
//!
//! Staleness policy: a candidate whose latest observation is older than the
//! configured window is flagged `available = false`. Stale candidates stay
//! in `alternative_distributors`, but while any fresh candidate exists they
//! neither win the recommendation nor count toward `worst_price`. When every
//! candidate is stale the cheapest one is recommended and the whole set is
//! used for the price comparison.
//!
//! The module performs no I/O; callers load both snapshots beforehand.

use std::{
    cmp::Ordering,
    collections::{HashMap, HashSet},
};

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::domain::models::{Distributor, PriceObservation, ProductListItem};

pub const DEFAULT_STALE_AFTER_DAYS: i64 = 30;

#[derive(Debug, Clone, Copy)]
pub struct OptimizerSettings {
    pub stale_after: Duration,
}

impl Default for OptimizerSettings {
    fn default() -> Self {
        Self {
            stale_after: Duration::days(DEFAULT_STALE_AFTER_DAYS),
        }
    }
}

/// Read-only market data the allocator runs against.
#[derive(Debug, Clone, Copy)]
pub struct MarketSnapshot<'a> {
    pub observations: &'a [PriceObservation],
    pub distributors: &'a [Distributor],
}

/// Monthly distributor usage of the pharmacy being optimized.
#[derive(Debug, Clone, Default)]
pub struct UsageContext {
    /// Distinct distributors already shipped to this calendar month.
    pub used_this_month: HashSet<Uuid>,
    /// Plan allowance of distinct distributors per month; `None` is unlimited.
    pub monthly_cap: Option<u32>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OptimizationReport {
    pub recommendations: Vec<Recommendation>,
    pub total_potential_savings: f64,
    pub generated_at: DateTime<Utc>,
    pub distributor_usage: DistributorUsage,
    pub earnings_comparison: EarningsComparison,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Recommendation {
    pub ndc: String,
    pub product_name: String,
    pub quantity: i32,
    pub recommended_distributor: String,
    pub expected_price: f64,
    pub worst_price: f64,
    pub available: bool,
    pub alternative_distributors: Vec<AlternativeDistributor>,
    pub savings: f64,
}

/// Another distributor quoting the same NDC. `difference` is this
/// distributor's unit price minus the recommended unit price.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AlternativeDistributor {
    pub name: String,
    pub price: f64,
    pub difference: f64,
    pub available: bool,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DistributorUsage {
    pub used_this_month: u32,
    pub total_distributors: u32,
    pub still_available: u32,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EarningsComparison {
    pub single_distributor_strategy: f64,
    pub multiple_distributors_strategy: f64,
    pub potential_additional_earnings: f64,
}

#[derive(Debug, Clone)]
struct Candidate {
    distributor_id: Uuid,
    name: String,
    price: f64,
    observed_at: DateTime<Utc>,
    available: bool,
}

/// Per-line state kept for the strategy comparison.
struct LineAllocation<'a> {
    quantity: f64,
    worst_price: f64,
    savings: f64,
    recommended: Uuid,
    /// Comparison pool: fresh candidates when any exist, by ascending price.
    preference: Vec<&'a Candidate>,
}

impl LineAllocation<'_> {
    fn quoted_price(&self, distributor_id: Uuid) -> Option<f64> {
        self.preference
            .iter()
            .find(|candidate| candidate.distributor_id == distributor_id)
            .map(|candidate| candidate.price)
    }
}

pub fn optimize(
    items: &[ProductListItem],
    market: &MarketSnapshot<'_>,
    usage: &UsageContext,
    settings: &OptimizerSettings,
    now: DateTime<Utc>,
) -> OptimizationReport {
    let distributor_usage = distributor_usage(market.distributors, usage);
    let candidates = rank_candidates(market, settings, now);

    let mut recommendations = Vec::new();
    let mut lines = Vec::new();

    for item in items.iter().filter(|item| item.quantity > 0) {
        let Some(ranked) = candidates.get(item.ndc.as_str()) else {
            continue;
        };
        let Some(chosen) = ranked
            .iter()
            .find(|candidate| candidate.available)
            .or_else(|| ranked.first())
        else {
            continue;
        };

        let any_available = ranked.iter().any(|candidate| candidate.available);
        let worst_price = ranked
            .iter()
            .filter(|candidate| candidate.available || !any_available)
            .map(|candidate| candidate.price)
            .fold(chosen.price, f64::max);

        let quantity = f64::from(item.quantity);
        let savings = (worst_price - chosen.price) * quantity;

        let alternative_distributors = ranked
            .iter()
            .filter(|candidate| candidate.distributor_id != chosen.distributor_id)
            .map(|candidate| AlternativeDistributor {
                name: candidate.name.clone(),
                price: candidate.price,
                difference: candidate.price - chosen.price,
                available: candidate.available,
            })
            .collect();

        let preference: Vec<&Candidate> = ranked
            .iter()
            .filter(|candidate| candidate.available || !any_available)
            .collect();

        lines.push(LineAllocation {
            quantity,
            worst_price,
            savings,
            recommended: chosen.distributor_id,
            preference,
        });

        recommendations.push(Recommendation {
            ndc: item.ndc.clone(),
            product_name: item.product_name.clone(),
            quantity: item.quantity,
            recommended_distributor: chosen.name.clone(),
            expected_price: chosen.price,
            worst_price,
            available: chosen.available,
            alternative_distributors,
            savings,
        });
    }

    let total_potential_savings = recommendations.iter().map(|rec| rec.savings).sum();
    let earnings_comparison = compare_strategies(&lines, usage, distributor_usage.still_available);

    OptimizationReport {
        recommendations,
        total_potential_savings,
        generated_at: now,
        distributor_usage,
        earnings_comparison,
    }
}

/// Latest quote per (NDC, distributor), ranked by ascending unit price.
fn rank_candidates(
    market: &MarketSnapshot<'_>,
    settings: &OptimizerSettings,
    now: DateTime<Utc>,
) -> HashMap<String, Vec<Candidate>> {
    let directory: HashMap<Uuid, &Distributor> = market
        .distributors
        .iter()
        .map(|distributor| (distributor.id, distributor))
        .collect();

    let mut latest: HashMap<(&str, Uuid), &PriceObservation> = HashMap::new();
    for observation in market.observations {
        if directory
            .get(&observation.distributor_id)
            .is_some_and(|distributor| !distributor.active)
        {
            continue;
        }
        latest
            .entry((observation.ndc.as_str(), observation.distributor_id))
            .and_modify(|current| {
                if observation.observed_at > current.observed_at {
                    *current = observation;
                }
            })
            .or_insert(observation);
    }

    let mut grouped: HashMap<String, Vec<Candidate>> = HashMap::new();
    for ((ndc, distributor_id), observation) in latest {
        let name = directory
            .get(&distributor_id)
            .map(|distributor| distributor.name.clone())
            .unwrap_or_else(|| distributor_id.to_string());
        grouped.entry(ndc.to_string()).or_default().push(Candidate {
            distributor_id,
            name,
            price: observation.unit_price,
            observed_at: observation.observed_at,
            available: now - observation.observed_at <= settings.stale_after,
        });
    }

    for ranked in grouped.values_mut() {
        ranked.sort_by(|a, b| {
            a.price
                .total_cmp(&b.price)
                .then_with(|| a.name.cmp(&b.name))
                .then_with(|| b.observed_at.cmp(&a.observed_at))
        });
    }

    grouped
}

fn distributor_usage(distributors: &[Distributor], usage: &UsageContext) -> DistributorUsage {
    let total = distributors.iter().filter(|d| d.active).count() as u32;
    let used = usage.used_this_month.len() as u32;
    let limit = usage.monthly_cap.map_or(total, |cap| cap.min(total));
    DistributorUsage {
        used_this_month: used,
        total_distributors: total,
        still_available: limit.saturating_sub(used),
    }
}

fn compare_strategies(
    lines: &[LineAllocation<'_>],
    usage: &UsageContext,
    still_available: u32,
) -> EarningsComparison {
    let single = single_distributor_total(lines);
    let multiple = multiple_distributor_total(lines, usage, still_available);
    EarningsComparison {
        single_distributor_strategy: single,
        multiple_distributors_strategy: multiple,
        potential_additional_earnings: (single - multiple).max(0.0),
    }
}

/// Everything goes to the distributor recommended for the most lines; lines
/// it does not quote are valued at their worst price.
fn single_distributor_total(lines: &[LineAllocation<'_>]) -> f64 {
    let mut wins: HashMap<Uuid, usize> = HashMap::new();
    for line in lines {
        *wins.entry(line.recommended).or_default() += 1;
    }

    let total_for = |distributor_id: Uuid| -> f64 {
        lines
            .iter()
            .map(|line| {
                line.quoted_price(distributor_id)
                    .unwrap_or(line.worst_price)
                    * line.quantity
            })
            .sum()
    };

    wins.into_iter()
        .map(|(distributor_id, count)| (count, total_for(distributor_id)))
        .min_by(|(count_a, total_a), (count_b, total_b)| {
            count_b
                .cmp(count_a)
                .then_with(|| total_a.partial_cmp(total_b).unwrap_or(Ordering::Equal))
        })
        .map_or(0.0, |(_, total)| total)
}

/// Greedy split: lines with the largest savings claim distributors first.
/// Distributors already used this month are free; new ones consume the
/// remaining monthly allowance.
fn multiple_distributor_total(
    lines: &[LineAllocation<'_>],
    usage: &UsageContext,
    still_available: u32,
) -> f64 {
    let mut order: Vec<&LineAllocation<'_>> = lines.iter().collect();
    order.sort_by(|a, b| b.savings.total_cmp(&a.savings));

    let mut allowed = usage.used_this_month.clone();
    let mut added = 0_u32;
    let mut total = 0.0;

    for line in order {
        let mut price = line.worst_price;
        for candidate in &line.preference {
            if allowed.contains(&candidate.distributor_id) {
                price = candidate.price;
                break;
            }
            if added < still_available {
                allowed.insert(candidate.distributor_id);
                added += 1;
                price = candidate.price;
                break;
            }
        }
        total += price * line.quantity;
    }

    total
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f64 = 1e-9;

    fn distributor(name: &str) -> Distributor {
        Distributor {
            id: Uuid::new_v4(),
            name: name.to_string(),
            active: true,
        }
    }

    fn item(ndc: &str, quantity: i32) -> ProductListItem {
        ProductListItem {
            id: Uuid::new_v4(),
            pharmacy_id: Uuid::new_v4(),
            ndc: ndc.to_string(),
            product_name: format!("Product {ndc}"),
            quantity,
            lot_number: None,
            expiration_date: None,
            created_at: Utc::now(),
        }
    }

    fn observation(
        ndc: &str,
        distributor: &Distributor,
        price: f64,
        age_days: i64,
        now: DateTime<Utc>,
    ) -> PriceObservation {
        PriceObservation {
            ndc: ndc.to_string(),
            distributor_id: distributor.id,
            unit_price: price,
            observed_at: now - Duration::days(age_days),
        }
    }

    fn run(
        items: &[ProductListItem],
        observations: &[PriceObservation],
        distributors: &[Distributor],
        usage: &UsageContext,
        now: DateTime<Utc>,
    ) -> OptimizationReport {
        let market = MarketSnapshot {
            observations,
            distributors,
        };
        optimize(items, &market, usage, &OptimizerSettings::default(), now)
    }

    #[test]
    fn empty_product_list_yields_empty_report() {
        let now = Utc::now();
        let a = distributor("A");
        let observations = vec![observation("X", &a, 1.0, 1, now)];

        let report = run(&[], &observations, &[a], &UsageContext::default(), now);

        assert!(report.recommendations.is_empty());
        assert_eq!(report.total_potential_savings, 0.0);
        assert_eq!(report.earnings_comparison.single_distributor_strategy, 0.0);
        assert_eq!(report.earnings_comparison.potential_additional_earnings, 0.0);
        assert_eq!(report.generated_at, now);
    }

    #[test]
    fn ndc_without_observations_is_omitted() {
        let now = Utc::now();
        let a = distributor("A");
        let observations = vec![observation("X", &a, 1.0, 1, now)];
        let items = vec![item("X", 2), item("Y", 5)];

        let report = run(&items, &observations, &[a], &UsageContext::default(), now);

        assert_eq!(report.recommendations.len(), 1);
        assert_eq!(report.recommendations[0].ndc, "X");
    }

    #[test]
    fn zero_quantity_lines_are_skipped() {
        let now = Utc::now();
        let a = distributor("A");
        let observations = vec![observation("X", &a, 1.0, 1, now)];

        let report = run(&[item("X", 0)], &observations, &[a], &UsageContext::default(), now);

        assert!(report.recommendations.is_empty());
    }

    #[test]
    fn single_observation_has_no_savings() {
        let now = Utc::now();
        let a = distributor("A");
        let observations = vec![observation("X", &a, 2.5, 3, now)];

        let report = run(&[item("X", 4)], &observations, &[a], &UsageContext::default(), now);

        let rec = &report.recommendations[0];
        assert_eq!(rec.expected_price, 2.5);
        assert_eq!(rec.worst_price, 2.5);
        assert_eq!(rec.savings, 0.0);
        assert!(rec.available);
        assert!(rec.alternative_distributors.is_empty());
    }

    #[test]
    fn picks_cheapest_fresh_distributor_and_computes_savings() {
        let now = Utc::now();
        let a = distributor("A");
        let b = distributor("B");
        let c = distributor("C");
        let observations = vec![
            observation("X", &a, 1.50, 2, now),
            observation("X", &b, 1.20, 4, now),
            observation("X", &c, 2.00, 10, now),
        ];

        let report = run(
            &[item("X", 10)],
            &observations,
            &[a, b, c],
            &UsageContext::default(),
            now,
        );

        let rec = &report.recommendations[0];
        assert_eq!(rec.recommended_distributor, "B");
        assert!((rec.expected_price - 1.20).abs() < EPSILON);
        assert!((rec.worst_price - 2.00).abs() < EPSILON);
        assert!((rec.savings - 8.0).abs() < EPSILON);
        assert_eq!(
            rec.alternative_distributors
                .iter()
                .map(|alt| alt.name.as_str())
                .collect::<Vec<_>>(),
            vec!["A", "C"]
        );
        assert!((rec.alternative_distributors[0].difference - 0.30).abs() < EPSILON);
    }

    #[test]
    fn stale_cheaper_quote_is_flagged_but_not_preferred() {
        let now = Utc::now();
        let a = distributor("A");
        let b = distributor("B");
        let observations = vec![
            observation("X", &a, 1.00, 5, now),
            observation("X", &b, 0.80, 40, now),
        ];

        let report = run(&[item("X", 10)], &observations, &[a, b], &UsageContext::default(), now);

        let rec = &report.recommendations[0];
        assert_eq!(rec.recommended_distributor, "A");
        assert!(rec.available);
        assert_eq!(rec.expected_price, 1.00);
        assert_eq!(rec.worst_price, 1.00);
        assert_eq!(rec.savings, 0.0);
        assert_eq!(rec.alternative_distributors.len(), 1);
        let stale = &rec.alternative_distributors[0];
        assert_eq!(stale.name, "B");
        assert!(!stale.available);
        assert!((stale.difference + 0.20).abs() < EPSILON);
    }

    #[test]
    fn all_stale_falls_back_to_cheapest_and_flags_unavailable() {
        let now = Utc::now();
        let a = distributor("A");
        let b = distributor("B");
        let observations = vec![
            observation("X", &a, 1.00, 45, now),
            observation("X", &b, 0.80, 60, now),
        ];

        let report = run(&[item("X", 5)], &observations, &[a, b], &UsageContext::default(), now);

        let rec = &report.recommendations[0];
        assert_eq!(rec.recommended_distributor, "B");
        assert!(!rec.available);
        assert!((rec.worst_price - 1.00).abs() < EPSILON);
        assert!((rec.savings - 1.0).abs() < EPSILON);
    }

    #[test]
    fn latest_observation_per_distributor_sets_price() {
        let now = Utc::now();
        let a = distributor("A");
        let observations = vec![
            observation("X", &a, 0.50, 90, now),
            observation("X", &a, 1.75, 2, now),
        ];

        let report = run(&[item("X", 1)], &observations, &[a], &UsageContext::default(), now);

        let rec = &report.recommendations[0];
        assert_eq!(rec.expected_price, 1.75);
        assert!(rec.available);
    }

    #[test]
    fn inactive_distributors_are_ignored() {
        let now = Utc::now();
        let a = distributor("A");
        let mut b = distributor("B");
        b.active = false;
        let observations = vec![
            observation("X", &a, 1.00, 1, now),
            observation("X", &b, 0.10, 1, now),
        ];

        let report = run(&[item("X", 1)], &observations, &[a, b], &UsageContext::default(), now);

        assert_eq!(report.recommendations[0].recommended_distributor, "A");
        assert_eq!(report.distributor_usage.total_distributors, 1);
    }

    #[test]
    fn invariants_hold_across_mixed_portfolio() {
        let now = Utc::now();
        let distributors: Vec<Distributor> =
            ["A", "B", "C", "D"].into_iter().map(distributor).collect();
        let mut observations = Vec::new();
        for (i, ndc) in ["N1", "N2", "N3", "N4", "N5"].iter().enumerate() {
            for (j, d) in distributors.iter().enumerate() {
                let price = 0.5 + ((i * 7 + j * 3) % 11) as f64 * 0.25;
                let age = ((i + j) * 13 % 50) as i64;
                observations.push(observation(ndc, d, price, age, now));
            }
        }
        let items: Vec<ProductListItem> = ["N1", "N2", "N3", "N4", "N5"]
            .iter()
            .enumerate()
            .map(|(i, ndc)| item(ndc, i as i32 + 1))
            .collect();

        let report = run(&items, &observations, &distributors, &UsageContext::default(), now);

        assert_eq!(report.recommendations.len(), 5);
        let mut sum = 0.0;
        for rec in &report.recommendations {
            assert!(rec.expected_price <= rec.worst_price);
            let expected = (rec.worst_price - rec.expected_price) * f64::from(rec.quantity);
            assert!((rec.savings - expected).abs() < EPSILON);
            sum += rec.savings;
        }
        assert!((report.total_potential_savings - sum).abs() < EPSILON);
        assert!(report.earnings_comparison.potential_additional_earnings >= 0.0);
    }

    #[test]
    fn usage_reports_remaining_allowance() {
        let distributors: Vec<Distributor> =
            ["A", "B", "C", "D"].into_iter().map(distributor).collect();
        let usage = UsageContext {
            used_this_month: [distributors[0].id].into_iter().collect(),
            monthly_cap: Some(3),
        };

        let summary = distributor_usage(&distributors, &usage);
        assert_eq!(
            summary,
            DistributorUsage {
                used_this_month: 1,
                total_distributors: 4,
                still_available: 2,
            }
        );

        let unlimited = UsageContext {
            monthly_cap: None,
            ..usage.clone()
        };
        assert_eq!(distributor_usage(&distributors, &unlimited).still_available, 3);

        let exhausted = UsageContext {
            monthly_cap: Some(1),
            used_this_month: distributors.iter().take(2).map(|d| d.id).collect(),
        };
        assert_eq!(distributor_usage(&distributors, &exhausted).still_available, 0);
    }

    #[test]
    fn splitting_across_distributors_beats_single_when_allowed() {
        let now = Utc::now();
        let a = distributor("A");
        let b = distributor("B");
        let observations = vec![
            observation("X", &a, 1.00, 1, now),
            observation("X", &b, 2.00, 1, now),
            observation("Y", &a, 3.00, 1, now),
            observation("Y", &b, 1.00, 1, now),
            observation("Z", &a, 1.00, 1, now),
            observation("Z", &b, 1.50, 1, now),
        ];
        let items = vec![item("X", 1), item("Y", 1), item("Z", 1)];
        let usage = UsageContext {
            used_this_month: HashSet::new(),
            monthly_cap: Some(2),
        };

        let report = run(&items, &observations, &[a, b], &usage, now);

        let comparison = report.earnings_comparison;
        // A wins two lines: 1.00 + 3.00 + 1.00
        assert!((comparison.single_distributor_strategy - 5.0).abs() < EPSILON);
        assert!((comparison.multiple_distributors_strategy - 3.0).abs() < EPSILON);
        assert!((comparison.potential_additional_earnings - 2.0).abs() < EPSILON);
    }

    #[test]
    fn monthly_cap_limits_multiple_distributor_strategy() {
        let now = Utc::now();
        let a = distributor("A");
        let b = distributor("B");
        let observations = vec![
            observation("X", &a, 1.00, 1, now),
            observation("X", &b, 2.00, 1, now),
            observation("Y", &a, 3.00, 1, now),
            observation("Y", &b, 1.00, 1, now),
        ];
        let items = vec![item("X", 1), item("Y", 1)];
        let usage = UsageContext {
            used_this_month: [a.id].into_iter().collect(),
            monthly_cap: Some(1),
        };

        let report = run(&items, &observations, &[a, b], &usage, now);

        assert_eq!(report.distributor_usage.still_available, 0);
        let comparison = report.earnings_comparison;
        // Only A is allowed: 1.00 + 3.00
        assert!((comparison.multiple_distributors_strategy - 4.0).abs() < EPSILON);
        assert_eq!(comparison.potential_additional_earnings, 0.0);
    }

    #[test]
    fn no_allowance_values_lines_at_worst_price() {
        let now = Utc::now();
        let a = distributor("A");
        let b = distributor("B");
        let observations = vec![
            observation("X", &a, 1.00, 1, now),
            observation("X", &b, 2.00, 1, now),
        ];
        let usage = UsageContext {
            used_this_month: HashSet::new(),
            monthly_cap: Some(0),
        };

        let report = run(&[item("X", 3)], &observations, &[a, b], &usage, now);

        let comparison = report.earnings_comparison;
        assert!((comparison.multiple_distributors_strategy - 6.0).abs() < EPSILON);
        assert!((comparison.single_distributor_strategy - 3.0).abs() < EPSILON);
        assert_eq!(comparison.potential_additional_earnings, 0.0);
    }

    #[test]
    fn stale_quote_from_used_distributor_is_not_taken_by_capped_strategy() {
        let now = Utc::now();
        let a = distributor("A");
        let b = distributor("B");
        let observations = vec![
            observation("X", &a, 1.00, 1, now),
            observation("X", &b, 5.00, 45, now),
        ];
        let usage = UsageContext {
            used_this_month: [b.id].into_iter().collect(),
            monthly_cap: Some(1),
        };

        let report = run(&[item("X", 1)], &observations, &[a, b], &usage, now);

        let rec = &report.recommendations[0];
        assert_eq!(rec.worst_price, 1.0);
        assert_eq!(report.distributor_usage.still_available, 0);
        let comparison = report.earnings_comparison;
        assert!(comparison.multiple_distributors_strategy <= rec.worst_price + EPSILON);
        assert!((comparison.multiple_distributors_strategy - 1.0).abs() < EPSILON);
        assert!((comparison.single_distributor_strategy - 1.0).abs() < EPSILON);
    }
}
