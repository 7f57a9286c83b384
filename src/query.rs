//! The single seam the presentation layer calls against: one query
//! (selected years, year mode, selected portfolios) in, the full set of
//! KPI tables out.
//!
//! Each call runs the fully sequential pipeline: resolve time windows,
//! filter both datasets, join payments to pledges, compute every metric.
//! The loaded datasets are immutable, so concurrent queries share them
//! freely.

use crate::filter::{apply, Predicate};
use crate::join::enrich_payments;
use crate::money::{
    accumulated_money_moved, counterfactual_money_moved, money_moved,
    money_moved_by_donation_type, money_moved_by_platform, money_moved_by_source, AccumulatedRow,
    MoneyMoved, SourceTotal,
};
use crate::performance::{
    active_arr, all_arr, breakdown_by_channel, chapter_arr, future_arr, future_pledges,
    monthly_attrition_rate, pledge_attrition_rate, total_active_donors, total_active_pledges,
    total_pledges,
};
use crate::schema::{Payment, Pledge};
use crate::timewindow::{resolve_windows, YearMode};
use chrono::NaiveDate;
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// A filter-bar selection. Hashable so it can key a response cache.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MetricsQuery {
    /// Selected years; empty means no date restriction.
    pub years: BTreeSet<i32>,
    pub mode: YearMode,
    /// Selected portfolios; empty means no portfolio restriction.
    pub portfolios: BTreeSet<String>,
}

impl MetricsQuery {
    pub fn new(mode: YearMode) -> Self {
        MetricsQuery {
            years: BTreeSet::new(),
            mode,
            portfolios: BTreeSet::new(),
        }
    }

    pub fn with_years<I: IntoIterator<Item = i32>>(mut self, years: I) -> Self {
        self.years = years.into_iter().collect();
        self
    }

    pub fn with_portfolios<I: IntoIterator<Item = String>>(mut self, portfolios: I) -> Self {
        self.portfolios = portfolios.into_iter().collect();
        self
    }
}

/// Everything the dashboard renders for one filter selection.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsReport {
    pub money_moved: MoneyMoved,
    pub counterfactual_money_moved: MoneyMoved,
    pub by_platform: BTreeMap<String, f64>,
    pub by_donation_type: BTreeMap<String, f64>,
    pub by_source: Vec<SourceTotal>,
    pub accumulated: Vec<AccumulatedRow>,
    pub active_donors: usize,
    pub active_pledges: usize,
    pub attrition_rate: f64,
    pub chapter_arr: BTreeMap<String, f64>,
    pub total_pledges: usize,
    pub future_pledges: usize,
    pub all_arr: f64,
    pub future_arr: f64,
    pub active_arr: f64,
    pub monthly_attrition_rate: f64,
    pub breakdown_by_channel: BTreeMap<String, usize>,
}

/// The loaded, normalized, currency-converted snapshot. Read-only for the
/// lifetime of the process.
#[derive(Debug, Clone)]
pub struct Analytics {
    payments: Vec<Payment>,
    pledges: Vec<Pledge>,
}

impl Analytics {
    pub fn new(payments: Vec<Payment>, pledges: Vec<Pledge>) -> Self {
        Analytics { payments, pledges }
    }

    pub fn payments(&self) -> &[Payment] {
        &self.payments
    }

    pub fn pledges(&self) -> &[Pledge] {
        &self.pledges
    }

    /// Computes the full report for a filter selection, using today's
    /// date to close the monthly-attrition span when every pledge is
    /// open-ended.
    pub fn metrics(&self, query: &MetricsQuery) -> MetricsReport {
        self.metrics_as_of(query, chrono::Utc::now().date_naive())
    }

    /// Pure variant of [`Analytics::metrics`]: the same inputs always
    /// produce the same report.
    pub fn metrics_as_of(&self, query: &MetricsQuery, as_of: NaiveDate) -> MetricsReport {
        let windows = resolve_windows(&query.years, query.mode);

        let mut payment_predicates = Vec::new();
        let mut pledge_predicates = Vec::new();
        // Empty windows means "no date restriction": the predicate is
        // omitted entirely, never passed as an empty list.
        if !windows.is_empty() {
            payment_predicates.push(Predicate::in_any_window("date", windows.clone()));
            pledge_predicates.push(Predicate::in_any_window("pledge_created_at", windows));
        }
        if !query.portfolios.is_empty() {
            payment_predicates.push(Predicate::one_of(
                "portfolio",
                query.portfolios.iter().cloned(),
            ));
        }

        let payments = apply(&self.payments, &payment_predicates);
        let pledges = apply(&self.pledges, &pledge_predicates);
        debug!(
            "Filter selection matched {}/{} payments and {}/{} pledges",
            payments.len(),
            self.payments.len(),
            pledges.len(),
            self.pledges.len()
        );

        let enriched = enrich_payments(&payments, &pledges);

        MetricsReport {
            money_moved: money_moved(&payments),
            counterfactual_money_moved: counterfactual_money_moved(&payments),
            by_platform: money_moved_by_platform(&payments),
            by_donation_type: money_moved_by_donation_type(&enriched),
            by_source: money_moved_by_source(&enriched),
            accumulated: accumulated_money_moved(&payments, query.mode),
            active_donors: total_active_donors(&pledges),
            active_pledges: total_active_pledges(&pledges),
            attrition_rate: pledge_attrition_rate(&pledges),
            chapter_arr: chapter_arr(&pledges),
            total_pledges: total_pledges(&pledges),
            future_pledges: future_pledges(&pledges),
            all_arr: all_arr(&pledges),
            future_arr: future_arr(&pledges),
            active_arr: active_arr(&pledges),
            monthly_attrition_rate: monthly_attrition_rate(&pledges, as_of),
            breakdown_by_channel: breakdown_by_channel(&pledges),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::PledgeStatus;

    fn payment(id: &str, portfolio: &str, y: i32, m: u32, d: u32, usd: f64) -> Payment {
        Payment {
            payment_id: id.to_string(),
            donor_id: "d1".to_string(),
            pledge_id: None,
            payment_platform: "Benevity".to_string(),
            portfolio: portfolio.to_string(),
            amount: Some(usd),
            currency: Some("USD".to_string()),
            date: NaiveDate::from_ymd_opt(y, m, d)
                .unwrap()
                .and_hms_opt(0, 0, 0),
            counterfactuality: 1.0,
            amount_usd: Some(usd),
        }
    }

    fn pledge(id: &str, status: PledgeStatus, created: (i32, u32, u32)) -> Pledge {
        Pledge {
            pledge_id: id.to_string(),
            donor_id: format!("donor-{}", id),
            donor_chapter: "UNSW".to_string(),
            chapter_type: "Undergrad".to_string(),
            pledge_status: status,
            pledge_created_at: NaiveDate::from_ymd_opt(created.0, created.1, created.2)
                .unwrap()
                .and_hms_opt(0, 0, 0),
            pledge_starts_at: None,
            pledge_ended_at: None,
            contribution_amount: Some(10.0),
            currency: Some("USD".to_string()),
            frequency: "Monthly".to_string(),
            contribution_amount_usd: Some(10.0),
        }
    }

    fn as_of() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, 1).unwrap()
    }

    #[test]
    fn test_empty_selection_is_unfiltered() {
        let analytics = Analytics::new(
            vec![
                payment("p1", "Top Picks", 2023, 5, 1, 10.0),
                payment("p2", "Top Picks", 2024, 5, 1, 20.0),
            ],
            vec![pledge("pl1", PledgeStatus::Active, (2023, 1, 1))],
        );

        let report = analytics.metrics_as_of(&MetricsQuery::new(YearMode::Calendar), as_of());
        assert!((report.money_moved.total - 30.0).abs() < 1e-9);
        assert_eq!(report.active_pledges, 1);
    }

    #[test]
    fn test_year_selection_filters_both_datasets() {
        let analytics = Analytics::new(
            vec![
                payment("p1", "Top Picks", 2023, 5, 1, 10.0),
                payment("p2", "Top Picks", 2024, 5, 1, 20.0),
            ],
            vec![
                pledge("pl1", PledgeStatus::Active, (2023, 1, 1)),
                pledge("pl2", PledgeStatus::Active, (2024, 1, 1)),
            ],
        );

        let query = MetricsQuery::new(YearMode::Calendar).with_years([2024]);
        let report = analytics.metrics_as_of(&query, as_of());
        assert!((report.money_moved.total - 20.0).abs() < 1e-9);
        assert_eq!(report.active_pledges, 1);
    }

    #[test]
    fn test_fiscal_year_selection_spans_july_to_june() {
        let analytics = Analytics::new(
            vec![
                payment("p1", "Top Picks", 2024, 6, 30, 10.0), // FY2023
                payment("p2", "Top Picks", 2024, 7, 1, 20.0),  // FY2024
                payment("p3", "Top Picks", 2025, 6, 30, 40.0), // FY2024
            ],
            Vec::new(),
        );

        let query = MetricsQuery::new(YearMode::Fiscal).with_years([2024]);
        let report = analytics.metrics_as_of(&query, as_of());
        assert!((report.money_moved.total - 60.0).abs() < 1e-9);
    }

    #[test]
    fn test_portfolio_selection() {
        let analytics = Analytics::new(
            vec![
                payment("p1", "Top Picks", 2024, 5, 1, 10.0),
                payment("p2", "Global Health", 2024, 5, 1, 20.0),
            ],
            Vec::new(),
        );

        let query = MetricsQuery::new(YearMode::Calendar)
            .with_portfolios(["Top Picks".to_string()]);
        let report = analytics.metrics_as_of(&query, as_of());
        assert!((report.money_moved.total - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_report_is_reproducible() {
        let analytics = Analytics::new(
            vec![payment("p1", "Top Picks", 2024, 5, 1, 10.0)],
            vec![pledge("pl1", PledgeStatus::Active, (2024, 1, 1))],
        );
        let query = MetricsQuery::new(YearMode::Fiscal).with_years([2023, 2024]);

        let first = analytics.metrics_as_of(&query, as_of());
        let second = analytics.metrics_as_of(&query, as_of());
        assert_eq!(first.money_moved.total, second.money_moved.total);
        assert_eq!(first.active_arr, second.active_arr);
        assert_eq!(first.monthly_attrition_rate, second.monthly_attrition_rate);
    }

    #[test]
    fn test_report_serializes_for_the_presentation_layer() {
        let analytics = Analytics::new(
            vec![payment("p1", "Top Picks", 2024, 5, 1, 10.0)],
            Vec::new(),
        );
        let report = analytics.metrics_as_of(&MetricsQuery::new(YearMode::Calendar), as_of());
        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains("money_moved"));
        assert!(json.contains("breakdown_by_channel"));
    }
}
