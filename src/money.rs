//! Money-moved aggregates over the payments dataset.
//!
//! Every function here takes already-filtered, already-joined,
//! already-currency-converted rows and is a pure computation. Rows whose
//! `amount_usd` is null contribute 0 and are not an error. Empty input
//! yields the documented empty shape, never a panic.

use crate::join::EnrichedPayment;
use crate::schema::Payment;
use crate::timewindow::{accounting_month_index, accounting_year, YearMode};
use chrono::Datelike;
use log::warn;
use serde::Serialize;
use std::collections::BTreeMap;

/// Portfolios excluded from every money-moved aggregate.
pub const EXCLUDED_PORTFOLIOS: [&str; 2] = ["Discretionary Fund", "Operating Costs"];

/// Pledge frequencies that make a payment a recurring donation.
pub const RECURRING_FREQUENCIES: [&str; 3] = ["Monthly", "Quarterly", "Annually"];

fn portfolio_excluded(portfolio: &str) -> bool {
    EXCLUDED_PORTFOLIOS.contains(&portfolio)
}

/// Monthly totals plus the grand total. The grand total is exactly the
/// sum of the monthly buckets.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MoneyMoved {
    /// Summed USD per `YYYY-MM` month label, sorted by label.
    pub monthly: BTreeMap<String, f64>,
    pub total: f64,
}

fn month_label(payment: &Payment) -> Option<String> {
    payment
        .date
        .map(|d| format!("{:04}-{:02}", d.year(), d.month()))
}

fn monthly_totals<F>(payments: &[Payment], contribution: F) -> MoneyMoved
where
    F: Fn(&Payment) -> f64,
{
    if payments.is_empty() {
        warn!("Payments dataset is empty: money moved is zero");
        return MoneyMoved::default();
    }

    let mut monthly: BTreeMap<String, f64> = BTreeMap::new();
    let mut skipped = 0usize;
    for payment in payments {
        if portfolio_excluded(&payment.portfolio) {
            continue;
        }
        match month_label(payment) {
            Some(label) => {
                *monthly.entry(label).or_insert(0.0) += contribution(payment);
            }
            None => skipped += 1,
        }
    }
    if skipped > 0 {
        warn!(
            "{} payment(s) without a parseable date were skipped from monthly totals",
            skipped
        );
    }

    let total = monthly.values().sum();
    MoneyMoved { monthly, total }
}

/// Total money moved, grouped by calendar month of the payment date, with
/// the fixed portfolio exclusions applied.
pub fn money_moved(payments: &[Payment]) -> MoneyMoved {
    monthly_totals(payments, |p| p.amount_usd.unwrap_or(0.0))
}

/// Like [`money_moved`], but each row contributes
/// `amount_usd * counterfactuality`. Out-of-range counterfactuality values
/// are not validated here; the factor is taken as-is.
pub fn counterfactual_money_moved(payments: &[Payment]) -> MoneyMoved {
    monthly_totals(payments, |p| {
        p.amount_usd.unwrap_or(0.0) * p.counterfactuality
    })
}

/// Money moved per payment platform, portfolio exclusions applied.
pub fn money_moved_by_platform(payments: &[Payment]) -> BTreeMap<String, f64> {
    if payments.is_empty() {
        warn!("Payments dataset is empty: no per-platform totals");
        return BTreeMap::new();
    }

    let mut totals: BTreeMap<String, f64> = BTreeMap::new();
    for payment in payments {
        if portfolio_excluded(&payment.portfolio) {
            continue;
        }
        *totals.entry(payment.payment_platform.clone()).or_insert(0.0) +=
            payment.amount_usd.unwrap_or(0.0);
    }
    totals
}

/// Recurring vs. one-time classification of a payment, derived from the
/// joined pledge frequency.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DonationType {
    Recurring,
    OneTime,
}

impl DonationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DonationType::Recurring => "Recurring",
            DonationType::OneTime => "One-Time",
        }
    }
}

/// Unknown or unjoinable frequencies classify as one-time.
pub fn classify_donation_type(frequency: &str) -> DonationType {
    if RECURRING_FREQUENCIES.contains(&frequency) {
        DonationType::Recurring
    } else {
        DonationType::OneTime
    }
}

/// Money moved split into recurring and one-time donations. Requires the
/// pledge join: orphan payments carry an unknown frequency and land in
/// the one-time bucket.
pub fn money_moved_by_donation_type(payments: &[EnrichedPayment]) -> BTreeMap<String, f64> {
    if payments.is_empty() {
        warn!("Enriched payments dataset is empty: no donation-type totals");
        return BTreeMap::new();
    }

    let mut totals: BTreeMap<String, f64> = BTreeMap::new();
    for row in payments {
        if portfolio_excluded(&row.payment.portfolio) {
            continue;
        }
        let key = classify_donation_type(&row.frequency).as_str().to_string();
        *totals.entry(key).or_insert(0.0) += row.payment.amount_usd.unwrap_or(0.0);
    }
    totals
}

/// Money moved for one `(donor_chapter, chapter_type)` source.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceTotal {
    pub donor_chapter: String,
    pub chapter_type: String,
    pub amount_usd: f64,
}

/// Money moved per `(donor_chapter, chapter_type)` pair. Requires the
/// pledge join.
pub fn money_moved_by_source(payments: &[EnrichedPayment]) -> Vec<SourceTotal> {
    if payments.is_empty() {
        warn!("Enriched payments dataset is empty: no per-source totals");
        return Vec::new();
    }

    let mut totals: BTreeMap<(String, String), f64> = BTreeMap::new();
    for row in payments {
        if portfolio_excluded(&row.payment.portfolio) {
            continue;
        }
        let key = (row.donor_chapter.clone(), row.chapter_type.clone());
        *totals.entry(key).or_insert(0.0) += row.payment.amount_usd.unwrap_or(0.0);
    }

    totals
        .into_iter()
        .map(|((donor_chapter, chapter_type), amount_usd)| SourceTotal {
            donor_chapter,
            chapter_type,
            amount_usd,
        })
        .collect()
}

/// One accounting month of the cumulative view.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AccumulatedRow {
    /// Accounting year (fiscal: the year the July start falls in).
    pub year: i32,
    /// 1..=12 position within the accounting year.
    pub month_index: u32,
    pub amount: f64,
    /// Running sum within the accounting year, ordered by month index.
    pub cumulative: f64,
}

/// Money moved per accounting (year, month) with a running cumulative sum
/// within each accounting year, for year-over-year progress comparison.
///
/// The output covers every accounting year present in the data; trimming
/// to the most recent few years is the presentation layer's concern.
pub fn accumulated_money_moved(payments: &[Payment], mode: YearMode) -> Vec<AccumulatedRow> {
    if payments.is_empty() {
        warn!("Payments dataset is empty: no accumulated totals");
        return Vec::new();
    }

    let mut buckets: BTreeMap<(i32, u32), f64> = BTreeMap::new();
    for payment in payments {
        if portfolio_excluded(&payment.portfolio) {
            continue;
        }
        let Some(date) = payment.date else { continue };
        let key = (
            accounting_year(date.date(), mode),
            accounting_month_index(date.month(), mode),
        );
        *buckets.entry(key).or_insert(0.0) += payment.amount_usd.unwrap_or(0.0);
    }

    let mut rows = Vec::with_capacity(buckets.len());
    let mut current_year = None;
    let mut running = 0.0;
    for ((year, month_index), amount) in buckets {
        if current_year != Some(year) {
            current_year = Some(year);
            running = 0.0;
        }
        running += amount;
        rows.push(AccumulatedRow {
            year,
            month_index,
            amount,
            cumulative: running,
        });
    }
    rows
}
