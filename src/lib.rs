//! # Donation Metrics
//!
//! The metrics computation and filtering core of a donation-analytics
//! dashboard. It ingests two snapshot record sets (payment transactions
//! and recurring pledges), normalizes currencies and dates, and derives
//! the financial KPIs the dashboard renders: money moved, annualized run
//! rate, and attrition, behind a year / fiscal-mode / portfolio filter
//! bar.
//!
//! ## Core Concepts
//!
//! - **Snapshot**: the payments and pledges exports, read once at startup
//!   and immutable thereafter
//! - **Rate Table**: historical daily FX rates with an explicit
//!   last-known-rate fallback policy; conversions before its coverage are
//!   skipped, never fabricated
//! - **Time Windows**: selected years resolved to date intervals under a
//!   calendar (Jan-Dec) or fiscal (Jul-Jun) convention
//! - **Predicates**: tagged filter conditions conjoined over a dataset,
//!   producing a new filtered view
//! - **Enrichment**: a left outer join pulling pledge attributes
//!   (frequency, chapter) onto payment rows
//! - **Metrics**: pure functions from filtered, joined, converted rows to
//!   KPI tables; empty input yields empty output, never an error
//!
//! ## Example
//!
//! ```rust,ignore
//! use donation_metrics::*;
//!
//! let rates = RateTable::from_path("data/fx-rates.csv")?;
//! let snapshot = Snapshot::load("data/payments.json", "data/pledges.json", &rates)?;
//! let analytics = Analytics::new(snapshot.payments, snapshot.pledges);
//!
//! let query = MetricsQuery::new(YearMode::Fiscal).with_years([2024]);
//! let report = analytics.metrics(&query);
//! println!("Money moved: ${:.2}", report.money_moved.total);
//! ```

pub mod cache;
pub mod error;
pub mod filter;
pub mod fx;
pub mod ingestion;
pub mod join;
pub mod money;
pub mod performance;
pub mod query;
pub mod schema;
pub mod timewindow;

pub use cache::TtlCache;
pub use error::{MetricsError, Result};
pub use filter::{apply, FieldAccess, FieldRef, Predicate};
pub use fx::{convert_payments, convert_pledges, RateFallback, RateTable};
pub use ingestion::{load_payments, load_pledges, portfolio_options, year_options, Snapshot};
pub use join::{enrich_payments, EnrichedPayment};
pub use money::{
    accumulated_money_moved, classify_donation_type, counterfactual_money_moved, money_moved,
    money_moved_by_donation_type, money_moved_by_platform, money_moved_by_source, AccumulatedRow,
    DonationType, MoneyMoved, SourceTotal, EXCLUDED_PORTFOLIOS,
};
pub use performance::{
    active_arr, all_arr, annualization_multiplier, arr, breakdown_by_channel, chapter_arr,
    future_arr, future_pledges, monthly_attrition_rate, pledge_attrition_rate,
    total_active_donors, total_active_pledges, total_pledges,
};
pub use query::{Analytics, MetricsQuery, MetricsReport};
pub use schema::{normalize_category, parse_flexible_date, Payment, Pledge, PledgeStatus, UNKNOWN};
pub use timewindow::{
    accounting_month_index, accounting_year, resolve_windows, DateWindow, YearMode,
};
