//! Currency normalization against a historical daily exchange-rate table.
//!
//! The table is loaded once at startup and never mutated. Rates are keyed
//! by `(date, currency)` and quoted as units of the source currency per
//! 1 USD, so a conversion is `amount / rate`.
//!
//! The fallback behavior when a date has no published rate is part of the
//! contract, not an incidental default: see [`RateFallback`].

use crate::error::{MetricsError, Result};
use crate::schema::{Payment, Pledge};
use chrono::{NaiveDate, NaiveDateTime};
use log::{debug, info, warn};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::io::Read;
use std::path::Path;

/// Policy for dates with no published rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RateFallback {
    /// Use the most recent earlier published rate. Silently picking any
    /// other fallback would change every downstream total, so this is the
    /// documented default.
    #[default]
    LastKnown,
    /// No fallback: a date without a published rate yields no conversion.
    Exact,
}

#[derive(Debug, Deserialize)]
struct RateRow {
    date: String,
    currency: String,
    rate: f64,
}

/// Historical daily FX rates. Read-only after load.
#[derive(Debug, Clone)]
pub struct RateTable {
    rates: BTreeMap<NaiveDate, HashMap<String, f64>>,
}

impl RateTable {
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut csv_reader = csv::Reader::from_reader(reader);
        let mut rates: BTreeMap<NaiveDate, HashMap<String, f64>> = BTreeMap::new();

        for (idx, record) in csv_reader.deserialize::<RateRow>().enumerate() {
            let line = idx as u64 + 2; // 1-based, after the header
            let row = record?;

            let date = NaiveDate::parse_from_str(row.date.trim(), "%Y-%m-%d").map_err(|_| {
                MetricsError::RateRow {
                    line,
                    details: format!("invalid date '{}'", row.date),
                }
            })?;

            if !row.rate.is_finite() || row.rate <= 0.0 {
                return Err(MetricsError::RateRow {
                    line,
                    details: format!("non-positive rate {} for {}", row.rate, row.currency),
                });
            }

            rates
                .entry(date)
                .or_default()
                .insert(row.currency.trim().to_ascii_uppercase(), row.rate);
        }

        if rates.is_empty() {
            return Err(MetricsError::EmptyRateTable);
        }

        let table = RateTable { rates };
        info!(
            "Loaded exchange-rate table: {} dates, coverage starts {}",
            table.rates.len(),
            table.coverage_start()
        );
        Ok(table)
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(file)
    }

    /// Earliest date the table covers. Conversions for earlier dates are
    /// skipped rather than fabricated.
    pub fn coverage_start(&self) -> NaiveDate {
        *self
            .rates
            .keys()
            .next()
            .expect("rate table is never constructed empty")
    }

    /// Converts `amount` from `currency` into USD as of `date`.
    ///
    /// Returns `None` (never an error) when the date precedes coverage or
    /// the currency has no usable rate.
    pub fn to_usd(
        &self,
        amount: f64,
        currency: &str,
        date: NaiveDate,
        fallback: RateFallback,
    ) -> Option<f64> {
        let code = currency.trim().to_ascii_uppercase();
        if code == "USD" {
            return Some(amount);
        }

        if date < self.coverage_start() {
            warn!(
                "FX lookup for {} on {} precedes coverage start {}: skipping conversion",
                code,
                date,
                self.coverage_start()
            );
            return None;
        }

        let rate = match fallback {
            RateFallback::Exact => self.rates.get(&date).and_then(|day| day.get(&code)),
            RateFallback::LastKnown => self
                .rates
                .range(..=date)
                .rev()
                .find_map(|(_, day)| day.get(&code)),
        };

        match rate {
            Some(rate) => Some(amount / rate),
            None => {
                warn!("No published {} rate on or before {}", code, date);
                None
            }
        }
    }
}

fn convert_row(
    table: &RateTable,
    amount: Option<f64>,
    currency: Option<&str>,
    date: Option<NaiveDateTime>,
    row_id: &str,
) -> Option<f64> {
    match (amount, currency, date) {
        (Some(amount), Some(currency), Some(date)) => {
            table.to_usd(amount, currency, date.date(), RateFallback::LastKnown)
        }
        _ => {
            debug!(
                "Skipping USD conversion for '{}': amount, currency, or date missing",
                row_id
            );
            None
        }
    }
}

/// Populates `amount_usd` on every payment. Rows that cannot be converted
/// keep `None` and are logged; processing always continues.
pub fn convert_payments(payments: &mut [Payment], table: &RateTable) {
    let mut converted = 0usize;
    for payment in payments.iter_mut() {
        payment.amount_usd = convert_row(
            table,
            payment.amount,
            payment.currency.as_deref(),
            payment.date,
            &payment.payment_id,
        );
        if payment.amount_usd.is_some() {
            converted += 1;
        }
    }
    info!("Converted {}/{} payments to USD", converted, payments.len());
}

/// Populates `contribution_amount_usd` on every pledge, keyed off
/// `pledge_starts_at`.
pub fn convert_pledges(pledges: &mut [Pledge], table: &RateTable) {
    let mut converted = 0usize;
    for pledge in pledges.iter_mut() {
        pledge.contribution_amount_usd = convert_row(
            table,
            pledge.contribution_amount,
            pledge.currency.as_deref(),
            pledge.pledge_starts_at,
            &pledge.pledge_id,
        );
        if pledge.contribution_amount_usd.is_some() {
            converted += 1;
        }
    }
    info!("Converted {}/{} pledges to USD", converted, pledges.len());
}

#[cfg(test)]
mod tests {
    use super::*;

    const RATES_CSV: &str = "\
date,currency,rate
2023-01-02,GBP,0.80
2023-01-02,EUR,0.95
2023-01-09,GBP,0.82
";

    fn table() -> RateTable {
        RateTable::from_reader(RATES_CSV.as_bytes()).unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_usd_passes_through() {
        let result = table().to_usd(100.0, "USD", date(2023, 1, 5), RateFallback::LastKnown);
        assert_eq!(result, Some(100.0));
    }

    #[test]
    fn test_exact_date_conversion() {
        let result = table().to_usd(80.0, "GBP", date(2023, 1, 2), RateFallback::LastKnown);
        assert!((result.unwrap() - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_last_known_rate_fallback() {
        // Jan 5 has no published rate: fall back to Jan 2.
        let result = table().to_usd(80.0, "GBP", date(2023, 1, 5), RateFallback::LastKnown);
        assert!((result.unwrap() - 100.0).abs() < 1e-9);

        // Exact policy refuses the same lookup.
        let exact = table().to_usd(80.0, "GBP", date(2023, 1, 5), RateFallback::Exact);
        assert_eq!(exact, None);
    }

    #[test]
    fn test_before_coverage_yields_none() {
        let result = table().to_usd(80.0, "GBP", date(2022, 12, 30), RateFallback::LastKnown);
        assert_eq!(result, None);
        // USD itself predating coverage would still skip non-trivially;
        // but USD short-circuits before the coverage check.
        let usd = table().to_usd(80.0, "USD", date(2022, 12, 30), RateFallback::LastKnown);
        assert_eq!(usd, Some(80.0));
    }

    #[test]
    fn test_unmapped_currency_yields_none() {
        let result = table().to_usd(80.0, "JPY", date(2023, 1, 5), RateFallback::LastKnown);
        assert_eq!(result, None);
    }

    #[test]
    fn test_empty_table_is_an_error() {
        let result = RateTable::from_reader("date,currency,rate\n".as_bytes());
        assert!(matches!(result, Err(MetricsError::EmptyRateTable)));
    }

    #[test]
    fn test_bad_rate_row_is_an_error() {
        let csv = "date,currency,rate\n2023-01-02,GBP,-1.0\n";
        let result = RateTable::from_reader(csv.as_bytes());
        assert!(matches!(result, Err(MetricsError::RateRow { line: 2, .. })));
    }

    #[test]
    fn test_convert_payments_nulls_out_failures() {
        let mut payments = vec![
            Payment {
                payment_id: "p1".to_string(),
                donor_id: "d1".to_string(),
                pledge_id: None,
                payment_platform: "Unknown".to_string(),
                portfolio: "Unknown".to_string(),
                amount: Some(80.0),
                currency: Some("GBP".to_string()),
                date: date(2023, 1, 2).and_hms_opt(0, 0, 0),
                counterfactuality: 1.0,
                amount_usd: None,
            },
            Payment {
                payment_id: "p2".to_string(),
                donor_id: "d1".to_string(),
                pledge_id: None,
                payment_platform: "Unknown".to_string(),
                portfolio: "Unknown".to_string(),
                amount: None,
                currency: Some("GBP".to_string()),
                date: date(2023, 1, 2).and_hms_opt(0, 0, 0),
                counterfactuality: 1.0,
                amount_usd: None,
            },
        ];

        convert_payments(&mut payments, &table());
        assert!((payments[0].amount_usd.unwrap() - 100.0).abs() < 1e-9);
        assert!(payments[1].amount_usd.is_none());
    }
}
