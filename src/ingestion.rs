//! Snapshot loading: the one-time, startup-only read of the payments and
//! pledges exports plus currency conversion. After this, everything is
//! immutable.

use crate::error::{MetricsError, Result};
use crate::fx::{convert_payments, convert_pledges, RateTable};
use crate::schema::{Payment, Pledge};
use log::info;
use serde::de::DeserializeOwned;
use std::collections::BTreeSet;
use std::path::Path;

fn load_records<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let raw = std::fs::read_to_string(path).map_err(|source| MetricsError::SnapshotRead {
        path: path.display().to_string(),
        source,
    })?;
    let records: Vec<T> =
        serde_json::from_str(&raw).map_err(|source| MetricsError::SnapshotParse {
            path: path.display().to_string(),
            source,
        })?;
    Ok(records)
}

/// Loads the payments snapshot (a JSON array of records). Row-level data
/// problems are absorbed by the lenient schema deserializers; only an
/// unreadable or structurally invalid file is an error.
pub fn load_payments<P: AsRef<Path>>(path: P) -> Result<Vec<Payment>> {
    let payments = load_records(path.as_ref())?;
    info!(
        "Loaded {} payment(s) from {}",
        payments.len(),
        path.as_ref().display()
    );
    Ok(payments)
}

/// Loads the pledges snapshot (a JSON array of records).
pub fn load_pledges<P: AsRef<Path>>(path: P) -> Result<Vec<Pledge>> {
    let pledges = load_records(path.as_ref())?;
    info!(
        "Loaded {} pledge(s) from {}",
        pledges.len(),
        path.as_ref().display()
    );
    Ok(pledges)
}

/// Both record sets, normalized and converted to USD.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub payments: Vec<Payment>,
    pub pledges: Vec<Pledge>,
}

impl Snapshot {
    /// Reads both snapshot files and runs the currency conversion once.
    pub fn load<P: AsRef<Path>>(
        payments_path: P,
        pledges_path: P,
        rates: &RateTable,
    ) -> Result<Snapshot> {
        let mut payments = load_payments(payments_path)?;
        let mut pledges = load_pledges(pledges_path)?;
        convert_payments(&mut payments, rates);
        convert_pledges(&mut pledges, rates);
        Ok(Snapshot { payments, pledges })
    }
}

/// Distinct years present in the payment dates, for the year dropdown.
pub fn year_options(payments: &[Payment]) -> BTreeSet<i32> {
    use chrono::Datelike;
    payments
        .iter()
        .filter_map(|p| p.date)
        .map(|d| d.year())
        .collect()
}

/// Distinct portfolios present in the payments, for the portfolio
/// dropdown. Includes the `"Unknown"` sentinel when present.
pub fn portfolio_options(payments: &[Payment]) -> BTreeSet<String> {
    payments.iter().map(|p| p.portfolio.clone()).collect()
}
