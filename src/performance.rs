//! Pledge-side KPIs: annualized run rate, donor and pledge counts,
//! attrition, and the channel breakdown.
//!
//! All functions are pure over already-filtered pledges. Empty input
//! returns the zero value with a warning, never an error.

use crate::schema::{Pledge, PledgeStatus};
use chrono::{Datelike, NaiveDate, NaiveDateTime};
use log::warn;
use std::collections::{BTreeMap, HashSet};

/// Annualization multiplier for a pledge frequency: Monthly 12,
/// Quarterly 4, Annually 1. Anything else multiplies to zero, which
/// silently drops that pledge from ARR, so it is logged loudly.
pub fn annualization_multiplier(frequency: &str) -> f64 {
    match frequency {
        "Monthly" => 12.0,
        "Quarterly" => 4.0,
        "Annually" => 1.0,
        other => {
            warn!(
                "Unexpected pledge frequency '{}': contributes 0 to ARR",
                other
            );
            0.0
        }
    }
}

fn contribution_usd(pledge: &Pledge) -> f64 {
    // Prefer the converted amount; fall back to the source amount when
    // conversion was skipped (e.g. date before rate coverage).
    pledge
        .contribution_amount_usd
        .or(pledge.contribution_amount)
        .unwrap_or(0.0)
}

/// Annualized run rate over the pledges whose status is in `statuses`.
pub fn arr(pledges: &[Pledge], statuses: &[PledgeStatus]) -> f64 {
    if pledges.is_empty() {
        warn!("Pledges dataset is empty: ARR is zero");
        return 0.0;
    }

    pledges
        .iter()
        .filter(|p| statuses.contains(&p.pledge_status))
        .map(|p| contribution_usd(p) * annualization_multiplier(&p.frequency))
        .sum()
}

/// ARR over active pledges only.
pub fn active_arr(pledges: &[Pledge]) -> f64 {
    arr(pledges, &[PledgeStatus::Active])
}

/// ARR over pledged-but-not-yet-active pledges.
pub fn future_arr(pledges: &[Pledge]) -> f64 {
    arr(pledges, &[PledgeStatus::Pledged])
}

/// ARR over both pledged and active pledges.
pub fn all_arr(pledges: &[Pledge]) -> f64 {
    arr(pledges, &[PledgeStatus::Pledged, PledgeStatus::Active])
}

/// Active-donor ARR per `chapter_type`.
pub fn chapter_arr(pledges: &[Pledge]) -> BTreeMap<String, f64> {
    if pledges.is_empty() {
        warn!("Pledges dataset is empty: no chapter ARR");
        return BTreeMap::new();
    }

    let mut totals: BTreeMap<String, f64> = BTreeMap::new();
    for pledge in pledges {
        if pledge.pledge_status != PledgeStatus::Active {
            continue;
        }
        *totals.entry(pledge.chapter_type.clone()).or_insert(0.0) +=
            contribution_usd(pledge) * annualization_multiplier(&pledge.frequency);
    }
    totals
}

/// Distinct donors with a one-time or active pledge.
pub fn total_active_donors(pledges: &[Pledge]) -> usize {
    pledges
        .iter()
        .filter(|p| {
            matches!(
                p.pledge_status,
                PledgeStatus::OneTime | PledgeStatus::Active
            )
        })
        .map(|p| p.donor_id.as_str())
        .collect::<HashSet<_>>()
        .len()
}

/// Row count of active-donor pledges. Unlike [`total_active_donors`],
/// this does not dedupe by donor.
pub fn total_active_pledges(pledges: &[Pledge]) -> usize {
    pledges
        .iter()
        .filter(|p| p.pledge_status == PledgeStatus::Active)
        .count()
}

/// Row count of pledges that are pledged or active.
pub fn total_pledges(pledges: &[Pledge]) -> usize {
    pledges
        .iter()
        .filter(|p| {
            matches!(
                p.pledge_status,
                PledgeStatus::Pledged | PledgeStatus::Active
            )
        })
        .count()
}

/// Row count of pledged-but-not-yet-active pledges.
pub fn future_pledges(pledges: &[Pledge]) -> usize {
    pledges
        .iter()
        .filter(|p| p.pledge_status == PledgeStatus::Pledged)
        .count()
}

/// Share of recurring pledges that churned or failed.
///
/// Contract: one-time donors are excluded from the universe, and both
/// numerator and denominator count distinct `pledge_id`s. A dataset with
/// no recurring pledges yields 0.0.
pub fn pledge_attrition_rate(pledges: &[Pledge]) -> f64 {
    if pledges.is_empty() {
        warn!("Pledges dataset is empty: attrition rate is zero");
        return 0.0;
    }

    let mut recurring: HashSet<&str> = HashSet::new();
    let mut churned: HashSet<&str> = HashSet::new();
    for pledge in pledges {
        if pledge.pledge_status == PledgeStatus::OneTime {
            continue;
        }
        recurring.insert(pledge.pledge_id.as_str());
        if pledge.pledge_status.is_churned() {
            churned.insert(pledge.pledge_id.as_str());
        }
    }

    if recurring.is_empty() {
        return 0.0;
    }
    churned.len() as f64 / recurring.len() as f64
}

fn first_of_month(date: NaiveDateTime) -> NaiveDate {
    NaiveDate::from_ymd_opt(date.year(), date.month(), 1).expect("day 1 is always valid")
}

fn next_month(month: NaiveDate) -> NaiveDate {
    let (year, next) = if month.month() == 12 {
        (month.year() + 1, 1)
    } else {
        (month.year(), month.month() + 1)
    };
    NaiveDate::from_ymd_opt(year, next, 1).expect("day 1 is always valid")
}

/// Mean of per-month churn ratios across the span from the earliest
/// pledge start to the latest pledge end (or `as_of` when every pledge is
/// still open-ended).
///
/// For each month M: active = pledges with `pledge_starts_at` <= end of M
/// and (`pledge_ended_at` null or >= start of M); churned = churned/failed
/// pledges whose `pledge_ended_at` falls inside M. The monthly ratio is 0
/// when nothing was active. The reported value is the arithmetic mean of
/// the monthly ratios — an average of ratios, kept that way for numeric
/// reproducibility with the dashboard's history.
pub fn monthly_attrition_rate(pledges: &[Pledge], as_of: NaiveDate) -> f64 {
    if pledges.is_empty() {
        warn!("Pledges dataset is empty: monthly attrition rate is zero");
        return 0.0;
    }

    let Some(span_start) = pledges.iter().filter_map(|p| p.pledge_starts_at).min() else {
        warn!("No pledge has a start date: monthly attrition rate is zero");
        return 0.0;
    };
    let span_end = pledges
        .iter()
        .filter_map(|p| p.pledge_ended_at)
        .max()
        .map(|d| d.date())
        .unwrap_or(as_of);

    let mut rates = Vec::new();
    let mut month = first_of_month(span_start);
    let last_month = NaiveDate::from_ymd_opt(span_end.year(), span_end.month(), 1)
        .expect("day 1 is always valid");

    while month <= last_month {
        let month_start = month.and_hms_opt(0, 0, 0).expect("midnight is valid");
        let month_end = next_month(month)
            .pred_opt()
            .expect("previous day of a month start exists")
            .and_hms_opt(23, 59, 59)
            .expect("end-of-day is valid");

        let active = pledges
            .iter()
            .filter(|p| {
                p.pledge_starts_at.is_some_and(|s| s <= month_end)
                    && p.pledge_ended_at.is_none_or(|e| e >= month_start)
            })
            .count();
        let churned = pledges
            .iter()
            .filter(|p| {
                p.pledge_status.is_churned()
                    && p.pledge_ended_at
                        .is_some_and(|e| e >= month_start && e <= month_end)
            })
            .count();

        rates.push(if active > 0 {
            churned as f64 / active as f64
        } else {
            0.0
        });
        month = next_month(month);
    }

    if rates.is_empty() {
        return 0.0;
    }
    rates.iter().sum::<f64>() / rates.len() as f64
}

/// Pledge counts per `chapter_type`.
pub fn breakdown_by_channel(pledges: &[Pledge]) -> BTreeMap<String, usize> {
    if pledges.is_empty() {
        warn!("Pledges dataset is empty: no channel breakdown");
        return BTreeMap::new();
    }

    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for pledge in pledges {
        *counts.entry(pledge.chapter_type.clone()).or_insert(0) += 1;
    }
    counts
}
