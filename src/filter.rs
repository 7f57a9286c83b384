//! Predicate-based filtering over the snapshot datasets.
//!
//! Filters are a conjunction of tagged predicates instead of stringly
//! typed field/operator pairs, so an invalid filter is a construction-time
//! error rather than a malformed query string. Predicates naming a field
//! the dataset does not have are ignored; this default is deliberate and
//! tested.

use crate::schema::{Payment, Pledge};
use crate::timewindow::DateWindow;
use chrono::NaiveDateTime;
use log::debug;
use std::collections::BTreeSet;

/// The value of a named field on a record, as seen by the filter engine.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldRef {
    /// The record type has no such field: the predicate is skipped.
    Unknown,
    /// The field exists but holds no value: value predicates fail.
    Null,
    Text(String),
    Date(NaiveDateTime),
}

/// Field lookup by name. Implemented by each filterable record type.
pub trait FieldAccess {
    fn field(&self, name: &str) -> FieldRef;
}

/// A single filter condition. A filter is a list of these, conjoined.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Equals {
        field: String,
        value: String,
    },
    OneOf {
        field: String,
        values: BTreeSet<String>,
    },
    Range {
        field: String,
        start: NaiveDateTime,
        end: NaiveDateTime,
    },
    /// Matches when the date falls in ANY of the windows. Callers that
    /// mean "no date restriction" must omit the predicate rather than
    /// pass an empty window list.
    InAnyWindow {
        field: String,
        windows: Vec<DateWindow>,
    },
}

impl Predicate {
    pub fn equals(field: &str, value: &str) -> Self {
        Predicate::Equals {
            field: field.to_string(),
            value: value.to_string(),
        }
    }

    pub fn one_of<I: IntoIterator<Item = String>>(field: &str, values: I) -> Self {
        Predicate::OneOf {
            field: field.to_string(),
            values: values.into_iter().collect(),
        }
    }

    pub fn in_any_window(field: &str, windows: Vec<DateWindow>) -> Self {
        Predicate::InAnyWindow {
            field: field.to_string(),
            windows,
        }
    }

    fn field_name(&self) -> &str {
        match self {
            Predicate::Equals { field, .. }
            | Predicate::OneOf { field, .. }
            | Predicate::Range { field, .. }
            | Predicate::InAnyWindow { field, .. } => field,
        }
    }

    fn accepts<T: FieldAccess>(&self, row: &T) -> bool {
        let value = row.field(self.field_name());
        if value == FieldRef::Unknown {
            debug!(
                "Predicate on unknown field '{}': ignoring",
                self.field_name()
            );
            return true;
        }

        match (self, value) {
            (Predicate::Equals { value: expected, .. }, FieldRef::Text(actual)) => {
                actual == *expected
            }
            (Predicate::OneOf { values, .. }, FieldRef::Text(actual)) => values.contains(&actual),
            (Predicate::Range { start, end, .. }, FieldRef::Date(actual)) => {
                actual >= *start && actual <= *end
            }
            (Predicate::InAnyWindow { windows, .. }, FieldRef::Date(actual)) => {
                windows.iter().any(|w| w.contains(actual))
            }
            // Null values, and type mismatches between predicate and field,
            // never match.
            _ => false,
        }
    }
}

/// Applies the conjunction of `predicates`, returning a new dataset.
/// The input is never mutated; an empty input is a no-op.
pub fn apply<T: FieldAccess + Clone>(rows: &[T], predicates: &[Predicate]) -> Vec<T> {
    if predicates.is_empty() {
        return rows.to_vec();
    }
    rows.iter()
        .filter(|row| predicates.iter().all(|p| p.accepts(*row)))
        .cloned()
        .collect()
}

impl FieldAccess for Payment {
    fn field(&self, name: &str) -> FieldRef {
        match name {
            "payment_id" => FieldRef::Text(self.payment_id.clone()),
            "donor_id" => FieldRef::Text(self.donor_id.clone()),
            "pledge_id" => match &self.pledge_id {
                Some(id) => FieldRef::Text(id.clone()),
                None => FieldRef::Null,
            },
            "payment_platform" => FieldRef::Text(self.payment_platform.clone()),
            "portfolio" => FieldRef::Text(self.portfolio.clone()),
            "currency" => match &self.currency {
                Some(code) => FieldRef::Text(code.clone()),
                None => FieldRef::Null,
            },
            "date" => match self.date {
                Some(date) => FieldRef::Date(date),
                None => FieldRef::Null,
            },
            _ => FieldRef::Unknown,
        }
    }
}

impl FieldAccess for Pledge {
    fn field(&self, name: &str) -> FieldRef {
        match name {
            "pledge_id" => FieldRef::Text(self.pledge_id.clone()),
            "donor_id" => FieldRef::Text(self.donor_id.clone()),
            "donor_chapter" => FieldRef::Text(self.donor_chapter.clone()),
            "chapter_type" => FieldRef::Text(self.chapter_type.clone()),
            "pledge_status" => FieldRef::Text(self.pledge_status.as_str().to_string()),
            "frequency" => FieldRef::Text(self.frequency.clone()),
            "pledge_created_at" => match self.pledge_created_at {
                Some(date) => FieldRef::Date(date),
                None => FieldRef::Null,
            },
            "pledge_starts_at" => match self.pledge_starts_at {
                Some(date) => FieldRef::Date(date),
                None => FieldRef::Null,
            },
            "pledge_ended_at" => match self.pledge_ended_at {
                Some(date) => FieldRef::Date(date),
                None => FieldRef::Null,
            },
            _ => FieldRef::Unknown,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timewindow::{resolve_windows, YearMode};
    use chrono::NaiveDate;

    fn payment(id: &str, portfolio: &str, year: i32) -> Payment {
        Payment {
            payment_id: id.to_string(),
            donor_id: "d1".to_string(),
            pledge_id: None,
            payment_platform: "Benevity".to_string(),
            portfolio: portfolio.to_string(),
            amount: Some(10.0),
            currency: Some("USD".to_string()),
            date: NaiveDate::from_ymd_opt(year, 3, 15)
                .unwrap()
                .and_hms_opt(0, 0, 0),
            counterfactuality: 1.0,
            amount_usd: Some(10.0),
        }
    }

    #[test]
    fn test_equals_and_one_of_conjoin() {
        let rows = vec![
            payment("p1", "Top Picks", 2024),
            payment("p2", "Global Health", 2024),
            payment("p3", "Top Picks", 2023),
        ];

        let predicates = vec![
            Predicate::equals("portfolio", "Top Picks"),
            Predicate::one_of("payment_platform", ["Benevity".to_string()]),
        ];

        let filtered = apply(&rows, &predicates);
        assert_eq!(filtered.len(), 2);
        assert!(filtered.iter().all(|p| p.portfolio == "Top Picks"));
    }

    #[test]
    fn test_window_predicate_ors_across_windows() {
        let rows = vec![
            payment("p1", "Top Picks", 2022),
            payment("p2", "Top Picks", 2023),
            payment("p3", "Top Picks", 2024),
        ];

        let years = [2022, 2024].into_iter().collect();
        let windows = resolve_windows(&years, YearMode::Calendar);
        let filtered = apply(&rows, &[Predicate::in_any_window("date", windows)]);

        let ids: Vec<&str> = filtered.iter().map(|p| p.payment_id.as_str()).collect();
        assert_eq!(ids, vec!["p1", "p3"]);
    }

    #[test]
    fn test_unknown_field_is_ignored() {
        let rows = vec![payment("p1", "Top Picks", 2024)];
        let filtered = apply(&rows, &[Predicate::equals("no_such_field", "x")]);
        assert_eq!(filtered.len(), 1);
    }

    #[test]
    fn test_null_value_fails_predicate() {
        let mut row = payment("p1", "Top Picks", 2024);
        row.date = None;
        let years = [2024].into_iter().collect();
        let windows = resolve_windows(&years, YearMode::Calendar);
        let filtered = apply(&[row], &[Predicate::in_any_window("date", windows)]);
        assert!(filtered.is_empty());
    }

    #[test]
    fn test_empty_dataset_is_a_noop() {
        let rows: Vec<Payment> = Vec::new();
        let filtered = apply(&rows, &[Predicate::equals("portfolio", "Top Picks")]);
        assert!(filtered.is_empty());
    }

    #[test]
    fn test_filtering_is_idempotent() {
        let rows = vec![
            payment("p1", "Top Picks", 2024),
            payment("p2", "Global Health", 2024),
        ];
        let predicates = vec![Predicate::equals("portfolio", "Top Picks")];

        let once = apply(&rows, &predicates);
        let twice = apply(&once, &predicates);
        assert_eq!(once.len(), twice.len());
        assert_eq!(
            once.iter().map(|p| &p.payment_id).collect::<Vec<_>>(),
            twice.iter().map(|p| &p.payment_id).collect::<Vec<_>>()
        );
    }
}
