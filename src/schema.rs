//! Typed records for the two snapshot datasets.
//!
//! Deserialization is deliberately lenient at the row level: unparseable
//! dates become `None` and null/empty categoricals become the `"Unknown"`
//! sentinel before any grouping can see them. Bad rows are logged, never
//! fatal.

use chrono::NaiveDateTime;
use log::warn;
use serde::{Deserialize, Serialize};

/// Sentinel for null, empty, or not-applicable categorical values.
pub const UNKNOWN: &str = "Unknown";

/// Lifecycle status of a pledge. Unexpected strings are preserved in
/// `Other` rather than failing the load.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PledgeStatus {
    Pledged,
    Active,
    OneTime,
    PaymentFailure,
    Churned,
    Other(String),
}

impl PledgeStatus {
    pub fn as_str(&self) -> &str {
        match self {
            PledgeStatus::Pledged => "Pledged donor",
            PledgeStatus::Active => "Active donor",
            PledgeStatus::OneTime => "One-time donor",
            PledgeStatus::PaymentFailure => "Payment failure",
            PledgeStatus::Churned => "Churned donor",
            PledgeStatus::Other(s) => s,
        }
    }

    /// Statuses that count as lost pledges for attrition purposes.
    pub fn is_churned(&self) -> bool {
        matches!(self, PledgeStatus::PaymentFailure | PledgeStatus::Churned)
    }
}

impl From<String> for PledgeStatus {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "Pledged donor" => PledgeStatus::Pledged,
            "Active donor" => PledgeStatus::Active,
            "One-time donor" => PledgeStatus::OneTime,
            "Payment failure" => PledgeStatus::PaymentFailure,
            "Churned donor" => PledgeStatus::Churned,
            _ => {
                warn!("Unrecognized pledge status '{}'", raw);
                PledgeStatus::Other(raw)
            }
        }
    }
}

impl From<PledgeStatus> for String {
    fn from(status: PledgeStatus) -> Self {
        status.as_str().to_string()
    }
}

/// One payment transaction.
///
/// `amount_usd` is derived: only the currency normalizer populates it, and
/// it stays `None` (not zero) when conversion is impossible. Aggregations
/// treat `None` as "excluded", never as an error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    pub payment_id: String,
    pub donor_id: String,
    #[serde(default)]
    pub pledge_id: Option<String>,
    #[serde(default = "default_unknown", deserialize_with = "de::category")]
    pub payment_platform: String,
    #[serde(default = "default_unknown", deserialize_with = "de::category")]
    pub portfolio: String,
    #[serde(default)]
    pub amount: Option<f64>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default, deserialize_with = "de::lenient_date")]
    pub date: Option<NaiveDateTime>,
    #[serde(default = "default_counterfactuality")]
    pub counterfactuality: f64,
    #[serde(default, skip_deserializing)]
    pub amount_usd: Option<f64>,
}

fn default_counterfactuality() -> f64 {
    1.0
}

fn default_unknown() -> String {
    UNKNOWN.to_string()
}

/// One recurring or one-time giving commitment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pledge {
    pub pledge_id: String,
    pub donor_id: String,
    #[serde(default = "default_unknown", deserialize_with = "de::category")]
    pub donor_chapter: String,
    #[serde(default = "default_unknown", deserialize_with = "de::category")]
    pub chapter_type: String,
    pub pledge_status: PledgeStatus,
    #[serde(default, deserialize_with = "de::lenient_date")]
    pub pledge_created_at: Option<NaiveDateTime>,
    #[serde(default, deserialize_with = "de::lenient_date")]
    pub pledge_starts_at: Option<NaiveDateTime>,
    #[serde(default, deserialize_with = "de::lenient_date")]
    pub pledge_ended_at: Option<NaiveDateTime>,
    #[serde(default)]
    pub contribution_amount: Option<f64>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default = "default_unknown", deserialize_with = "de::category")]
    pub frequency: String,
    #[serde(default, skip_deserializing)]
    pub contribution_amount_usd: Option<f64>,
}

/// Collapses null, empty, and case-variant "not applicable" values to the
/// `"Unknown"` sentinel so grouping never splits on null-vs-"Unknown".
pub fn normalize_category(raw: Option<String>) -> String {
    match raw {
        None => UNKNOWN.to_string(),
        Some(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return UNKNOWN.to_string();
            }
            match trimmed.to_ascii_lowercase().as_str() {
                "n/a" | "na" | "none" | "null" | "unknown" => UNKNOWN.to_string(),
                _ => trimmed.to_string(),
            }
        }
    }
}

/// Parses the date formats seen in the snapshot exports. Returns `None`
/// for anything unparseable.
pub fn parse_flexible_date(raw: &str) -> Option<NaiveDateTime> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Some(dt);
        }
    }

    chrono::NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

pub(crate) mod de {
    use super::{normalize_category, parse_flexible_date};
    use chrono::NaiveDateTime;
    use log::warn;
    use serde::{Deserialize, Deserializer};

    pub fn category<'de, D>(deserializer: D) -> Result<String, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(normalize_category(raw))
    }

    pub fn lenient_date<'de, D>(deserializer: D) -> Result<Option<NaiveDateTime>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Option::<String>::deserialize(deserializer)?;
        match raw {
            None => Ok(None),
            Some(s) => {
                let parsed = parse_flexible_date(&s);
                if parsed.is_none() && !s.trim().is_empty() {
                    warn!("Unparseable date value '{}': treating as null", s);
                }
                Ok(parsed)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_normalize_category_sentinel() {
        assert_eq!(normalize_category(None), "Unknown");
        assert_eq!(normalize_category(Some("".to_string())), "Unknown");
        assert_eq!(normalize_category(Some("  ".to_string())), "Unknown");
        assert_eq!(normalize_category(Some("N/A".to_string())), "Unknown");
        assert_eq!(normalize_category(Some("unknown".to_string())), "Unknown");
        assert_eq!(
            normalize_category(Some("Top Picks".to_string())),
            "Top Picks"
        );
    }

    #[test]
    fn test_parse_flexible_date_formats() {
        let midnight = NaiveDate::from_ymd_opt(2024, 1, 15)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        assert_eq!(parse_flexible_date("2024-01-15"), Some(midnight));
        assert_eq!(
            parse_flexible_date("2024-01-15 12:30:00"),
            NaiveDate::from_ymd_opt(2024, 1, 15)
                .unwrap()
                .and_hms_opt(12, 30, 0)
        );
        assert_eq!(parse_flexible_date("not a date"), None);
        assert_eq!(parse_flexible_date(""), None);
    }

    #[test]
    fn test_payment_deserializes_with_nulls() {
        let json = r#"{
            "payment_id": "pay_1",
            "donor_id": "d_1",
            "pledge_id": null,
            "payment_platform": "",
            "portfolio": null,
            "amount": 25.0,
            "currency": "USD",
            "date": "2024-03-02",
            "counterfactuality": 0.5
        }"#;

        let payment: Payment = serde_json::from_str(json).unwrap();
        assert_eq!(payment.payment_platform, "Unknown");
        assert_eq!(payment.portfolio, "Unknown");
        assert!(payment.pledge_id.is_none());
        assert!(payment.amount_usd.is_none());
        assert_eq!(payment.counterfactuality, 0.5);
    }

    #[test]
    fn test_payment_bad_date_becomes_null() {
        let json = r#"{
            "payment_id": "pay_2",
            "donor_id": "d_1",
            "amount": 10.0,
            "currency": "USD",
            "date": "garbage"
        }"#;

        let payment: Payment = serde_json::from_str(json).unwrap();
        assert!(payment.date.is_none());
        assert_eq!(payment.counterfactuality, 1.0);
    }

    #[test]
    fn test_pledge_status_round_trip() {
        assert_eq!(
            PledgeStatus::from("Active donor".to_string()),
            PledgeStatus::Active
        );
        assert_eq!(PledgeStatus::Active.as_str(), "Active donor");
        assert!(PledgeStatus::Churned.is_churned());
        assert!(PledgeStatus::PaymentFailure.is_churned());
        assert!(!PledgeStatus::OneTime.is_churned());
    }

    #[test]
    fn test_pledge_status_unknown_string_preserved() {
        let status = PledgeStatus::from("Paused donor".to_string());
        assert_eq!(status, PledgeStatus::Other("Paused donor".to_string()));
        assert_eq!(status.as_str(), "Paused donor");
    }
}
