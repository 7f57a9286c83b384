//! Left outer join from payments onto their originating pledges.
//!
//! Payments carry only a `pledge_id`; frequency and chapter attributes
//! live on the pledge. Orphan payments (no `pledge_id`, or no matching
//! pledge) keep their row with `"Unknown"` enrichment values.

use crate::filter::{FieldAccess, FieldRef};
use crate::schema::{Payment, Pledge, UNKNOWN};
use log::warn;
use std::collections::HashMap;

/// A payment with pledge attributes pulled in by the join.
#[derive(Debug, Clone)]
pub struct EnrichedPayment {
    pub payment: Payment,
    pub frequency: String,
    pub donor_chapter: String,
    pub chapter_type: String,
}

/// Joins each payment to its pledge by `pledge_id`.
///
/// The result always has exactly one row per input payment. Duplicate
/// pledge ids are a data-quality warning; the first occurrence wins so
/// the join is deterministic and never fans out rows.
pub fn enrich_payments(payments: &[Payment], pledges: &[Pledge]) -> Vec<EnrichedPayment> {
    let mut by_id: HashMap<&str, &Pledge> = HashMap::with_capacity(pledges.len());
    let mut duplicates = 0usize;
    for pledge in pledges {
        if by_id.contains_key(pledge.pledge_id.as_str()) {
            duplicates += 1;
        } else {
            by_id.insert(pledge.pledge_id.as_str(), pledge);
        }
    }
    if duplicates > 0 {
        warn!(
            "{} duplicate pledge id(s) in the pledge set: keeping first occurrence of each",
            duplicates
        );
    }

    payments
        .iter()
        .map(|payment| {
            let matched = payment
                .pledge_id
                .as_deref()
                .and_then(|id| by_id.get(id).copied());
            match matched {
                Some(pledge) => EnrichedPayment {
                    payment: payment.clone(),
                    frequency: pledge.frequency.clone(),
                    donor_chapter: pledge.donor_chapter.clone(),
                    chapter_type: pledge.chapter_type.clone(),
                },
                None => EnrichedPayment {
                    payment: payment.clone(),
                    frequency: UNKNOWN.to_string(),
                    donor_chapter: UNKNOWN.to_string(),
                    chapter_type: UNKNOWN.to_string(),
                },
            }
        })
        .collect()
}

impl FieldAccess for EnrichedPayment {
    fn field(&self, name: &str) -> FieldRef {
        match name {
            "frequency" => FieldRef::Text(self.frequency.clone()),
            "donor_chapter" => FieldRef::Text(self.donor_chapter.clone()),
            "chapter_type" => FieldRef::Text(self.chapter_type.clone()),
            _ => self.payment.field(name),
        }
    }
}
