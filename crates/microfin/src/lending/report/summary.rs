use std::collections::BTreeMap;

use chrono::{FixedOffset, NaiveDate};

use super::views::{CollectionEntry, DailyCollectionSummary, MethodTotalEntry};
use crate::lending::ledger::{PaymentMethod, Repayment};
use crate::money::Money;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MethodTotal {
    pub postings: usize,
    pub total: Money,
}

/// Collections for one reporting day, derived directly from ledger postings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DailyCollections {
    pub date: NaiveDate,
    pub offset: FixedOffset,
    pub postings: Vec<Repayment>,
    /// Principal-reducing postings only.
    pub total_collection: Money,
    pub total_late_fee: Money,
    pub by_method: BTreeMap<PaymentMethod, MethodTotal>,
}

impl DailyCollections {
    pub(crate) fn from_postings(
        date: NaiveDate,
        offset: FixedOffset,
        mut postings: Vec<Repayment>,
    ) -> Self {
        postings.sort_by(|a, b| {
            a.payment_date
                .cmp(&b.payment_date)
                .then_with(|| a.loan_account_number.cmp(&b.loan_account_number))
                .then_with(|| a.sequence.cmp(&b.sequence))
        });

        let mut total_collection = Money::ZERO;
        let mut total_late_fee = Money::ZERO;
        let mut by_method: BTreeMap<PaymentMethod, MethodTotal> = BTreeMap::new();

        for posting in &postings {
            if posting.is_late_fee {
                total_late_fee += posting.amount;
            } else {
                total_collection += posting.amount;
            }
            let entry = by_method.entry(posting.payment_method).or_default();
            entry.postings += 1;
            entry.total += posting.amount;
        }

        Self {
            date,
            offset,
            postings,
            total_collection,
            total_late_fee,
            by_method,
        }
    }

    pub fn grand_total(&self) -> Money {
        self.total_collection + self.total_late_fee
    }

    pub fn summary(&self) -> DailyCollectionSummary {
        let postings = self
            .postings
            .iter()
            .map(|posting| CollectionEntry {
                loan_account_number: posting.loan_account_number.clone(),
                sequence: posting.sequence,
                amount: posting.amount,
                payment_method: posting.payment_method,
                payment_method_label: posting.payment_method.label(),
                is_late_fee: posting.is_late_fee,
                payment_date: posting.payment_date,
                local_time: posting.payment_date.with_timezone(&self.offset),
                recorded_by: posting.recorded_by.clone(),
                remarks: posting.remarks.clone(),
            })
            .collect();

        let by_method = PaymentMethod::ordered()
            .into_iter()
            .filter_map(|method| {
                self.by_method.get(&method).map(|totals| MethodTotalEntry {
                    method,
                    method_label: method.label(),
                    postings: totals.postings,
                    total: totals.total,
                })
            })
            .collect();

        DailyCollectionSummary {
            date: self.date,
            utc_offset: self.offset.to_string(),
            postings,
            total_collection: self.total_collection,
            total_late_fee: self.total_late_fee,
            grand_total: self.grand_total(),
            by_method,
        }
    }
}
