use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use serde::Serialize;

use crate::lending::ledger::PaymentMethod;
use crate::money::Money;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CollectionEntry {
    pub loan_account_number: String,
    pub sequence: u64,
    pub amount: Money,
    pub payment_method: PaymentMethod,
    pub payment_method_label: &'static str,
    pub is_late_fee: bool,
    pub payment_date: DateTime<Utc>,
    /// `payment_date` expressed in the reporting timezone.
    pub local_time: DateTime<FixedOffset>,
    pub recorded_by: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remarks: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MethodTotalEntry {
    pub method: PaymentMethod,
    pub method_label: &'static str,
    pub postings: usize,
    pub total: Money,
}

/// Daily collection summary handed to export/PDF collaborators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DailyCollectionSummary {
    pub date: NaiveDate,
    pub utc_offset: String,
    pub postings: Vec<CollectionEntry>,
    pub total_collection: Money,
    pub total_late_fee: Money,
    pub grand_total: Money,
    pub by_method: Vec<MethodTotalEntry>,
}
