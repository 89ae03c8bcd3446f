use std::sync::Arc;

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};

use super::summary::DailyCollections;
use crate::lending::error::{EngineError, ValidationError};
use crate::lending::loans::LoanRepository;
use crate::lending::retry::ReadRetryPolicy;

/// Read-only projection over ledger postings. Nothing here is cached or stored.
pub struct ReportAggregator {
    loans: Arc<dyn LoanRepository>,
    offset: FixedOffset,
    reads: ReadRetryPolicy,
}

impl ReportAggregator {
    pub fn new(
        loans: Arc<dyn LoanRepository>,
        offset: FixedOffset,
        reads: ReadRetryPolicy,
    ) -> Self {
        Self {
            loans,
            offset,
            reads,
        }
    }

    /// Postings whose `payment_date` falls on `date` in the reporting timezone.
    pub fn daily_collections(&self, date: NaiveDate) -> Result<DailyCollections, EngineError> {
        let (from, to) = day_window(date, self.offset)?;
        let postings = self
            .reads
            .run(|| self.loans.postings_between(from, to))?;
        Ok(DailyCollections::from_postings(date, self.offset, postings))
    }
}

/// `[local midnight, next local midnight)` of `date`, expressed in UTC.
pub(crate) fn day_window(
    date: NaiveDate,
    offset: FixedOffset,
) -> Result<(DateTime<Utc>, DateTime<Utc>), ValidationError> {
    let out_of_range = || ValidationError::new("date", "outside the supported calendar range");
    let next = date.succ_opt().ok_or_else(out_of_range)?;
    let start = date
        .and_hms_opt(0, 0, 0)
        .and_then(|midnight| midnight.and_local_timezone(offset).single())
        .ok_or_else(out_of_range)?;
    let end = next
        .and_hms_opt(0, 0, 0)
        .and_then(|midnight| midnight.and_local_timezone(offset).single())
        .ok_or_else(out_of_range)?;
    Ok((start.with_timezone(&Utc), end.with_timezone(&Utc)))
}
