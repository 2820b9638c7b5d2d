use crate::error::BookingError;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A half-open range of nights `[check_in, check_out)`.
///
/// Construction guarantees at least one night, so an instance can never stand for
/// an empty stay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StayRange {
    check_in: NaiveDate,
    check_out: NaiveDate,
}

impl StayRange {
    pub fn new(check_in: NaiveDate, check_out: NaiveDate) -> Result<Self, BookingError> {
        if check_in >= check_out {
            return Err(BookingError::InvalidDateRange(format!(
                "check-in {check_in} must be before check-out {check_out}"
            )));
        }
        Ok(Self {
            check_in,
            check_out,
        })
    }

    pub fn check_in(&self) -> NaiveDate {
        self.check_in
    }

    pub fn check_out(&self) -> NaiveDate {
        self.check_out
    }

    pub fn nights(&self) -> u32 {
        // Positive by construction; a stay longer than u32::MAX nights is not a thing.
        u32::try_from((self.check_out - self.check_in).num_days()).unwrap_or(u32::MAX)
    }

    /// True when the two stays share at least one night.
    pub fn overlaps(&self, other: &StayRange) -> bool {
        self.check_in < other.check_out && self.check_out > other.check_in
    }

    /// Rejects stays starting before the current UTC date.
    pub fn ensure_not_past(&self, now: DateTime<Utc>) -> Result<(), BookingError> {
        let today = now.date_naive();
        if self.check_in < today {
            return Err(BookingError::InvalidDateRange(format!(
                "check-in {} is in the past",
                self.check_in
            )));
        }
        Ok(())
    }

    /// Start of the check-in day, the reference point for cancellation cutoffs.
    pub fn arrival(&self) -> DateTime<Utc> {
        self.check_in.and_time(chrono::NaiveTime::MIN).and_utc()
    }
}

impl fmt::Display for StayRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.check_in, self.check_out)
    }
}
