use crate::domain::booking::{BookingId, BookingStatus};
use crate::domain::room::{RoomId, UserId};
use chrono::NaiveDate;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, BookingError>;

#[derive(Error, Debug)]
pub enum BookingError {
    #[error("Invalid date range: {0}")]
    InvalidDateRange(String),
    #[error("Room {room} is unavailable from {check_in} to {check_out}")]
    RoomUnavailable {
        room: RoomId,
        check_in: NaiveDate,
        check_out: NaiveDate,
    },
    #[error("Room {0} not found")]
    RoomNotFound(RoomId),
    #[error("User {0} not found")]
    UserNotFound(UserId),
    #[error("Booking {0} not found")]
    BookingNotFound(BookingId),
    #[error("Booking {booking} is not payable in status {status}")]
    BookingNotPayable {
        booking: BookingId,
        status: BookingStatus,
    },
    #[error("Booking {booking} cannot be cancelled in status {status}")]
    BookingNotCancellable {
        booking: BookingId,
        status: BookingStatus,
    },
    #[error("Cancellation window for booking {0} has closed")]
    CancellationWindowClosed(BookingId),
    #[error("Payment gateway unreachable: {0}")]
    PaymentGatewayUnreachable(String),
    #[error("Payment verification failed for intent {intent}: {reason}")]
    PaymentVerificationFailed { intent: String, reason: String },
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    #[error("Gateway notification signature mismatch")]
    InvalidSignature,
    #[error("Malformed gateway notification: {0}")]
    InvalidNotification(String),
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Internal error: {0}")]
    InternalError(Box<dyn std::error::Error + Send + Sync>),
}

impl BookingError {
    /// Whether the caller may retry the same request unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::PaymentGatewayUnreachable(_))
    }
}

#[cfg(feature = "storage-rocksdb")]
impl From<rocksdb::Error> for BookingError {
    fn from(err: rocksdb::Error) -> Self {
        Self::InternalError(Box::new(err))
    }
}

impl From<serde_json::Error> for BookingError {
    fn from(err: serde_json::Error) -> Self {
        Self::InternalError(Box::new(err))
    }
}
