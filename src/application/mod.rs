//! Application layer containing the booking orchestration.
//!
//! Each component owns one concern (availability, lifecycle, payment
//! reconciliation, expiry sweeping) and talks to the outside world only through
//! the ports in [`crate::domain::ports`]. `BookingEngine` wires them together.

pub mod availability;
pub mod engine;
pub mod lifecycle;
pub mod reconciliation;
pub mod sweeper;
