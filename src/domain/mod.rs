//! Booking domain: value objects, the booking state machine and the ports the
//! application layer talks through.

pub mod booking;
pub mod clock;
pub mod dates;
pub mod money;
pub mod payment;
pub mod ports;
pub mod room;
pub mod webhook;
