use crate::domain::booking::Booking;
use crate::error::Result;
use serde::Serialize;
use std::io::Write;

#[derive(Debug, Serialize)]
struct BookingRecord<'a> {
    booking: u64,
    room: u32,
    user: u32,
    check_in: String,
    check_out: String,
    nights: u32,
    price_per_night: String,
    total_price: String,
    status: &'a str,
    payment_status: &'a str,
    cancel_reason: &'a str,
    payment_intent: &'a str,
}

impl<'a> From<&'a Booking> for BookingRecord<'a> {
    fn from(booking: &'a Booking) -> Self {
        Self {
            booking: booking.id.0,
            room: booking.room.0,
            user: booking.user.0,
            check_in: booking.stay.check_in().to_string(),
            check_out: booking.stay.check_out().to_string(),
            nights: booking.stay.nights(),
            price_per_night: booking.price_per_night.to_string(),
            total_price: booking.total_price.to_string(),
            status: booking.status.as_str(),
            payment_status: booking.payment_status.as_str(),
            cancel_reason: booking.cancel_reason.map_or("", |reason| reason.as_str()),
            payment_intent: booking.payment_intent_id.as_deref().unwrap_or(""),
        }
    }
}

const HEADER: [&str; 12] = [
    "booking",
    "room",
    "user",
    "check_in",
    "check_out",
    "nights",
    "price_per_night",
    "total_price",
    "status",
    "payment_status",
    "cancel_reason",
    "payment_intent",
];

/// Writes the final booking report as CSV.
pub struct BookingWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> BookingWriter<W> {
    pub fn new(sink: W) -> Self {
        let writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(sink);
        Self { writer }
    }

    /// Writes the header and one row per booking, in the order given, and
    /// flushes. An empty report still carries the header.
    pub fn write_bookings<'a, I>(&mut self, bookings: I) -> Result<()>
    where
        I: IntoIterator<Item = &'a Booking>,
    {
        self.writer.write_record(HEADER)?;
        for booking in bookings {
            self.writer.serialize(BookingRecord::from(booking))?;
        }
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::booking::{
        BookingId, CANCELLABLE_BY_GUEST, CancelReason, NewBooking, Transition,
    };
    use crate::domain::dates::StayRange;
    use crate::domain::money::Money;
    use crate::domain::room::{RoomId, UserId};
    use chrono::{Duration, NaiveDate, TimeZone, Utc};
    use rust_decimal_macros::dec;

    fn booking() -> Booking {
        Booking::new(
            BookingId(3),
            NewBooking {
                room: RoomId(1),
                user: UserId(2),
                stay: StayRange::new(
                    NaiveDate::from_ymd_opt(2025, 3, 10).unwrap(),
                    NaiveDate::from_ymd_opt(2025, 3, 12).unwrap(),
                )
                .unwrap(),
                price_per_night: Money::new(dec!(120.5)),
                total_price: Money::new(dec!(241)),
                created_at: Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap(),
                hold: Duration::minutes(15),
            },
        )
    }

    #[test]
    fn test_writer_formats_rows() {
        let mut cancelled = booking();
        Transition::cancel(CANCELLABLE_BY_GUEST, CancelReason::User, cancelled.created_at)
            .apply(&mut cancelled);

        let mut out = Vec::new();
        BookingWriter::new(&mut out)
            .write_bookings([&booking(), &cancelled])
            .unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(
            lines[0],
            "booking,room,user,check_in,check_out,nights,price_per_night,total_price,status,payment_status,cancel_reason,payment_intent"
        );
        assert_eq!(lines[1], "3,1,2,2025-03-10,2025-03-12,2,120.50,241.00,pending,pending,,");
        assert_eq!(lines[2], "3,1,2,2025-03-10,2025-03-12,2,120.50,241.00,cancelled,pending,user,");
    }

    #[test]
    fn test_writer_empty_report_keeps_header() {
        let mut out = Vec::new();
        BookingWriter::new(&mut out).write_bookings(&[]).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text.lines().count(), 1);
        assert!(text.starts_with("booking,room,user,"));
    }
}
