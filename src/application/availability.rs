use crate::domain::booking::find_conflict;
use crate::domain::clock::ClockRef;
use crate::domain::dates::StayRange;
use crate::domain::ports::{BookingStoreRef, RoomDirectoryRef};
use crate::domain::room::RoomId;
use crate::error::{BookingError, Result};
use chrono::NaiveDate;
use tracing::debug;

/// Answers "can this room be booked for these nights right now?".
///
/// A pure read. Expired holds are filtered out here with the same predicate the
/// stores use when inserting, so the answer never depends on when the sweep last
/// ran.
pub struct AvailabilityChecker {
    rooms: RoomDirectoryRef,
    store: BookingStoreRef,
    clock: ClockRef,
}

impl AvailabilityChecker {
    pub fn new(rooms: RoomDirectoryRef, store: BookingStoreRef, clock: ClockRef) -> Self {
        Self {
            rooms,
            store,
            clock,
        }
    }

    /// Fails with `InvalidDateRange` for empty or inverted ranges rather than
    /// reporting them as available.
    pub async fn is_available(
        &self,
        room: RoomId,
        check_in: NaiveDate,
        check_out: NaiveDate,
    ) -> Result<bool> {
        let stay = StayRange::new(check_in, check_out)?;
        self.is_stay_available(room, &stay).await
    }

    pub async fn is_stay_available(&self, room_id: RoomId, stay: &StayRange) -> Result<bool> {
        let room = self
            .rooms
            .get_room(room_id)
            .await?
            .ok_or(BookingError::RoomNotFound(room_id))?;

        if !room.is_available {
            debug!(room_id = %room_id, "Room is closed by the directory");
            return Ok(false);
        }

        let now = self.clock.now();
        let calendar = self.store.room_bookings(room_id).await?;
        let conflict = find_conflict(&calendar, stay, now);
        if let Some(booking) = conflict {
            debug!(room_id = %room_id, stay = %stay, booking_id = %booking.id, "Stay overlaps an existing booking");
        }
        Ok(conflict.is_none())
    }
}
