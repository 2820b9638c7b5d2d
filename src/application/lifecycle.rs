use crate::config::BookingConfig;
use crate::domain::booking::{
    Booking, BookingId, BookingStatus, CANCELLABLE_BY_ADMIN, CANCELLABLE_BY_GUEST, CancelReason,
    NewBooking, PaymentStatus, Transition, TransitionOutcome,
};
use crate::domain::clock::ClockRef;
use crate::domain::dates::StayRange;
use crate::domain::ports::{BookingStoreRef, RoomDirectoryRef, UserDirectoryRef};
use crate::domain::room::{Actor, RoomId, UserId};
use crate::error::{BookingError, Result};
use chrono::{Duration, NaiveDate};
use tracing::{debug, info, warn};

/// Owns the booking state machine outside of payments: holds, cancellation,
/// administrative confirmation and hold expiry.
pub struct BookingManager {
    rooms: RoomDirectoryRef,
    users: UserDirectoryRef,
    store: BookingStoreRef,
    clock: ClockRef,
    hold: Duration,
    cancellation_cutoff: Duration,
}

impl BookingManager {
    pub fn new(
        config: &BookingConfig,
        rooms: RoomDirectoryRef,
        users: UserDirectoryRef,
        store: BookingStoreRef,
        clock: ClockRef,
    ) -> Self {
        Self {
            rooms,
            users,
            store,
            clock,
            hold: config.hold_duration(),
            cancellation_cutoff: config.cancellation_cutoff(),
        }
    }

    /// Places a pending hold on the room.
    ///
    /// The overlap check runs inside the store's insert, under the room's guard,
    /// so two concurrent requests for the same nights cannot both succeed.
    pub async fn create(
        &self,
        room_id: RoomId,
        user_id: UserId,
        check_in: NaiveDate,
        check_out: NaiveDate,
    ) -> Result<Booking> {
        let now = self.clock.now();
        let stay = StayRange::new(check_in, check_out)?;
        stay.ensure_not_past(now)?;

        let room = self
            .rooms
            .get_room(room_id)
            .await?
            .ok_or(BookingError::RoomNotFound(room_id))?;
        if !room.is_available {
            return Err(BookingError::RoomUnavailable {
                room: room_id,
                check_in,
                check_out,
            });
        }
        if self.users.get_user(user_id).await?.is_none() {
            return Err(BookingError::UserNotFound(user_id));
        }

        let total_price = room.price_per_night.checked_mul(stay.nights())?;
        let booking = self
            .store
            .insert_if_available(NewBooking {
                room: room_id,
                user: user_id,
                stay,
                price_per_night: room.price_per_night,
                total_price,
                created_at: now,
                hold: self.hold,
            })
            .await?;

        info!(
            booking_id = %booking.id,
            room_id = %room_id,
            user_id = %user_id,
            stay = %stay,
            total_price = %booking.total_price,
            "Booking held"
        );
        Ok(booking)
    }

    pub async fn cancel(&self, id: BookingId, actor: Actor) -> Result<Booking> {
        let booking = self.load(id).await?;
        if !actor.can_access(booking.user) {
            return Err(BookingError::Unauthorized(format!(
                "user {} does not own booking {id}",
                actor.user_id()
            )));
        }

        match booking.status {
            BookingStatus::Cancelled | BookingStatus::Failed => {
                return Err(BookingError::BookingNotCancellable {
                    booking: id,
                    status: booking.status,
                });
            }
            BookingStatus::Paid if !actor.is_admin() => return Err(paid_needs_admin(id)),
            _ => {}
        }

        let now = self.clock.now();
        if !actor.is_admin() && now >= booking.stay.arrival() - self.cancellation_cutoff {
            return Err(BookingError::CancellationWindowClosed(id));
        }

        let transition = if actor.is_admin() {
            Transition::cancel(CANCELLABLE_BY_ADMIN, CancelReason::Admin, now)
        } else {
            Transition::cancel(CANCELLABLE_BY_GUEST, CancelReason::User, now)
        };

        match self.store.transition(id, &transition).await? {
            TransitionOutcome::Applied(booking) => {
                if booking.payment_status == PaymentStatus::Paid {
                    warn!(booking_id = %id, "Paid booking cancelled by administrator; refund handled out of band");
                }
                info!(booking_id = %id, actor = ?actor, "Booking cancelled");
                Ok(booking)
            }
            TransitionOutcome::Rejected(current) => match current.status {
                BookingStatus::Cancelled => {
                    debug!(booking_id = %id, "Booking was already cancelled");
                    Ok(current)
                }
                BookingStatus::Paid => Err(paid_needs_admin(id)),
                status => Err(BookingError::BookingNotCancellable {
                    booking: id,
                    status,
                }),
            },
        }
    }

    /// Accepts a pending hold without online payment. Administrators only.
    pub async fn confirm(&self, id: BookingId, actor: Actor) -> Result<Booking> {
        if !actor.is_admin() {
            return Err(BookingError::Unauthorized(
                "only administrators can confirm bookings".to_string(),
            ));
        }

        let now = self.clock.now();
        match self.store.transition(id, &Transition::confirm(now)).await? {
            TransitionOutcome::Applied(booking) => {
                info!(booking_id = %id, "Booking confirmed");
                Ok(booking)
            }
            TransitionOutcome::Rejected(current) if current.status == BookingStatus::Confirmed => {
                Ok(current)
            }
            TransitionOutcome::Rejected(current) => Err(BookingError::BookingNotPayable {
                booking: id,
                status: current.status,
            }),
        }
    }

    pub async fn get(&self, id: BookingId, actor: Actor) -> Result<Booking> {
        let booking = self.load(id).await?;
        if actor.can_access(booking.user) {
            Ok(booking)
        } else {
            Err(BookingError::Unauthorized(format!(
                "user {} does not own booking {id}",
                actor.user_id()
            )))
        }
    }

    pub async fn bookings_for_user(&self, user: UserId) -> Result<Vec<Booking>> {
        self.store.user_bookings(user).await
    }

    pub async fn all_bookings(&self) -> Result<Vec<Booking>> {
        self.store.all_bookings().await
    }

    /// Cancels every pending hold whose window has run out without a payment.
    ///
    /// Each row is flipped with a conditional update, so a payment recorded
    /// between listing and writing wins and the row is skipped.
    pub async fn expire_stale_pending(&self) -> Result<Vec<BookingId>> {
        let now = self.clock.now();
        let transition = Transition::expire(now);
        let mut expired = Vec::new();

        for id in self.store.expired_holds(now).await? {
            match self.store.transition(id, &transition).await? {
                TransitionOutcome::Applied(_) => {
                    info!(booking_id = %id, reason = CancelReason::Expired.as_str(), "Hold expired");
                    expired.push(id);
                }
                TransitionOutcome::Rejected(current) => {
                    debug!(booking_id = %id, status = %current.status, "Hold resolved before expiry");
                }
            }
        }

        Ok(expired)
    }

    async fn load(&self, id: BookingId) -> Result<Booking> {
        self.store
            .get(id)
            .await?
            .ok_or(BookingError::BookingNotFound(id))
    }
}

fn paid_needs_admin(id: BookingId) -> BookingError {
    BookingError::Unauthorized(format!(
        "booking {id} is paid; only an administrator can cancel it"
    ))
}
