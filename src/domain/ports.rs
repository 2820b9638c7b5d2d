use super::booking::{Booking, BookingId, NewBooking, Transition, TransitionOutcome};
use super::payment::{GatewayError, PaymentIntent};
use super::room::{Room, RoomId, User, UserId};
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Persistence for bookings.
///
/// Every write is a single atomic unit: `insert_if_available` checks the room's
/// calendar and inserts under one room-scoped guard, and `transition` compares and
/// writes one row without a window in between.
#[async_trait]
pub trait BookingStore: Send + Sync {
    /// Inserts the booking unless a live booking shares a night with it.
    ///
    /// Overlapping pending holds that have run out without payment are expired in
    /// the same unit of work. Fails with `RoomUnavailable` on conflict.
    async fn insert_if_available(&self, booking: NewBooking) -> Result<Booking>;
    async fn get(&self, id: BookingId) -> Result<Option<Booking>>;
    async fn room_bookings(&self, room: RoomId) -> Result<Vec<Booking>>;
    async fn user_bookings(&self, user: UserId) -> Result<Vec<Booking>>;
    /// Ids of pending holds whose window has elapsed at `now`.
    async fn expired_holds(&self, now: DateTime<Utc>) -> Result<Vec<BookingId>>;
    /// Applies `transition` if the row still matches it. Fails with
    /// `BookingNotFound` for unknown ids.
    async fn transition(&self, id: BookingId, transition: &Transition)
    -> Result<TransitionOutcome>;
    async fn all_bookings(&self) -> Result<Vec<Booking>>;
}

#[async_trait]
pub trait RoomDirectory: Send + Sync {
    async fn get_room(&self, id: RoomId) -> Result<Option<Room>>;
}

#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn get_user(&self, id: UserId) -> Result<Option<User>>;
}

/// An external payment processor.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_payment_intent(
        &self,
        amount: i64,
        currency: &str,
        metadata: BTreeMap<String, String>,
    ) -> std::result::Result<PaymentIntent, GatewayError>;

    async fn get_payment_intent(
        &self,
        intent_id: &str,
    ) -> std::result::Result<PaymentIntent, GatewayError>;
}

pub type BookingStoreRef = Arc<dyn BookingStore>;
pub type RoomDirectoryRef = Arc<dyn RoomDirectory>;
pub type UserDirectoryRef = Arc<dyn UserDirectory>;
pub type PaymentGatewayRef = Arc<dyn PaymentGateway>;
