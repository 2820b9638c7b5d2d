use crate::domain::booking::{
    Booking, BookingId, NewBooking, Overlap, Transition, TransitionOutcome, find_conflict,
};
use crate::domain::money::Money;
use crate::domain::ports::{BookingStore, RoomDirectory, UserDirectory};
use crate::domain::room::{Room, RoomId, User, UserId};
use crate::error::{BookingError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;
use tracing::info;

type Calendar = Arc<RwLock<BTreeMap<BookingId, Booking>>>;

/// A thread-safe in-memory booking store, sharded by room.
///
/// Each room owns its own calendar behind a `RwLock`; creating a booking and
/// transitioning any booking of that room both go through the calendar's write
/// guard, so writers on one room are linearized and writers on different rooms
/// never wait on each other.
#[derive(Default, Clone)]
pub struct InMemoryBookingStore {
    calendars: Arc<RwLock<HashMap<RoomId, Calendar>>>,
    index: Arc<RwLock<HashMap<BookingId, RoomId>>>,
    next_id: Arc<AtomicU64>,
}

impl InMemoryBookingStore {
    /// Creates a new, empty in-memory booking store.
    pub fn new() -> Self {
        Self::default()
    }

    async fn calendar(&self, room: RoomId) -> Calendar {
        if let Some(calendar) = self.calendars.read().await.get(&room) {
            return calendar.clone();
        }
        self.calendars
            .write()
            .await
            .entry(room)
            .or_default()
            .clone()
    }

    async fn calendar_of(&self, id: BookingId) -> Option<Calendar> {
        let room = self.index.read().await.get(&id).copied()?;
        Some(self.calendar(room).await)
    }

    async fn snapshot(&self) -> Vec<Calendar> {
        self.calendars.read().await.values().cloned().collect()
    }
}

#[async_trait]
impl BookingStore for InMemoryBookingStore {
    async fn insert_if_available(&self, new: NewBooking) -> Result<Booking> {
        let calendar = self.calendar(new.room).await;
        let mut bookings = calendar.write().await;
        let now = new.created_at;

        if let Some(existing) = find_conflict(bookings.values(), &new.stay, now) {
            return Err(BookingError::RoomUnavailable {
                room: existing.room,
                check_in: new.stay.check_in(),
                check_out: new.stay.check_out(),
            });
        }

        let expire = Transition::expire(now);
        for stale in bookings
            .values_mut()
            .filter(|b| b.classify(&new.stay, now) == Overlap::Stale)
        {
            if expire.admits(stale) {
                expire.apply(stale);
                info!(booking_id = %stale.id, room_id = %stale.room, "Expired stale hold displaced by new booking");
            }
        }

        let id = BookingId(self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        let booking = Booking::new(id, new);
        bookings.insert(id, booking.clone());
        self.index.write().await.insert(id, booking.room);
        Ok(booking)
    }

    async fn get(&self, id: BookingId) -> Result<Option<Booking>> {
        let Some(calendar) = self.calendar_of(id).await else {
            return Ok(None);
        };
        let bookings = calendar.read().await;
        Ok(bookings.get(&id).cloned())
    }

    async fn room_bookings(&self, room: RoomId) -> Result<Vec<Booking>> {
        let calendar = self.calendar(room).await;
        let bookings = calendar.read().await;
        Ok(bookings.values().cloned().collect())
    }

    async fn user_bookings(&self, user: UserId) -> Result<Vec<Booking>> {
        let mut found = Vec::new();
        for calendar in self.snapshot().await {
            let bookings = calendar.read().await;
            found.extend(bookings.values().filter(|b| b.user == user).cloned());
        }
        found.sort_by_key(|b| b.id);
        Ok(found)
    }

    async fn expired_holds(&self, now: DateTime<Utc>) -> Result<Vec<BookingId>> {
        let mut ids = Vec::new();
        for calendar in self.snapshot().await {
            let bookings = calendar.read().await;
            ids.extend(
                bookings
                    .values()
                    .filter(|b| b.is_expired_hold(now))
                    .map(|b| b.id),
            );
        }
        ids.sort();
        Ok(ids)
    }

    async fn transition(
        &self,
        id: BookingId,
        transition: &Transition,
    ) -> Result<TransitionOutcome> {
        let calendar = self
            .calendar_of(id)
            .await
            .ok_or(BookingError::BookingNotFound(id))?;
        let mut bookings = calendar.write().await;
        let booking = bookings
            .get_mut(&id)
            .ok_or(BookingError::BookingNotFound(id))?;

        if transition.admits(booking) {
            transition.apply(booking);
            Ok(TransitionOutcome::Applied(booking.clone()))
        } else {
            Ok(TransitionOutcome::Rejected(booking.clone()))
        }
    }

    async fn all_bookings(&self) -> Result<Vec<Booking>> {
        let mut all = Vec::new();
        for calendar in self.snapshot().await {
            all.extend(calendar.read().await.values().cloned());
        }
        all.sort_by_key(|b| b.id);
        Ok(all)
    }
}

/// Room directory backed by a map, standing in for the hotel catalogue.
#[derive(Default, Clone)]
pub struct InMemoryRoomDirectory {
    rooms: Arc<RwLock<HashMap<RoomId, Room>>>,
}

impl InMemoryRoomDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn upsert(&self, room: Room) {
        self.rooms.write().await.insert(room.id, room);
    }

    pub async fn set_price(&self, id: RoomId, price: Money) -> Result<()> {
        let mut rooms = self.rooms.write().await;
        let room = rooms.get_mut(&id).ok_or(BookingError::RoomNotFound(id))?;
        room.price_per_night = price;
        Ok(())
    }

    pub async fn set_available(&self, id: RoomId, available: bool) -> Result<()> {
        let mut rooms = self.rooms.write().await;
        let room = rooms.get_mut(&id).ok_or(BookingError::RoomNotFound(id))?;
        room.is_available = available;
        Ok(())
    }
}

#[async_trait]
impl RoomDirectory for InMemoryRoomDirectory {
    async fn get_room(&self, id: RoomId) -> Result<Option<Room>> {
        Ok(self.rooms.read().await.get(&id).cloned())
    }
}

#[derive(Default, Clone)]
pub struct InMemoryUserDirectory {
    users: Arc<RwLock<HashMap<UserId, User>>>,
}

impl InMemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, id: UserId) {
        self.users.write().await.insert(id, User { id });
    }
}

#[async_trait]
impl UserDirectory for InMemoryUserDirectory {
    async fn get_user(&self, id: UserId) -> Result<Option<User>> {
        Ok(self.users.read().await.get(&id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::booking::{BookingStatus, CancelReason};
    use crate::domain::dates::StayRange;
    use crate::domain::room::HotelId;
    use chrono::{Duration, NaiveDate, TimeZone};
    use rust_decimal_macros::dec;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap()
    }

    fn new_booking(room: u32, a: u32, b: u32, at: DateTime<Utc>) -> NewBooking {
        NewBooking {
            room: RoomId(room),
            user: UserId(1),
            stay: StayRange::new(
                NaiveDate::from_ymd_opt(2025, 3, a).unwrap(),
                NaiveDate::from_ymd_opt(2025, 3, b).unwrap(),
            )
            .unwrap(),
            price_per_night: Money::new(dec!(80)),
            total_price: Money::new(dec!(80)).checked_mul(b - a).unwrap(),
            created_at: at,
            hold: Duration::minutes(15),
        }
    }

    #[tokio::test]
    async fn test_insert_and_get() {
        let store = InMemoryBookingStore::new();
        let booking = store
            .insert_if_available(new_booking(1, 10, 12, now()))
            .await
            .unwrap();
        assert_eq!(booking.id, BookingId(1));

        let retrieved = store.get(booking.id).await.unwrap().unwrap();
        assert_eq!(retrieved, booking);
        assert!(store.get(BookingId(99)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_insert_rejects_overlap_on_same_room_only() {
        let store = InMemoryBookingStore::new();
        store
            .insert_if_available(new_booking(1, 10, 12, now()))
            .await
            .unwrap();

        let clash = store.insert_if_available(new_booking(1, 11, 13, now())).await;
        assert!(matches!(clash, Err(BookingError::RoomUnavailable { .. })));

        store
            .insert_if_available(new_booking(2, 11, 13, now()))
            .await
            .unwrap();
        store
            .insert_if_available(new_booking(1, 12, 14, now()))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_insert_expires_displaced_stale_hold() {
        let store = InMemoryBookingStore::new();
        let stale = store
            .insert_if_available(new_booking(1, 10, 12, now()))
            .await
            .unwrap();

        let later = now() + Duration::minutes(30);
        store
            .insert_if_available(new_booking(1, 11, 13, later))
            .await
            .unwrap();

        let stale = store.get(stale.id).await.unwrap().unwrap();
        assert_eq!(stale.status, BookingStatus::Cancelled);
        assert_eq!(stale.cancel_reason, Some(CancelReason::Expired));

        // The displaced hold can no longer be paid into a double booking.
        let outcome = store
            .transition(stale.id, &Transition::mark_paid(later))
            .await
            .unwrap();
        assert!(!outcome.is_applied());
    }

    #[tokio::test]
    async fn test_transition_is_conditional() {
        let store = InMemoryBookingStore::new();
        let booking = store
            .insert_if_available(new_booking(1, 10, 12, now()))
            .await
            .unwrap();

        let first = store
            .transition(booking.id, &Transition::mark_paid(now()))
            .await
            .unwrap();
        assert!(first.is_applied());

        let second = store
            .transition(booking.id, &Transition::mark_failed(now()))
            .await
            .unwrap();
        assert!(!second.is_applied());
        assert_eq!(second.booking().status, BookingStatus::Paid);

        let missing = store
            .transition(BookingId(42), &Transition::mark_paid(now()))
            .await;
        assert!(matches!(missing, Err(BookingError::BookingNotFound(_))));
    }

    #[tokio::test]
    async fn test_expired_holds_and_listings() {
        let store = InMemoryBookingStore::new();
        let a = store
            .insert_if_available(new_booking(1, 10, 12, now()))
            .await
            .unwrap();
        let b = store
            .insert_if_available(new_booking(2, 10, 12, now()))
            .await
            .unwrap();
        store
            .transition(b.id, &Transition::mark_paid(now()))
            .await
            .unwrap();

        let expired = store
            .expired_holds(now() + Duration::minutes(16))
            .await
            .unwrap();
        assert_eq!(expired, vec![a.id]);

        assert_eq!(store.user_bookings(UserId(1)).await.unwrap().len(), 2);
        assert!(store.user_bookings(UserId(2)).await.unwrap().is_empty());
        assert_eq!(store.room_bookings(RoomId(2)).await.unwrap().len(), 1);
        assert_eq!(store.all_bookings().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_room_directory_updates() {
        let rooms = InMemoryRoomDirectory::new();
        rooms
            .upsert(Room::new(RoomId(1), HotelId(1), Money::new(dec!(90)), 2))
            .await;
        rooms.set_price(RoomId(1), Money::new(dec!(120))).await.unwrap();
        rooms.set_available(RoomId(1), false).await.unwrap();

        let room = rooms.get_room(RoomId(1)).await.unwrap().unwrap();
        assert_eq!(room.price_per_night, Money::new(dec!(120)));
        assert!(!room.is_available);
        assert!(matches!(
            rooms.set_price(RoomId(9), Money::new(dec!(1))).await,
            Err(BookingError::RoomNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_user_directory() {
        let users = InMemoryUserDirectory::new();
        users.register(UserId(5)).await;
        assert!(users.get_user(UserId(5)).await.unwrap().is_some());
        assert!(users.get_user(UserId(6)).await.unwrap().is_none());
    }
}
