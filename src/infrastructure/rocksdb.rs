use crate::domain::booking::{
    Booking, BookingId, NewBooking, Overlap, Transition, TransitionOutcome, find_conflict,
};
use crate::domain::ports::BookingStore;
use crate::domain::room::{RoomId, UserId};
use crate::error::{BookingError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, DB, Direction, IteratorMode, Options, WriteBatch};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

/// Column Family for booking rows, keyed by booking id.
pub const CF_BOOKINGS: &str = "bookings";
/// Column Family indexing bookings by room: `room_id ++ booking_id` → empty.
pub const CF_ROOM_INDEX: &str = "room_index";
/// Column Family for store bookkeeping (id sequence).
pub const CF_META: &str = "meta";

const NEXT_ID_KEY: &[u8] = b"next_booking_id";

/// A persistent booking store using RocksDB.
///
/// Reads go straight to the database. Every read-check-write unit (insert with
/// overlap check, conditional transition) runs under one async write mutex and
/// commits through a single `WriteBatch`, so no writer can interleave between the
/// check and the write.
///
/// This struct is thread-safe (`Clone` shares the underlying `Arc<DB>`).
#[derive(Clone)]
pub struct RocksDBStore {
    db: Arc<DB>,
    write_lock: Arc<Mutex<()>>,
}

impl RocksDBStore {
    /// Opens or creates a RocksDB instance at the specified path, with all
    /// column families the store needs.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let families = [CF_BOOKINGS, CF_ROOM_INDEX, CF_META]
            .into_iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()));

        let db = DB::open_cf_descriptors(&opts, path, families)?;

        Ok(Self {
            db: Arc::new(db),
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    fn cf(&self, name: &str) -> Result<&ColumnFamily> {
        self.db.cf_handle(name).ok_or_else(|| {
            BookingError::InternalError(Box::new(std::io::Error::other(format!(
                "{name} column family not found"
            ))))
        })
    }

    fn read_booking(&self, id: BookingId) -> Result<Option<Booking>> {
        let cf = self.cf(CF_BOOKINGS)?;
        match self.db.get_cf(cf, id.0.to_be_bytes())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn put_booking(&self, batch: &mut WriteBatch, booking: &Booking) -> Result<()> {
        let cf = self.cf(CF_BOOKINGS)?;
        batch.put_cf(cf, booking.id.0.to_be_bytes(), serde_json::to_vec(booking)?);
        Ok(())
    }

    fn room_calendar(&self, room: RoomId) -> Result<Vec<Booking>> {
        let cf = self.cf(CF_ROOM_INDEX)?;
        let prefix = room.0.to_be_bytes();
        let mut bookings = Vec::new();

        for item in self
            .db
            .iterator_cf(cf, IteratorMode::From(&prefix[..], Direction::Forward))
        {
            let (key, _) = item?;
            if !key.starts_with(&prefix) {
                break;
            }
            let id_bytes: [u8; 8] = key[prefix.len()..].try_into().map_err(|_| {
                BookingError::InternalError(Box::new(std::io::Error::other(
                    "Malformed room index key",
                )))
            })?;
            if let Some(booking) = self.read_booking(BookingId(u64::from_be_bytes(id_bytes)))? {
                bookings.push(booking);
            }
        }
        Ok(bookings)
    }

    fn next_id(&self) -> Result<u64> {
        let cf = self.cf(CF_META)?;
        let current = match self.db.get_cf(cf, NEXT_ID_KEY)? {
            Some(bytes) => {
                let raw: [u8; 8] = bytes.as_slice().try_into().map_err(|_| {
                    BookingError::InternalError(Box::new(std::io::Error::other(
                        "Malformed booking id sequence",
                    )))
                })?;
                u64::from_be_bytes(raw)
            }
            None => 0,
        };
        Ok(current + 1)
    }
}

fn index_key(room: RoomId, id: BookingId) -> Vec<u8> {
    let mut key = Vec::with_capacity(12);
    key.extend_from_slice(&room.0.to_be_bytes());
    key.extend_from_slice(&id.0.to_be_bytes());
    key
}

#[async_trait]
impl BookingStore for RocksDBStore {
    async fn insert_if_available(&self, new: NewBooking) -> Result<Booking> {
        let _guard = self.write_lock.lock().await;
        let now = new.created_at;
        let calendar = self.room_calendar(new.room)?;

        if find_conflict(&calendar, &new.stay, now).is_some() {
            return Err(BookingError::RoomUnavailable {
                room: new.room,
                check_in: new.stay.check_in(),
                check_out: new.stay.check_out(),
            });
        }

        let mut batch = WriteBatch::default();
        let expire = Transition::expire(now);
        for mut stale in calendar
            .into_iter()
            .filter(|b| b.classify(&new.stay, now) == Overlap::Stale && expire.admits(b))
        {
            expire.apply(&mut stale);
            self.put_booking(&mut batch, &stale)?;
            info!(booking_id = %stale.id, room_id = %stale.room, "Expired stale hold displaced by new booking");
        }

        let id = BookingId(self.next_id()?);
        let booking = Booking::new(id, new);
        self.put_booking(&mut batch, &booking)?;
        batch.put_cf(self.cf(CF_ROOM_INDEX)?, index_key(booking.room, id), b"");
        batch.put_cf(self.cf(CF_META)?, NEXT_ID_KEY, id.0.to_be_bytes());
        self.db.write(batch)?;

        Ok(booking)
    }

    async fn get(&self, id: BookingId) -> Result<Option<Booking>> {
        self.read_booking(id)
    }

    async fn room_bookings(&self, room: RoomId) -> Result<Vec<Booking>> {
        self.room_calendar(room)
    }

    async fn user_bookings(&self, user: UserId) -> Result<Vec<Booking>> {
        Ok(self
            .all_bookings()
            .await?
            .into_iter()
            .filter(|b| b.user == user)
            .collect())
    }

    async fn expired_holds(&self, now: DateTime<Utc>) -> Result<Vec<BookingId>> {
        Ok(self
            .all_bookings()
            .await?
            .into_iter()
            .filter(|b| b.is_expired_hold(now))
            .map(|b| b.id)
            .collect())
    }

    async fn transition(
        &self,
        id: BookingId,
        transition: &Transition,
    ) -> Result<TransitionOutcome> {
        let _guard = self.write_lock.lock().await;
        let mut booking = self
            .read_booking(id)?
            .ok_or(BookingError::BookingNotFound(id))?;

        if !transition.admits(&booking) {
            return Ok(TransitionOutcome::Rejected(booking));
        }

        transition.apply(&mut booking);
        let mut batch = WriteBatch::default();
        self.put_booking(&mut batch, &booking)?;
        self.db.write(batch)?;
        Ok(TransitionOutcome::Applied(booking))
    }

    async fn all_bookings(&self) -> Result<Vec<Booking>> {
        let cf = self.cf(CF_BOOKINGS)?;
        let mut bookings = Vec::new();

        // Big-endian keys iterate in id order.
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (_key, value) = item?;
            bookings.push(serde_json::from_slice(&value)?);
        }

        Ok(bookings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::booking::{BookingStatus, CancelReason};
    use crate::domain::dates::StayRange;
    use crate::domain::money::Money;
    use chrono::{Duration, NaiveDate, TimeZone};
    use rust_decimal_macros::dec;
    use tempfile::tempdir;

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
    async fn test_rocksdb_open_cf() {
        let dir = tempdir().unwrap();
        let store = RocksDBStore::open(dir.path()).expect("Failed to open RocksDB");

        assert!(store.db.cf_handle(CF_BOOKINGS).is_some());
        assert!(store.db.cf_handle(CF_ROOM_INDEX).is_some());
        assert!(store.db.cf_handle(CF_META).is_some());
    }

    #[tokio::test]
    async fn test_rocksdb_insert_and_overlap() {
        let dir = tempdir().unwrap();
        let store = RocksDBStore::open(dir.path()).unwrap();

        let first = store
            .insert_if_available(new_booking(1, 10, 12, now()))
            .await
            .unwrap();
        assert_eq!(first.id, BookingId(1));

        assert!(matches!(
            store.insert_if_available(new_booking(1, 11, 13, now())).await,
            Err(BookingError::RoomUnavailable { .. })
        ));
        let second = store
            .insert_if_available(new_booking(1, 12, 14, now()))
            .await
            .unwrap();
        assert_eq!(second.id, BookingId(2));

        assert_eq!(store.room_bookings(RoomId(1)).await.unwrap().len(), 2);
        assert!(store.room_bookings(RoomId(2)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_rocksdb_transition_and_reopen() {
        let dir = tempdir().unwrap();
        let id = {
            let store = RocksDBStore::open(dir.path()).unwrap();
            let booking = store
                .insert_if_available(new_booking(1, 10, 12, now()))
                .await
                .unwrap();
            let paid = store
                .transition(booking.id, &Transition::mark_paid(now()))
                .await
                .unwrap();
            assert!(paid.is_applied());
            booking.id
        };

        let store = RocksDBStore::open(dir.path()).unwrap();
        let booking = store.get(id).await.unwrap().unwrap();
        assert_eq!(booking.status, BookingStatus::Paid);

        let next = store
            .insert_if_available(new_booking(1, 20, 22, now()))
            .await
            .unwrap();
        assert_eq!(next.id, BookingId(2));
    }

    #[tokio::test]
    async fn test_rocksdb_displaces_stale_hold() {
        let dir = tempdir().unwrap();
        let store = RocksDBStore::open(dir.path()).unwrap();
        let stale = store
            .insert_if_available(new_booking(1, 10, 12, now()))
            .await
            .unwrap();

        let later = now() + Duration::minutes(20);
        assert_eq!(store.expired_holds(later).await.unwrap(), vec![stale.id]);
        store
            .insert_if_available(new_booking(1, 10, 12, later))
            .await
            .unwrap();

        let stale = store.get(stale.id).await.unwrap().unwrap();
        assert_eq!(stale.cancel_reason, Some(CancelReason::Expired));
        assert!(store.expired_holds(later).await.unwrap().is_empty());
    }
}
