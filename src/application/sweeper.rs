use crate::application::lifecycle::BookingManager;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

/// Background task that expires stale holds on a fixed interval.
///
/// Reads already ignore expired holds, so the sweep only keeps stored state
/// tidy; a slow or failed tick never lets a stale hold block a room.
pub struct ExpirySweeper {
    lifecycle: Arc<BookingManager>,
    interval: Duration,
}

impl ExpirySweeper {
    pub fn new(lifecycle: Arc<BookingManager>, interval: Duration) -> Self {
        Self {
            lifecycle,
            interval,
        }
    }

    /// Runs until `shutdown` flips to `true` or its sender is dropped.
    pub fn spawn(self, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            info!(interval_ms = self.interval.as_millis() as u64, "Expiry sweeper started");

            while !*shutdown.borrow() {
                tokio::select! {
                    _ = ticker.tick() => {
                        match self.lifecycle.expire_stale_pending().await {
                            Ok(expired) if expired.is_empty() => {}
                            Ok(expired) => debug!(count = expired.len(), "Sweep expired holds"),
                            Err(e) => error!(error = %e, "Expiry sweep failed"),
                        }
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                }
            }

            info!("Expiry sweeper stopped");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BookingConfig;
    use crate::domain::booking::{BookingStatus, CancelReason};
    use crate::domain::clock::ManualClock;
    use crate::domain::money::Money;
    use crate::domain::ports::BookingStore;
    use crate::domain::room::{HotelId, Room, RoomId, UserId};
    use crate::infrastructure::in_memory::{
        InMemoryBookingStore, InMemoryRoomDirectory, InMemoryUserDirectory,
    };
    use chrono::{NaiveDate, TimeZone, Utc};
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_sweeper_expires_and_stops() {
        let rooms = InMemoryRoomDirectory::new();
        rooms
            .upsert(Room::new(RoomId(1), HotelId(1), Money::new(dec!(90)), 1))
            .await;
        let users = InMemoryUserDirectory::new();
        users.register(UserId(1)).await;
        let store = InMemoryBookingStore::new();
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap());
        let manager = Arc::new(BookingManager::new(
            &BookingConfig::default(),
            Arc::new(rooms),
            Arc::new(users),
            Arc::new(store.clone()),
            Arc::new(clock.clone()),
        ));

        let booking = manager
            .create(
                RoomId(1),
                UserId(1),
                NaiveDate::from_ymd_opt(2025, 3, 5).unwrap(),
                NaiveDate::from_ymd_opt(2025, 3, 6).unwrap(),
            )
            .await
            .unwrap();
        clock.advance(chrono::Duration::minutes(16));

        let (tx, rx) = watch::channel(false);
        let handle = ExpirySweeper::new(manager, Duration::from_millis(10)).spawn(rx);

        let mut swept = None;
        for _ in 0..100 {
            let current = store.get(booking.id).await.unwrap().unwrap();
            if current.status == BookingStatus::Cancelled {
                swept = Some(current);
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        let swept = swept.expect("sweeper never expired the hold");
        assert_eq!(swept.cancel_reason, Some(CancelReason::Expired));

        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("sweeper did not stop")
            .unwrap();
    }
}
