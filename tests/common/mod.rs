#![allow(dead_code)]

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use rust_decimal::Decimal;
use staybook::application::engine::BookingEngine;
use staybook::config::BookingConfig;
use staybook::domain::clock::ManualClock;
use staybook::domain::money::Money;
use staybook::domain::ports::BookingStoreRef;
use staybook::domain::room::{HotelId, Room, RoomId, UserId};
use staybook::domain::webhook::WebhookSecret;
use staybook::infrastructure::gateway::SimulatedGateway;
use staybook::infrastructure::in_memory::{
    InMemoryBookingStore, InMemoryRoomDirectory, InMemoryUserDirectory,
};
use std::io::Write;
use std::sync::Arc;
use tempfile::NamedTempFile;

pub const SCRIPT_HEADER: &str = "command, room, user, booking, check_in, check_out, intent, value";
pub const START: &str = "2025-03-01T12:00:00Z";

pub fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap()
}

pub fn march(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 3, day).unwrap()
}

/// Writes a command script with the standard header.
pub fn script(rows: &[&str]) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "{SCRIPT_HEADER}").unwrap();
    for row in rows {
        writeln!(file, "{row}").unwrap();
    }
    file
}

pub struct Harness {
    pub engine: Arc<BookingEngine>,
    pub rooms: InMemoryRoomDirectory,
    pub users: InMemoryUserDirectory,
    pub gateway: SimulatedGateway,
    pub clock: ManualClock,
}

/// An engine over in-memory adapters with one room per entry in `prices` (ids
/// from 1) and users 1 to 10 registered.
pub async fn harness(prices: &[Decimal]) -> Harness {
    harness_with_store(prices, Arc::new(InMemoryBookingStore::new())).await
}

pub async fn harness_with_store(prices: &[Decimal], store: BookingStoreRef) -> Harness {
    let config = BookingConfig::default();
    let rooms = InMemoryRoomDirectory::new();
    for (i, price) in prices.iter().enumerate() {
        let id = RoomId(i as u32 + 1);
        rooms
            .upsert(Room::new(id, HotelId(1), Money::new(*price), 2))
            .await;
    }
    let users = InMemoryUserDirectory::new();
    for id in 1..=10 {
        users.register(UserId(id)).await;
    }
    let gateway = SimulatedGateway::new(WebhookSecret::new(&config.webhook_secret));
    let clock = ManualClock::new(start());
    let engine = BookingEngine::new(
        &config,
        Arc::new(rooms.clone()),
        Arc::new(users.clone()),
        store,
        Arc::new(gateway.clone()),
        Arc::new(clock.clone()),
    );
    Harness {
        engine: Arc::new(engine),
        rooms,
        users,
        gateway,
        clock,
    }
}
