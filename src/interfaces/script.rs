//! Drives a [`BookingEngine`] from a command script.
//!
//! The runner plays every external party at once: the hotel catalogue, the user
//! directory, the paying guest at the gateway and the gateway's notification
//! sender. Time only moves when the script says so.

use crate::application::engine::BookingEngine;
use crate::config::BookingConfig;
use crate::domain::booking::{Booking, BookingId};
use crate::domain::clock::ManualClock;
use crate::domain::money::Money;
use crate::domain::payment::IntentStatus;
use crate::domain::ports::{BookingStoreRef, RoomDirectory};
use crate::domain::room::{Actor, HotelId, Room, RoomId, UserId};
use crate::domain::webhook::WebhookSecret;
use crate::error::{BookingError, Result};
use crate::infrastructure::gateway::SimulatedGateway;
use crate::infrastructure::in_memory::{InMemoryRoomDirectory, InMemoryUserDirectory};
use crate::interfaces::csv::command_reader::{Command, CommandKind};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use std::sync::Arc;
use tracing::info;

/// Hotel every scripted room belongs to.
const SCRIPT_HOTEL: HotelId = HotelId(1);
const DEFAULT_CAPACITY: u32 = 2;
/// Acting administrator when an admin command names no user.
const SCRIPT_ADMIN: UserId = UserId(0);

pub struct ScriptRunner {
    engine: BookingEngine,
    rooms: InMemoryRoomDirectory,
    users: InMemoryUserDirectory,
    gateway: SimulatedGateway,
    clock: ManualClock,
}

impl ScriptRunner {
    pub fn new(config: &BookingConfig, store: BookingStoreRef, start: DateTime<Utc>) -> Self {
        let rooms = InMemoryRoomDirectory::new();
        let users = InMemoryUserDirectory::new();
        let gateway = SimulatedGateway::new(WebhookSecret::new(&config.webhook_secret));
        let clock = ManualClock::new(start);
        let engine = BookingEngine::new(
            config,
            Arc::new(rooms.clone()),
            Arc::new(users.clone()),
            store,
            Arc::new(gateway.clone()),
            Arc::new(clock.clone()),
        );
        Self {
            engine,
            rooms,
            users,
            gateway,
            clock,
        }
    }

    pub async fn execute(&self, cmd: Command) -> Result<()> {
        match cmd.command {
            CommandKind::Room => {
                let id = RoomId(required(cmd.room, "room")?);
                let price = Money::try_from(required(cmd.value, "value")?)?;
                if self.rooms.get_room(id).await?.is_some() {
                    self.rooms.set_price(id, price).await?;
                } else {
                    self.rooms
                        .upsert(Room::new(id, SCRIPT_HOTEL, price, DEFAULT_CAPACITY))
                        .await;
                }
            }
            CommandKind::Close | CommandKind::Open => {
                let id = RoomId(required(cmd.room, "room")?);
                self.rooms
                    .set_available(id, cmd.command == CommandKind::Open)
                    .await?;
            }
            CommandKind::User => {
                self.users.register(UserId(required(cmd.user, "user")?)).await;
            }
            CommandKind::Check => {
                let room = RoomId(required(cmd.room, "room")?);
                let (check_in, check_out) = stay(&cmd)?;
                let response = self.engine.check_availability(room, check_in, check_out).await?;
                info!(room_id = %room, %check_in, %check_out, available = response.available, "Availability checked");
            }
            CommandKind::Book => {
                let room = RoomId(required(cmd.room, "room")?);
                let user = UserId(required(cmd.user, "user")?);
                let (check_in, check_out) = stay(&cmd)?;
                self.engine.create_booking(room, user, check_in, check_out).await?;
            }
            CommandKind::Intent => {
                self.engine.create_payment_intent(booking_id(&cmd)?).await?;
            }
            CommandKind::Pay | CommandKind::Decline => {
                let status = if cmd.command == CommandKind::Pay {
                    IntentStatus::Succeeded
                } else {
                    IntentStatus::Failed
                };
                self.gateway
                    .settle(&intent_id(&cmd)?, status)
                    .await
                    .map_err(|e| BookingError::ValidationError(e.to_string()))?;
            }
            CommandKind::Confirm => {
                self.engine
                    .confirm_payment(booking_id(&cmd)?, &intent_id(&cmd)?)
                    .await?;
            }
            CommandKind::Notify => {
                let notification = self.gateway.notification_for(&intent_id(&cmd)?).await?;
                self.engine
                    .handle_gateway_notification(&notification.payload, &notification.signature)
                    .await?;
            }
            CommandKind::Cancel => {
                let actor = Actor::Guest(UserId(required(cmd.user, "user")?));
                self.engine.cancel_booking(booking_id(&cmd)?, actor).await?;
            }
            CommandKind::AdminCancel => {
                self.engine.cancel_booking(booking_id(&cmd)?, admin(&cmd)).await?;
            }
            CommandKind::AdminConfirm => {
                self.engine.confirm_booking(booking_id(&cmd)?, admin(&cmd)).await?;
            }
            CommandKind::Advance => {
                let minutes = whole_minutes(required(cmd.value, "value")?)?;
                self.clock.advance(Duration::minutes(minutes));
            }
            CommandKind::Sweep => {
                self.engine.expire_stale_pending().await?;
            }
        }
        Ok(())
    }

    pub async fn bookings(&self) -> Result<Vec<Booking>> {
        self.engine.all_bookings().await
    }
}

fn required<T>(field: Option<T>, name: &str) -> Result<T> {
    field.ok_or_else(|| BookingError::ValidationError(format!("missing {name}")))
}

fn stay(cmd: &Command) -> Result<(NaiveDate, NaiveDate)> {
    Ok((
        required(cmd.check_in, "check_in")?,
        required(cmd.check_out, "check_out")?,
    ))
}

fn booking_id(cmd: &Command) -> Result<BookingId> {
    required(cmd.booking, "booking").map(BookingId)
}

fn intent_id(cmd: &Command) -> Result<String> {
    required(cmd.intent.clone(), "intent")
}

fn admin(cmd: &Command) -> Actor {
    Actor::Admin(cmd.user.map_or(SCRIPT_ADMIN, UserId))
}

fn whole_minutes(value: Decimal) -> Result<i64> {
    if value.is_sign_negative() || !value.fract().is_zero() {
        return Err(BookingError::ValidationError(format!(
            "advance needs a whole, non-negative number of minutes, got {value}"
        )));
    }
    value
        .to_i64()
        .ok_or_else(|| BookingError::ValidationError(format!("advance of {value} minutes is out of range")))
}
