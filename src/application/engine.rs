use crate::application::availability::AvailabilityChecker;
use crate::application::lifecycle::BookingManager;
use crate::application::reconciliation::{Acknowledgement, IntentHandle, PaymentCoordinator, PaymentState};
use crate::application::sweeper::ExpirySweeper;
use crate::config::BookingConfig;
use crate::domain::booking::{Booking, BookingId, BookingStatus};
use crate::domain::clock::ClockRef;
use crate::domain::money::Money;
use crate::domain::ports::{BookingStoreRef, PaymentGatewayRef, RoomDirectoryRef, UserDirectoryRef};
use crate::domain::room::{Actor, RoomId, UserId};
use crate::domain::webhook::WebhookSecret;
use crate::error::Result;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AvailabilityResponse {
    pub available: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BookingReceipt {
    pub booking_id: BookingId,
    pub status: BookingStatus,
    pub expires_at: Option<DateTime<Utc>>,
    pub total_price: Money,
}

impl From<&Booking> for BookingReceipt {
    fn from(booking: &Booking) -> Self {
        Self {
            booking_id: booking.id,
            status: booking.status,
            expires_at: booking.expires_at,
            total_price: booking.total_price,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CancellationResponse {
    pub booking_id: BookingId,
    pub status: BookingStatus,
}

/// The main entry point for booking operations.
///
/// `BookingEngine` wires the availability checker, the lifecycle manager and the
/// payment coordinator over shared ports. Every method may be called
/// concurrently; consistency comes from the store's atomic units, not from the
/// engine.
pub struct BookingEngine {
    availability: AvailabilityChecker,
    lifecycle: Arc<BookingManager>,
    payments: PaymentCoordinator,
    sweep_interval: Duration,
}

impl BookingEngine {
    /// Creates a new `BookingEngine` instance.
    ///
    /// # Arguments
    ///
    /// * `config` - Hold window, cancellation cutoff, currency and webhook secret.
    /// * `rooms` - Read-only room directory.
    /// * `users` - Read-only user directory.
    /// * `store` - Booking persistence.
    /// * `gateway` - The payment processor.
    /// * `clock` - Source of "now" for every time-based rule.
    pub fn new(
        config: &BookingConfig,
        rooms: RoomDirectoryRef,
        users: UserDirectoryRef,
        store: BookingStoreRef,
        gateway: PaymentGatewayRef,
        clock: ClockRef,
    ) -> Self {
        let availability = AvailabilityChecker::new(rooms.clone(), store.clone(), clock.clone());
        let lifecycle = Arc::new(BookingManager::new(
            config,
            rooms,
            users,
            store.clone(),
            clock.clone(),
        ));
        let payments = PaymentCoordinator::new(
            store,
            gateway,
            clock,
            config.currency.clone(),
            WebhookSecret::new(&config.webhook_secret),
        );
        Self {
            availability,
            lifecycle,
            payments,
            sweep_interval: config.sweep_interval(),
        }
    }

    pub async fn check_availability(
        &self,
        room: RoomId,
        check_in: NaiveDate,
        check_out: NaiveDate,
    ) -> Result<AvailabilityResponse> {
        let available = self.availability.is_available(room, check_in, check_out).await?;
        Ok(AvailabilityResponse { available })
    }

    pub async fn create_booking(
        &self,
        room: RoomId,
        user: UserId,
        check_in: NaiveDate,
        check_out: NaiveDate,
    ) -> Result<BookingReceipt> {
        let booking = self.lifecycle.create(room, user, check_in, check_out).await?;
        Ok(BookingReceipt::from(&booking))
    }

    pub async fn create_payment_intent(&self, booking: BookingId) -> Result<IntentHandle> {
        self.payments.create_intent(booking).await
    }

    pub async fn confirm_payment(&self, booking: BookingId, intent_id: &str) -> Result<PaymentState> {
        self.payments.confirm(booking, intent_id).await
    }

    pub async fn cancel_booking(&self, booking: BookingId, actor: Actor) -> Result<CancellationResponse> {
        let booking = self.lifecycle.cancel(booking, actor).await?;
        Ok(CancellationResponse {
            booking_id: booking.id,
            status: booking.status,
        })
    }

    /// Verifies and applies a gateway notification. Redeliveries are harmless.
    pub async fn handle_gateway_notification(
        &self,
        payload: &[u8],
        signature: &str,
    ) -> Result<Acknowledgement> {
        self.payments.handle_gateway_notification(payload, signature).await
    }

    pub async fn confirm_booking(&self, booking: BookingId, actor: Actor) -> Result<BookingReceipt> {
        let booking = self.lifecycle.confirm(booking, actor).await?;
        Ok(BookingReceipt::from(&booking))
    }

    pub async fn get_booking(&self, booking: BookingId, actor: Actor) -> Result<Booking> {
        self.lifecycle.get(booking, actor).await
    }

    pub async fn bookings_for_user(&self, user: UserId) -> Result<Vec<Booking>> {
        self.lifecycle.bookings_for_user(user).await
    }

    pub async fn expire_stale_pending(&self) -> Result<Vec<BookingId>> {
        self.lifecycle.expire_stale_pending().await
    }

    /// Every booking in id order, for reporting.
    pub async fn all_bookings(&self) -> Result<Vec<Booking>> {
        self.lifecycle.all_bookings().await
    }

    /// Starts the periodic expiry sweep on the current runtime.
    pub fn spawn_sweeper(&self, shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        ExpirySweeper::new(self.lifecycle.clone(), self.sweep_interval).spawn(shutdown)
    }
}
