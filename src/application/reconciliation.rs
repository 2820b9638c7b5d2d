use crate::domain::booking::{Booking, BookingId, BookingStatus, PaymentStatus, Transition, TransitionOutcome};
use crate::domain::clock::ClockRef;
use crate::domain::payment::{BOOKING_ID_METADATA, GatewayError, GatewayEvent, PaymentIntent, PaymentOutcome};
use crate::domain::ports::{BookingStoreRef, PaymentGatewayRef};
use crate::domain::webhook::WebhookSecret;
use crate::error::{BookingError, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// What the paying client needs to complete a payment.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IntentHandle {
    pub intent_id: String,
    pub client_secret: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PaymentState {
    pub booking: BookingId,
    pub status: BookingStatus,
    pub payment_status: PaymentStatus,
}

impl From<&Booking> for PaymentState {
    fn from(booking: &Booking) -> Self {
        Self {
            booking: booking.id,
            status: booking.status,
            payment_status: booking.payment_status,
        }
    }
}

/// Reply to the gateway. Both variants tell it to stop redelivering.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "result", rename_all = "lowercase")]
pub enum Acknowledgement {
    Processed(PaymentState),
    Ignored { reason: String },
}

/// Reconciles payment outcomes into booking state.
///
/// Two producers write the same row: the client's `confirm` call and the
/// gateway's notification. Both end in the same conditional transitions, so
/// whichever lands second sees the settled row and leaves it alone.
pub struct PaymentCoordinator {
    store: BookingStoreRef,
    gateway: PaymentGatewayRef,
    clock: ClockRef,
    currency: String,
    secret: WebhookSecret,
}

impl PaymentCoordinator {
    pub fn new(
        store: BookingStoreRef,
        gateway: PaymentGatewayRef,
        clock: ClockRef,
        currency: impl Into<String>,
        secret: WebhookSecret,
    ) -> Self {
        Self {
            store,
            gateway,
            clock,
            currency: currency.into(),
            secret,
        }
    }

    pub async fn create_intent(&self, id: BookingId) -> Result<IntentHandle> {
        let booking = self.load(id).await?;
        if !booking.is_payable(self.clock.now()) {
            return Err(BookingError::BookingNotPayable {
                booking: id,
                status: booking.status,
            });
        }
        let amount = booking.total_price.to_minor_units()?;

        if let Some(existing) = &booking.payment_intent_id {
            match self.gateway.get_payment_intent(existing).await {
                Ok(intent) => match intent.status.outcome() {
                    // Already captured; record it instead of charging again.
                    Some(PaymentOutcome::Succeeded) => {
                        let booking = self
                            .apply_outcome(id, &intent.id, PaymentOutcome::Succeeded, "create_intent")
                            .await?;
                        return Err(BookingError::BookingNotPayable {
                            booking: id,
                            status: booking.status,
                        });
                    }
                    None if intent.amount == amount => {
                        debug!(booking_id = %id, intent_id = %intent.id, "Reusing open payment intent");
                        return Ok(IntentHandle {
                            intent_id: intent.id,
                            client_secret: intent.client_secret,
                        });
                    }
                    None | Some(PaymentOutcome::Failed) => {}
                },
                Err(GatewayError::UnknownIntent(_)) => {}
                Err(e) => return Err(gateway_failure(e)),
            }
        }

        let metadata = BTreeMap::from([(BOOKING_ID_METADATA.to_string(), id.to_string())]);
        let intent = self
            .gateway
            .create_payment_intent(amount, &self.currency, metadata)
            .await
            .map_err(gateway_failure)?;

        let attach = Transition::attach_intent(intent.id.clone(), self.clock.now());
        match self.store.transition(id, &attach).await? {
            TransitionOutcome::Applied(_) => {
                info!(booking_id = %id, intent_id = %intent.id, amount, "Payment intent created");
                Ok(IntentHandle {
                    intent_id: intent.id,
                    client_secret: intent.client_secret,
                })
            }
            TransitionOutcome::Rejected(current) => {
                debug!(booking_id = %id, intent_id = %intent.id, "Booking moved on while the intent was being created");
                Err(BookingError::BookingNotPayable {
                    booking: id,
                    status: current.status,
                })
            }
        }
    }

    /// Client-driven confirmation. The intent is always re-fetched from the
    /// gateway; nothing the client sends besides its id is trusted.
    pub async fn confirm(&self, id: BookingId, intent_id: &str) -> Result<PaymentState> {
        let booking = self.load(id).await?;
        match booking.status {
            BookingStatus::Paid => {
                debug!(booking_id = %id, "Booking already paid");
                return Ok(PaymentState::from(&booking));
            }
            BookingStatus::Pending => {}
            status => {
                self.flag_stranded_capture(&booking, intent_id).await;
                return Err(BookingError::BookingNotPayable { booking: id, status });
            }
        }

        let intent = self
            .gateway
            .get_payment_intent(intent_id)
            .await
            .map_err(gateway_failure)?;
        verify_intent(&booking, &intent)?;

        match intent.status.outcome() {
            None => {
                debug!(booking_id = %id, intent_id, status = ?intent.status, "Payment still open");
                Ok(PaymentState::from(&booking))
            }
            Some(PaymentOutcome::Succeeded) => {
                let booking = self
                    .apply_outcome(id, &intent.id, PaymentOutcome::Succeeded, "confirm")
                    .await?;
                Ok(PaymentState::from(&booking))
            }
            Some(PaymentOutcome::Failed) => {
                let booking = self
                    .apply_outcome(id, &intent.id, PaymentOutcome::Failed, "confirm")
                    .await?;
                if booking.status == BookingStatus::Paid {
                    return Ok(PaymentState::from(&booking));
                }
                Err(BookingError::PaymentVerificationFailed {
                    intent: intent.id,
                    reason: "payment was declined".to_string(),
                })
            }
        }
    }

    /// Gateway-driven path. Safe to call any number of times for the same event.
    pub async fn handle_gateway_notification(
        &self,
        payload: &[u8],
        signature: &str,
    ) -> Result<Acknowledgement> {
        self.secret.verify(payload, signature)?;
        let event: GatewayEvent = serde_json::from_slice(payload)
            .map_err(|e| BookingError::InvalidNotification(e.to_string()))?;
        self.handle_event(event).await
    }

    pub async fn handle_event(&self, event: GatewayEvent) -> Result<Acknowledgement> {
        let Some(outcome) = event.status.outcome() else {
            return Ok(ignored(&event, "intent has not settled"));
        };
        let Some(id) = event
            .booking_reference()
            .and_then(|reference| reference.parse::<u64>().ok())
            .map(BookingId)
        else {
            return Ok(ignored(&event, "missing booking reference"));
        };
        let Some(booking) = self.store.get(id).await? else {
            return Ok(ignored(&event, "unknown booking"));
        };
        if outcome == PaymentOutcome::Failed
            && booking.payment_intent_id.as_deref() != Some(event.intent_id.as_str())
        {
            return Ok(ignored(&event, "intent was superseded"));
        }

        let booking = self
            .apply_outcome(id, &event.intent_id, outcome, "notification")
            .await?;
        Ok(Acknowledgement::Processed(PaymentState::from(&booking)))
    }

    /// Success is honored whichever of the booking's intents carried it. A
    /// failure only counts for the intent currently attached.
    async fn apply_outcome(
        &self,
        id: BookingId,
        intent_id: &str,
        outcome: PaymentOutcome,
        source: &'static str,
    ) -> Result<Booking> {
        let now = self.clock.now();
        let transition = match outcome {
            PaymentOutcome::Succeeded => Transition::mark_paid_by(intent_id.to_string(), now),
            PaymentOutcome::Failed => Transition::mark_failed_for(intent_id.to_string(), now),
        };

        match self.store.transition(id, &transition).await? {
            TransitionOutcome::Applied(booking) => {
                info!(booking_id = %id, source, status = %booking.status, "Payment outcome recorded");
                Ok(booking)
            }
            TransitionOutcome::Rejected(current) => {
                let captured = outcome == PaymentOutcome::Succeeded;
                if captured
                    && matches!(current.status, BookingStatus::Cancelled | BookingStatus::Failed)
                {
                    warn!(
                        booking_id = %id,
                        intent_id,
                        source,
                        status = %current.status,
                        "Payment succeeded for a booking that no longer holds the room; refund required"
                    );
                } else if captured
                    && current.status == BookingStatus::Paid
                    && current.payment_intent_id.as_deref() != Some(intent_id)
                {
                    warn!(
                        booking_id = %id,
                        intent_id,
                        source,
                        paid_by = current.payment_intent_id.as_deref().unwrap_or_default(),
                        "Booking was paid twice; refund required"
                    );
                } else {
                    debug!(booking_id = %id, intent_id, source, status = %current.status, "Payment outcome already settled");
                }
                Ok(current)
            }
        }
    }

    /// A client confirming against a booking that has moved on may still have
    /// been charged. Nothing changes, but the capture must not go unnoticed.
    async fn flag_stranded_capture(&self, booking: &Booking, intent_id: &str) {
        let intent = match self.gateway.get_payment_intent(intent_id).await {
            Ok(intent) => intent,
            Err(e) => {
                debug!(booking_id = %booking.id, intent_id, error = %e, "Could not inspect intent");
                return;
            }
        };
        if verify_intent(booking, &intent).is_err()
            || intent.status.outcome() != Some(PaymentOutcome::Succeeded)
        {
            return;
        }
        if let Err(e) = self
            .apply_outcome(booking.id, &intent.id, PaymentOutcome::Succeeded, "confirm")
            .await
        {
            warn!(booking_id = %booking.id, intent_id, error = %e, "Could not record stranded capture");
        }
    }

    async fn load(&self, id: BookingId) -> Result<Booking> {
        self.store
            .get(id)
            .await?
            .ok_or(BookingError::BookingNotFound(id))
    }
}

fn verify_intent(booking: &Booking, intent: &PaymentIntent) -> Result<()> {
    let reference = booking.id.to_string();
    if intent.booking_reference() != Some(reference.as_str()) {
        return Err(BookingError::PaymentVerificationFailed {
            intent: intent.id.clone(),
            reason: format!("intent does not belong to booking {}", booking.id),
        });
    }
    let expected = booking.total_price.to_minor_units()?;
    if intent.amount != expected {
        return Err(BookingError::PaymentVerificationFailed {
            intent: intent.id.clone(),
            reason: format!("amount {} does not match {expected}", intent.amount),
        });
    }
    Ok(())
}

fn gateway_failure(err: GatewayError) -> BookingError {
    match err {
        GatewayError::Unreachable(reason) => BookingError::PaymentGatewayUnreachable(reason),
        GatewayError::UnknownIntent(intent) => BookingError::PaymentVerificationFailed {
            intent,
            reason: "unknown to the gateway".to_string(),
        },
        GatewayError::Rejected(reason) => BookingError::ValidationError(reason),
    }
}

fn ignored(event: &GatewayEvent, reason: &str) -> Acknowledgement {
    debug!(event_id = %event.id, intent_id = %event.intent_id, reason, "Notification ignored");
    Acknowledgement::Ignored {
        reason: reason.to_string(),
    }
}
