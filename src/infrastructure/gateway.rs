//! In-process payment gateway for development, tests and scripted runs.
//!
//! Behaves like a hosted processor from the engine's point of view: it issues
//! intents, reports their status on request and can produce signed notifications
//! for a settled intent. A driver decides how each payment ends with
//! [`SimulatedGateway::settle`] and can cut the network with
//! [`SimulatedGateway::set_unreachable`].

use crate::domain::payment::{GatewayError, GatewayEvent, IntentStatus, PaymentIntent};
use crate::domain::ports::PaymentGateway;
use crate::domain::webhook::WebhookSecret;
use crate::error::{BookingError, Result};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

/// A notification as it arrives over the wire: raw body plus signature header.
#[derive(Debug, Clone, PartialEq)]
pub struct SignedNotification {
    pub payload: Vec<u8>,
    pub signature: String,
}

#[derive(Clone)]
pub struct SimulatedGateway {
    intents: Arc<RwLock<HashMap<String, PaymentIntent>>>,
    counter: Arc<AtomicU64>,
    unreachable: Arc<AtomicBool>,
    secret: WebhookSecret,
}

impl SimulatedGateway {
    pub fn new(secret: WebhookSecret) -> Self {
        Self {
            intents: Arc::default(),
            counter: Arc::default(),
            unreachable: Arc::default(),
            secret,
        }
    }

    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::SeqCst);
    }

    /// Records how the customer's payment ended, as the processor would.
    pub async fn settle(
        &self,
        intent_id: &str,
        status: IntentStatus,
    ) -> std::result::Result<PaymentIntent, GatewayError> {
        let mut intents = self.intents.write().await;
        let intent = intents
            .get_mut(intent_id)
            .ok_or_else(|| GatewayError::UnknownIntent(intent_id.to_string()))?;
        intent.status = status;
        info!(intent_id = %intent_id, status = ?status, "Simulated payment settled");
        Ok(intent.clone())
    }

    /// Builds the signed notification the processor would push for the intent's
    /// current status.
    pub async fn notification_for(&self, intent_id: &str) -> Result<SignedNotification> {
        let intent = self
            .intents
            .read()
            .await
            .get(intent_id)
            .cloned()
            .ok_or_else(|| {
                BookingError::ValidationError(format!("unknown payment intent {intent_id}"))
            })?;

        let event = GatewayEvent {
            id: format!("evt_{}", Uuid::new_v4().simple()),
            intent_id: intent.id,
            status: intent.status,
            metadata: intent.metadata,
        };
        let payload = serde_json::to_vec(&event)?;
        let signature = self.secret.sign(&payload)?;
        Ok(SignedNotification { payload, signature })
    }

    fn ensure_reachable(&self) -> std::result::Result<(), GatewayError> {
        if self.unreachable.load(Ordering::SeqCst) {
            Err(GatewayError::Unreachable("connection timed out".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl PaymentGateway for SimulatedGateway {
    async fn create_payment_intent(
        &self,
        amount: i64,
        currency: &str,
        metadata: BTreeMap<String, String>,
    ) -> std::result::Result<PaymentIntent, GatewayError> {
        self.ensure_reachable()?;
        if amount <= 0 {
            return Err(GatewayError::Rejected(format!("invalid amount {amount}")));
        }

        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        let id = format!("pi_{n}");
        let intent = PaymentIntent {
            client_secret: format!("{id}_secret_{}", Uuid::new_v4().simple()),
            id: id.clone(),
            amount,
            currency: currency.to_string(),
            status: IntentStatus::RequiresPayment,
            metadata,
        };
        self.intents.write().await.insert(id.clone(), intent.clone());
        debug!(intent_id = %id, amount, "Simulated intent created");
        Ok(intent)
    }

    async fn get_payment_intent(
        &self,
        intent_id: &str,
    ) -> std::result::Result<PaymentIntent, GatewayError> {
        self.ensure_reachable()?;
        self.intents
            .read()
            .await
            .get(intent_id)
            .cloned()
            .ok_or_else(|| GatewayError::UnknownIntent(intent_id.to_string()))
    }
}
