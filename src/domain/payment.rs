use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Metadata key carrying our booking reference on every intent.
pub const BOOKING_ID_METADATA: &str = "booking_id";

/// Lifecycle of a payment intent on the gateway side.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "snake_case")]
pub enum IntentStatus {
    RequiresPayment,
    Processing,
    Succeeded,
    Failed,
    Canceled,
}

/// The settled result of an intent, if it has one.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum PaymentOutcome {
    Succeeded,
    Failed,
}

impl IntentStatus {
    pub fn outcome(&self) -> Option<PaymentOutcome> {
        match self {
            Self::Succeeded => Some(PaymentOutcome::Succeeded),
            Self::Failed | Self::Canceled => Some(PaymentOutcome::Failed),
            Self::RequiresPayment | Self::Processing => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentIntent {
    pub id: String,
    pub client_secret: String,
    /// Amount in minor units.
    pub amount: i64,
    pub currency: String,
    pub status: IntentStatus,
    pub metadata: BTreeMap<String, String>,
}

impl PaymentIntent {
    pub fn booking_reference(&self) -> Option<&str> {
        self.metadata.get(BOOKING_ID_METADATA).map(String::as_str)
    }
}

/// Body of an asynchronous notification pushed by the gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayEvent {
    pub id: String,
    pub intent_id: String,
    pub status: IntentStatus,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl GatewayEvent {
    pub fn booking_reference(&self) -> Option<&str> {
        self.metadata.get(BOOKING_ID_METADATA).map(String::as_str)
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum GatewayError {
    #[error("gateway unreachable: {0}")]
    Unreachable(String),
    #[error("gateway rejected request: {0}")]
    Rejected(String),
    #[error("unknown payment intent {0}")]
    UnknownIntent(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intent_outcomes() {
        assert_eq!(IntentStatus::Succeeded.outcome(), Some(PaymentOutcome::Succeeded));
        assert_eq!(IntentStatus::Canceled.outcome(), Some(PaymentOutcome::Failed));
        assert_eq!(IntentStatus::Processing.outcome(), None);
        assert_eq!(IntentStatus::RequiresPayment.outcome(), None);
    }

    #[test]
    fn test_event_deserialization() {
        let json = r#"{"id":"evt_1","intent_id":"pi_1","status":"succeeded","metadata":{"booking_id":"4"}}"#;
        let event: GatewayEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.status, IntentStatus::Succeeded);
        assert_eq!(event.booking_reference(), Some("4"));
    }
}
