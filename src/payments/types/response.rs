use bon::Builder;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use serde_with::{DefaultOnError, serde_as};

use crate::types::{Address, DateTime, Decimal, Utc};
use crate::ws::WsError;

pub const PAYMENT_RECEIVED: &str = "payment_received";
pub const BILL_UPDATE: &str = "bill_update";

/// Top-level notification message, tagged by its `type` field.
///
/// Types this client does not know are kept as [`WsMessage::Unknown`] rather than
/// rejected, so new server pushes never break older clients.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq)]
pub enum WsMessage {
    /// A payment was made against a bill
    PaymentReceived(PaymentNotification),
    /// A bill's totals or status changed
    BillUpdate(PaymentNotification),
    /// Any other `type`
    Unknown {
        /// Value of the `type` field
        msg_type: String,
        /// The whole frame
        payload: Value,
    },
}

impl WsMessage {
    /// The `type` discriminator of this message.
    #[must_use]
    pub fn msg_type(&self) -> &str {
        match self {
            Self::PaymentReceived(_) => PAYMENT_RECEIVED,
            Self::BillUpdate(_) => BILL_UPDATE,
            Self::Unknown { msg_type, .. } => msg_type,
        }
    }

    /// The notification carried by known message types.
    #[must_use]
    pub const fn notification(&self) -> Option<&PaymentNotification> {
        match self {
            Self::PaymentReceived(n) | Self::BillUpdate(n) => Some(n),
            Self::Unknown { .. } => None,
        }
    }

    #[must_use]
    pub fn as_payment_received(&self) -> Option<&PaymentNotification> {
        match self {
            Self::PaymentReceived(n) => Some(n),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_bill_update(&self) -> Option<&PaymentNotification> {
        match self {
            Self::BillUpdate(n) => Some(n),
            _ => None,
        }
    }

    /// Build a message from an already parsed frame.
    pub fn from_value(value: Value) -> Result<Self, WsError> {
        let Some(msg_type) = value.get("type").and_then(Value::as_str) else {
            return Err(WsError::InvalidMessage(
                "frame is not an object with a string `type` field".to_owned(),
            ));
        };

        match msg_type {
            PAYMENT_RECEIVED => serde_json::from_value(value)
                .map(Self::PaymentReceived)
                .map_err(WsError::MessageParse),
            BILL_UPDATE => serde_json::from_value(value)
                .map(Self::BillUpdate)
                .map_err(WsError::MessageParse),
            other => Ok(Self::Unknown {
                msg_type: other.to_owned(),
                payload: value,
            }),
        }
    }
}

impl<'de> Deserialize<'de> for WsMessage {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        Self::from_value(value).map_err(D::Error::custom)
    }
}

/// Payload of `payment_received` and `bill_update` messages.
///
/// Only `bill_id` is always present; which other fields are set depends on the event.
#[serde_as]
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Deserialize, Builder)]
pub struct PaymentNotification {
    pub bill_id: u64,
    pub transaction_hash: Option<String>,
    pub amount: Option<Decimal>,
    pub tip_amount: Option<Decimal>,
    /// Wallet that paid. Unparseable addresses are dropped rather than failing the message.
    #[serde_as(as = "DefaultOnError")]
    #[serde(default)]
    pub payer_address: Option<Address>,
    pub business_id: Option<u64>,
    pub status: Option<String>,
    pub paid_amount: Option<Decimal>,
    pub total: Option<Decimal>,
    pub remaining: Option<Decimal>,
    /// Dropped when it carries no UTC offset or is otherwise unparseable.
    #[serde_as(as = "DefaultOnError")]
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

/// Parse one text frame.
pub fn parse_message(bytes: &[u8]) -> crate::Result<WsMessage> {
    let value: Value = serde_json::from_slice(bytes).map_err(WsError::MessageParse)?;
    Ok(WsMessage::from_value(value)?)
}
