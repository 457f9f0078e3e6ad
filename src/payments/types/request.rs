use bon::Builder;
use serde::Serialize;
use strum_macros::Display;

/// Kind of room a client can subscribe to.
#[non_exhaustive]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "snake_case")]
pub enum RoomKind {
    Bill,
    Table,
    Business,
}

/// A room the server pushes notifications to, e.g. `bill_42`.
#[non_exhaustive]
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum SubscriptionTarget {
    /// Updates for a single bill
    Bill(u64),
    /// Updates for every bill opened at a table, by table code
    Table(String),
    /// Updates for every bill of a business
    Business(u64),
}

impl SubscriptionTarget {
    #[must_use]
    pub const fn kind(&self) -> RoomKind {
        match self {
            Self::Bill(_) => RoomKind::Bill,
            Self::Table(_) => RoomKind::Table,
            Self::Business(_) => RoomKind::Business,
        }
    }

    /// Room name as the server knows it: `<kind>_<identifier>`.
    #[must_use]
    pub fn room(&self) -> String {
        match self {
            Self::Bill(id) | Self::Business(id) => format!("{}_{id}", self.kind()),
            Self::Table(code) => format!("{}_{code}", self.kind()),
        }
    }
}

/// Identifiers a client was created for. Each one present becomes one subscription.
///
/// Rooms are fixed for the lifetime of a [`crate::payments::Client`]; watching different
/// rooms means creating a new client.
#[non_exhaustive]
#[derive(Clone, Debug, Default, PartialEq, Eq, Builder)]
pub struct Rooms {
    pub bill_id: Option<u64>,
    #[builder(into)]
    pub table_code: Option<String>,
    pub business_id: Option<u64>,
}

impl Rooms {
    /// Targets in subscription order: bill, table, business. Blank table codes are skipped;
    /// any other code is used as given.
    #[must_use]
    pub fn targets(&self) -> Vec<SubscriptionTarget> {
        let table = self
            .table_code
            .as_deref()
            .filter(|code| !code.trim().is_empty())
            .map(|code| SubscriptionTarget::Table(code.to_owned()));

        [
            self.bill_id.map(SubscriptionTarget::Bill),
            table,
            self.business_id.map(SubscriptionTarget::Business),
        ]
        .into_iter()
        .flatten()
        .collect()
    }
}

/// Outbound request type.
#[non_exhaustive]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestType {
    Subscribe,
}

/// `{"type":"subscribe","room":"bill_42"}`
#[non_exhaustive]
#[derive(Clone, Debug, Serialize)]
pub struct SubscribeRequest {
    #[serde(rename = "type")]
    pub request_type: RequestType,
    pub room: String,
}

impl SubscribeRequest {
    #[must_use]
    pub fn subscribe(target: &SubscriptionTarget) -> Self {
        Self {
            request_type: RequestType::Subscribe,
            room: target.room(),
        }
    }
}
