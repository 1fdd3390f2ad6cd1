//! Delivery route types: ledger snapshots frozen into outbound routes.

use jiff::Timestamp;
use serde::{Deserialize, Serialize};

/// Lifecycle of a delivery route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeliveryStatus {
    /// Generated, waiting for a courier to pick it up.
    Available,

    /// A courier confirmed a session on it.
    InProgress,

    /// The delivery session was finalized.
    Completed,
}

impl DeliveryStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Available => "available",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
        }
    }
}

/// One organization's share of a delivery route.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryPoint {
    pub organization: String,
    pub address: String,

    /// Snapshotted stock at generation time. This row *is* the ledger
    /// consumption record — stock reads zero as soon as it exists.
    pub quantity_to_deliver: u32,

    /// Filled in when the delivery session is finalized.
    pub quantity_delivered: Option<u32>,
}

/// An outbound route to the depot, generated from a ledger snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryRoute {
    pub id: i64,

    /// The label couriers select: `depot-<id>`.
    pub label: String,

    pub status: DeliveryStatus,
    pub created_by: String,
    pub created_at: Timestamp,

    /// The courier who took the route, once in progress.
    pub courier: Option<String>,

    pub completed_at: Option<Timestamp>,
    pub points: Vec<DeliveryPoint>,
}

impl DeliveryRoute {
    /// The label for a route id: `depot-<id>`.
    pub fn label_for(id: i64) -> String {
        format!("depot-{id}")
    }

    pub fn total_quantity(&self) -> u32 {
        self.points.iter().map(|p| p.quantity_to_deliver).sum()
    }
}
