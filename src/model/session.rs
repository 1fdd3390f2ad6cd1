//! Route session types: one courier's traversal of a route.

use std::fmt;

use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Point;

/// Opaque session identifier.
///
/// Human-scannable — it embeds the actor, route label, and creation time —
/// but never parsed back: actor and label are stored as their own columns.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(String);

impl SessionId {
    /// Generates a fresh id: `{actor}_{label}_{yyyymmdd_hhmmss}_{uuid8}`.
    pub fn generate(actor: &str, label: &str, at: Timestamp) -> Self {
        let stamp = at.strftime("%Y%m%d_%H%M%S");
        let uuid_part = &Uuid::new_v4().to_string()[..8];
        Self(format!("{actor}_{label}_{stamp}_{uuid_part}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for SessionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Whether a session collects stock into the warehouse or delivers it out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RouteKind {
    Collection,
    Delivery,
}

/// Where a session stands in its lifecycle.
///
/// A stored marker, not the source of truth: everything except `Confirming`
/// vs `Traversal` is reconstructable from the event log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SessionPhase {
    /// Route chosen, point list frozen, awaiting courier confirmation.
    Confirming,

    /// Walking the points in order.
    Traversal,

    /// All points visited or skipped; lab summaries (collection) or the
    /// final comment (delivery) still outstanding.
    Finalizing,

    /// Finalization event written. The session is immutable.
    Finalized,

    /// Courier cancelled. Committed events remain in the log.
    Cancelled,
}

/// One courier's traversal of a route, from confirmation to finalization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteSession {
    pub id: SessionId,
    pub actor: String,
    pub kind: RouteKind,

    /// The route label the courier selected: a catalog city for collection,
    /// a `depot-<n>` delivery route for delivery.
    pub label: String,

    /// Point list frozen at session start. Catalog edits never reach an
    /// in-flight session.
    pub points: Vec<Point>,

    pub phase: SessionPhase,
    pub created_at: Timestamp,

    /// Set on confirmation, when traversal actually begins.
    pub started_at: Option<Timestamp>,
}

/// Operational classification of a session for monitoring dashboards.
///
/// Inferred from event timestamps and completion ratio; see
/// `workflow::status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SessionStatus {
    /// Events within the active window (default 2h).
    Active,

    /// Quiet for a while, or stale but nearly done.
    Paused,

    /// Stale with most of the route still ahead — likely abandoned.
    Inactive,

    /// Finalization event written.
    Completed,
}

impl SessionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Paused => "paused",
            Self::Inactive => "inactive",
            Self::Completed => "completed",
        }
    }
}
