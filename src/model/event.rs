//! Event types: the immutable records a session leaves behind.

use jiff::Timestamp;
use serde::{Deserialize, Serialize};

use super::SessionId;

/// What happened at a point.
///
/// `Skipped` means "not evaluated". `Completed` with quantity zero means
/// "evaluated, nothing present" — a different fact. Skipped points never
/// create a lab summary obligation; completed-with-zero points do.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "kebab-case")]
pub enum PointOutcome {
    Skipped,

    Completed {
        quantity: u32,

        /// Opaque media references in submission order.
        photos: Vec<String>,

        comment: String,
    },
}

impl PointOutcome {
    pub fn quantity(&self) -> u32 {
        match self {
            Self::Skipped => 0,
            Self::Completed { quantity, .. } => *quantity,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }
}

/// One point visit, written to the event log exactly once per point.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PointVisitEvent {
    pub session_id: SessionId,

    /// Ordinal of the point within the session's frozen point list.
    pub point_index: u32,

    /// Copied from the point at commit time so ledger and report queries
    /// never have to re-open the session's point snapshot.
    pub organization: String,

    pub outcome: PointOutcome,
    pub recorded_at: Timestamp,
}

/// Terminal marker for a session. At most one exists per session; once
/// written, the session is immutable and classified `completed`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "finalization", rename_all = "kebab-case")]
pub enum Finalization {
    /// Collection session: every lab summary was marked complete.
    LabsComplete,

    /// Collection session where every point was skipped — nothing
    /// collected, nothing to summarize.
    NothingCollected,

    /// Delivery session: courier's closing comment.
    FinalComment { text: String },
}
