//! Lab summary: per-organization evidence bundle collected after traversal.

use serde::{Deserialize, Serialize};

use super::SessionId;

/// Post-traversal evidence for one organization visited in a session.
///
/// Created lazily when a collection session enters finalization, one per
/// organization with at least one completed point. The completion flag may
/// only be set once at least one photo is attached.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabSummary {
    pub session_id: SessionId,
    pub organization: String,

    /// Opaque media references in submission order, 1..=10 once complete.
    pub photos: Vec<String>,

    /// Optional — the one place in the workflow where a comment may be
    /// empty.
    pub comment: Option<String>,

    pub complete: bool,
}
