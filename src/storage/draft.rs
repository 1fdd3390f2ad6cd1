//! Draft storage: the in-progress point state between commands.
//!
//! A draft accumulates as the courier submits photos, a quantity, and a
//! comment, then is cleared when the point commits — or when the session
//! is cancelled. A missing row is a valid empty draft.

use rusqlite::{OptionalExtension, params};

use crate::model::SessionId;
use crate::tracker::PointDraft;

use super::{Result, Storage};

impl Storage {
    /// Saves (or replaces) the draft for a point.
    pub fn save_draft(
        &self,
        session_id: &SessionId,
        point_index: u32,
        draft: &PointDraft,
    ) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO point_drafts (session_id, point_index, draft)
             VALUES (?1, ?2, ?3)",
            params![
                session_id.as_str(),
                point_index,
                serde_json::to_string(draft)?
            ],
        )?;
        Ok(())
    }

    /// Loads the draft for a point. A missing row is an empty draft.
    pub fn load_draft(&self, session_id: &SessionId, point_index: u32) -> Result<PointDraft> {
        let json = self
            .conn
            .query_row(
                "SELECT draft FROM point_drafts WHERE session_id = ?1 AND point_index = ?2",
                params![session_id.as_str(), point_index],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        match json {
            Some(json) => Ok(serde_json::from_str(&json)?),
            None => Ok(PointDraft::default()),
        }
    }

    /// Removes the draft for one point. Idempotent.
    pub fn clear_draft(&self, session_id: &SessionId, point_index: u32) -> Result<()> {
        self.conn.execute(
            "DELETE FROM point_drafts WHERE session_id = ?1 AND point_index = ?2",
            params![session_id.as_str(), point_index],
        )?;
        Ok(())
    }

    /// Removes every draft a session holds. Used on cancel.
    pub fn clear_drafts(&self, session_id: &SessionId) -> Result<()> {
        self.conn.execute(
            "DELETE FROM point_drafts WHERE session_id = ?1",
            params![session_id.as_str()],
        )?;
        Ok(())
    }
}
