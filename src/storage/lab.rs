//! Lab summary storage: per-organization evidence bundles and their photos.

use rusqlite::{OptionalExtension, params};

use crate::model::{LabSummary, SessionId};

use super::{Result, Storage};

impl Storage {
    /// Creates one empty summary per organization.
    ///
    /// Idempotent: organizations that already have a summary are left
    /// untouched, so re-entering finalization never duplicates or resets
    /// anything.
    pub fn create_lab_summaries(&self, session_id: &SessionId, organizations: &[String]) -> Result<()> {
        for org in organizations {
            self.conn.execute(
                "INSERT OR IGNORE INTO lab_summaries (session_id, organization, comment, complete)
                 VALUES (?1, ?2, NULL, 0)",
                params![session_id.as_str(), org],
            )?;
        }
        Ok(())
    }

    /// All summaries for a session, ordered by organization.
    pub fn lab_summaries(&self, session_id: &SessionId) -> Result<Vec<LabSummary>> {
        let mut stmt = self.conn.prepare(
            "SELECT organization, comment, complete FROM lab_summaries
             WHERE session_id = ?1 ORDER BY organization",
        )?;
        let rows = stmt.query_map(params![session_id.as_str()], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, Option<String>>(1)?,
                row.get::<_, bool>(2)?,
            ))
        })?;

        let mut summaries = Vec::new();
        for row in rows {
            let (organization, comment, complete) = row?;
            let photos = self.lab_photos(session_id, &organization)?;
            summaries.push(LabSummary {
                session_id: session_id.clone(),
                organization,
                photos,
                comment,
                complete,
            });
        }
        Ok(summaries)
    }

    /// One organization's summary, or `None` if it has no obligation in
    /// this session.
    pub fn lab_summary(&self, session_id: &SessionId, organization: &str) -> Result<Option<LabSummary>> {
        let row = self
            .conn
            .query_row(
                "SELECT comment, complete FROM lab_summaries
                 WHERE session_id = ?1 AND organization = ?2",
                params![session_id.as_str(), organization],
                |row| {
                    Ok((
                        row.get::<_, Option<String>>(0)?,
                        row.get::<_, bool>(1)?,
                    ))
                },
            )
            .optional()?;

        let Some((comment, complete)) = row else {
            return Ok(None);
        };
        Ok(Some(LabSummary {
            session_id: session_id.clone(),
            organization: organization.to_string(),
            photos: self.lab_photos(session_id, organization)?,
            comment,
            complete,
        }))
    }

    /// Appends a photo to a summary.
    pub fn add_lab_photo(
        &self,
        session_id: &SessionId,
        organization: &str,
        photo_ref: &str,
    ) -> Result<()> {
        self.conn.execute(
            "INSERT INTO lab_photos (session_id, organization, seq, photo_ref)
             VALUES (?1, ?2,
                     (SELECT COALESCE(MAX(seq) + 1, 0) FROM lab_photos
                      WHERE session_id = ?1 AND organization = ?2),
                     ?3)",
            params![session_id.as_str(), organization, photo_ref],
        )?;
        Ok(())
    }

    /// Removes and returns the most recently added photo, if any.
    pub fn remove_last_lab_photo(
        &self,
        session_id: &SessionId,
        organization: &str,
    ) -> Result<Option<String>> {
        let last = self
            .conn
            .query_row(
                "SELECT seq, photo_ref FROM lab_photos
                 WHERE session_id = ?1 AND organization = ?2
                 ORDER BY seq DESC LIMIT 1",
                params![session_id.as_str(), organization],
                |row| Ok((row.get::<_, u32>(0)?, row.get::<_, String>(1)?)),
            )
            .optional()?;

        let Some((seq, photo_ref)) = last else {
            return Ok(None);
        };
        self.conn.execute(
            "DELETE FROM lab_photos WHERE session_id = ?1 AND organization = ?2 AND seq = ?3",
            params![session_id.as_str(), organization, seq],
        )?;
        Ok(Some(photo_ref))
    }

    /// Sets a summary's comment, overwriting any previous value.
    pub fn set_lab_comment(
        &self,
        session_id: &SessionId,
        organization: &str,
        comment: &str,
    ) -> Result<()> {
        self.conn.execute(
            "UPDATE lab_summaries SET comment = ?3
             WHERE session_id = ?1 AND organization = ?2",
            params![session_id.as_str(), organization, comment],
        )?;
        Ok(())
    }

    /// Flips a summary's completion flag. The photo-count precondition is
    /// the workflow's to enforce.
    pub fn set_lab_complete(&self, session_id: &SessionId, organization: &str) -> Result<()> {
        self.conn.execute(
            "UPDATE lab_summaries SET complete = 1
             WHERE session_id = ?1 AND organization = ?2",
            params![session_id.as_str(), organization],
        )?;
        Ok(())
    }

    fn lab_photos(&self, session_id: &SessionId, organization: &str) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT photo_ref FROM lab_photos
             WHERE session_id = ?1 AND organization = ?2 ORDER BY seq",
        )?;
        let rows = stmt.query_map(params![session_id.as_str(), organization], |row| {
            row.get::<_, String>(0)
        })?;
        rows.collect::<core::result::Result<Vec<_>, _>>()
            .map_err(Into::into)
    }
}
