//! Event log storage: append-only point visits and finalizations.
//!
//! The uniqueness of (session, point index) lives in the schema, so a
//! re-entered commit after a crash is rejected here rather than detected
//! by the workflow.

use jiff::Timestamp;
use rusqlite::{OptionalExtension, params};

use crate::model::{Finalization, PointOutcome, PointVisitEvent, SessionId};

use super::{Result, Storage, StorageError, is_constraint_violation, parse_timestamp};

impl Storage {
    /// Appends a point visit event.
    ///
    /// Fails with `DuplicatePointCommit` when an outcome is already
    /// recorded for this (session, point index).
    pub fn append_point_event(&self, event: &PointVisitEvent) -> Result<()> {
        let (outcome, quantity, photos, comment) = match &event.outcome {
            PointOutcome::Skipped => ("skipped", 0, Vec::new(), String::new()),
            PointOutcome::Completed {
                quantity,
                photos,
                comment,
            } => ("completed", *quantity, photos.clone(), comment.clone()),
        };

        let inserted = self.conn.execute(
            "INSERT INTO point_events
                 (session_id, point_index, organization, outcome, quantity,
                  photos, comment, recorded_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                event.session_id.as_str(),
                event.point_index,
                &event.organization,
                outcome,
                quantity,
                serde_json::to_string(&photos)?,
                comment,
                event.recorded_at.to_string(),
            ],
        );
        if let Err(e) = inserted {
            if is_constraint_violation(&e) {
                return Err(StorageError::DuplicatePointCommit {
                    session_id: event.session_id.clone(),
                    point_index: event.point_index,
                });
            }
            return Err(e.into());
        }
        Ok(())
    }

    /// All point events for a session, in visit order.
    pub fn point_events(&self, session_id: &SessionId) -> Result<Vec<PointVisitEvent>> {
        let mut stmt = self.conn.prepare(
            "SELECT point_index, organization, outcome, quantity, photos, comment, recorded_at
             FROM point_events WHERE session_id = ?1
             ORDER BY point_index",
        )?;
        let rows = stmt.query_map(params![session_id.as_str()], |row| {
            Ok((
                row.get::<_, u32>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, u32>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, String>(5)?,
                row.get::<_, String>(6)?,
            ))
        })?;

        let mut events = Vec::new();
        for row in rows {
            let (point_index, organization, outcome, quantity, photos, comment, recorded_at) =
                row?;
            events.push(PointVisitEvent {
                session_id: session_id.clone(),
                point_index,
                organization,
                outcome: outcome_from_columns(&outcome, quantity, &photos, comment)?,
                recorded_at: parse_timestamp(&recorded_at, "recorded_at")?,
            });
        }
        Ok(events)
    }

    /// How many outcomes this session has recorded — which is also the
    /// index of the next point to visit.
    pub fn count_point_events(&self, session_id: &SessionId) -> Result<u32> {
        let count = self.conn.query_row(
            "SELECT COUNT(*) FROM point_events WHERE session_id = ?1",
            params![session_id.as_str()],
            |row| row.get::<_, u32>(0),
        )?;
        Ok(count)
    }

    /// Writes the terminal marker for a session. At most one may exist.
    pub fn append_finalization(
        &self,
        session_id: &SessionId,
        finalization: &Finalization,
        at: Timestamp,
    ) -> Result<()> {
        let (kind, comment) = match finalization {
            Finalization::LabsComplete => ("labs-complete", None),
            Finalization::NothingCollected => ("nothing-collected", None),
            Finalization::FinalComment { text } => ("final-comment", Some(text.clone())),
        };

        let inserted = self.conn.execute(
            "INSERT INTO finalizations (session_id, kind, comment, recorded_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![session_id.as_str(), kind, comment, at.to_string()],
        );
        if let Err(e) = inserted {
            if is_constraint_violation(&e) {
                return Err(StorageError::AlreadyFinalized(session_id.clone()));
            }
            return Err(e.into());
        }
        Ok(())
    }

    /// The session's finalization, if it has one.
    pub fn finalization(&self, session_id: &SessionId) -> Result<Option<(Finalization, Timestamp)>> {
        let row = self
            .conn
            .query_row(
                "SELECT kind, comment, recorded_at FROM finalizations WHERE session_id = ?1",
                params![session_id.as_str()],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, Option<String>>(1)?,
                        row.get::<_, String>(2)?,
                    ))
                },
            )
            .optional()?;

        let Some((kind, comment, recorded_at)) = row else {
            return Ok(None);
        };
        let finalization = match kind.as_str() {
            "labs-complete" => Finalization::LabsComplete,
            "nothing-collected" => Finalization::NothingCollected,
            "final-comment" => Finalization::FinalComment {
                text: comment.unwrap_or_default(),
            },
            other => {
                return Err(StorageError::Corrupt(format!(
                    "unknown finalization kind: {other}"
                )));
            }
        };
        Ok(Some((
            finalization,
            parse_timestamp(&recorded_at, "recorded_at")?,
        )))
    }

    /// When the session last touched the log: its latest point event or
    /// finalization. `None` for sessions with no events yet.
    pub fn last_event_at(&self, session_id: &SessionId) -> Result<Option<Timestamp>> {
        let mut latest: Option<Timestamp> = None;

        let mut stmt = self.conn.prepare(
            "SELECT recorded_at FROM point_events WHERE session_id = ?1",
        )?;
        let rows = stmt.query_map(params![session_id.as_str()], |row| row.get::<_, String>(0))?;
        for row in rows {
            let at = parse_timestamp(&row?, "recorded_at")?;
            if latest.is_none_or(|l| at > l) {
                latest = Some(at);
            }
        }

        if let Some((_, at)) = self.finalization(session_id)?
            && latest.is_none_or(|l| at > l)
        {
            latest = Some(at);
        }
        Ok(latest)
    }
}

fn outcome_from_columns(
    outcome: &str,
    quantity: u32,
    photos: &str,
    comment: String,
) -> Result<PointOutcome> {
    match outcome {
        "skipped" => Ok(PointOutcome::Skipped),
        "completed" => Ok(PointOutcome::Completed {
            quantity,
            photos: serde_json::from_str(photos)?,
            comment,
        }),
        other => Err(StorageError::Corrupt(format!(
            "unknown point outcome: {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_event(session_id: &SessionId, point_index: u32) -> PointVisitEvent {
        PointVisitEvent {
            session_id: session_id.clone(),
            point_index,
            organization: "KDL".into(),
            outcome: PointOutcome::Completed {
                quantity: 5,
                photos: vec!["photo-1".into(), "photo-2".into()],
                comment: "two crates by the door".into(),
            },
            recorded_at: Timestamp::now(),
        }
    }

    fn session_id() -> SessionId {
        SessionId::generate("vera", "Yaroslavl", Timestamp::now())
    }

    #[test]
    fn append_and_read_back_in_visit_order() {
        let storage = Storage::open_in_memory().unwrap();
        let id = session_id();

        storage.append_point_event(&sample_event(&id, 0)).unwrap();
        storage
            .append_point_event(&PointVisitEvent {
                outcome: PointOutcome::Skipped,
                ..sample_event(&id, 1)
            })
            .unwrap();

        let events = storage.point_events(&id).unwrap();
        assert_eq!(events.len(), 2);
        assert!(events[0].outcome.is_completed());
        assert!(matches!(events[1].outcome, PointOutcome::Skipped));
        assert_eq!(events[0].outcome.quantity(), 5);
        assert_eq!(storage.count_point_events(&id).unwrap(), 2);
    }

    #[test]
    fn duplicate_commit_rejected_and_log_unchanged() {
        let storage = Storage::open_in_memory().unwrap();
        let id = session_id();
        storage.append_point_event(&sample_event(&id, 0)).unwrap();

        let mut replay = sample_event(&id, 0);
        replay.outcome = PointOutcome::Completed {
            quantity: 99,
            photos: vec![],
            comment: "replayed".into(),
        };
        let err = storage.append_point_event(&replay).unwrap_err();

        assert!(matches!(err, StorageError::DuplicatePointCommit { .. }));
        let events = storage.point_events(&id).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].outcome.quantity(), 5);
    }

    #[test]
    fn skipped_event_stores_no_photos() {
        let storage = Storage::open_in_memory().unwrap();
        let id = session_id();
        storage
            .append_point_event(&PointVisitEvent {
                outcome: PointOutcome::Skipped,
                ..sample_event(&id, 0)
            })
            .unwrap();

        let events = storage.point_events(&id).unwrap();
        assert_eq!(events[0].outcome.quantity(), 0);
    }

    #[test]
    fn finalization_roundtrip_and_uniqueness() {
        let storage = Storage::open_in_memory().unwrap();
        let id = session_id();

        assert!(storage.finalization(&id).unwrap().is_none());

        storage
            .append_finalization(&id, &Finalization::LabsComplete, Timestamp::now())
            .unwrap();
        let (finalization, _) = storage.finalization(&id).unwrap().unwrap();
        assert!(matches!(finalization, Finalization::LabsComplete));

        let err = storage
            .append_finalization(&id, &Finalization::LabsComplete, Timestamp::now())
            .unwrap_err();
        assert!(matches!(err, StorageError::AlreadyFinalized(_)));
    }

    #[test]
    fn final_comment_text_survives() {
        let storage = Storage::open_in_memory().unwrap();
        let id = session_id();

        storage
            .append_finalization(
                &id,
                &Finalization::FinalComment {
                    text: "all dropped off".into(),
                },
                Timestamp::now(),
            )
            .unwrap();

        let (finalization, _) = storage.finalization(&id).unwrap().unwrap();
        assert!(
            matches!(finalization, Finalization::FinalComment { text } if text == "all dropped off")
        );
    }

    #[test]
    fn last_event_tracks_the_newest_record() {
        let storage = Storage::open_in_memory().unwrap();
        let id = session_id();
        assert!(storage.last_event_at(&id).unwrap().is_none());

        let mut event = sample_event(&id, 0);
        event.recorded_at = Timestamp::new(1_000, 0).unwrap();
        storage.append_point_event(&event).unwrap();

        let final_at = Timestamp::new(2_000, 0).unwrap();
        storage
            .append_finalization(&id, &Finalization::NothingCollected, final_at)
            .unwrap();

        assert_eq!(storage.last_event_at(&id).unwrap(), Some(final_at));
    }
}
