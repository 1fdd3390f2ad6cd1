//! Session storage: create, load, list sessions and their frozen point
//! snapshots, plus the per-actor active-session pointer.

use jiff::Timestamp;
use rusqlite::{OptionalExtension, params};

use crate::model::{Point, RouteKind, RouteSession, SessionId, SessionPhase};

use super::{Result, Storage, StorageError, is_constraint_violation, parse_timestamp};

impl Storage {
    /// Creates a session, freezing its point list and claiming the
    /// actor's active-session slot — all in one transaction.
    ///
    /// Fails with `ActorBusy` when the actor already holds an open
    /// session, and `SessionAlreadyExists` on an id collision.
    pub fn create_session(&mut self, session: &RouteSession) -> Result<()> {
        let tx = self.conn.transaction()?;

        let inserted = tx.execute(
            "INSERT INTO sessions (id, actor, kind, label, phase, created_at, started_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                session.id.as_str(),
                &session.actor,
                kind_to_str(session.kind),
                &session.label,
                phase_to_str(session.phase),
                session.created_at.to_string(),
                session.started_at.map(|t| t.to_string()),
            ],
        );
        if let Err(e) = inserted {
            if is_constraint_violation(&e) {
                return Err(StorageError::SessionAlreadyExists(session.id.clone()));
            }
            return Err(e.into());
        }

        for (index, point) in session.points.iter().enumerate() {
            tx.execute(
                "INSERT INTO session_points (session_id, point_index, point)
                 VALUES (?1, ?2, ?3)",
                params![
                    session.id.as_str(),
                    index as u32,
                    serde_json::to_string(point)?,
                ],
            )?;
        }

        let claimed = tx.execute(
            "INSERT INTO active_sessions (actor, session_id) VALUES (?1, ?2)",
            params![&session.actor, session.id.as_str()],
        );
        if let Err(e) = claimed {
            if is_constraint_violation(&e) {
                return Err(StorageError::ActorBusy(session.actor.clone()));
            }
            return Err(e.into());
        }

        tx.commit()?;
        Ok(())
    }

    /// Loads a session with its frozen point list.
    pub fn load_session(&self, id: &SessionId) -> Result<RouteSession> {
        let row = self
            .conn
            .query_row(
                "SELECT actor, kind, label, phase, created_at, started_at
                 FROM sessions WHERE id = ?1",
                params![id.as_str()],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, String>(4)?,
                        row.get::<_, Option<String>>(5)?,
                    ))
                },
            )
            .optional()?;

        let Some((actor, kind, label, phase, created_at, started_at)) = row else {
            return Err(StorageError::SessionNotFound(id.clone()));
        };

        Ok(RouteSession {
            id: id.clone(),
            actor,
            kind: kind_from_str(&kind)?,
            label,
            points: self.session_points(id)?,
            phase: phase_from_str(&phase)?,
            created_at: parse_timestamp(&created_at, "created_at")?,
            started_at: started_at
                .map(|t| parse_timestamp(&t, "started_at"))
                .transpose()?,
        })
    }

    /// Lists all sessions, oldest first.
    pub fn list_sessions(&self) -> Result<Vec<RouteSession>> {
        let ids: Vec<SessionId> = self
            .conn
            .prepare("SELECT id FROM sessions")?
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<core::result::Result<Vec<_>, _>>()?
            .into_iter()
            .map(SessionId::from)
            .collect();

        let mut sessions = Vec::with_capacity(ids.len());
        for id in ids {
            sessions.push(self.load_session(&id)?);
        }
        sessions.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(sessions)
    }

    /// Updates a session's phase marker.
    pub fn set_session_phase(&self, id: &SessionId, phase: SessionPhase) -> Result<()> {
        let rows = self.conn.execute(
            "UPDATE sessions SET phase = ?1 WHERE id = ?2",
            params![phase_to_str(phase), id.as_str()],
        )?;
        if rows == 0 {
            return Err(StorageError::SessionNotFound(id.clone()));
        }
        Ok(())
    }

    /// Records when traversal actually began.
    pub fn set_session_started(&self, id: &SessionId, at: Timestamp) -> Result<()> {
        let rows = self.conn.execute(
            "UPDATE sessions SET started_at = ?1 WHERE id = ?2",
            params![at.to_string(), id.as_str()],
        )?;
        if rows == 0 {
            return Err(StorageError::SessionNotFound(id.clone()));
        }
        Ok(())
    }

    /// The actor's open session, if any.
    pub fn active_session(&self, actor: &str) -> Result<Option<SessionId>> {
        let id = self
            .conn
            .query_row(
                "SELECT session_id FROM active_sessions WHERE actor = ?1",
                params![actor],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(id.map(SessionId::from))
    }

    /// Releases the actor's active-session slot.
    ///
    /// Idempotent: does nothing when no slot is held.
    pub fn clear_active_session(&self, actor: &str) -> Result<()> {
        self.conn.execute(
            "DELETE FROM active_sessions WHERE actor = ?1",
            params![actor],
        )?;
        Ok(())
    }

    fn session_points(&self, id: &SessionId) -> Result<Vec<Point>> {
        let mut stmt = self.conn.prepare(
            "SELECT point FROM session_points WHERE session_id = ?1 ORDER BY point_index",
        )?;
        let rows = stmt.query_map(params![id.as_str()], |row| row.get::<_, String>(0))?;

        let mut points = Vec::new();
        for json in rows {
            points.push(serde_json::from_str(&json?)?);
        }
        Ok(points)
    }
}

fn kind_to_str(kind: RouteKind) -> &'static str {
    match kind {
        RouteKind::Collection => "collection",
        RouteKind::Delivery => "delivery",
    }
}

fn kind_from_str(s: &str) -> Result<RouteKind> {
    match s {
        "collection" => Ok(RouteKind::Collection),
        "delivery" => Ok(RouteKind::Delivery),
        other => Err(StorageError::Corrupt(format!("unknown route kind: {other}"))),
    }
}

fn phase_to_str(phase: SessionPhase) -> &'static str {
    match phase {
        SessionPhase::Confirming => "confirming",
        SessionPhase::Traversal => "traversal",
        SessionPhase::Finalizing => "finalizing",
        SessionPhase::Finalized => "finalized",
        SessionPhase::Cancelled => "cancelled",
    }
}

fn phase_from_str(s: &str) -> Result<SessionPhase> {
    match s {
        "confirming" => Ok(SessionPhase::Confirming),
        "traversal" => Ok(SessionPhase::Traversal),
        "finalizing" => Ok(SessionPhase::Finalizing),
        "finalized" => Ok(SessionPhase::Finalized),
        "cancelled" => Ok(SessionPhase::Cancelled),
        other => Err(StorageError::Corrupt(format!(
            "unknown session phase: {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::model::Point;

    fn sample_session(actor: &str) -> RouteSession {
        let now = Timestamp::now();
        RouteSession {
            id: SessionId::generate(actor, "Yaroslavl", now),
            actor: actor.to_string(),
            kind: RouteKind::Collection,
            label: "Yaroslavl".into(),
            points: vec![
                Point::Collection {
                    organization: "KDL".into(),
                    name: "KDL Center".into(),
                    address: "12 Lenina St".into(),
                    coordinates: None,
                },
                Point::Collection {
                    organization: "Hover".into(),
                    name: "Hover Lab".into(),
                    address: "3 Svobody St".into(),
                    coordinates: Some((57.62, 39.87)),
                },
            ],
            phase: SessionPhase::Confirming,
            created_at: now,
            started_at: None,
        }
    }

    #[test]
    fn create_and_load_session() {
        let mut storage = Storage::open_in_memory().unwrap();
        let session = sample_session("vera");

        storage.create_session(&session).unwrap();
        let loaded = storage.load_session(&session.id).unwrap();

        assert_eq!(loaded.actor, "vera");
        assert_eq!(loaded.kind, RouteKind::Collection);
        assert_eq!(loaded.points.len(), 2);
        assert_eq!(loaded.points[1].name(), "Hover Lab");
        assert_eq!(loaded.phase, SessionPhase::Confirming);
    }

    #[test]
    fn create_claims_active_slot() {
        let mut storage = Storage::open_in_memory().unwrap();
        let session = sample_session("vera");

        storage.create_session(&session).unwrap();
        let active = storage.active_session("vera").unwrap();

        assert_eq!(active, Some(session.id));
    }

    #[test]
    fn second_session_for_same_actor_fails() {
        let mut storage = Storage::open_in_memory().unwrap();
        storage.create_session(&sample_session("vera")).unwrap();

        let err = storage.create_session(&sample_session("vera")).unwrap_err();
        assert!(matches!(err, StorageError::ActorBusy(_)));
    }

    #[test]
    fn cleared_slot_frees_the_actor() {
        let mut storage = Storage::open_in_memory().unwrap();
        let first = sample_session("vera");
        storage.create_session(&first).unwrap();
        storage.clear_active_session("vera").unwrap();

        storage.create_session(&sample_session("vera")).unwrap();
        assert_ne!(storage.active_session("vera").unwrap(), Some(first.id));
    }

    #[test]
    fn load_nonexistent_session_fails() {
        let storage = Storage::open_in_memory().unwrap();
        let id = SessionId::from("missing".to_string());

        let err = storage.load_session(&id).unwrap_err();
        assert!(matches!(err, StorageError::SessionNotFound(_)));
    }

    #[test]
    fn phase_updates_round_trip() {
        let mut storage = Storage::open_in_memory().unwrap();
        let session = sample_session("vera");
        storage.create_session(&session).unwrap();

        storage
            .set_session_phase(&session.id, SessionPhase::Traversal)
            .unwrap();
        storage
            .set_session_started(&session.id, Timestamp::now())
            .unwrap();

        let loaded = storage.load_session(&session.id).unwrap();
        assert_eq!(loaded.phase, SessionPhase::Traversal);
        assert!(loaded.started_at.is_some());
    }

    #[test]
    fn list_sessions_sorted_by_creation() {
        let mut storage = Storage::open_in_memory().unwrap();

        let mut first = sample_session("vera");
        first.created_at = Timestamp::new(1_000_000_000, 0).unwrap();
        let mut second = sample_session("pavel");
        second.created_at = Timestamp::new(2_000_000_000, 0).unwrap();

        // Create in reverse order to verify sorting.
        storage.create_session(&second).unwrap();
        storage.create_session(&first).unwrap();

        let sessions = storage.list_sessions().unwrap();
        assert_eq!(sessions.len(), 2);
        assert_eq!(sessions[0].actor, "vera");
        assert_eq!(sessions[1].actor, "pavel");
    }
}
