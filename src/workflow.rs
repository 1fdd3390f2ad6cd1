//! The route session state machine.
//!
//! Drives one courier through an ordered point list: select a route,
//! confirm it, fill in a draft per point (photos, quantity, comment),
//! commit or skip each point, then finalize — lab summaries for
//! collection sessions, a closing comment for delivery sessions.
//!
//! The engine itself is stateless between calls. Everything durable is an
//! event in storage; the current point index is always derived from the
//! count of recorded outcomes, so a crash between commands loses nothing
//! but the unsaved keystroke. A commit that did not reach the log never
//! happened, and the courier resubmits — that is the whole retry story.

pub mod lab;
pub mod status;

use jiff::Timestamp;
use thiserror::Error;

use crate::catalog::Catalog;
use crate::config::Config;
use crate::model::{
    DeliveryRoute, Finalization, LabSummary, Point, PointOutcome, PointVisitEvent, RouteKind,
    RouteSession, SessionId, SessionPhase, SessionStatus,
};
use crate::storage::{Storage, StorageError};
use crate::tracker::{DraftError, PointDraft, QuantityBound};

/// Errors surfaced by workflow operations.
///
/// Draft and storage failures pass through unchanged; everything else is
/// a state conflict — the action is rejected and engine state is left
/// exactly as it was.
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("no route named '{0}': not a catalog city and not an available delivery route")]
    RouteNotFound(String),

    #[error("an open session already exists: {0}")]
    ActiveRouteExists(SessionId),

    #[error("{0} has no active session")]
    NoActiveSession(String),

    #[error("this action needs the session to be {expected}, but it is {found}")]
    WrongPhase {
        expected: &'static str,
        found: &'static str,
    },

    #[error("point is incomplete: missing {missing}")]
    PointIncomplete { missing: String },

    #[error("lab summary for {0} has no photos yet")]
    MissingPhoto(String),

    #[error("lab summary photo limit reached (max {max})")]
    TooManyLabPhotos { max: usize },

    #[error("no lab summary is owed for {0} in this session")]
    UnknownLab(String),

    #[error("lab summaries still incomplete: {0}")]
    LabsIncomplete(String),

    #[error("a final comment is required to finish a delivery session")]
    FinalCommentRequired,

    #[error(transparent)]
    Draft(#[from] DraftError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

pub type Result<T> = core::result::Result<T, WorkflowError>;

/// A session together with everything derived from its events, for
/// rendering and monitoring.
#[derive(Debug)]
pub struct SessionView {
    pub session: RouteSession,
    pub events: Vec<PointVisitEvent>,

    /// Index of the next unvisited point; equals the point count once
    /// traversal is done.
    pub next_index: u32,

    /// Running per-organization quantity accumulator over completed
    /// points.
    pub collected: Vec<(String, u32)>,

    pub labs: Vec<LabSummary>,
    pub finalization: Option<Finalization>,
    pub status: SessionStatus,
}

impl SessionView {
    pub fn total_points(&self) -> u32 {
        self.session.points.len() as u32
    }

    pub fn total_quantity(&self) -> u32 {
        self.collected.iter().map(|(_, q)| q).sum()
    }
}

/// The workflow engine: orchestrates sessions over storage, catalog, and
/// configuration. Construct one per command; it carries no state of its
/// own.
pub struct Engine<'a> {
    storage: &'a mut Storage,
    catalog: &'a Catalog,
    config: &'a Config,
}

impl<'a> Engine<'a> {
    pub fn new(storage: &'a mut Storage, catalog: &'a Catalog, config: &'a Config) -> Self {
        Self {
            storage,
            catalog,
            config,
        }
    }

    // ── Session lifecycle ──

    /// Starts a session on the named route: a catalog city (collection)
    /// or an available `depot-<n>` route (delivery).
    ///
    /// The point list is frozen into the session here; later catalog
    /// edits never reach it. The session still needs `confirm` before
    /// traversal begins.
    pub fn start_route(&mut self, actor: &str, label: &str) -> Result<RouteSession> {
        if let Some(existing) = self.storage.active_session(actor)? {
            return Err(WorkflowError::ActiveRouteExists(existing));
        }

        let now = Timestamp::now();
        let (kind, points, delivery_route) = self.resolve_label(label)?;

        let session = RouteSession {
            id: SessionId::generate(actor, label, now),
            actor: actor.to_string(),
            kind,
            label: label.to_string(),
            points,
            phase: SessionPhase::Confirming,
            created_at: now,
            started_at: None,
        };
        self.storage.create_session(&session)?;

        // Selecting a delivery route takes it off the board.
        if let Some(route) = delivery_route {
            self.storage
                .set_delivery_route_in_progress(route.id, actor)?;
        }

        Ok(session)
    }

    /// Confirms the pending session and begins traversal at point 0.
    pub fn confirm(&mut self, actor: &str) -> Result<RouteSession> {
        let mut session = self.require_session(actor)?;
        require_phase(&session, SessionPhase::Confirming, "awaiting confirmation")?;

        let now = Timestamp::now();
        self.storage
            .set_session_phase(&session.id, SessionPhase::Traversal)?;
        self.storage.set_session_started(&session.id, now)?;
        session.phase = SessionPhase::Traversal;
        session.started_at = Some(now);

        // A route with no points is already done.
        if session.points.is_empty() {
            self.enter_finalization(&mut session)?;
        }
        Ok(session)
    }

    /// Cancels the open session.
    ///
    /// Drafts are discarded and the actor's slot is released; committed
    /// events stay in the log. A cancelled session simply never gets a
    /// finalization. A cancelled delivery session returns its route to
    /// the available pool.
    pub fn cancel(&mut self, actor: &str) -> Result<RouteSession> {
        let mut session = self.require_session(actor)?;

        self.storage.clear_drafts(&session.id)?;
        self.storage
            .set_session_phase(&session.id, SessionPhase::Cancelled)?;
        self.storage.clear_active_session(actor)?;

        if session.kind == RouteKind::Delivery
            && let Some(route_id) = delivery_route_id(&session)
        {
            self.storage.set_delivery_route_available(route_id)?;
        }

        session.phase = SessionPhase::Cancelled;
        Ok(session)
    }

    // ── Point processing ──

    /// Appends a photo to the current point's draft.
    pub fn submit_photo(&mut self, actor: &str, photo_ref: &str) -> Result<()> {
        let (session, index, _) = self.current_point(actor)?;
        let mut draft = self.storage.load_draft(&session.id, index)?;
        draft.add_photo(photo_ref);
        self.storage.save_draft(&session.id, index, &draft)?;
        Ok(())
    }

    /// Removes the most recently added photo from the current point's
    /// draft, returning it.
    pub fn undo_photo(&mut self, actor: &str) -> Result<Option<String>> {
        let (session, index, _) = self.current_point(actor)?;
        let mut draft = self.storage.load_draft(&session.id, index)?;
        let removed = draft.remove_last_photo();
        self.storage.save_draft(&session.id, index, &draft)?;
        Ok(removed)
    }

    /// Sets the current point's quantity, overwriting a previous value.
    ///
    /// Collection points use the configured range; delivery points are
    /// capped by the point's remaining quantity-to-deliver.
    pub fn submit_quantity(&mut self, actor: &str, quantity: u32) -> Result<()> {
        let (session, index, point) = self.current_point(actor)?;
        let bound = match point.quantity_to_deliver() {
            Some(max) => QuantityBound::Remaining { max },
            None => QuantityBound::Configured {
                min: self.config.min_quantity,
                max: self.config.max_quantity,
            },
        };

        let mut draft = self.storage.load_draft(&session.id, index)?;
        draft.set_quantity(quantity, bound)?;
        self.storage.save_draft(&session.id, index, &draft)?;
        Ok(())
    }

    /// Sets the current point's comment, overwriting a previous value.
    pub fn submit_comment(&mut self, actor: &str, comment: &str) -> Result<()> {
        let (session, index, _) = self.current_point(actor)?;
        let mut draft = self.storage.load_draft(&session.id, index)?;
        draft.set_comment(comment, self.config.max_comment_chars)?;
        self.storage.save_draft(&session.id, index, &draft)?;
        Ok(())
    }

    /// The current point's draft, for re-prompting.
    pub fn current_draft(&self, actor: &str) -> Result<(Point, PointDraft)> {
        let (session, index, point) = self.current_point(actor)?;
        let draft = self.storage.load_draft(&session.id, index)?;
        Ok((point, draft))
    }

    /// Commits the current point as completed, consuming its draft.
    ///
    /// The draft must be complete: at least one photo, a quantity (zero
    /// counts), and a comment. The event append is the one durable side
    /// effect; the draft is cleared only after it succeeds.
    pub fn commit_point(&mut self, actor: &str) -> Result<SessionView> {
        let (mut session, index, point) = self.current_point(actor)?;
        let draft = self.storage.load_draft(&session.id, index)?;
        if !draft.is_complete() {
            return Err(WorkflowError::PointIncomplete {
                missing: draft.missing().join(", "),
            });
        }

        self.storage.append_point_event(&PointVisitEvent {
            session_id: session.id.clone(),
            point_index: index,
            organization: point.organization().to_string(),
            outcome: PointOutcome::Completed {
                quantity: draft.quantity.unwrap_or(0),
                photos: draft.photos.clone(),
                comment: draft.comment.clone().unwrap_or_default(),
            },
            recorded_at: Timestamp::now(),
        })?;
        self.storage.clear_draft(&session.id, index)?;

        self.advance(&mut session, index)?;
        self.view_session(&session.id)
    }

    /// Skips the current point: immediately records a `skipped` outcome
    /// and advances. No draft interaction required; any partial draft is
    /// discarded.
    pub fn skip_point(&mut self, actor: &str) -> Result<SessionView> {
        let (mut session, index, point) = self.current_point(actor)?;

        self.storage.append_point_event(&PointVisitEvent {
            session_id: session.id.clone(),
            point_index: index,
            organization: point.organization().to_string(),
            outcome: PointOutcome::Skipped,
            recorded_at: Timestamp::now(),
        })?;
        self.storage.clear_draft(&session.id, index)?;

        self.advance(&mut session, index)?;
        self.view_session(&session.id)
    }

    // ── Views ──

    /// The actor's open session with everything derived from its events.
    pub fn view_active(&self, actor: &str) -> Result<SessionView> {
        let session = self.require_session(actor)?;
        self.view_session(&session.id)
    }

    /// Any session by id, for monitoring.
    pub fn view_session(&self, id: &SessionId) -> Result<SessionView> {
        let session = self.storage.load_session(id)?;
        let events = self.storage.point_events(id)?;
        let next_index = events.len() as u32;
        let finalization = self.storage.finalization(id)?.map(|(f, _)| f);
        let labs = self.storage.lab_summaries(id)?;

        let mut collected: Vec<(String, u32)> = Vec::new();
        for event in &events {
            if let PointOutcome::Completed { quantity, .. } = &event.outcome {
                match collected.iter_mut().find(|(org, _)| org == &event.organization) {
                    Some((_, total)) => *total += quantity,
                    None => collected.push((event.organization.clone(), *quantity)),
                }
            }
        }

        let last_activity = self
            .storage
            .last_event_at(id)?
            .unwrap_or(session.created_at);
        let status = status::classify(
            finalization.is_some() || session.phase == SessionPhase::Finalized,
            last_activity,
            next_index,
            session.points.len() as u32,
            Timestamp::now(),
            self.config,
        );

        Ok(SessionView {
            session,
            events,
            next_index,
            collected,
            labs,
            finalization,
            status,
        })
    }

    /// Delivery routes currently waiting for a courier.
    pub fn available_routes(&self) -> Result<Vec<DeliveryRoute>> {
        Ok(self.storage.available_delivery_routes()?)
    }

    /// Views for every session ever recorded, oldest first.
    pub fn view_all(&self) -> Result<Vec<SessionView>> {
        let sessions = self.storage.list_sessions()?;
        let mut views = Vec::with_capacity(sessions.len());
        for session in sessions {
            views.push(self.view_session(&session.id)?);
        }
        Ok(views)
    }

    // ── Internals ──

    /// Resolves a route label against the catalog, then against available
    /// delivery routes.
    fn resolve_label(
        &self,
        label: &str,
    ) -> Result<(RouteKind, Vec<Point>, Option<DeliveryRoute>)> {
        if let Some(points) = self.catalog.points(label) {
            return Ok((RouteKind::Collection, points, None));
        }

        let route = self
            .storage
            .available_delivery_routes()?
            .into_iter()
            .find(|r| r.label == label)
            .ok_or_else(|| WorkflowError::RouteNotFound(label.to_string()))?;

        let points = route
            .points
            .iter()
            .map(|p| Point::Delivery {
                organization: p.organization.clone(),
                name: format!("{} depot", p.organization),
                address: p.address.clone(),
                quantity_to_deliver: p.quantity_to_deliver,
                delivery_route_id: route.id,
            })
            .collect();
        Ok((RouteKind::Delivery, points, Some(route)))
    }

    /// The actor's open session, whatever its phase.
    fn require_session(&self, actor: &str) -> Result<RouteSession> {
        let id = self
            .storage
            .active_session(actor)?
            .ok_or_else(|| WorkflowError::NoActiveSession(actor.to_string()))?;
        Ok(self.storage.load_session(&id)?)
    }

    /// The actor's session, its next point index, and that point.
    /// Requires traversal to be underway with points remaining.
    fn current_point(&self, actor: &str) -> Result<(RouteSession, u32, Point)> {
        let session = self.require_session(actor)?;
        require_phase(&session, SessionPhase::Traversal, "traversing")?;

        let index = self.storage.count_point_events(&session.id)?;
        let point = session
            .points
            .get(index as usize)
            .cloned()
            .ok_or(WorkflowError::WrongPhase {
                expected: "traversing",
                found: "past the last point",
            })?;
        Ok((session, index, point))
    }

    /// After recording an outcome for `index`, moves to the next point or
    /// into finalization when that was the last one.
    fn advance(&mut self, session: &mut RouteSession, index: u32) -> Result<()> {
        if (index + 1) as usize >= session.points.len() {
            self.enter_finalization(session)?;
        }
        Ok(())
    }

    /// Transition out of traversal once every point has an outcome.
    ///
    /// Collection sessions owe one lab summary per organization with a
    /// completed point; creating them is idempotent. If every point was
    /// skipped there is nothing to summarize and the session finalizes on
    /// the spot. Delivery sessions go straight to awaiting their final
    /// comment.
    fn enter_finalization(&mut self, session: &mut RouteSession) -> Result<()> {
        match session.kind {
            RouteKind::Collection => {
                let events = self.storage.point_events(&session.id)?;
                let mut organizations: Vec<String> = Vec::new();
                for event in &events {
                    if event.outcome.is_completed()
                        && !organizations.contains(&event.organization)
                    {
                        organizations.push(event.organization.clone());
                    }
                }

                if organizations.is_empty() {
                    self.storage.append_finalization(
                        &session.id,
                        &Finalization::NothingCollected,
                        Timestamp::now(),
                    )?;
                    self.storage
                        .set_session_phase(&session.id, SessionPhase::Finalized)?;
                    self.storage.clear_active_session(&session.actor)?;
                    session.phase = SessionPhase::Finalized;
                } else {
                    organizations.sort();
                    self.storage
                        .create_lab_summaries(&session.id, &organizations)?;
                    self.storage
                        .set_session_phase(&session.id, SessionPhase::Finalizing)?;
                    session.phase = SessionPhase::Finalizing;
                }
            }
            RouteKind::Delivery => {
                self.storage
                    .set_session_phase(&session.id, SessionPhase::Finalizing)?;
                session.phase = SessionPhase::Finalizing;
            }
        }
        Ok(())
    }
}

fn require_phase(
    session: &RouteSession,
    expected: SessionPhase,
    expected_name: &'static str,
) -> Result<()> {
    if session.phase == expected {
        return Ok(());
    }
    Err(WorkflowError::WrongPhase {
        expected: expected_name,
        found: phase_name(session.phase),
    })
}

fn phase_name(phase: SessionPhase) -> &'static str {
    match phase {
        SessionPhase::Confirming => "awaiting confirmation",
        SessionPhase::Traversal => "traversing",
        SessionPhase::Finalizing => "finalizing",
        SessionPhase::Finalized => "finalized",
        SessionPhase::Cancelled => "cancelled",
    }
}

fn delivery_route_id(session: &RouteSession) -> Option<i64> {
    session.points.iter().find_map(|p| match p {
        Point::Delivery {
            delivery_route_id, ..
        } => Some(*delivery_route_id),
        Point::Collection { .. } => None,
    })
}
