//! Finalization: lab summaries and the closing of a session.
//!
//! A collection session owes one lab summary per organization that had at
//! least one completed point — photos of the handover paperwork, an
//! optional comment, and an explicit "done" mark. Only when every summary
//! is marked complete can the session finish. Delivery sessions skip all
//! of that and close on a single final comment.

use jiff::Timestamp;

use crate::model::{Finalization, LabSummary, PointOutcome, RouteKind, SessionPhase};
use crate::tracker::DraftError;

use super::{Engine, Result, WorkflowError, delivery_route_id, require_phase};

impl Engine<'_> {
    /// Appends a photo to one organization's lab summary.
    pub fn lab_add_photo(&mut self, actor: &str, organization: &str, photo_ref: &str) -> Result<()> {
        let (session, summary) = self.require_lab(actor, organization)?;
        if summary.photos.len() >= self.config.max_lab_photos {
            return Err(WorkflowError::TooManyLabPhotos {
                max: self.config.max_lab_photos,
            });
        }
        self.storage
            .add_lab_photo(&session.id, organization, photo_ref)?;
        Ok(())
    }

    /// Removes the most recently added lab photo, returning it.
    pub fn lab_undo_photo(&mut self, actor: &str, organization: &str) -> Result<Option<String>> {
        let (session, _) = self.require_lab(actor, organization)?;
        Ok(self.storage.remove_last_lab_photo(&session.id, organization)?)
    }

    /// Sets one summary's comment, overwriting a previous value. The
    /// comment is optional; setting it is not.
    pub fn lab_set_comment(&mut self, actor: &str, organization: &str, comment: &str) -> Result<()> {
        let (session, _) = self.require_lab(actor, organization)?;

        let comment = comment.trim();
        if comment.is_empty() {
            return Err(WorkflowError::Draft(DraftError::EmptyComment));
        }
        if comment.chars().count() > self.config.max_comment_chars {
            return Err(WorkflowError::Draft(DraftError::CommentTooLong {
                max: self.config.max_comment_chars,
            }));
        }

        self.storage
            .set_lab_comment(&session.id, organization, comment)?;
        Ok(())
    }

    /// Marks one summary complete. Requires at least one photo.
    pub fn lab_mark_complete(&mut self, actor: &str, organization: &str) -> Result<()> {
        let (session, summary) = self.require_lab(actor, organization)?;
        if summary.photos.is_empty() {
            return Err(WorkflowError::MissingPhoto(organization.to_string()));
        }
        self.storage.set_lab_complete(&session.id, organization)?;
        Ok(())
    }

    /// Finishes the session.
    ///
    /// Collection: every lab summary must be marked complete; the comment
    /// argument is ignored. Delivery: a final comment is required, the
    /// delivered quantities are written back to the route, and the route
    /// itself completes. Either way the finalization event is written,
    /// the session becomes immutable, and the actor's slot is freed.
    pub fn finish(&mut self, actor: &str, comment: Option<&str>) -> Result<()> {
        let session = self.require_session(actor)?;
        require_phase(&session, SessionPhase::Finalizing, "finalizing")?;
        let now = Timestamp::now();

        match session.kind {
            RouteKind::Collection => {
                let incomplete: Vec<String> = self
                    .storage
                    .lab_summaries(&session.id)?
                    .into_iter()
                    .filter(|s| !s.complete)
                    .map(|s| s.organization)
                    .collect();
                if !incomplete.is_empty() {
                    return Err(WorkflowError::LabsIncomplete(incomplete.join(", ")));
                }

                self.storage
                    .append_finalization(&session.id, &Finalization::LabsComplete, now)?;
            }
            RouteKind::Delivery => {
                let text = comment.map(str::trim).unwrap_or_default();
                if text.is_empty() {
                    return Err(WorkflowError::FinalCommentRequired);
                }
                if text.chars().count() > self.config.max_comment_chars {
                    return Err(WorkflowError::Draft(DraftError::CommentTooLong {
                        max: self.config.max_comment_chars,
                    }));
                }

                let route_id = delivery_route_id(&session).ok_or_else(|| {
                    WorkflowError::Storage(crate::storage::StorageError::Corrupt(format!(
                        "delivery session {} has no route points",
                        session.id
                    )))
                })?;

                for event in self.storage.point_events(&session.id)? {
                    if let PointOutcome::Completed { quantity, .. } = event.outcome {
                        self.storage.set_quantity_delivered(
                            route_id,
                            &event.organization,
                            quantity,
                        )?;
                    }
                }
                self.storage.set_delivery_route_completed(route_id, now)?;
                self.storage.append_finalization(
                    &session.id,
                    &Finalization::FinalComment {
                        text: text.to_string(),
                    },
                    now,
                )?;
            }
        }

        self.storage
            .set_session_phase(&session.id, SessionPhase::Finalized)?;
        self.storage.clear_active_session(actor)?;
        Ok(())
    }

    /// The actor's session in finalization, plus the named summary.
    fn require_lab(
        &self,
        actor: &str,
        organization: &str,
    ) -> Result<(crate::model::RouteSession, LabSummary)> {
        let session = self.require_session(actor)?;
        require_phase(&session, SessionPhase::Finalizing, "finalizing")?;

        let summary = self
            .storage
            .lab_summary(&session.id, organization)?
            .ok_or_else(|| WorkflowError::UnknownLab(organization.to_string()))?;
        Ok((session, summary))
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::{complete_point, setup};
    use super::*;

    use crate::catalog::Catalog;
    use crate::config::Config;
    use crate::model::DeliveryStatus;
    use crate::storage::Storage;
    use crate::workflow::Engine;

    /// Runs a full collection session: 5 for Alpha, skip Beta, 7 for Alpha.
    /// Leaves the session finalizing with one lab obligation.
    fn traverse_collection(storage: &mut Storage, catalog: &Catalog, config: &Config, actor: &str) {
        {
            let mut engine = Engine::new(storage, catalog, config);
            engine.start_route(actor, "Yaroslavl").unwrap();
            engine.confirm(actor).unwrap();
        }
        complete_point(storage, catalog, config, actor, 5);
        {
            let mut engine = Engine::new(storage, catalog, config);
            engine.skip_point(actor).unwrap();
        }
        complete_point(storage, catalog, config, actor, 7);
    }

    #[test]
    fn unknown_organization_is_rejected() {
        let (mut storage, catalog, config) = setup();
        traverse_collection(&mut storage, &catalog, &config, "vera");

        let mut engine = Engine::new(&mut storage, &catalog, &config);
        let err = engine.lab_add_photo("vera", "Beta", "photo").unwrap_err();
        assert!(matches!(err, WorkflowError::UnknownLab(org) if org == "Beta"));
    }

    #[test]
    fn mark_complete_requires_a_photo() {
        let (mut storage, catalog, config) = setup();
        traverse_collection(&mut storage, &catalog, &config, "vera");

        let mut engine = Engine::new(&mut storage, &catalog, &config);
        let err = engine.lab_mark_complete("vera", "Alpha").unwrap_err();
        assert!(matches!(err, WorkflowError::MissingPhoto(_)));

        engine.lab_add_photo("vera", "Alpha", "handover").unwrap();
        engine.lab_mark_complete("vera", "Alpha").unwrap();
    }

    #[test]
    fn photo_cap_is_enforced() {
        let (mut storage, catalog, config) = setup();
        traverse_collection(&mut storage, &catalog, &config, "vera");

        let mut engine = Engine::new(&mut storage, &catalog, &config);
        for i in 0..config.max_lab_photos {
            engine
                .lab_add_photo("vera", "Alpha", &format!("photo-{i}"))
                .unwrap();
        }
        let err = engine.lab_add_photo("vera", "Alpha", "one-more").unwrap_err();
        assert!(matches!(err, WorkflowError::TooManyLabPhotos { max: 10 }));

        // Undo frees a slot.
        engine.lab_undo_photo("vera", "Alpha").unwrap();
        engine.lab_add_photo("vera", "Alpha", "one-more").unwrap();
    }

    #[test]
    fn finish_blocked_until_every_lab_is_done() {
        let (mut storage, catalog, config) = setup();
        traverse_collection(&mut storage, &catalog, &config, "vera");

        let mut engine = Engine::new(&mut storage, &catalog, &config);
        let err = engine.finish("vera", None).unwrap_err();
        assert!(matches!(err, WorkflowError::LabsIncomplete(orgs) if orgs == "Alpha"));

        engine.lab_add_photo("vera", "Alpha", "handover").unwrap();
        engine.lab_set_comment("vera", "Alpha", "paperwork signed").unwrap();
        engine.lab_mark_complete("vera", "Alpha").unwrap();
        engine.finish("vera", None).unwrap();

        // Session is closed and the actor is free again.
        let sessions = engine.view_all().unwrap();
        assert!(matches!(
            sessions[0].finalization,
            Some(Finalization::LabsComplete)
        ));
        assert!(engine.start_route("vera", "Yaroslavl").is_ok());
    }

    #[test]
    fn delivery_session_end_to_end() {
        let (mut storage, catalog, config) = setup();

        // Stock the warehouse: 12 containers for Alpha.
        traverse_collection(&mut storage, &catalog, &config, "vera");
        {
            let mut engine = Engine::new(&mut storage, &catalog, &config);
            engine.lab_add_photo("vera", "Alpha", "handover").unwrap();
            engine.lab_mark_complete("vera", "Alpha").unwrap();
            engine.finish("vera", None).unwrap();
        }

        let route = storage
            .generate_delivery_route("admin", jiff::Timestamp::now(), |org| {
                format!("{org} depot")
            })
            .unwrap()
            .unwrap();
        assert_eq!(route.total_quantity(), 12);

        {
            let mut engine = Engine::new(&mut storage, &catalog, &config);
            engine.start_route("pavel", &route.label).unwrap();
            engine.confirm("pavel").unwrap();
        }
        // The route left the pool when pavel took it.
        assert!(storage.available_delivery_routes().unwrap().is_empty());

        let view = complete_point(&mut storage, &catalog, &config, "pavel", 12);
        assert_eq!(view.session.phase, SessionPhase::Finalizing);

        let mut engine = Engine::new(&mut storage, &catalog, &config);
        let err = engine.finish("pavel", None).unwrap_err();
        assert!(matches!(err, WorkflowError::FinalCommentRequired));

        engine.finish("pavel", Some("all delivered, gate code 4411")).unwrap();

        let route = storage.delivery_route(route.id).unwrap();
        assert_eq!(route.status, DeliveryStatus::Completed);
        assert_eq!(route.points[0].quantity_delivered, Some(12));
        assert!(route.completed_at.is_some());
    }

    #[test]
    fn delivery_quantity_capped_by_remaining() {
        let (mut storage, catalog, config) = setup();
        traverse_collection(&mut storage, &catalog, &config, "vera");
        {
            let mut engine = Engine::new(&mut storage, &catalog, &config);
            engine.lab_add_photo("vera", "Alpha", "handover").unwrap();
            engine.lab_mark_complete("vera", "Alpha").unwrap();
            engine.finish("vera", None).unwrap();
        }
        let route = storage
            .generate_delivery_route("admin", jiff::Timestamp::now(), |_| String::new())
            .unwrap()
            .unwrap();

        let mut engine = Engine::new(&mut storage, &catalog, &config);
        engine.start_route("pavel", &route.label).unwrap();
        engine.confirm("pavel").unwrap();

        let err = engine.submit_quantity("pavel", 15).unwrap_err();
        assert!(matches!(
            err,
            WorkflowError::Draft(DraftError::QuantityExceedsAvailable { max: 12 })
        ));
        engine.submit_quantity("pavel", 12).unwrap();
    }

    #[test]
    fn cancelled_delivery_returns_route_to_pool() {
        let (mut storage, catalog, config) = setup();
        traverse_collection(&mut storage, &catalog, &config, "vera");
        {
            let mut engine = Engine::new(&mut storage, &catalog, &config);
            engine.lab_add_photo("vera", "Alpha", "handover").unwrap();
            engine.lab_mark_complete("vera", "Alpha").unwrap();
            engine.finish("vera", None).unwrap();
        }
        let route = storage
            .generate_delivery_route("admin", jiff::Timestamp::now(), |_| String::new())
            .unwrap()
            .unwrap();

        let mut engine = Engine::new(&mut storage, &catalog, &config);
        engine.start_route("pavel", &route.label).unwrap();
        engine.cancel("pavel").unwrap();

        let route = storage.delivery_route(route.id).unwrap();
        assert_eq!(route.status, DeliveryStatus::Available);
        assert_eq!(route.courier, None);
    }
}
