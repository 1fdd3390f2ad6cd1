//! Operational reporting: aggregates over the event log.
//!
//! Everything here is a read-only fold over sessions and their events,
//! windowed by timestamp. Nothing is precomputed or cached; the log is
//! small enough that recounting on demand beats keeping counters honest.

use jiff::Timestamp;

use crate::model::{PointOutcome, RouteKind};
use crate::storage::{Result, Storage};

/// Aggregate activity over a time window.
#[derive(Debug, Default)]
pub struct Report {
    /// Sessions created inside the window.
    pub sessions_started: u32,

    /// Sessions whose finalization event falls inside the window.
    pub sessions_completed: u32,

    /// Points committed as completed inside the window.
    pub points_completed: u32,

    /// Points skipped inside the window.
    pub points_skipped: u32,

    /// Containers collected per organization, ordered by organization,
    /// from completed collection points inside the window.
    pub collected_by_org: Vec<(String, u32)>,

    /// Every courier with at least one event inside the window, sorted.
    pub couriers: Vec<String>,
}

impl Report {
    pub fn total_collected(&self) -> u32 {
        self.collected_by_org.iter().map(|(_, q)| q).sum()
    }
}

fn in_window(at: Timestamp, since: Option<Timestamp>, until: Option<Timestamp>) -> bool {
    since.is_none_or(|s| at >= s) && until.is_none_or(|u| at <= u)
}

/// Folds the whole log into a report. `None` bounds are open.
pub fn aggregate(
    storage: &Storage,
    since: Option<Timestamp>,
    until: Option<Timestamp>,
) -> Result<Report> {
    let mut report = Report::default();

    for session in storage.list_sessions()? {
        if in_window(session.created_at, since, until) {
            report.sessions_started += 1;
        }
        if let Some((_, at)) = storage.finalization(&session.id)?
            && in_window(at, since, until)
        {
            report.sessions_completed += 1;
        }

        let mut courier_active = false;
        for event in storage.point_events(&session.id)? {
            if !in_window(event.recorded_at, since, until) {
                continue;
            }
            courier_active = true;
            match &event.outcome {
                PointOutcome::Completed { quantity, .. } => {
                    report.points_completed += 1;
                    if session.kind == RouteKind::Collection {
                        add_to_org(&mut report.collected_by_org, &event.organization, *quantity);
                    }
                }
                PointOutcome::Skipped => report.points_skipped += 1,
            }
        }
        if courier_active && !report.couriers.contains(&session.actor) {
            report.couriers.push(session.actor.clone());
        }
    }

    report.collected_by_org.sort();
    report.couriers.sort();
    Ok(report)
}

fn add_to_org(totals: &mut Vec<(String, u32)>, organization: &str, quantity: u32) {
    match totals.iter_mut().find(|(org, _)| org == organization) {
        Some((_, total)) => *total += quantity,
        None => totals.push((organization.to_string(), quantity)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use jiff::ToSpan;

    use crate::catalog::Catalog;
    use crate::config::Config;
    use crate::workflow::Engine;

    const CATALOG: &str = r#"
[[city]]
name = "Yaroslavl"

[[city.point]]
name = "Alpha One"
organization = "Alpha"
address = "1 First St"

[[city.point]]
name = "Beta One"
organization = "Beta"
address = "2 Second St"
"#;

    fn run_session(storage: &mut Storage, catalog: &Catalog, config: &Config, actor: &str) {
        let mut engine = Engine::new(storage, catalog, config);
        engine.start_route(actor, "Yaroslavl").unwrap();
        engine.confirm(actor).unwrap();
        engine.submit_photo(actor, "photo").unwrap();
        engine.submit_quantity(actor, 6).unwrap();
        engine.submit_comment(actor, "ok").unwrap();
        engine.commit_point(actor).unwrap();
        engine.skip_point(actor).unwrap();
        engine.lab_add_photo(actor, "Alpha", "handover").unwrap();
        engine.lab_mark_complete(actor, "Alpha").unwrap();
        engine.finish(actor, None).unwrap();
    }

    #[test]
    fn open_window_counts_everything() {
        let mut storage = Storage::open_in_memory().unwrap();
        let catalog = Catalog::parse(CATALOG).unwrap();
        let config = Config::default();
        run_session(&mut storage, &catalog, &config, "vera");
        run_session(&mut storage, &catalog, &config, "pavel");

        let report = aggregate(&storage, None, None).unwrap();
        assert_eq!(report.sessions_started, 2);
        assert_eq!(report.sessions_completed, 2);
        assert_eq!(report.points_completed, 2);
        assert_eq!(report.points_skipped, 2);
        assert_eq!(report.collected_by_org, vec![("Alpha".to_string(), 12)]);
        assert_eq!(report.couriers, vec!["pavel", "vera"]);
        assert_eq!(report.total_collected(), 12);
    }

    #[test]
    fn window_excludes_activity_outside_it() {
        let mut storage = Storage::open_in_memory().unwrap();
        let catalog = Catalog::parse(CATALOG).unwrap();
        let config = Config::default();
        run_session(&mut storage, &catalog, &config, "vera");

        // A window that ended before any of this happened.
        let long_ago = Timestamp::now() - 48.hours();
        let report = aggregate(&storage, None, Some(long_ago)).unwrap();
        assert_eq!(report.sessions_started, 0);
        assert_eq!(report.sessions_completed, 0);
        assert!(report.collected_by_org.is_empty());
        assert!(report.couriers.is_empty());

        // A window around now sees it all.
        let report = aggregate(&storage, Some(long_ago), None).unwrap();
        assert_eq!(report.sessions_started, 1);
        assert_eq!(report.total_collected(), 6);
    }
}
