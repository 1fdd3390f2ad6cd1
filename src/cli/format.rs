//! Human-readable rendering for CLI output.

use std::fmt::Write as _;

use jiff::Timestamp;

use crate::ledger::WarehouseStatus;
use crate::model::{DeliveryRoute, Finalization, PointOutcome, SessionPhase};
use crate::tracker::PointDraft;
use crate::workflow::SessionView;

/// One cell per point: `#` visited, `.` ahead.
pub fn progress_bar(visited: u32, total: u32) -> String {
    let mut bar = String::with_capacity(total as usize + 2);
    bar.push('[');
    for i in 0..total {
        bar.push(if i < visited { '#' } else { '.' });
    }
    bar.push(']');
    bar
}

pub fn format_route_line(route: &DeliveryRoute) -> String {
    format!(
        "{}  [{}] {} containers, {} depot(s), created {} by {}",
        route.label,
        route.status.as_str(),
        route.total_quantity(),
        route.points.len(),
        fmt_time(route.created_at),
        route.created_by,
    )
}

pub fn format_session_line(view: &SessionView) -> String {
    format!(
        "{}  [{}] [{}] {} {} {}/{}",
        view.session.id,
        view.status.as_str(),
        view.session.actor,
        view.session.label,
        progress_bar(view.next_index, view.total_points()),
        view.next_index,
        view.total_points(),
    )
}

pub fn format_session_detail(view: &SessionView, draft: Option<&PointDraft>) -> String {
    let mut out = String::new();
    let session = &view.session;

    let _ = writeln!(out, "Session:  {}", session.id);
    let _ = writeln!(out, "Courier:  {}", session.actor);
    let _ = writeln!(out, "Route:    {}", session.label);
    let _ = writeln!(
        out,
        "Phase:    {} ({})",
        phase_str(session.phase),
        view.status.as_str()
    );
    let _ = writeln!(
        out,
        "Progress: {} {}/{}",
        progress_bar(view.next_index, view.total_points()),
        view.next_index,
        view.total_points(),
    );

    for event in &view.events {
        let point = session.points.get(event.point_index as usize);
        let name = point.map_or("?", |p| p.name());
        match &event.outcome {
            PointOutcome::Completed { quantity, .. } => {
                let _ = writeln!(
                    out,
                    "  {} {name} ({}): {quantity} containers",
                    fmt_time(event.recorded_at),
                    event.organization
                );
            }
            PointOutcome::Skipped => {
                let _ = writeln!(
                    out,
                    "  {} {name} ({}): skipped",
                    fmt_time(event.recorded_at),
                    event.organization
                );
            }
        }
    }

    if let Some(point) = session.points.get(view.next_index as usize)
        && session.phase == SessionPhase::Traversal
    {
        let _ = writeln!(
            out,
            "Current:  {} ({}) at {}",
            point.name(),
            point.organization(),
            point.address()
        );
        if let Some(draft) = draft {
            let _ = writeln!(
                out,
                "Draft:    {} photo(s), quantity {}, comment {}",
                draft.photos.len(),
                draft
                    .quantity
                    .map_or_else(|| "unset".to_string(), |q| q.to_string()),
                if draft.comment.is_some() { "set" } else { "unset" },
            );
        }
    }

    if !view.collected.is_empty() {
        let _ = writeln!(out, "Collected:");
        for (org, quantity) in &view.collected {
            let _ = writeln!(out, "  {org}: {quantity}");
        }
        let _ = writeln!(out, "  total: {}", view.total_quantity());
    }

    if let Some(finalization) = &view.finalization {
        let closed = match finalization {
            Finalization::LabsComplete => "all lab summaries complete".to_string(),
            Finalization::NothingCollected => "nothing collected".to_string(),
            Finalization::FinalComment { text } => format!("\"{text}\""),
        };
        let _ = writeln!(out, "Closed:   {closed}");
    }

    if !view.labs.is_empty() {
        let _ = writeln!(out, "Lab summaries:");
        for lab in &view.labs {
            let _ = writeln!(
                out,
                "  {} [{}] {} photo(s){}",
                lab.organization,
                if lab.complete { "done" } else { "open" },
                lab.photos.len(),
                lab.comment
                    .as_deref()
                    .map_or_else(String::new, |c| format!(": {c}")),
            );
        }
    }

    out
}

pub fn format_warehouse(status: &WarehouseStatus) -> String {
    let mut out = String::new();
    if status.flows.is_empty() {
        let _ = writeln!(out, "Warehouse is empty; no movements recorded");
        return out;
    }

    for flow in &status.flows {
        let _ = writeln!(
            out,
            "{}: {} in stock ({} in / {} out, {} pending delivery)",
            flow.organization,
            flow.stock(),
            flow.incoming,
            flow.outgoing,
            flow.pending,
        );
        if let Some(at) = flow.last_incoming {
            let _ = writeln!(out, "  last collected:  {}", fmt_time(at));
        }
        if let Some(at) = flow.last_outgoing {
            let _ = writeln!(out, "  last dispatched: {}", fmt_time(at));
        }
    }
    let _ = writeln!(
        out,
        "Total: {} in stock, {} pending delivery",
        status.total_stock(),
        status.total_pending()
    );
    out
}

fn phase_str(phase: SessionPhase) -> &'static str {
    match phase {
        SessionPhase::Confirming => "awaiting confirmation",
        SessionPhase::Traversal => "traversing",
        SessionPhase::Finalizing => "finalizing",
        SessionPhase::Finalized => "finalized",
        SessionPhase::Cancelled => "cancelled",
    }
}

fn fmt_time(at: Timestamp) -> String {
    at.strftime("%Y-%m-%d %H:%M").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bar_marks_visited_points() {
        assert_eq!(progress_bar(0, 4), "[....]");
        assert_eq!(progress_bar(2, 4), "[##..]");
        assert_eq!(progress_bar(4, 4), "[####]");
        assert_eq!(progress_bar(0, 0), "[]");
    }
}
