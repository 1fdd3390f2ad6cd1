//! CLI interface for Waybill.
//!
//! Non-interactive: arguments in, structured output out. Each invocation
//! opens storage, applies one workflow step, and exits — the courier's
//! place in the route survives between commands because everything lives
//! in the event log.
//!
//! Commands split into three groups:
//!
//! - `waybill route …` / `waybill point …` / `waybill lab …` — the
//!   courier workflow, operating on the caller's active session.
//! - `waybill warehouse …` — stock status and delivery dispatch.
//! - `waybill sessions|session|report` — monitoring, read-only.
//!
//! The caller's identity comes from `--as`, then `WAYBILL_IDENTITY`,
//! then the configured default.

mod format;

use clap::{Parser, Subcommand, ValueEnum};
use jiff::Timestamp;

use crate::catalog::Catalog;
use crate::config::Config;
use crate::model::{SessionId, SessionStatus};
use crate::storage::Storage;
use crate::workflow::Engine;
use crate::{identity, ledger, report};

use format::{format_route_line, format_session_detail, format_session_line, format_warehouse};

/// Waybill — route sessions and the warehouse ledger.
#[derive(Debug, Parser)]
#[command(name = "waybill", after_long_help = WORKFLOW_HELP)]
pub struct Cli {
    /// Act as this courier or admin identity.
    #[arg(long = "as", global = true)]
    identity: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

const WORKFLOW_HELP: &str = r#"Workflow: one collection run
  1. waybill --as vera route list
  2. waybill --as vera route start Yaroslavl
  3. waybill --as vera route confirm
  4. waybill --as vera point photo box.jpg
     waybill --as vera point quantity 5
     waybill --as vera point comment "picked up at reception"
     waybill --as vera point commit        (or: point skip)
  5. waybill --as vera lab photo KDL handover.jpg
     waybill --as vera lab done KDL
  6. waybill --as vera route finish

Dispatch and monitoring:
  waybill --as admin warehouse status
  waybill --as admin warehouse dispatch
  waybill sessions
  waybill report --since 2026-08-01T00:00:00Z"#;

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Manage the caller's route session.
    Route {
        #[command(subcommand)]
        command: RouteCommand,
    },

    /// Work the current point of the active session.
    Point {
        #[command(subcommand)]
        command: PointCommand,
    },

    /// Fill in lab summaries during finalization of a collection session.
    Lab {
        #[command(subcommand)]
        command: LabCommand,
    },

    /// Warehouse stock and delivery dispatch.
    Warehouse {
        #[command(subcommand)]
        command: WarehouseCommand,
    },

    /// List every session with its inferred status.
    Sessions {
        /// Only show sessions with this status.
        #[arg(long, value_enum)]
        status: Option<StatusArg>,
    },

    /// Show one session in detail.
    Session {
        /// Full session id, as printed by `sessions`.
        id: String,
    },

    /// Aggregate activity over a time window.
    Report {
        /// Window start (RFC 3339). Open when omitted.
        #[arg(long)]
        since: Option<String>,

        /// Window end (RFC 3339). Open when omitted.
        #[arg(long)]
        until: Option<String>,
    },
}

#[derive(Debug, Subcommand)]
pub enum RouteCommand {
    /// List routes available to start: catalog cities and delivery routes
    /// waiting for a courier.
    List,

    /// Start a session on a route. The point list is frozen here.
    Start {
        /// A catalog city, or a delivery route label like `depot-3`.
        label: String,
    },

    /// Confirm the pending session and begin traversal.
    Confirm,

    /// Show the active session: progress, current point, draft state.
    Status,

    /// Cancel the active session. Committed points stay in the log.
    Cancel,

    /// Finish the session once every point is visited.
    Finish {
        /// Final comment. Required for delivery sessions.
        #[arg(long)]
        comment: Option<String>,
    },
}

#[derive(Debug, Subcommand)]
pub enum PointCommand {
    /// Attach a photo to the current point.
    Photo {
        /// Photo reference (a filename or storage key).
        photo_ref: String,
    },

    /// Remove the most recently attached photo.
    Unphoto,

    /// Record the container quantity. Zero is a valid value.
    Quantity { quantity: u32 },

    /// Record the point comment.
    Comment { text: String },

    /// Commit the point as completed and advance.
    Commit,

    /// Skip the point and advance. No photo, quantity, or comment needed.
    Skip,
}

#[derive(Debug, Subcommand)]
pub enum LabCommand {
    /// Attach a photo to one organization's lab summary.
    Photo {
        organization: String,
        photo_ref: String,
    },

    /// Remove the most recently attached lab photo.
    Unphoto { organization: String },

    /// Set the summary's comment.
    Comment { organization: String, text: String },

    /// Mark the summary complete. Requires at least one photo.
    Done { organization: String },
}

/// CLI-facing session status, mapped to the domain `SessionStatus`.
#[derive(Debug, Clone, ValueEnum)]
pub enum StatusArg {
    /// An event within the active window.
    Active,
    /// Quiet for a while, or stale but nearly done.
    Paused,
    /// Stale with most of the route still ahead.
    Inactive,
    /// Finalized.
    Completed,
}

impl StatusArg {
    fn to_domain(&self) -> SessionStatus {
        match self {
            Self::Active => SessionStatus::Active,
            Self::Paused => SessionStatus::Paused,
            Self::Inactive => SessionStatus::Inactive,
            Self::Completed => SessionStatus::Completed,
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum WarehouseCommand {
    /// Per-organization stock, pending outbound, and last movement.
    Status,

    /// Generate a delivery route from everything in stock.
    Dispatch,
}

/// Run the CLI, returning an error message on failure.
pub fn run(config: &Config, catalog: &Catalog, storage: &mut Storage) -> Result<(), String> {
    let cli = Cli::parse();
    let identity = identity::resolve(cli.identity.as_deref(), config);

    match cli.command {
        Command::Route { command } => cmd_route(config, catalog, storage, identity?, command),
        Command::Point { command } => cmd_point(config, catalog, storage, identity?, command),
        Command::Lab { command } => cmd_lab(config, catalog, storage, identity?, command),
        Command::Warehouse { command } => {
            cmd_warehouse(catalog, storage, identity?, command)
        }
        Command::Sessions { status } => cmd_sessions(config, catalog, storage, status.as_ref()),
        Command::Session { id } => cmd_session(config, catalog, storage, &id),
        Command::Report { since, until } => cmd_report(storage, since.as_deref(), until.as_deref()),
    }
}

fn cmd_route(
    config: &Config,
    catalog: &Catalog,
    storage: &mut Storage,
    actor: String,
    command: RouteCommand,
) -> Result<(), String> {
    let mut engine = Engine::new(storage, catalog, config);
    match command {
        RouteCommand::List => {
            let cities = catalog.cities();
            if cities.is_empty() {
                println!("No collection routes in the catalog");
            } else {
                println!("Collection routes:");
                for city in cities {
                    println!("  {city}");
                }
            }

            let routes = engine_routes(&engine)?;
            if routes.is_empty() {
                println!("No delivery routes waiting");
            } else {
                println!("Delivery routes:");
                for route in &routes {
                    println!("  {}", format_route_line(route));
                }
            }
            Ok(())
        }
        RouteCommand::Start { label } => {
            let session = engine
                .start_route(&actor, &label)
                .map_err(|e| e.to_string())?;
            println!("{}", session.id);
            eprintln!(
                "Started {} ({} points). Confirm with: waybill route confirm",
                session.label,
                session.points.len()
            );
            Ok(())
        }
        RouteCommand::Confirm => {
            let session = engine.confirm(&actor).map_err(|e| e.to_string())?;
            eprintln!("Confirmed {} — traversal begins", session.label);
            Ok(())
        }
        RouteCommand::Status => {
            let view = engine.view_active(&actor).map_err(|e| e.to_string())?;
            let draft = match engine.current_draft(&actor) {
                Ok((_, draft)) => Some(draft),
                Err(_) => None,
            };
            print!("{}", format_session_detail(&view, draft.as_ref()));
            Ok(())
        }
        RouteCommand::Cancel => {
            let session = engine.cancel(&actor).map_err(|e| e.to_string())?;
            eprintln!("Cancelled {}", session.id);
            Ok(())
        }
        RouteCommand::Finish { comment } => {
            engine
                .finish(&actor, comment.as_deref())
                .map_err(|e| e.to_string())?;
            eprintln!("Session finished");
            Ok(())
        }
    }
}

fn cmd_point(
    config: &Config,
    catalog: &Catalog,
    storage: &mut Storage,
    actor: String,
    command: PointCommand,
) -> Result<(), String> {
    let mut engine = Engine::new(storage, catalog, config);
    match command {
        PointCommand::Photo { photo_ref } => {
            engine
                .submit_photo(&actor, &photo_ref)
                .map_err(|e| e.to_string())?;
            Ok(())
        }
        PointCommand::Unphoto => {
            match engine.undo_photo(&actor).map_err(|e| e.to_string())? {
                Some(removed) => eprintln!("Removed {removed}"),
                None => eprintln!("No photo to remove"),
            }
            Ok(())
        }
        PointCommand::Quantity { quantity } => {
            engine
                .submit_quantity(&actor, quantity)
                .map_err(|e| e.to_string())?;
            Ok(())
        }
        PointCommand::Comment { text } => {
            engine
                .submit_comment(&actor, &text)
                .map_err(|e| e.to_string())?;
            Ok(())
        }
        PointCommand::Commit => {
            let view = engine.commit_point(&actor).map_err(|e| e.to_string())?;
            eprintln!(
                "Point committed ({}/{} visited)",
                view.next_index,
                view.total_points()
            );
            Ok(())
        }
        PointCommand::Skip => {
            let view = engine.skip_point(&actor).map_err(|e| e.to_string())?;
            eprintln!(
                "Point skipped ({}/{} visited)",
                view.next_index,
                view.total_points()
            );
            Ok(())
        }
    }
}

fn cmd_lab(
    config: &Config,
    catalog: &Catalog,
    storage: &mut Storage,
    actor: String,
    command: LabCommand,
) -> Result<(), String> {
    let mut engine = Engine::new(storage, catalog, config);
    match command {
        LabCommand::Photo {
            organization,
            photo_ref,
        } => engine
            .lab_add_photo(&actor, &organization, &photo_ref)
            .map_err(|e| e.to_string()),
        LabCommand::Unphoto { organization } => {
            match engine
                .lab_undo_photo(&actor, &organization)
                .map_err(|e| e.to_string())?
            {
                Some(removed) => eprintln!("Removed {removed}"),
                None => eprintln!("No photo to remove"),
            }
            Ok(())
        }
        LabCommand::Comment { organization, text } => engine
            .lab_set_comment(&actor, &organization, &text)
            .map_err(|e| e.to_string()),
        LabCommand::Done { organization } => {
            engine
                .lab_mark_complete(&actor, &organization)
                .map_err(|e| e.to_string())?;
            eprintln!("{organization} summary complete");
            Ok(())
        }
    }
}

fn cmd_warehouse(
    catalog: &Catalog,
    storage: &mut Storage,
    actor: String,
    command: WarehouseCommand,
) -> Result<(), String> {
    match command {
        WarehouseCommand::Status => {
            let status = ledger::warehouse_status(storage).map_err(|e| e.to_string())?;
            print!("{}", format_warehouse(&status));
            Ok(())
        }
        WarehouseCommand::Dispatch => {
            let route = ledger::dispatch(storage, catalog, &actor).map_err(|e| e.to_string())?;
            println!("{}", route.label);
            eprintln!(
                "Dispatched {} containers across {} depot(s)",
                route.total_quantity(),
                route.points.len()
            );
            Ok(())
        }
    }
}

fn cmd_sessions(
    config: &Config,
    catalog: &Catalog,
    storage: &mut Storage,
    status: Option<&StatusArg>,
) -> Result<(), String> {
    let engine = Engine::new(storage, catalog, config);
    let filter = status.map(StatusArg::to_domain);
    let views: Vec<_> = engine
        .view_all()
        .map_err(|e| e.to_string())?
        .into_iter()
        .filter(|v| filter.is_none_or(|f| v.status == f))
        .collect();
    if views.is_empty() {
        println!("No sessions");
        return Ok(());
    }
    for view in &views {
        println!("{}", format_session_line(view));
    }
    Ok(())
}

fn cmd_session(
    config: &Config,
    catalog: &Catalog,
    storage: &mut Storage,
    id: &str,
) -> Result<(), String> {
    let engine = Engine::new(storage, catalog, config);
    let view = engine
        .view_session(&SessionId::from(id.to_string()))
        .map_err(|e| e.to_string())?;
    print!("{}", format_session_detail(&view, None));
    Ok(())
}

fn cmd_report(
    storage: &Storage,
    since: Option<&str>,
    until: Option<&str>,
) -> Result<(), String> {
    let since = parse_bound(since, "--since")?;
    let until = parse_bound(until, "--until")?;
    let report = report::aggregate(storage, since, until).map_err(|e| e.to_string())?;

    println!("Sessions started:   {}", report.sessions_started);
    println!("Sessions completed: {}", report.sessions_completed);
    println!("Points completed:   {}", report.points_completed);
    println!("Points skipped:     {}", report.points_skipped);
    if !report.collected_by_org.is_empty() {
        println!("Collected:");
        for (org, quantity) in &report.collected_by_org {
            println!("  {org}: {quantity}");
        }
        println!("  total: {}", report.total_collected());
    }
    if !report.couriers.is_empty() {
        println!("Couriers: {}", report.couriers.join(", "));
    }
    Ok(())
}

fn parse_bound(value: Option<&str>, flag: &str) -> Result<Option<Timestamp>, String> {
    value
        .map(|v| {
            v.parse::<Timestamp>()
                .map_err(|e| format!("invalid {flag} timestamp '{v}': {e}"))
        })
        .transpose()
}

fn engine_routes(engine: &Engine<'_>) -> Result<Vec<crate::model::DeliveryRoute>, String> {
    engine.available_routes().map_err(|e| e.to_string())
}
