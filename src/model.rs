//! Core data model for Waybill.
//!
//! These types represent the conceptual architecture:
//! points, route sessions, visit events, lab summaries, and delivery routes.

mod delivery;
mod event;
mod lab;
mod point;
mod session;

pub use delivery::{DeliveryPoint, DeliveryRoute, DeliveryStatus};
pub use event::{Finalization, PointOutcome, PointVisitEvent};
pub use lab::LabSummary;
pub use point::Point;
pub use session::{RouteKind, RouteSession, SessionId, SessionPhase, SessionStatus};
