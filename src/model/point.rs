//! Point types: the stops a courier visits within a route.

use serde::{Deserialize, Serialize};

/// One stop within a route.
///
/// Collection and delivery points carry different required fields, so they
/// are distinct variants rather than one loosely-shaped struct. The
/// completeness tracker and workflow dispatch on the variant explicitly.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Point {
    /// A pickup stop from the static catalog.
    Collection {
        organization: String,
        name: String,
        address: String,
        coordinates: Option<(f64, f64)>,
    },

    /// A drop-off stop generated from a warehouse ledger snapshot.
    Delivery {
        organization: String,
        name: String,
        address: String,

        /// Stock consumed from the ledger for this organization.
        /// Also the upper bound on the quantity a courier may record here.
        quantity_to_deliver: u32,

        /// The delivery route this point was generated into.
        delivery_route_id: i64,
    },
}

impl Point {
    pub fn organization(&self) -> &str {
        match self {
            Self::Collection { organization, .. } | Self::Delivery { organization, .. } => {
                organization
            }
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Collection { name, .. } | Self::Delivery { name, .. } => name,
        }
    }

    pub fn address(&self) -> &str {
        match self {
            Self::Collection { address, .. } | Self::Delivery { address, .. } => address,
        }
    }

    /// The remaining quantity a delivery point can still accept.
    /// `None` for collection points, which are bounded by config instead.
    pub fn quantity_to_deliver(&self) -> Option<u32> {
        match self {
            Self::Collection { .. } => None,
            Self::Delivery {
                quantity_to_deliver,
                ..
            } => Some(*quantity_to_deliver),
        }
    }
}
