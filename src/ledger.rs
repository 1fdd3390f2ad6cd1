//! The warehouse ledger: derived stock and delivery dispatch.
//!
//! A thin domain layer over the storage aggregates. There is no stock
//! table to get out of sync — stock is what the event log says came in
//! minus what generated delivery routes say went out. Dispatch is the
//! only operation that consumes stock, and it does so atomically at
//! generation time.

use jiff::Timestamp;
use thiserror::Error;

use crate::catalog::Catalog;
use crate::model::DeliveryRoute;
use crate::storage::{OrgFlow, Storage, StorageError};

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("the warehouse is empty; nothing to dispatch")]
    EmptyWarehouse,

    #[error(transparent)]
    Storage(#[from] StorageError),
}

pub type Result<T> = core::result::Result<T, LedgerError>;

/// Point-in-time warehouse picture for the status view.
#[derive(Debug)]
pub struct WarehouseStatus {
    /// Per-organization flows, ordered by organization name.
    pub flows: Vec<OrgFlow>,
}

impl WarehouseStatus {
    /// Total containers currently on hand across all organizations.
    pub fn total_stock(&self) -> i64 {
        self.flows.iter().map(OrgFlow::stock).sum()
    }

    /// Total containers on delivery routes still underway.
    pub fn total_pending(&self) -> u32 {
        self.flows.iter().map(|f| f.pending).sum()
    }
}

/// The current warehouse picture.
pub fn warehouse_status(storage: &Storage) -> Result<WarehouseStatus> {
    Ok(WarehouseStatus {
        flows: storage.org_flows()?,
    })
}

/// Generates a delivery route from everything currently in stock.
///
/// One point per organization with positive stock, for its full stock,
/// addressed from the depot catalog. Consumption happens inside the
/// generation transaction: the moment this returns, stock reads zero for
/// every included organization, whether or not a courier ever takes the
/// route.
pub fn dispatch(storage: &mut Storage, catalog: &Catalog, created_by: &str) -> Result<DeliveryRoute> {
    storage
        .generate_delivery_route(created_by, Timestamp::now(), |org| {
            catalog
                .depot_address(org)
                .map_or_else(|| "address not on file".to_string(), |d| d.address.clone())
        })?
        .ok_or(LedgerError::EmptyWarehouse)
}
