//! Ledger storage: stock aggregation and atomic delivery-route generation.
//!
//! Stock is never stored — it is always derived: completed collection
//! quantities in, quantities consumed by generated delivery routes out.
//! Consumption happens at generation time, inside the same transaction
//! that reads the stock, so two dispatches can never allocate the same
//! containers.

use std::collections::BTreeMap;

use jiff::Timestamp;
use rusqlite::{TransactionBehavior, params};

use crate::model::DeliveryRoute;

use super::{Result, Storage, parse_timestamp};

/// Per-organization warehouse flow, for status views.
#[derive(Debug, Clone)]
pub struct OrgFlow {
    pub organization: String,

    /// Total quantity brought in by completed collection points.
    pub incoming: u32,

    /// Total quantity consumed by every delivery route ever generated,
    /// regardless of that route's own status.
    pub outgoing: u32,

    /// Quantity consumed by delivery routes not yet completed.
    pub pending: u32,

    pub last_incoming: Option<Timestamp>,
    pub last_outgoing: Option<Timestamp>,
}

impl OrgFlow {
    /// Current warehouse stock. Non-negative by construction: consumption
    /// only ever snapshots existing stock.
    pub fn stock(&self) -> i64 {
        i64::from(self.incoming) - i64::from(self.outgoing)
    }
}

impl Storage {
    /// Current stock for one organization.
    pub fn current_stock(&self, organization: &str) -> Result<i64> {
        let flows = self.org_flows()?;
        Ok(flows
            .iter()
            .find(|f| f.organization == organization)
            .map_or(0, OrgFlow::stock))
    }

    /// Quantity consumed by delivery routes still underway for one
    /// organization. Monitoring only — never part of the stock formula.
    pub fn pending_outbound(&self, organization: &str) -> Result<u32> {
        let flows = self.org_flows()?;
        Ok(flows
            .iter()
            .find(|f| f.organization == organization)
            .map_or(0, |f| f.pending))
    }

    /// Warehouse flows for every organization that ever appeared in the
    /// log, ordered by organization name.
    pub fn org_flows(&self) -> Result<Vec<OrgFlow>> {
        let mut orgs: BTreeMap<String, OrgFlow> = BTreeMap::new();

        let mut stmt = self.conn.prepare(
            "SELECT pe.organization, SUM(pe.quantity), MAX(pe.recorded_at)
             FROM point_events pe
             JOIN sessions s ON s.id = pe.session_id
             WHERE pe.outcome = 'completed' AND s.kind = 'collection'
             GROUP BY pe.organization",
        )?;
        let incoming = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, u32>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?;
        for row in incoming {
            let (org, total, last) = row?;
            let flow = orgs.entry(org.clone()).or_insert_with(|| empty_flow(&org));
            flow.incoming = total;
            flow.last_incoming = Some(parse_timestamp(&last, "recorded_at")?);
        }

        let mut stmt = self.conn.prepare(
            "SELECT dp.organization, SUM(dp.quantity_to_deliver), MAX(dr.created_at),
                    SUM(CASE WHEN dr.status != 'completed' THEN dp.quantity_to_deliver ELSE 0 END)
             FROM delivery_points dp
             JOIN delivery_routes dr ON dr.id = dp.delivery_route_id
             GROUP BY dp.organization",
        )?;
        let outgoing = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, u32>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, u32>(3)?,
            ))
        })?;
        for row in outgoing {
            let (org, total, last, pending) = row?;
            let flow = orgs.entry(org.clone()).or_insert_with(|| empty_flow(&org));
            flow.outgoing = total;
            flow.pending = pending;
            flow.last_outgoing = Some(parse_timestamp(&last, "created_at")?);
        }

        Ok(orgs.into_values().collect())
    }

    /// Generates a delivery route from the current stock snapshot, inside
    /// one IMMEDIATE transaction.
    ///
    /// Returns `Ok(None)` when no organization has positive stock. On
    /// success the inserted points are the consumption record — stock
    /// reads zero for every included organization the moment this
    /// commits. A crash before commit leaves stock untouched.
    pub fn generate_delivery_route(
        &mut self,
        created_by: &str,
        now: Timestamp,
        depot_address: impl Fn(&str) -> String,
    ) -> Result<Option<DeliveryRoute>> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        // Snapshot stock per organization within the transaction.
        let mut stock: BTreeMap<String, i64> = BTreeMap::new();
        {
            let mut stmt = tx.prepare(
                "SELECT pe.organization, SUM(pe.quantity)
                 FROM point_events pe
                 JOIN sessions s ON s.id = pe.session_id
                 WHERE pe.outcome = 'completed' AND s.kind = 'collection'
                 GROUP BY pe.organization",
            )?;
            let rows = stmt.query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
            })?;
            for row in rows {
                let (org, total) = row?;
                *stock.entry(org).or_insert(0) += total;
            }

            let mut stmt = tx.prepare(
                "SELECT organization, SUM(quantity_to_deliver)
                 FROM delivery_points GROUP BY organization",
            )?;
            let rows = stmt.query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
            })?;
            for row in rows {
                let (org, total) = row?;
                *stock.entry(org).or_insert(0) -= total;
            }
        }
        stock.retain(|_, s| *s > 0);

        if stock.is_empty() {
            return Ok(None);
        }

        tx.execute(
            "INSERT INTO delivery_routes (status, created_by, created_at)
             VALUES ('available', ?1, ?2)",
            params![created_by, now.to_string()],
        )?;
        let route_id = tx.last_insert_rowid();

        for (index, (org, quantity)) in stock.iter().enumerate() {
            tx.execute(
                "INSERT INTO delivery_points
                     (delivery_route_id, point_index, organization, address, quantity_to_deliver)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    route_id,
                    index as u32,
                    org,
                    depot_address(org),
                    *quantity as u32,
                ],
            )?;
        }

        tx.commit()?;
        self.delivery_route(route_id).map(Some)
    }
}

fn empty_flow(org: &str) -> OrgFlow {
    OrgFlow {
        organization: org.to_string(),
        incoming: 0,
        outgoing: 0,
        pending: 0,
        last_incoming: None,
        last_outgoing: None,
    }
}
