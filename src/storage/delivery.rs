//! Delivery route storage: load, list, and advance outbound routes.
//!
//! Route *generation* lives in the ledger module — it must read stock and
//! write the route in one transaction.

use jiff::Timestamp;
use rusqlite::{OptionalExtension, params};

use crate::model::{DeliveryPoint, DeliveryRoute, DeliveryStatus};

use super::{Result, Storage, StorageError, parse_timestamp};

impl Storage {
    /// Loads a delivery route with its points.
    pub fn delivery_route(&self, id: i64) -> Result<DeliveryRoute> {
        let row = self
            .conn
            .query_row(
                "SELECT status, created_by, created_at, courier, completed_at
                 FROM delivery_routes WHERE id = ?1",
                params![id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, Option<String>>(3)?,
                        row.get::<_, Option<String>>(4)?,
                    ))
                },
            )
            .optional()?;

        let Some((status, created_by, created_at, courier, completed_at)) = row else {
            return Err(StorageError::DeliveryRouteNotFound(id));
        };

        Ok(DeliveryRoute {
            id,
            label: DeliveryRoute::label_for(id),
            status: status_from_str(&status)?,
            created_by,
            created_at: parse_timestamp(&created_at, "created_at")?,
            courier,
            completed_at: completed_at
                .map(|t| parse_timestamp(&t, "completed_at"))
                .transpose()?,
            points: self.delivery_points(id)?,
        })
    }

    /// Routes currently waiting for a courier, newest first.
    pub fn available_delivery_routes(&self) -> Result<Vec<DeliveryRoute>> {
        self.delivery_routes_where("status = 'available'")
    }

    /// All delivery routes, newest first.
    pub fn list_delivery_routes(&self) -> Result<Vec<DeliveryRoute>> {
        self.delivery_routes_where("1 = 1")
    }

    /// Marks a route taken by a courier.
    pub fn set_delivery_route_in_progress(&self, id: i64, courier: &str) -> Result<()> {
        self.update_route(
            id,
            "UPDATE delivery_routes SET status = 'in_progress', courier = ?2 WHERE id = ?1",
            params![id, courier],
        )
    }

    /// Returns a route to the pool, dropping its courier.
    pub fn set_delivery_route_available(&self, id: i64) -> Result<()> {
        self.update_route(
            id,
            "UPDATE delivery_routes SET status = 'available', courier = NULL WHERE id = ?1",
            params![id],
        )
    }

    /// Marks a route completed.
    pub fn set_delivery_route_completed(&self, id: i64, at: Timestamp) -> Result<()> {
        self.update_route(
            id,
            "UPDATE delivery_routes SET status = 'completed', completed_at = ?2 WHERE id = ?1",
            params![id, at.to_string()],
        )
    }

    /// Records the quantity actually delivered to one organization.
    pub fn set_quantity_delivered(&self, id: i64, organization: &str, quantity: u32) -> Result<()> {
        self.conn.execute(
            "UPDATE delivery_points SET quantity_delivered = ?3
             WHERE delivery_route_id = ?1 AND organization = ?2",
            params![id, organization, quantity],
        )?;
        Ok(())
    }

    fn update_route(
        &self,
        id: i64,
        sql: &str,
        params: impl rusqlite::Params,
    ) -> Result<()> {
        let rows = self.conn.execute(sql, params)?;
        if rows == 0 {
            return Err(StorageError::DeliveryRouteNotFound(id));
        }
        Ok(())
    }

    fn delivery_routes_where(&self, filter: &str) -> Result<Vec<DeliveryRoute>> {
        let sql =
            format!("SELECT id FROM delivery_routes WHERE {filter} ORDER BY created_at DESC, id DESC");
        let ids: Vec<i64> = self
            .conn
            .prepare(&sql)?
            .query_map([], |row| row.get::<_, i64>(0))?
            .collect::<core::result::Result<Vec<_>, _>>()?;

        let mut routes = Vec::with_capacity(ids.len());
        for id in ids {
            routes.push(self.delivery_route(id)?);
        }
        Ok(routes)
    }

    fn delivery_points(&self, id: i64) -> Result<Vec<DeliveryPoint>> {
        let mut stmt = self.conn.prepare(
            "SELECT organization, address, quantity_to_deliver, quantity_delivered
             FROM delivery_points WHERE delivery_route_id = ?1 ORDER BY point_index",
        )?;
        let rows = stmt.query_map(params![id], |row| {
            Ok(DeliveryPoint {
                organization: row.get(0)?,
                address: row.get(1)?,
                quantity_to_deliver: row.get(2)?,
                quantity_delivered: row.get(3)?,
            })
        })?;
        rows.collect::<core::result::Result<Vec<_>, _>>()
            .map_err(Into::into)
    }
}

fn status_from_str(s: &str) -> Result<DeliveryStatus> {
    match s {
        "available" => Ok(DeliveryStatus::Available),
        "in_progress" => Ok(DeliveryStatus::InProgress),
        "completed" => Ok(DeliveryStatus::Completed),
        other => Err(StorageError::Corrupt(format!(
            "unknown delivery route status: {other}"
        ))),
    }
}
