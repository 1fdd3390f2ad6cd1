//! Static route catalog: city → ordered collection points, plus the
//! per-organization depot address table used when generating delivery
//! routes.
//!
//! Loaded from `~/.waybill/catalog.toml`, read-only and versionless. An
//! in-flight session never sees catalog edits — its point list is frozen
//! at session start.
//!
//! ```text
//! [[city]]
//! name = "Yaroslavl"
//!
//! [[city.point]]
//! name = "KDL Center"
//! organization = "KDL"
//! address = "12 Lenina St"
//! coordinates = [57.62, 39.87]
//!
//! [depot.KDL]
//! address = "8 Volokolamskoe Hwy, Moscow"
//! contact = "reception, 9:00-18:00"
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::model::Point;

/// Errors that can occur loading the catalog.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("invalid catalog: {0}")]
    Parse(#[from] toml::de::Error),
}

#[derive(Debug, Clone, Deserialize)]
struct CityEntry {
    name: String,
    #[serde(default)]
    point: Vec<PointEntry>,
}

#[derive(Debug, Clone, Deserialize)]
struct PointEntry {
    name: String,
    organization: String,
    address: String,
    #[serde(default)]
    coordinates: Option<(f64, f64)>,
}

/// Depot-side address for one organization.
#[derive(Debug, Clone, Deserialize)]
pub struct DepotAddress {
    pub address: String,
    #[serde(default)]
    pub contact: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    city: Vec<CityEntry>,
    #[serde(default)]
    depot: BTreeMap<String, DepotAddress>,
}

/// The read-only route catalog.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    cities: Vec<CityEntry>,
    depots: BTreeMap<String, DepotAddress>,
}

impl Catalog {
    /// Loads the catalog from a TOML file.
    ///
    /// A missing file is a valid empty catalog — delivery routes can still
    /// be selected without one.
    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parses catalog TOML.
    pub fn parse(contents: &str) -> Result<Self, CatalogError> {
        let file: CatalogFile = toml::from_str(contents)?;
        Ok(Self {
            cities: file.city,
            depots: file.depot,
        })
    }

    /// The catalog file path: `~/.waybill/catalog.toml`.
    pub fn path() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(".waybill").join("catalog.toml"))
    }

    /// City names, in file order.
    pub fn cities(&self) -> Vec<&str> {
        self.cities.iter().map(|c| c.name.as_str()).collect()
    }

    /// The ordered point list for a city, or `None` for an unknown city.
    pub fn points(&self, city: &str) -> Option<Vec<Point>> {
        let entry = self.cities.iter().find(|c| c.name == city)?;
        Some(
            entry
                .point
                .iter()
                .map(|p| Point::Collection {
                    organization: p.organization.clone(),
                    name: p.name.clone(),
                    address: p.address.clone(),
                    coordinates: p.coordinates,
                })
                .collect(),
        )
    }

    /// The depot address for an organization, if configured.
    pub fn depot_address(&self, organization: &str) -> Option<&DepotAddress> {
        self.depots.get(organization)
    }
}
