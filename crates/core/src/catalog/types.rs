//! Types for the city and airport reference table.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// An origin airport the search can depart from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Airport {
    /// Short lowercase code (e.g. "vie"), also the sky code in booking links.
    pub code: String,
    /// Upstream entity id.
    pub entity_id: String,
    /// Display name, used as the origin tag on deals.
    pub name: String,
}

/// A known destination city.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CityInfo {
    pub name: String,
    /// Upstream destination entity id.
    pub entity_id: String,
    /// Short code used in booking links.
    pub sky_code: String,
    pub country: String,
    pub latitude: f64,
    pub longitude: f64,
}

/// On-disk layout of the reference table.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(super) struct CatalogFile {
    #[serde(default)]
    pub airports: Vec<Airport>,
    #[serde(default)]
    pub cities: Vec<CityInfo>,
}

/// Errors for catalog loading.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Failed to read catalog file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse catalog: {0}")]
    Parse(String),

    #[error("Duplicate catalog entry: {0}")]
    Duplicate(String),
}
