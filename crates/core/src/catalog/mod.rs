//! City and airport reference table.
//!
//! The table is configuration data: an embedded TOML document by default,
//! optionally replaced by a file. It backs the coordinate fallback for funnel
//! results and is the lookup catalog for targeted city searches.

mod types;

pub use types::*;

use std::collections::HashMap;
use std::path::Path;

use types::CatalogFile;

const EMBEDDED_CATALOG: &str = include_str!("../../data/catalog.toml");

/// Immutable, case-insensitive lookup over airports and cities.
#[derive(Debug, Clone)]
pub struct CityCatalog {
    airports: Vec<Airport>,
    cities: Vec<CityInfo>,
    airport_index: HashMap<String, usize>,
    city_index: HashMap<String, usize>,
}

impl CityCatalog {
    /// The table shipped with the crate.
    pub fn embedded() -> Result<Self, CatalogError> {
        Self::from_toml_str(EMBEDDED_CATALOG)
    }

    /// Load a replacement table from a TOML file.
    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Embedded table unless `path` is given.
    pub fn load_or_embedded(path: Option<&Path>) -> Result<Self, CatalogError> {
        match path {
            Some(p) => Self::load(p),
            None => Self::embedded(),
        }
    }

    pub fn from_toml_str(content: &str) -> Result<Self, CatalogError> {
        let file: CatalogFile =
            toml::from_str(content).map_err(|e| CatalogError::Parse(e.to_string()))?;
        Self::from_parts(file.airports, file.cities)
    }

    pub fn from_parts(airports: Vec<Airport>, cities: Vec<CityInfo>) -> Result<Self, CatalogError> {
        let mut airport_index = HashMap::new();
        for (i, airport) in airports.iter().enumerate() {
            if airport_index.insert(normalize(&airport.code), i).is_some() {
                return Err(CatalogError::Duplicate(format!("airport {}", airport.code)));
            }
        }

        let mut city_index = HashMap::new();
        for (i, city) in cities.iter().enumerate() {
            if city_index.insert(normalize(&city.name), i).is_some() {
                return Err(CatalogError::Duplicate(format!("city {}", city.name)));
            }
        }

        Ok(Self {
            airports,
            cities,
            airport_index,
            city_index,
        })
    }

    pub fn airport(&self, code: &str) -> Option<&Airport> {
        self.airport_index
            .get(&normalize(code))
            .map(|&i| &self.airports[i])
    }

    pub fn city(&self, name: &str) -> Option<&CityInfo> {
        self.city_index.get(&normalize(name)).map(|&i| &self.cities[i])
    }

    /// Coordinates for a city name, if the table knows it.
    pub fn coordinates(&self, name: &str) -> Option<(f64, f64)> {
        self.city(name).map(|c| (c.latitude, c.longitude))
    }

    pub fn airports(&self) -> &[Airport] {
        &self.airports
    }

    pub fn cities(&self) -> &[CityInfo] {
        &self.cities
    }
}

fn normalize(key: &str) -> String {
    key.trim().to_lowercase()
}
