//! Search request files.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use flightscout_core::{CitySearchRequest, DiscoveryRequest};

/// A request file: `mode = "discovery"` or `mode = "cities"` plus the request fields.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum SearchRequest {
    Discovery(DiscoveryRequest),
    Cities(CitySearchRequest),
}

impl SearchRequest {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse search request")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read search request {:?}", path))?;
        Self::from_toml_str(&content).with_context(|| format!("Invalid request file {:?}", path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Weekday;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_parse_discovery_request() {
        let request = SearchRequest::from_toml_str(
            r#"
mode = "discovery"
range_start = "2026-03-20"
range_end = "2026-04-30"
weekday = "Fri"
duration_days = 2
airports = ["vie", "bts"]
excluded_countries = ["Österreich"]
"#,
        )
        .unwrap();

        match request {
            SearchRequest::Discovery(r) => {
                assert_eq!(r.plan.weekday, Weekday::Fri);
                assert_eq!(r.options.airports.len(), 2);
                assert_eq!(r.excluded_countries, vec!["Österreich"]);
            }
            other => panic!("expected discovery, got {:?}", other),
        }
    }

    #[test]
    fn test_load_city_request() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
mode = "cities"
range_start = "2026-05-01"
range_end = "2026-05-31"
weekday = "Sat"
duration_days = 1
cities = ["Rom", "Lissabon"]
max_price = 90.0
"#
        )
        .unwrap();

        match SearchRequest::load(file.path()).unwrap() {
            SearchRequest::Cities(r) => {
                assert_eq!(r.cities, vec!["Rom", "Lissabon"]);
                assert_eq!(r.options.max_price, Some(90.0));
            }
            other => panic!("expected cities, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_mode_rejected() {
        let err = SearchRequest::from_toml_str(
            r#"
mode = "everything"
range_start = "2026-05-01"
range_end = "2026-05-31"
weekday = "Sat"
duration_days = 1
"#,
        );
        assert!(err.is_err());
    }
}
