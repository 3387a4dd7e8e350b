//! Testing utilities and mock implementations.
//!
//! This module provides a scripted upstream and a recording observer so the
//! engine can be driven end to end without network access.
//!
//! # Example
//!
//! ```rust,ignore
//! use flightscout_core::testing::{fixtures, MockTransport, RecordingObserver};
//!
//! let transport = MockTransport::new();
//! transport
//!     .set_everywhere(fixtures::everywhere_response(&[("Italien", "29475437", 60.0)]))
//!     .await;
//! let scout = fixtures::scout(&transport);
//! let observer = Arc::new(RecordingObserver::new());
//! let deals = scout.run(&request, &CancellationToken::new(), observer.clone()).await?;
//! ```

mod mock_transport;
mod recording_observer;

pub use mock_transport::{MockTransport, RecordedRequest};
pub use recording_observer::RecordingObserver;

/// Test fixtures and helper functions.
pub mod fixtures {
    use std::sync::Arc;

    use chrono::{Duration, NaiveDate, NaiveTime};
    use serde_json::{json, Value};

    use super::MockTransport;
    use crate::cache::{MemoryCache, ResultCache};
    use crate::catalog::{Airport, CityCatalog};
    use crate::config::{Config, PauseRange};
    use crate::orchestrator::FlightScout;
    use crate::schedule::TripWindow;

    pub fn vienna() -> Airport {
        Airport {
            code: "vie".to_string(),
            entity_id: "95673444".to_string(),
            name: "Wien".to_string(),
        }
    }

    pub fn bratislava() -> Airport {
        Airport {
            code: "bts".to_string(),
            entity_id: "95673445".to_string(),
            name: "Bratislava".to_string(),
        }
    }

    /// Config with every pause and backoff stage set to zero.
    pub fn fast_config() -> Config {
        let mut config = Config::default();
        config.identity.warmup_pause = PauseRange::ZERO;
        config.identity.backoff_secs = vec![0, 0];
        config.search.country_pause_ms = 0;
        config.search.city_pause_ms = 0;
        config
    }

    /// Engine over `transport` with [`fast_config`], the embedded catalog and
    /// a fresh in-memory cache.
    pub fn scout(transport: &MockTransport) -> FlightScout {
        scout_with_config(transport, &fast_config())
    }

    pub fn scout_with_config(transport: &MockTransport, config: &Config) -> FlightScout {
        let cache: Arc<dyn ResultCache> = Arc::new(MemoryCache::new(Duration::hours(3)));
        let catalog = Arc::new(CityCatalog::embedded().expect("embedded catalog parses"));
        FlightScout::new(config, Arc::new(transport.clone()), cache, catalog)
    }

    fn location_result(kind: &str, mut location: Value, raw_price: f64, direct: bool) -> Value {
        location["type"] = json!(kind);
        json!({
            "type": "LOCATION",
            "content": {
                "location": location,
                "flightQuotes": {
                    "cheapest": { "rawPrice": raw_price, "direct": direct }
                }
            }
        })
    }

    /// Everywhere response offering `(country, entity id, total price)`.
    pub fn everywhere_response(countries: &[(&str, &str, f64)]) -> String {
        let results: Vec<Value> = countries
            .iter()
            .map(|(name, id, price)| {
                location_result("Nation", json!({ "id": id, "name": name }), *price, false)
            })
            .collect();
        json!({ "everywhereDestination": { "results": results } }).to_string()
    }

    /// Country response offering `(city, entity id, sky code, total price)`.
    pub fn country_response(cities: &[(&str, &str, &str, f64)]) -> String {
        let results: Vec<Value> = cities
            .iter()
            .map(|(name, id, sky_code, price)| {
                location_result(
                    "City",
                    json!({
                        "id": format!("location-{}", id),
                        "entityId": id,
                        "name": name,
                        "skyCode": sky_code,
                    }),
                    *price,
                    true,
                )
            })
            .collect();
        json!({ "countryDestination": { "results": results } }).to_string()
    }

    /// Detail response with `(total price, outbound HH:MM, return HH:MM, direct)`.
    ///
    /// Each leg arrives 90 minutes after it departs.
    pub fn detail_response(window: &TripWindow, itineraries: &[(f64, &str, &str, bool)]) -> String {
        let timestamp = |date: NaiveDate, time: &str, offset: i64| {
            let time = NaiveTime::parse_from_str(time, "%H:%M").unwrap_or(NaiveTime::MIN);
            (date.and_time(time) + Duration::minutes(offset))
                .format("%Y-%m-%dT%H:%M:%S")
                .to_string()
        };
        let results: Vec<Value> = itineraries
            .iter()
            .map(|(price, outbound, inbound, direct)| {
                let stops = if *direct { 0 } else { 1 };
                json!({
                    "price": { "raw": price },
                    "legs": [
                        {
                            "departure": timestamp(window.departure, outbound, 0),
                            "arrival": timestamp(window.departure, outbound, 90),
                            "stopCount": stops,
                        },
                        {
                            "departure": timestamp(window.return_date, inbound, 0),
                            "arrival": timestamp(window.return_date, inbound, 90),
                            "stopCount": 0,
                        }
                    ]
                })
            })
            .collect();
        json!({ "itineraries": { "results": results } }).to_string()
    }

    pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }
}
