//! Response parsing for the unified search endpoint.
//!
//! Parsing is lenient: a malformed body or entry yields fewer results, never
//! an error. Callers treat "nothing parsed" the same as "nothing offered".

use chrono::{DateTime, NaiveDateTime};
use serde::Deserialize;
use serde_json::Value;

/// A destination offered by an explore query with its cheapest quote.
#[derive(Debug, Clone, PartialEq)]
pub struct QuotedLocation {
    pub entity_id: String,
    pub name: String,
    pub sky_code: Option<String>,
    /// Total for the whole party.
    pub raw_price: f64,
    pub direct: bool,
    /// `(latitude, longitude)` when the upstream reports it.
    pub coordinates: Option<(f64, f64)>,
}

/// A bookable round trip from a detail query.
#[derive(Debug, Clone, PartialEq)]
pub struct Itinerary {
    /// Total for the whole party.
    pub total_price: f64,
    pub outbound_departure: NaiveDateTime,
    pub return_departure: Option<NaiveDateTime>,
    pub return_arrival: Option<NaiveDateTime>,
    /// Every leg is nonstop.
    pub is_direct: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UnifiedSearchResponse {
    #[serde(default)]
    everywhere_destination: Option<DestinationBlock>,
    #[serde(default)]
    country_destination: Option<DestinationBlock>,
    #[serde(default)]
    itineraries: Option<ItineraryBlock>,
}

#[derive(Debug, Default, Deserialize)]
struct DestinationBlock {
    #[serde(default)]
    results: Vec<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DestinationResult {
    #[serde(default, rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    content: Option<DestinationContent>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DestinationContent {
    #[serde(default)]
    location: Option<LocationInfo>,
    #[serde(default)]
    flight_quotes: Option<FlightQuotes>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LocationInfo {
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    entity_id: Option<Value>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default, rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    sky_code: Option<String>,
    #[serde(default)]
    coordinates: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct FlightQuotes {
    #[serde(default)]
    cheapest: Option<Quote>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Quote {
    #[serde(default)]
    raw_price: Option<f64>,
    #[serde(default)]
    direct: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
struct ItineraryBlock {
    #[serde(default)]
    results: Vec<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawItinerary {
    #[serde(default)]
    price: Option<RawPrice>,
    #[serde(default)]
    legs: Vec<RawLeg>,
}

#[derive(Debug, Deserialize)]
struct RawPrice {
    #[serde(default)]
    raw: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawLeg {
    #[serde(default)]
    departure: Option<String>,
    #[serde(default)]
    arrival: Option<String>,
    #[serde(default)]
    stop_count: Option<u32>,
}

fn parse_body(body: &str) -> UnifiedSearchResponse {
    match serde_json::from_str(body) {
        Ok(parsed) => parsed,
        Err(e) => {
            tracing::debug!(error = %e, "Unparseable search response");
            UnifiedSearchResponse::default()
        }
    }
}

fn id_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn coordinates(value: &Value) -> Option<(f64, f64)> {
    match value {
        Value::Object(map) => {
            let lat = map.get("latitude").or_else(|| map.get("lat"))?.as_f64()?;
            let lon = map.get("longitude").or_else(|| map.get("lon"))?.as_f64()?;
            Some((lat, lon))
        }
        _ => None,
    }
}

/// Accept both naive ISO timestamps and ones with an offset.
fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S")
        .ok()
        .or_else(|| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M").ok())
        .or_else(|| DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.naive_local()))
}

fn quoted_locations(block: Option<DestinationBlock>, location_kind: &str) -> Vec<QuotedLocation> {
    let Some(block) = block else {
        return Vec::new();
    };

    block
        .results
        .into_iter()
        .filter_map(|raw| serde_json::from_value::<DestinationResult>(raw).ok())
        .filter(|result| result.kind.as_deref() == Some("LOCATION"))
        .filter_map(|result| {
            let content = result.content?;
            let location = content.location?;
            if location.kind.as_deref() != Some(location_kind) {
                return None;
            }
            let quote = content.flight_quotes?.cheapest?;
            let raw_price = quote.raw_price?;

            let entity_id = location
                .entity_id
                .as_ref()
                .and_then(id_string)
                .or_else(|| location.id.as_ref().and_then(id_string))?;

            Some(QuotedLocation {
                entity_id,
                name: location.name.unwrap_or_default(),
                sky_code: location.sky_code.filter(|s| !s.is_empty()),
                raw_price,
                direct: quote.direct.unwrap_or(false),
                coordinates: location.coordinates.as_ref().and_then(coordinates),
            })
        })
        .collect()
}

/// Countries offered by an everywhere query.
pub fn parse_countries(body: &str) -> Vec<QuotedLocation> {
    quoted_locations(parse_body(body).everywhere_destination, "Nation")
}

/// Cities offered by a country query.
pub fn parse_cities(body: &str) -> Vec<QuotedLocation> {
    quoted_locations(parse_body(body).country_destination, "City")
}

/// Itineraries offered by a detail query, in response order.
pub fn parse_itineraries(body: &str) -> Vec<Itinerary> {
    let Some(block) = parse_body(body).itineraries else {
        return Vec::new();
    };

    block
        .results
        .into_iter()
        .filter_map(|raw| serde_json::from_value::<RawItinerary>(raw).ok())
        .filter_map(|itinerary| {
            let total_price = itinerary.price?.raw?;
            let outbound = itinerary.legs.first()?;
            let outbound_departure = outbound.departure.as_deref().and_then(parse_timestamp)?;

            let inbound = itinerary.legs.get(1);
            let return_departure = inbound
                .and_then(|leg| leg.departure.as_deref())
                .and_then(parse_timestamp);
            let return_arrival = inbound
                .and_then(|leg| leg.arrival.as_deref())
                .and_then(parse_timestamp);

            let is_direct = itinerary
                .legs
                .iter()
                .all(|leg| leg.stop_count.unwrap_or(0) == 0);

            Some(Itinerary {
                total_price,
                outbound_departure,
                return_departure,
                return_arrival,
                is_direct,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_countries_keeps_nations_only() {
        let body = json!({
            "everywhereDestination": {
                "results": [
                    {
                        "type": "LOCATION",
                        "content": {
                            "location": { "id": "29475437", "name": "Italien", "type": "Nation" },
                            "flightQuotes": { "cheapest": { "rawPrice": 89.0, "direct": true } }
                        }
                    },
                    {
                        "type": "LOCATION",
                        "content": {
                            "location": { "id": "1", "name": "Somewhere", "type": "Region" },
                            "flightQuotes": { "cheapest": { "rawPrice": 10.0 } }
                        }
                    },
                    { "type": "AD" },
                    {
                        "type": "LOCATION",
                        "content": {
                            "location": { "id": "2", "name": "No quotes", "type": "Nation" },
                            "flightQuotes": {}
                        }
                    }
                ]
            }
        })
        .to_string();

        let countries = parse_countries(&body);
        assert_eq!(countries.len(), 1);
        assert_eq!(countries[0].entity_id, "29475437");
        assert_eq!(countries[0].name, "Italien");
        assert_eq!(countries[0].raw_price, 89.0);
        assert!(countries[0].direct);
    }

    #[test]
    fn test_parse_cities_prefers_entity_id() {
        let body = json!({
            "countryDestination": {
                "results": [{
                    "type": "LOCATION",
                    "content": {
                        "location": {
                            "id": "location-27539793",
                            "entityId": "27539793",
                            "name": "Rom",
                            "type": "City",
                            "skyCode": "ROME",
                            "coordinates": { "latitude": 41.9, "longitude": 12.5 }
                        },
                        "flightQuotes": { "cheapest": { "rawPrice": 98.0, "direct": false } }
                    }
                }]
            }
        })
        .to_string();

        let cities = parse_cities(&body);
        assert_eq!(cities.len(), 1);
        assert_eq!(cities[0].entity_id, "27539793");
        assert_eq!(cities[0].sky_code.as_deref(), Some("ROME"));
        assert_eq!(cities[0].coordinates, Some((41.9, 12.5)));
    }

    #[test]
    fn test_malformed_body_yields_nothing() {
        assert!(parse_countries("not json").is_empty());
        assert!(parse_cities(r#"{"countryDestination": {"results": 5}}"#).is_empty());
        assert!(parse_itineraries("").is_empty());
    }

    #[test]
    fn test_parse_itineraries() {
        let body = json!({
            "itineraries": {
                "results": [
                    {
                        "price": { "raw": 120.0 },
                        "legs": [
                            { "departure": "2026-01-09T18:30:00", "arrival": "2026-01-09T20:10:00", "stopCount": 0 },
                            { "departure": "2026-01-11T21:00:00", "arrival": "2026-01-11T22:40:00", "stopCount": 0 }
                        ]
                    },
                    {
                        "price": { "raw": 80.0 },
                        "legs": [
                            { "departure": "2026-01-09T06:15:00+01:00", "stopCount": 1 },
                            { "departure": "2026-01-11T09:00:00", "stopCount": 0 }
                        ]
                    },
                    { "price": { "raw": 10.0 }, "legs": [] }
                ]
            }
        })
        .to_string();

        let itineraries = parse_itineraries(&body);
        assert_eq!(itineraries.len(), 2);

        assert_eq!(itineraries[0].total_price, 120.0);
        assert_eq!(itineraries[0].outbound_departure.format("%H:%M").to_string(), "18:30");
        assert!(itineraries[0].is_direct);
        assert!(itineraries[0].return_arrival.is_some());

        assert_eq!(itineraries[1].outbound_departure.format("%H:%M").to_string(), "06:15");
        assert!(!itineraries[1].is_direct);
        assert!(itineraries[1].return_arrival.is_none());
    }
}
