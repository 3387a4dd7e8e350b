//! Request bodies for the unified search endpoint.

use chrono::{Datelike, NaiveDate};
use serde_json::{json, Value};

use crate::schedule::TripWindow;

/// The three query shapes the engine issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryKind {
    /// Origin to anywhere, grouped by country.
    Everywhere,
    /// Origin to one country, grouped by city.
    Country,
    /// Origin to one city, full itineraries.
    Detail,
}

impl QueryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryKind::Everywhere => "everywhere",
            QueryKind::Country => "country",
            QueryKind::Detail => "detail",
        }
    }

    /// Explore queries carry the combined-results headers; detail queries do not.
    pub fn is_explore(&self) -> bool {
        !matches!(self, QueryKind::Detail)
    }
}

impl std::fmt::Display for QueryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

fn entity(entity_id: &str) -> Value {
    json!({ "@type": "entity", "entityId": entity_id })
}

fn numeric_date(date: NaiveDate) -> Value {
    json!({
        "@type": "date",
        "year": date.year(),
        "month": date.month(),
        "day": date.day(),
    })
}

fn padded_date(date: NaiveDate) -> Value {
    json!({
        "@type": "date",
        "year": date.year().to_string(),
        "month": format!("{:02}", date.month()),
        "day": format!("{:02}", date.day()),
    })
}

fn envelope(adults: u32, legs: Vec<Value>) -> Value {
    json!({
        "cabinClass": "ECONOMY",
        "childAges": [],
        "adults": adults,
        "legs": legs,
        "options": {
            "fareAttributes": { "selectedFareAttributes": [] }
        }
    })
}

/// Phase-1 query: origin to everywhere and back.
pub fn everywhere_query(origin_entity: &str, window: &TripWindow, adults: u32) -> Value {
    envelope(
        adults,
        vec![
            json!({
                "legOrigin": entity(origin_entity),
                "legDestination": { "@type": "everywhere" },
                "dates": numeric_date(window.departure),
            }),
            json!({
                "legOrigin": { "@type": "everywhere" },
                "legDestination": entity(origin_entity),
                "dates": numeric_date(window.return_date),
            }),
        ],
    )
}

/// Phase-2 query: origin to one country, staying in that country.
pub fn country_query(
    origin_entity: &str,
    country_entity: &str,
    window: &TripWindow,
    adults: u32,
) -> Value {
    envelope(
        adults,
        vec![
            json!({
                "legOrigin": entity(origin_entity),
                "legDestination": entity(country_entity),
                "dates": numeric_date(window.departure),
                "placeOfStay": country_entity,
            }),
            json!({
                "legOrigin": entity(country_entity),
                "legDestination": entity(origin_entity),
                "dates": numeric_date(window.return_date),
            }),
        ],
    )
}

/// Detail query for one city. Accepts `location-` prefixed ids.
pub fn detail_query(
    origin_entity: &str,
    city_entity: &str,
    window: &TripWindow,
    adults: u32,
) -> Value {
    let city = city_entity
        .strip_prefix("location-")
        .unwrap_or(city_entity);
    envelope(
        adults,
        vec![
            json!({
                "legOrigin": entity(origin_entity),
                "legDestination": entity(city),
                "dates": padded_date(window.departure),
                "placeOfStay": city,
            }),
            json!({
                "legOrigin": entity(city),
                "legDestination": entity(origin_entity),
                "dates": padded_date(window.return_date),
            }),
        ],
    )
}
