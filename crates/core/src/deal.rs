//! The deal record handed to callers.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Placeholder for a departure/return time the upstream did not confirm.
pub const UNKNOWN_TIME: &str = "??:??";

/// Maximum number of alternatives carried on a deal.
pub const MAX_ALTERNATIVES: usize = 3;

/// A confirmed (or degraded) round-trip deal for one city and trip window.
///
/// Prices are per traveller: the upstream total divided by the party size.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FlightDeal {
    pub city: String,
    pub country: String,
    pub price: f64,
    pub departure_date: NaiveDate,
    pub return_date: NaiveDate,
    /// Outbound departure, `HH:MM` or [`UNKNOWN_TIME`].
    pub flight_time: String,
    /// Return departure, `HH:MM` or [`UNKNOWN_TIME`].
    pub return_time: String,
    pub is_direct: bool,
    pub url: String,
    /// Display name of the origin airport.
    pub origin: String,
    pub latitude: f64,
    pub longitude: f64,
    /// The itinerary departs before the preferred hour.
    #[serde(default)]
    pub early_departure: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub alternatives: Vec<DealAlternative>,
}

impl FlightDeal {
    /// Whether the price came from a funnel quote instead of a confirmed itinerary.
    pub fn is_degraded(&self) -> bool {
        self.flight_time == UNKNOWN_TIME && self.return_time == UNKNOWN_TIME
    }
}

/// Another itinerary for the same city and window.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DealAlternative {
    pub price: f64,
    pub time: String,
    pub return_time: String,
    #[serde(default)]
    pub early_departure: bool,
}
