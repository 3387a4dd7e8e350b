//! Per-city itinerary lookup with price and time filtering.

use std::sync::Arc;

use chrono::Timelike;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::catalog::Airport;
use crate::deal::{DealAlternative, MAX_ALTERNATIVES, UNKNOWN_TIME};
use crate::identity::{IdentityManager, SessionError, SessionState};
use crate::schedule::TripWindow;
use crate::upstream::{detail_query, parse_itineraries, Itinerary, QueryKind};

/// Filters applied to the itineraries of one city and window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolveCriteria {
    pub adults: u32,
    /// Per traveller.
    pub max_price: f64,
    /// Effective floor for this window (holiday relaxation already applied).
    pub min_departure_hour: u32,
    pub max_return_hour: Option<u32>,
}

/// The chosen itinerary and its alternatives.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedFlight {
    /// Per traveller.
    pub price: f64,
    pub time: String,
    pub return_time: String,
    pub is_direct: bool,
    pub early_departure: bool,
    pub alternatives: Vec<DealAlternative>,
}

/// Outcome of a detail lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Found(ResolvedFlight),
    /// Nothing within the price ceiling (or an unusable response).
    NoMatch,
    /// The upstream denied access even after backoff.
    Blocked,
}

#[derive(Debug, Clone)]
struct Candidate {
    price: f64,
    time: String,
    return_time: String,
    is_direct: bool,
}

fn candidate(itinerary: &Itinerary, adults: u32) -> Candidate {
    Candidate {
        price: itinerary.total_price / f64::from(adults),
        time: itinerary.outbound_departure.format("%H:%M").to_string(),
        return_time: itinerary
            .return_departure
            .map(|dt| dt.format("%H:%M").to_string())
            .unwrap_or_else(|| UNKNOWN_TIME.to_string()),
        is_direct: itinerary.is_direct,
    }
}

/// Pick the best itinerary and up to [`MAX_ALTERNATIVES`] alternatives.
///
/// Itineraries over the price ceiling are dropped. Those departing at or
/// after the floor (and, with a ceiling set, returning by it) are preferred;
/// when none qualify the cheapest early departures are used instead and
/// flagged as such. A missing return arrival never violates the ceiling.
pub fn select_flight(itineraries: &[Itinerary], criteria: &ResolveCriteria) -> Option<ResolvedFlight> {
    let mut on_time = Vec::new();
    let mut early = Vec::new();

    for itinerary in itineraries {
        let c = candidate(itinerary, criteria.adults);
        if c.price > criteria.max_price {
            continue;
        }

        if itinerary.outbound_departure.hour() < criteria.min_departure_hour {
            early.push(c);
            continue;
        }

        let late_return = match (criteria.max_return_hour, itinerary.return_arrival) {
            (Some(ceiling), Some(arrival)) => arrival.hour() > ceiling,
            _ => false,
        };
        if !late_return {
            on_time.push(c);
        }
    }

    let (mut bucket, early_departure) = if !on_time.is_empty() {
        (on_time, false)
    } else if !early.is_empty() {
        (early, true)
    } else {
        return None;
    };
    bucket.sort_by(|a, b| a.price.total_cmp(&b.price));

    let mut iter = bucket.into_iter();
    let best = iter.next()?;

    let mut alternatives: Vec<DealAlternative> = Vec::new();
    for c in iter {
        if alternatives.len() == MAX_ALTERNATIVES {
            break;
        }
        let duplicate = (c.time == best.time && c.return_time == best.return_time)
            || alternatives
                .iter()
                .any(|a| a.time == c.time && a.return_time == c.return_time);
        if duplicate {
            continue;
        }
        alternatives.push(DealAlternative {
            price: c.price,
            time: c.time,
            return_time: c.return_time,
            early_departure,
        });
    }

    Some(ResolvedFlight {
        price: best.price,
        time: best.time,
        return_time: best.return_time,
        is_direct: best.is_direct,
        early_departure,
        alternatives,
    })
}

/// Issues detail queries and applies [`select_flight`].
#[derive(Clone)]
pub struct DetailResolver {
    identity: Arc<IdentityManager>,
}

impl DetailResolver {
    pub fn new(identity: Arc<IdentityManager>) -> Self {
        Self { identity }
    }

    pub async fn resolve(
        &self,
        state: &mut SessionState,
        origin: &Airport,
        city_entity: &str,
        window: &TripWindow,
        criteria: &ResolveCriteria,
        cancel: &CancellationToken,
    ) -> Result<Resolution, SessionError> {
        let query = detail_query(&origin.entity_id, city_entity, window, criteria.adults);
        let label = format!("detail {} {}", city_entity, window);
        let response = self
            .identity
            .issue(state, QueryKind::Detail, &query, &label, cancel)
            .await?;

        if response.is_denied() {
            return Ok(Resolution::Blocked);
        }
        if !response.is_success() {
            debug!(city = city_entity, status = response.status, "Detail query failed");
            return Ok(Resolution::NoMatch);
        }

        let itineraries = parse_itineraries(&response.body);
        Ok(match select_flight(&itineraries, criteria) {
            Some(flight) => Resolution::Found(flight),
            None => Resolution::NoMatch,
        })
    }
}
