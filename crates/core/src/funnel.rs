//! Two-phase candidate discovery: everywhere -> affordable countries -> affordable cities.

use std::collections::HashSet;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::cache::{CacheKey, ResultCache};
use crate::catalog::Airport;
use crate::identity::{IdentityManager, SessionError, SessionState};
use crate::metrics;
use crate::schedule::TripWindow;
use crate::upstream::{
    country_query, everywhere_query, parse_cities, parse_countries, QueryKind,
};

/// A country that survived phase 1.
#[derive(Debug, Clone, PartialEq)]
pub struct CountryCandidate {
    pub name: String,
    pub entity_id: String,
    /// Per traveller.
    pub price: f64,
}

/// A city that survived phase 2.
#[derive(Debug, Clone, PartialEq)]
pub struct CityCandidate {
    pub name: String,
    pub entity_id: String,
    pub sky_code: Option<String>,
    pub country: String,
    /// Per traveller.
    pub price: f64,
    pub direct: bool,
    pub coordinates: Option<(f64, f64)>,
}

/// Lower-cased country names to skip.
#[derive(Debug, Clone, Default)]
pub struct Exclusions(HashSet<String>);

impl Exclusions {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self(
            names
                .into_iter()
                .map(|n| n.as_ref().trim().to_lowercase())
                .filter(|n| !n.is_empty())
                .collect(),
        )
    }

    pub fn contains(&self, country: &str) -> bool {
        self.0.contains(&country.trim().to_lowercase())
    }
}

/// Runs the everywhere and per-country queries for one worker.
#[derive(Clone)]
pub struct CandidateFunnel {
    identity: Arc<IdentityManager>,
    cache: Arc<dyn ResultCache>,
}

impl CandidateFunnel {
    pub fn new(identity: Arc<IdentityManager>, cache: Arc<dyn ResultCache>) -> Self {
        Self { identity, cache }
    }

    fn cached_everywhere(&self, key: &CacheKey) -> Option<String> {
        match self.cache.get(key) {
            Ok(Some(payload)) => {
                metrics::CACHE_HITS.inc();
                Some(payload)
            }
            Ok(None) => {
                metrics::CACHE_MISSES.inc();
                None
            }
            Err(e) => {
                warn!(key = %key.as_storage_key(), error = %e, "Cache read failed, treating as miss");
                metrics::CACHE_MISSES.inc();
                None
            }
        }
    }

    /// Phase 1: countries priced at or below `max_price`, cheapest first.
    ///
    /// Served from the cache when a fresh entry exists. A blocked or failed
    /// query yields an empty list; `state.is_blocked()` tells them apart.
    #[allow(clippy::too_many_arguments)]
    pub async fn countries(
        &self,
        state: &mut SessionState,
        origin: &Airport,
        window: &TripWindow,
        adults: u32,
        max_price: f64,
        exclusions: &Exclusions,
        cancel: &CancellationToken,
    ) -> Result<Vec<CountryCandidate>, SessionError> {
        let key = CacheKey::new(&origin.entity_id, window.departure, window.return_date, adults);

        let body = match self.cached_everywhere(&key) {
            Some(payload) => {
                debug!(origin = %origin.code, trip = %window, "Phase 1 served from cache");
                payload
            }
            None => {
                let query = everywhere_query(&origin.entity_id, window, adults);
                let label = format!("everywhere {} {}", origin.code, window);
                let response = self
                    .identity
                    .issue(state, QueryKind::Everywhere, &query, &label, cancel)
                    .await?;

                if !response.is_success() {
                    warn!(origin = %origin.code, trip = %window, status = response.status, "Phase 1 query failed");
                    return Ok(Vec::new());
                }
                if let Err(e) = self.cache.set(&key, &response.body) {
                    warn!(key = %key.as_storage_key(), error = %e, "Cache write failed");
                }
                response.body
            }
        };

        let mut countries: Vec<CountryCandidate> = parse_countries(&body)
            .into_iter()
            .map(|location| CountryCandidate {
                price: location.raw_price / f64::from(adults),
                name: location.name,
                entity_id: location.entity_id,
            })
            .filter(|c| c.price <= max_price && !exclusions.contains(&c.name))
            .collect();
        countries.sort_by(|a, b| a.price.total_cmp(&b.price));

        debug!(origin = %origin.code, trip = %window, count = countries.len(), "Phase 1 complete");
        Ok(countries)
    }

    /// Phase 2: cities in `country` priced at or below `max_price`, cheapest first.
    #[allow(clippy::too_many_arguments)]
    pub async fn cities(
        &self,
        state: &mut SessionState,
        origin: &Airport,
        country: &CountryCandidate,
        window: &TripWindow,
        adults: u32,
        max_price: f64,
        cancel: &CancellationToken,
    ) -> Result<Vec<CityCandidate>, SessionError> {
        let query = country_query(&origin.entity_id, &country.entity_id, window, adults);
        let label = format!("country {} {}", country.name, window);
        let response = self
            .identity
            .issue(state, QueryKind::Country, &query, &label, cancel)
            .await?;

        if !response.is_success() {
            warn!(country = %country.name, trip = %window, status = response.status, "Phase 2 query failed");
            return Ok(Vec::new());
        }

        let mut cities: Vec<CityCandidate> = parse_cities(&response.body)
            .into_iter()
            .map(|location| CityCandidate {
                price: location.raw_price / f64::from(adults),
                name: location.name,
                entity_id: location.entity_id,
                sky_code: location.sky_code,
                country: country.name.clone(),
                direct: location.direct,
                coordinates: location.coordinates,
            })
            .filter(|c| c.price <= max_price)
            .collect();
        cities.sort_by(|a, b| a.price.total_cmp(&b.price));

        debug!(country = %country.name, trip = %window, count = cities.len(), "Phase 2 complete");
        Ok(cities)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::config::{IdentityConfig, PauseRange, UpstreamConfig};
    use crate::testing::{fixtures, MockTransport};
    use chrono::{Duration, NaiveDate};

    fn vienna() -> Airport {
        Airport {
            code: "vie".to_string(),
            entity_id: "95673444".to_string(),
            name: "Wien".to_string(),
        }
    }

    fn window() -> TripWindow {
        TripWindow::new(NaiveDate::from_ymd_opt(2026, 1, 9).unwrap(), 2)
    }

    fn funnel(transport: &MockTransport) -> (CandidateFunnel, Arc<IdentityManager>) {
        let identity = Arc::new(IdentityManager::new(
            Arc::new(transport.clone()),
            UpstreamConfig::default(),
            IdentityConfig {
                warmup: false,
                warmup_pause: PauseRange::ZERO,
                backoff_secs: vec![],
                ..IdentityConfig::default()
            },
        ));
        let cache: Arc<dyn ResultCache> = Arc::new(MemoryCache::new(Duration::hours(3)));
        (CandidateFunnel::new(identity.clone(), cache), identity)
    }

    #[test]
    fn test_exclusions_are_case_insensitive() {
        let exclusions = Exclusions::new(["Italien", " spanien "]);
        assert!(exclusions.contains("italien"));
        assert!(exclusions.contains("SPANIEN"));
        assert!(!exclusions.contains("Frankreich"));
    }

    #[tokio::test]
    async fn test_countries_filtered_and_normalized() {
        let transport = MockTransport::new();
        transport
            .set_everywhere(fixtures::everywhere_response(&[
                ("Italien", "29475437", 120.0),
                ("Spanien", "29475436", 100.0),
                ("Island", "29475414", 400.0),
            ]))
            .await;
        let (funnel, identity) = funnel(&transport);
        let cancel = CancellationToken::new();
        let mut state = identity.acquire(&cancel).await.unwrap();

        let countries = funnel
            .countries(&mut state, &vienna(), &window(), 2, 70.0, &Exclusions::new(["spanien"]), &cancel)
            .await
            .unwrap();

        assert_eq!(countries.len(), 1);
        assert_eq!(countries[0].name, "Italien");
        assert_eq!(countries[0].price, 60.0);
    }

    #[tokio::test]
    async fn test_cache_hit_skips_network() {
        let transport = MockTransport::new();
        transport
            .set_everywhere(fixtures::everywhere_response(&[("Italien", "29475437", 50.0)]))
            .await;
        let (funnel, identity) = funnel(&transport);
        let cancel = CancellationToken::new();
        let mut state = identity.acquire(&cancel).await.unwrap();

        let first = funnel
            .countries(&mut state, &vienna(), &window(), 1, 70.0, &Exclusions::default(), &cancel)
            .await
            .unwrap();
        let second = funnel
            .countries(&mut state, &vienna(), &window(), 1, 70.0, &Exclusions::default(), &cancel)
            .await
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(transport.api_request_count().await, 1);
    }

    #[tokio::test]
    async fn test_denied_phase_one_is_not_cached() {
        let transport = MockTransport::new();
        transport.deny_next(1).await;
        let (funnel, identity) = funnel(&transport);
        let cancel = CancellationToken::new();
        let mut state = identity.acquire(&cancel).await.unwrap();

        let countries = funnel
            .countries(&mut state, &vienna(), &window(), 1, 70.0, &Exclusions::default(), &cancel)
            .await
            .unwrap();
        assert!(countries.is_empty());
        assert!(state.is_blocked());

        funnel
            .countries(&mut state, &vienna(), &window(), 1, 70.0, &Exclusions::default(), &cancel)
            .await
            .unwrap();
        assert_eq!(transport.api_request_count().await, 2);
    }

    #[tokio::test]
    async fn test_cities_filtered_and_tagged_with_country() {
        let transport = MockTransport::new();
        transport
            .set_country(
                "29475437",
                fixtures::country_response(&[
                    ("Rom", "27539793", "ROME", 45.0),
                    ("Mailand", "27544068", "MILA", 95.0),
                ]),
            )
            .await;
        let (funnel, identity) = funnel(&transport);
        let cancel = CancellationToken::new();
        let mut state = identity.acquire(&cancel).await.unwrap();

        let country = CountryCandidate {
            name: "Italien".to_string(),
            entity_id: "29475437".to_string(),
            price: 40.0,
        };
        let cities = funnel
            .cities(&mut state, &vienna(), &country, &window(), 1, 70.0, &cancel)
            .await
            .unwrap();

        assert_eq!(cities.len(), 1);
        assert_eq!(cities[0].name, "Rom");
        assert_eq!(cities[0].country, "Italien");
        assert_eq!(cities[0].sky_code.as_deref(), Some("ROME"));
    }
}
