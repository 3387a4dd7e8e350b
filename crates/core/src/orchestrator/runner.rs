//! Search orchestrator implementation.
//!
//! Each (origin airport, trip window) pair is one unit of work. Units run as
//! tokio tasks gated by a semaphore of `max_workers` permits; every unit
//! acquires its own search identity and never shares it.

use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::cache::{create_cache, ResultCache};
use crate::catalog::{Airport, CityCatalog, CityInfo};
use crate::config::{BlockedFallback, Config, SearchConfig};
use crate::deal::{FlightDeal, UNKNOWN_TIME};
use crate::funnel::{CandidateFunnel, CityCandidate, Exclusions};
use crate::identity::{pause, IdentityManager, SessionError, SessionState};
use crate::metrics;
use crate::resolver::{DetailResolver, Resolution, ResolveCriteria, ResolvedFlight};
use crate::schedule::{generate_trips, upcoming_trips, TripPlan, TripWindow};
use crate::upstream::{booking_url, ReqwestTransport, Transport};

use super::types::{
    check_plan, CitySearchRequest, DiscoveryRequest, ResolvedOptions, ScoutError, SearchObserver,
    SearchOptions,
};

/// What a unit does once it has an identity.
enum Mode {
    Discovery(Exclusions),
    Targeted(Vec<CityInfo>),
}

/// The flight-deal discovery engine.
pub struct FlightScout {
    search: SearchConfig,
    site_url: String,
    default_airport: String,
    catalog: Arc<CityCatalog>,
    identity: Arc<IdentityManager>,
    funnel: CandidateFunnel,
    resolver: DetailResolver,
    today: Option<NaiveDate>,
}

impl FlightScout {
    /// Create an engine over explicit collaborators.
    pub fn new(
        config: &Config,
        transport: Arc<dyn Transport>,
        cache: Arc<dyn ResultCache>,
        catalog: Arc<CityCatalog>,
    ) -> Self {
        let identity = Arc::new(IdentityManager::new(
            transport,
            config.upstream.clone(),
            config.identity.clone(),
        ));

        Self {
            search: config.search.clone(),
            site_url: config.upstream.site_url.clone(),
            default_airport: config.origin.airport.clone(),
            catalog,
            funnel: CandidateFunnel::new(identity.clone(), cache),
            resolver: DetailResolver::new(identity.clone()),
            identity,
            today: None,
        }
    }

    /// Create an engine with the production transport and the configured cache and catalog.
    pub fn from_config(config: &Config) -> Result<Self, ScoutError> {
        let transport: Arc<dyn Transport> = Arc::new(ReqwestTransport::new(&config.upstream));
        let cache = create_cache(&config.cache)?;
        let catalog = Arc::new(CityCatalog::load_or_embedded(config.catalog.path.as_deref())?);

        info!(
            transport = transport.name(),
            cities = catalog.cities().len(),
            proxies = config.identity.proxies.len(),
            "Search engine ready"
        );
        Ok(Self::new(config, transport, cache, catalog))
    }

    /// Pin the date used to skip past trip windows (defaults to the local date).
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }

    pub fn catalog(&self) -> &CityCatalog {
        &self.catalog
    }

    /// Discover deals to any affordable destination.
    pub async fn run(
        &self,
        request: &DiscoveryRequest,
        cancel: &CancellationToken,
        observer: Arc<dyn SearchObserver>,
    ) -> Result<Vec<FlightDeal>, ScoutError> {
        let (airports, options) = self.resolve_options(&request.plan, &request.options)?;
        let mode = Mode::Discovery(Exclusions::new(&request.excluded_countries));

        info!(
            airports = airports.len(),
            max_price = options.max_price,
            excluded = request.excluded_countries.len(),
            "Starting discovery"
        );
        self.execute(&request.plan, airports, options, mode, cancel, observer)
            .await
    }

    /// Resolve deals for a fixed list of catalog cities.
    pub async fn run_city_search(
        &self,
        request: &CitySearchRequest,
        cancel: &CancellationToken,
        observer: Arc<dyn SearchObserver>,
    ) -> Result<Vec<FlightDeal>, ScoutError> {
        let (airports, options) = self.resolve_options(&request.plan, &request.options)?;

        let mut cities = Vec::new();
        for name in &request.cities {
            match self.catalog.city(name) {
                Some(city) => {
                    if !cities.iter().any(|c: &CityInfo| c.entity_id == city.entity_id) {
                        cities.push(city.clone());
                    }
                }
                None => report(&*observer, format!("Unknown city: {}", name.trim())),
            }
        }

        info!(
            airports = airports.len(),
            cities = cities.len(),
            max_price = options.max_price,
            "Starting city search"
        );
        self.execute(
            &request.plan,
            airports,
            options,
            Mode::Targeted(cities),
            cancel,
            observer,
        )
        .await
    }

    fn resolve_options(
        &self,
        plan: &TripPlan,
        options: &SearchOptions,
    ) -> Result<(Vec<Airport>, ResolvedOptions), ScoutError> {
        check_plan(plan)?;

        let codes: Vec<&str> = if options.airports.is_empty() {
            vec![self.default_airport.as_str()]
        } else {
            options.airports.iter().map(String::as_str).collect()
        };

        let mut airports: Vec<Airport> = Vec::new();
        for code in codes {
            let airport = self
                .catalog
                .airport(code)
                .ok_or_else(|| ScoutError::InvalidRequest(format!("unknown airport: {}", code)))?;
            if !airports.iter().any(|a| a.code == airport.code) {
                airports.push(airport.clone());
            }
        }

        let resolved = ResolvedOptions {
            adults: options.adults.unwrap_or(self.search.adults),
            max_price: options.max_price.unwrap_or(self.search.max_price),
            min_departure_hour: options
                .min_departure_hour
                .unwrap_or(self.search.min_departure_hour),
            max_return_hour: options.max_return_hour.or(self.search.max_return_hour),
        };

        if resolved.adults == 0 {
            return Err(ScoutError::InvalidRequest("adults must be at least 1".to_string()));
        }
        if !(resolved.max_price > 0.0) {
            return Err(ScoutError::InvalidRequest(format!(
                "max_price must be positive, got {}",
                resolved.max_price
            )));
        }
        if resolved.min_departure_hour > 23 || resolved.max_return_hour.is_some_and(|h| h > 23) {
            return Err(ScoutError::InvalidRequest("hours must be 0-23".to_string()));
        }

        Ok((airports, resolved))
    }

    async fn execute(
        &self,
        plan: &TripPlan,
        airports: Vec<Airport>,
        options: ResolvedOptions,
        mode: Mode,
        cancel: &CancellationToken,
        observer: Arc<dyn SearchObserver>,
    ) -> Result<Vec<FlightDeal>, ScoutError> {
        let trips = match self.today {
            Some(today) => generate_trips(plan, today),
            None => upcoming_trips(plan),
        };

        let units: Vec<(Airport, TripWindow)> = airports
            .iter()
            .flat_map(|airport| trips.iter().map(move |trip| (airport.clone(), *trip)))
            .collect();
        let total = units.len();

        if total == 0 {
            report(&*observer, "No trip windows in range".to_string());
            return Ok(Vec::new());
        }
        report(
            &*observer,
            format!("{} trips from {} airport(s)", trips.len(), airports.len()),
        );

        let worker = Arc::new(UnitWorker {
            search: self.search.clone(),
            site_url: self.site_url.clone(),
            catalog: self.catalog.clone(),
            identity: self.identity.clone(),
            funnel: self.funnel.clone(),
            resolver: self.resolver.clone(),
            options,
            mode,
            cancel: cancel.clone(),
            observer: observer.clone(),
        });

        let semaphore = Arc::new(Semaphore::new(self.search.max_workers.max(1)));
        let mut tasks = JoinSet::new();
        for (airport, trip) in units {
            let worker = worker.clone();
            let semaphore = semaphore.clone();
            tasks.spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return UnitOutcome::default();
                };
                worker.run_unit(airport, trip).await
            });
        }

        let mut deals = Vec::new();
        let mut completed = 0;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(outcome) => {
                    deals.extend(outcome.deals);
                    if outcome.completed {
                        completed += 1;
                        observer.on_progress(completed, total);
                    }
                }
                Err(e) => {
                    error!("Trip unit aborted: {}", e);
                    metrics::UNITS_COMPLETED.with_label_values(&["failed"]).inc();
                }
            }
        }

        deals.sort_by(|a, b| a.price.total_cmp(&b.price));
        info!(
            deals = deals.len(),
            cancelled = cancel.is_cancelled(),
            "Search finished"
        );
        Ok(deals)
    }
}

fn report(observer: &dyn SearchObserver, message: String) {
    info!("{}", message);
    observer.on_status(&message);
}

/// Everything one unit needs, shared read-only across units.
struct UnitWorker {
    search: SearchConfig,
    site_url: String,
    catalog: Arc<CityCatalog>,
    identity: Arc<IdentityManager>,
    funnel: CandidateFunnel,
    resolver: DetailResolver,
    options: ResolvedOptions,
    mode: Mode,
    cancel: CancellationToken,
    observer: Arc<dyn SearchObserver>,
}

/// What a unit hands back to the orchestrator.
#[derive(Default)]
struct UnitOutcome {
    deals: Vec<FlightDeal>,
    /// Ran to the end, not cut short by cancellation or a failure.
    completed: bool,
}

/// Per-unit state; owned by exactly one task.
struct UnitRun<'a> {
    airport: &'a Airport,
    trip: TripWindow,
    state: SessionState,
    criteria: ResolveCriteria,
    deals: Vec<FlightDeal>,
}

impl UnitRun<'_> {
    fn label(&self) -> String {
        format!("{} {}", self.airport.name, self.trip)
    }
}

impl UnitWorker {
    async fn run_unit(&self, airport: Airport, trip: TripWindow) -> UnitOutcome {
        if self.cancel.is_cancelled() {
            metrics::UNITS_COMPLETED.with_label_values(&["cancelled"]).inc();
            return UnitOutcome::default();
        }

        let state = match self.identity.acquire(&self.cancel).await {
            Ok(state) => state,
            Err(SessionError::Cancelled) => {
                metrics::UNITS_COMPLETED.with_label_values(&["cancelled"]).inc();
                return UnitOutcome::default();
            }
            Err(e) => {
                warn!(airport = %airport.code, trip = %trip, error = %e, "Could not open a session");
                metrics::UNITS_COMPLETED.with_label_values(&["failed"]).inc();
                return UnitOutcome::default();
            }
        };

        let criteria = ResolveCriteria {
            adults: self.options.adults,
            max_price: self.options.max_price,
            min_departure_hour: self
                .search
                .min_departure_hour_for(self.options.min_departure_hour, trip.departure),
            max_return_hour: self.options.max_return_hour,
        };

        let mut run = UnitRun {
            airport: &airport,
            trip,
            state,
            criteria,
            deals: Vec::new(),
        };

        let result = match &self.mode {
            Mode::Discovery(exclusions) => self.discover(&mut run, exclusions).await,
            Mode::Targeted(cities) => self.targeted(&mut run, cities).await,
        };

        let outcome = match result {
            Ok(()) => "ok",
            Err(SessionError::Cancelled) => {
                debug!(trip = %run.label(), "Unit cancelled");
                "cancelled"
            }
            Err(e) => {
                warn!(trip = %run.label(), error = %e, "Unit stopped early");
                "failed"
            }
        };
        metrics::UNITS_COMPLETED.with_label_values(&[outcome]).inc();

        debug!(trip = %run.label(), deals = run.deals.len(), "Unit finished");
        UnitOutcome {
            deals: run.deals,
            completed: outcome == "ok",
        }
    }

    async fn discover(&self, run: &mut UnitRun<'_>, exclusions: &Exclusions) -> Result<(), SessionError> {
        let label = run.label();
        let countries = self
            .funnel
            .countries(
                &mut run.state,
                run.airport,
                &run.trip,
                run.criteria.adults,
                run.criteria.max_price,
                exclusions,
                &self.cancel,
            )
            .await?;

        if countries.is_empty() {
            let message = if run.state.is_blocked() {
                format!("{}: blocked during country search", label)
            } else {
                format!("{}: no countries under {:.0} EUR", label, run.criteria.max_price)
            };
            report(&*self.observer, message);
            return Ok(());
        }
        report(
            &*self.observer,
            format!(
                "{}: {} countries under {:.0} EUR",
                label,
                countries.len(),
                run.criteria.max_price
            ),
        );

        for (i, country) in countries.iter().enumerate() {
            if self.cancel.is_cancelled() {
                return Err(SessionError::Cancelled);
            }
            if i > 0 {
                pause(Duration::from_millis(self.search.country_pause_ms), &self.cancel).await?;
            }

            let cities = match self
                .funnel
                .cities(
                    &mut run.state,
                    run.airport,
                    country,
                    &run.trip,
                    run.criteria.adults,
                    run.criteria.max_price,
                    &self.cancel,
                )
                .await
            {
                Ok(cities) => cities,
                Err(SessionError::Cancelled) => return Err(SessionError::Cancelled),
                Err(e) => {
                    warn!(trip = %label, country = %country.name, error = %e, "Skipping country");
                    continue;
                }
            };

            // Backoff already exhausted on this identity; keep what was found.
            if run.state.is_blocked() {
                report(
                    &*self.observer,
                    format!("{}: blocked during city search in {}", label, country.name),
                );
                return Ok(());
            }

            for (j, city) in cities.iter().enumerate() {
                if self.cancel.is_cancelled() {
                    return Err(SessionError::Cancelled);
                }
                if j > 0 {
                    pause(Duration::from_millis(self.search.city_pause_ms), &self.cancel).await?;
                }
                report(
                    &*self.observer,
                    format!(
                        "{}: {} ({}/{}) in {}",
                        label,
                        city.name,
                        j + 1,
                        cities.len(),
                        country.name
                    ),
                );

                let resolution = match self
                    .resolver
                    .resolve(
                        &mut run.state,
                        run.airport,
                        &city.entity_id,
                        &run.trip,
                        &run.criteria,
                        &self.cancel,
                    )
                    .await
                {
                    Ok(resolution) => resolution,
                    Err(SessionError::Cancelled) => return Err(SessionError::Cancelled),
                    Err(e) => {
                        warn!(trip = %label, city = %city.name, error = %e, "Skipping city");
                        continue;
                    }
                };

                let deal = match resolution {
                    Resolution::Found(flight) => self.confirmed_deal(run, city, flight),
                    Resolution::Blocked => match self.search.blocked_fallback {
                        BlockedFallback::AcceptDegraded => {
                            report(
                                &*self.observer,
                                format!("{}: {} blocked, using quoted price", label, city.name),
                            );
                            self.degraded_deal(run, city)
                        }
                        BlockedFallback::DropCity => {
                            report(
                                &*self.observer,
                                format!("{}: {} blocked, skipped", label, city.name),
                            );
                            continue;
                        }
                    },
                    Resolution::NoMatch => continue,
                };
                self.emit(run, deal)?;
            }
        }
        Ok(())
    }

    async fn targeted(&self, run: &mut UnitRun<'_>, cities: &[CityInfo]) -> Result<(), SessionError> {
        let label = run.label();

        for (j, city) in cities.iter().enumerate() {
            if self.cancel.is_cancelled() {
                return Err(SessionError::Cancelled);
            }
            if j > 0 {
                pause(Duration::from_millis(self.search.city_pause_ms), &self.cancel).await?;
            }
            report(
                &*self.observer,
                format!("{}: {} ({}/{})", label, city.name, j + 1, cities.len()),
            );

            let resolution = match self
                .resolver
                .resolve(
                    &mut run.state,
                    run.airport,
                    &city.entity_id,
                    &run.trip,
                    &run.criteria,
                    &self.cancel,
                )
                .await
            {
                Ok(resolution) => resolution,
                Err(SessionError::Cancelled) => return Err(SessionError::Cancelled),
                Err(e) => {
                    warn!(trip = %label, city = %city.name, error = %e, "Skipping city");
                    continue;
                }
            };

            match resolution {
                Resolution::Found(flight) => {
                    let candidate = CityCandidate {
                        name: city.name.clone(),
                        entity_id: city.entity_id.clone(),
                        sky_code: Some(city.sky_code.clone()),
                        country: city.country.clone(),
                        price: flight.price,
                        direct: flight.is_direct,
                        coordinates: Some((city.latitude, city.longitude)),
                    };
                    let deal = self.confirmed_deal(run, &candidate, flight);
                    self.emit(run, deal)?;
                }
                Resolution::Blocked => report(
                    &*self.observer,
                    format!("{}: {} blocked, no quote to fall back on", label, city.name),
                ),
                Resolution::NoMatch => {}
            }
        }
        Ok(())
    }

    /// Hand a deal to the observer unless the search was cancelled.
    fn emit(&self, run: &mut UnitRun<'_>, deal: FlightDeal) -> Result<(), SessionError> {
        if self.cancel.is_cancelled() {
            return Err(SessionError::Cancelled);
        }

        let source = if deal.is_degraded() {
            "degraded"
        } else if deal.early_departure {
            "early"
        } else {
            "confirmed"
        };
        metrics::DEALS_EMITTED.with_label_values(&[source]).inc();

        debug!(city = %deal.city, price = deal.price, source, "Deal found");
        self.observer.on_deal(&deal);
        run.deals.push(deal);
        Ok(())
    }

    fn base_deal(&self, run: &UnitRun<'_>, city: &CityCandidate) -> FlightDeal {
        let sky_code = city
            .sky_code
            .clone()
            .or_else(|| self.catalog.city(&city.name).map(|c| c.sky_code.clone()))
            .unwrap_or_else(|| city.entity_id.clone());
        let (latitude, longitude) = city
            .coordinates
            .or_else(|| self.catalog.coordinates(&city.name))
            .unwrap_or((0.0, 0.0));

        FlightDeal {
            city: city.name.clone(),
            country: city.country.clone(),
            price: city.price,
            departure_date: run.trip.departure,
            return_date: run.trip.return_date,
            flight_time: UNKNOWN_TIME.to_string(),
            return_time: UNKNOWN_TIME.to_string(),
            is_direct: city.direct,
            url: booking_url(
                &self.site_url,
                &run.airport.code,
                &sky_code,
                &run.trip,
                run.criteria.adults,
                run.criteria.min_departure_hour,
            ),
            origin: run.airport.name.clone(),
            latitude,
            longitude,
            early_departure: false,
            alternatives: Vec::new(),
        }
    }

    fn confirmed_deal(&self, run: &UnitRun<'_>, city: &CityCandidate, flight: ResolvedFlight) -> FlightDeal {
        FlightDeal {
            price: flight.price,
            flight_time: flight.time,
            return_time: flight.return_time,
            is_direct: flight.is_direct,
            early_departure: flight.early_departure,
            alternatives: flight.alternatives,
            ..self.base_deal(run, city)
        }
    }

    /// Deal priced from the phase-2 quote when the detail lookup was blocked.
    fn degraded_deal(&self, run: &UnitRun<'_>, city: &CityCandidate) -> FlightDeal {
        self.base_deal(run, city)
    }
}
