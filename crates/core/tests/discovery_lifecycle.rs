//! Discovery lifecycle integration tests.
//!
//! These tests drive the full engine against the scripted upstream:
//! warmup -> everywhere query -> country queries -> detail queries -> deals

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{NaiveDate, Weekday};
use tokio_util::sync::CancellationToken;

use flightscout_core::{
    config::HolidayRange,
    testing::{fixtures, MockTransport, RecordingObserver},
    upstream::QueryKind,
    BlockedFallback, Config, DiscoveryRequest, FlightScout, NoopObserver, ScoutError, TripPlan,
    UNKNOWN_TIME,
};

const ITALY: &str = "29475437";
const SPAIN: &str = "29475436";
const ROME: &str = "27539793";
const BARCELONA: &str = "27548283";

fn date(m: u32, d: u32) -> NaiveDate {
    fixtures::date(2026, m, d)
}

/// Fridays 2026-01-09 and 2026-01-16, two nights each.
fn two_weekends() -> TripPlan {
    TripPlan {
        range_start: date(1, 5),
        range_end: date(1, 18),
        weekday: Weekday::Fri,
        duration_days: 2,
    }
}

/// Test helper wiring a scripted upstream with two affordable countries.
struct TestHarness {
    transport: MockTransport,
}

impl TestHarness {
    async fn new() -> Self {
        let transport = MockTransport::new();
        transport
            .set_everywhere(fixtures::everywhere_response(&[
                ("Italien", ITALY, 60.0),
                ("Spanien", SPAIN, 50.0),
                ("Island", "29475414", 300.0),
            ]))
            .await;
        transport
            .set_country(
                ITALY,
                fixtures::country_response(&[("Rom", ROME, "rome", 45.0)]),
            )
            .await;
        transport
            .set_country(
                SPAIN,
                fixtures::country_response(&[("Barcelona", BARCELONA, "barc", 40.0)]),
            )
            .await;

        let window = flightscout_core::TripWindow::new(date(1, 9), 2);
        transport
            .set_detail(
                ROME,
                fixtures::detail_response(
                    &window,
                    &[
                        (55.0, "18:30", "21:00", true),
                        (65.0, "19:45", "20:15", false),
                        (30.0, "06:00", "07:00", true),
                    ],
                ),
            )
            .await;
        // Barcelona has no detail body: the upstream offers nothing concrete.

        Self { transport }
    }

    fn scout(&self) -> FlightScout {
        fixtures::scout(&self.transport).with_today(date(1, 1))
    }

    fn scout_with(&self, config: &Config) -> FlightScout {
        fixtures::scout_with_config(&self.transport, config).with_today(date(1, 1))
    }
}

#[tokio::test]
async fn test_discovery_streams_deals_and_progress() {
    let harness = TestHarness::new().await;
    let scout = harness.scout();
    let observer = Arc::new(RecordingObserver::new());

    let deals = scout
        .run(
            &DiscoveryRequest::new(two_weekends()),
            &CancellationToken::new(),
            observer.clone(),
        )
        .await
        .unwrap();

    assert_eq!(deals.len(), 2);
    for deal in &deals {
        assert_eq!(deal.city, "Rom");
        assert_eq!(deal.country, "Italien");
        assert_eq!(deal.price, 55.0);
        assert_eq!(deal.flight_time, "18:30");
        assert_eq!(deal.return_time, "21:00");
        assert!(deal.is_direct);
        assert!(!deal.early_departure);
        assert_eq!(deal.origin, "Wien");
        assert_eq!(deal.alternatives.len(), 1);
        assert_eq!(deal.alternatives[0].price, 65.0);
        // Coordinates come from the catalog when the upstream omits them.
        assert_eq!((deal.latitude, deal.longitude), (41.9028, 12.4964));
        assert!(deal.url.contains("/vie/rome/"));
        assert!(deal.url.ends_with("departure-times=840-1439"));
    }

    let departures: Vec<NaiveDate> = deals.iter().map(|d| d.departure_date).collect();
    assert!(departures.contains(&date(1, 9)));
    assert!(departures.contains(&date(1, 16)));

    assert_eq!(observer.deals().len(), 2);
    assert_eq!(observer.progress().len(), 2);
    assert_eq!(observer.progress().last(), Some(&(2, 2)));
    assert!(observer
        .statuses()
        .iter()
        .any(|s| s.contains("2 countries under 70 EUR")));

    // The expensive country never reaches phase 2.
    let country_queries = harness.transport.api_requests(QueryKind::Country).await;
    assert_eq!(country_queries.len(), 4);
    assert!(country_queries
        .iter()
        .all(|r| r.destination.as_deref() != Some("29475414")));
}

#[tokio::test]
async fn test_price_normalized_by_party_size() {
    let harness = TestHarness::new().await;
    let scout = harness.scout();

    let mut request = DiscoveryRequest::new(two_weekends());
    request.options.adults = Some(2);
    request.options.max_price = Some(70.0);

    let deals = scout
        .run(&request, &CancellationToken::new(), Arc::new(NoopObserver))
        .await
        .unwrap();

    // Totals of 55 and 65 become 27.5 and 32.5 per traveller.
    assert!(!deals.is_empty());
    for deal in &deals {
        assert_eq!(deal.price, 27.5);
        assert!(deal.url.contains("adultsv2=2"));
    }
}

#[tokio::test]
async fn test_blocked_detail_falls_back_to_quoted_price() {
    let harness = TestHarness::new().await;
    harness.transport.deny_city(ROME).await;
    let scout = harness.scout();
    let observer = Arc::new(RecordingObserver::new());

    let deals = scout
        .run(
            &DiscoveryRequest::new(two_weekends()),
            &CancellationToken::new(),
            observer.clone(),
        )
        .await
        .unwrap();

    assert_eq!(deals.len(), 2);
    for deal in &deals {
        assert_eq!(deal.city, "Rom");
        assert_eq!(deal.price, 45.0);
        assert_eq!(deal.flight_time, UNKNOWN_TIME);
        assert_eq!(deal.return_time, UNKNOWN_TIME);
        assert!(deal.is_degraded());
    }
    assert!(observer
        .statuses()
        .iter()
        .any(|s| s.contains("Rom blocked, using quoted price")));
}

#[tokio::test]
async fn test_drop_city_policy_discards_blocked_cities() {
    let harness = TestHarness::new().await;
    harness.transport.deny_city(ROME).await;
    let mut config = fixtures::fast_config();
    config.search.blocked_fallback = BlockedFallback::DropCity;
    let scout = harness.scout_with(&config);

    let deals = scout
        .run(
            &DiscoveryRequest::new(two_weekends()),
            &CancellationToken::new(),
            Arc::new(RecordingObserver::new()),
        )
        .await
        .unwrap();

    assert!(deals.is_empty());
}

#[tokio::test]
async fn test_blocked_trip_does_not_affect_other_trip() {
    let harness = TestHarness::new().await;
    harness.transport.block_date(date(1, 9)).await;
    let scout = harness.scout();
    let observer = Arc::new(RecordingObserver::new());

    let deals = scout
        .run(
            &DiscoveryRequest::new(two_weekends()),
            &CancellationToken::new(),
            observer.clone(),
        )
        .await
        .unwrap();

    assert_eq!(deals.len(), 1);
    assert_eq!(deals[0].departure_date, date(1, 16));
    assert_eq!(deals[0].price, 55.0);
    assert!(observer
        .statuses()
        .iter()
        .any(|s| s.contains("blocked during country search")));
    assert_eq!(observer.progress().last(), Some(&(2, 2)));

    // The blocked unit's identities never served the healthy unit.
    let requests = harness.transport.recorded_requests().await;
    let blocked_views: Vec<_> = requests
        .iter()
        .filter(|r| r.departure == Some(date(1, 9)))
        .filter_map(|r| r.view_id.clone())
        .collect();
    assert!(requests
        .iter()
        .filter(|r| r.departure == Some(date(1, 16)))
        .filter_map(|r| r.view_id.as_ref())
        .all(|v| !blocked_views.contains(v)));
}

#[tokio::test]
async fn test_cancellation_stops_further_deals() {
    let harness = TestHarness::new().await;
    let mut config = fixtures::fast_config();
    config.search.max_workers = 1;
    let scout = harness.scout_with(&config);

    let plan = TripPlan {
        range_start: date(1, 5),
        range_end: date(2, 28),
        weekday: Weekday::Fri,
        duration_days: 2,
    };
    let cancel = CancellationToken::new();
    let observer = Arc::new(RecordingObserver::cancel_after_deals(1, cancel.clone()));

    let deals = scout
        .run(&DiscoveryRequest::new(plan), &cancel, observer.clone())
        .await
        .unwrap();

    assert!(cancel.is_cancelled());
    assert_eq!(deals.len(), 1);
    assert_eq!(observer.deals().len(), 1);
    // Only the unit that ran to the end reports progress.
    assert_eq!(observer.progress(), vec![(1, 7)]);
}

#[tokio::test]
async fn test_cancellation_during_request_returns_promptly() {
    let harness = TestHarness::new().await;
    harness.transport.set_latency(Duration::from_millis(300)).await;
    let scout = harness.scout();
    let cancel = CancellationToken::new();
    let observer = Arc::new(RecordingObserver::new());

    // Two page loads take 600ms; cancel while the everywhere query is in flight.
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(750)).await;
        trigger.cancel();
    });

    let started = Instant::now();
    let deals = scout
        .run(&DiscoveryRequest::new(two_weekends()), &cancel, observer.clone())
        .await
        .unwrap();

    // The in-flight request finishes at ~900ms; nothing is issued after it.
    assert!(started.elapsed() < Duration::from_millis(1500));
    assert!(deals.is_empty());
    assert!(observer.deals().is_empty());
    assert!(observer.progress().is_empty());
    assert!(harness
        .transport
        .api_requests(QueryKind::Country)
        .await
        .is_empty());
}

#[tokio::test]
async fn test_city_search_blocking_ends_the_unit() {
    let harness = TestHarness::new().await;
    harness.transport.deny_kind(QueryKind::Country).await;
    harness
        .transport
        .set_everywhere(fixtures::everywhere_response(&[
            ("Italien", ITALY, 60.0),
            ("Spanien", SPAIN, 50.0),
            ("Portugal", "29475417", 55.0),
        ]))
        .await;
    let mut config = fixtures::fast_config();
    config.search.max_workers = 1;
    let scout = harness.scout_with(&config);
    let observer = Arc::new(RecordingObserver::new());

    let plan = TripPlan {
        range_start: date(1, 5),
        range_end: date(1, 11),
        weekday: Weekday::Fri,
        duration_days: 2,
    };
    let deals = scout
        .run(&DiscoveryRequest::new(plan), &CancellationToken::new(), observer.clone())
        .await
        .unwrap();

    assert!(deals.is_empty());
    // One country: the initial attempt plus one per backoff stage.
    let country_queries = harness.transport.api_requests(QueryKind::Country).await;
    assert_eq!(country_queries.len(), 3);
    assert!(country_queries
        .iter()
        .all(|r| r.destination.as_deref() == Some(SPAIN)));
    assert!(observer
        .statuses()
        .iter()
        .any(|s| s.contains("blocked during city search in Spanien")));
    assert_eq!(observer.progress(), vec![(1, 1)]);
}

#[tokio::test]
async fn test_phase_one_is_per_departure_date() {
    let harness = TestHarness::new().await;
    harness
        .transport
        .set_everywhere_for(
            date(1, 16),
            fixtures::everywhere_response(&[("Spanien", SPAIN, 50.0)]),
        )
        .await;
    let scout = harness.scout();

    let deals = scout
        .run(
            &DiscoveryRequest::new(two_weekends()),
            &CancellationToken::new(),
            Arc::new(RecordingObserver::new()),
        )
        .await
        .unwrap();

    assert_eq!(deals.len(), 1);
    assert_eq!(deals[0].departure_date, date(1, 9));
    let italy_queries: Vec<_> = harness
        .transport
        .api_requests(QueryKind::Country)
        .await
        .into_iter()
        .filter(|r| r.destination.as_deref() == Some(ITALY))
        .collect();
    assert_eq!(italy_queries.len(), 1);
    assert_eq!(italy_queries[0].departure, Some(date(1, 9)));
}

#[tokio::test]
async fn test_cancelled_before_start_returns_nothing() {
    let harness = TestHarness::new().await;
    let scout = harness.scout();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let deals = scout
        .run(
            &DiscoveryRequest::new(two_weekends()),
            &cancel,
            Arc::new(RecordingObserver::new()),
        )
        .await
        .unwrap();

    assert!(deals.is_empty());
    assert_eq!(harness.transport.recorded_requests().await.len(), 0);
}

#[tokio::test]
async fn test_phase_one_cache_shared_across_runs() {
    let harness = TestHarness::new().await;
    let scout = harness.scout();
    let request = DiscoveryRequest::new(two_weekends());

    scout
        .run(&request, &CancellationToken::new(), Arc::new(RecordingObserver::new()))
        .await
        .unwrap();
    assert_eq!(harness.transport.api_requests(QueryKind::Everywhere).await.len(), 2);
    harness.transport.clear_requests().await;

    let deals = scout
        .run(&request, &CancellationToken::new(), Arc::new(RecordingObserver::new()))
        .await
        .unwrap();

    assert_eq!(deals.len(), 2);
    assert!(harness
        .transport
        .api_requests(QueryKind::Everywhere)
        .await
        .is_empty());
    // Phase 2 is never cached.
    assert_eq!(harness.transport.api_requests(QueryKind::Country).await.len(), 4);
}

#[tokio::test]
async fn test_excluded_countries_are_skipped() {
    let harness = TestHarness::new().await;
    let scout = harness.scout();
    let mut request = DiscoveryRequest::new(two_weekends());
    request.excluded_countries = vec!["ITALIEN".to_string()];

    let deals = scout
        .run(&request, &CancellationToken::new(), Arc::new(RecordingObserver::new()))
        .await
        .unwrap();

    assert!(deals.is_empty());
    let country_queries = harness.transport.api_requests(QueryKind::Country).await;
    assert!(country_queries
        .iter()
        .all(|r| r.destination.as_deref() == Some(SPAIN)));
}

#[tokio::test]
async fn test_multiple_origins_are_separate_units() {
    let harness = TestHarness::new().await;
    let scout = harness.scout();
    let observer = Arc::new(RecordingObserver::new());
    let mut request = DiscoveryRequest::new(two_weekends());
    request.options.airports = vec!["vie".to_string(), "BTS".to_string()];

    let deals = scout
        .run(&request, &CancellationToken::new(), observer.clone())
        .await
        .unwrap();

    let bratislava = fixtures::bratislava();
    assert_eq!(deals.len(), 4);
    assert_eq!(deals.iter().filter(|d| d.origin == bratislava.name).count(), 2);
    assert!(deals
        .iter()
        .filter(|d| d.origin == bratislava.name)
        .all(|d| d.url.contains(&format!("/{}/rome/", bratislava.code))));
    assert_eq!(observer.progress().last(), Some(&(4, 4)));
}

#[tokio::test]
async fn test_holiday_relaxes_departure_floor() {
    let harness = TestHarness::new().await;
    let window = flightscout_core::TripWindow::new(date(1, 9), 2);
    harness
        .transport
        .set_detail(
            ROME,
            fixtures::detail_response(&window, &[(35.0, "08:15", "20:00", true)]),
        )
        .await;

    let mut config = fixtures::fast_config();
    config.search.holidays = vec![HolidayRange {
        name: Some("Semesterferien".to_string()),
        start: date(1, 9),
        end: date(1, 11),
        min_departure_hour: 7,
    }];
    let scout = harness.scout_with(&config);

    let deals = scout
        .run(
            &DiscoveryRequest::new(two_weekends()),
            &CancellationToken::new(),
            Arc::new(RecordingObserver::new()),
        )
        .await
        .unwrap();

    let holiday = deals.iter().find(|d| d.departure_date == date(1, 9)).unwrap();
    assert!(!holiday.early_departure);
    assert!(holiday.url.ends_with("departure-times=420-1439"));

    let regular = deals.iter().find(|d| d.departure_date == date(1, 16)).unwrap();
    assert!(regular.early_departure);
    assert_eq!(regular.flight_time, "08:15");
}

#[tokio::test]
async fn test_invalid_requests_rejected() {
    let harness = TestHarness::new().await;
    let scout = harness.scout();
    let cancel = CancellationToken::new();

    let mut unknown_airport = DiscoveryRequest::new(two_weekends());
    unknown_airport.options.airports = vec!["xyz".to_string()];
    let err = scout
        .run(&unknown_airport, &cancel, Arc::new(RecordingObserver::new()))
        .await
        .unwrap_err();
    assert!(matches!(err, ScoutError::InvalidRequest(_)));

    let mut no_adults = DiscoveryRequest::new(two_weekends());
    no_adults.options.adults = Some(0);
    assert!(scout
        .run(&no_adults, &cancel, Arc::new(RecordingObserver::new()))
        .await
        .is_err());

    let inverted = DiscoveryRequest::new(TripPlan {
        range_start: date(2, 1),
        range_end: date(1, 1),
        weekday: Weekday::Fri,
        duration_days: 2,
    });
    assert!(scout
        .run(&inverted, &cancel, Arc::new(RecordingObserver::new()))
        .await
        .is_err());

    assert_eq!(harness.transport.recorded_requests().await.len(), 0);
}

#[tokio::test]
async fn test_past_windows_produce_no_work() {
    let harness = TestHarness::new().await;
    let scout = fixtures::scout(&harness.transport).with_today(date(3, 1));
    let observer = Arc::new(RecordingObserver::new());

    let deals = scout
        .run(
            &DiscoveryRequest::new(two_weekends()),
            &CancellationToken::new(),
            observer.clone(),
        )
        .await
        .unwrap();

    assert!(deals.is_empty());
    assert!(observer.progress().is_empty());
    assert_eq!(observer.statuses(), vec!["No trip windows in range".to_string()]);
}
