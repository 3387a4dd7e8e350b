//! Search orchestrator.
//!
//! Drives the funnel and resolver over every (origin airport, trip window)
//! unit with a bounded worker pool:
//! - Deals stream to the [`SearchObserver`] one at a time as cities resolve
//! - Status messages report funnel progress
//! - Progress fires once per finished unit
//! - Cancellation is polled before each country, each city and each backoff tick

mod runner;
mod types;

pub use runner::FlightScout;
pub use types::{
    ChannelObserver, CitySearchRequest, DiscoveryRequest, NoopObserver, ScoutError, SearchEvent,
    SearchObserver, SearchOptions,
};
