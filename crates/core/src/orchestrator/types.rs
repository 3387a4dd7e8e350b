//! Requests, events and errors for the search orchestrator.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;

use crate::cache::CacheError;
use crate::catalog::CatalogError;
use crate::deal::FlightDeal;
use crate::schedule::TripPlan;

/// Errors that can occur before a search starts.
///
/// Failures during a search never surface here; they cost the affected city
/// or trip its deals and are logged.
#[derive(Debug, Error)]
pub enum ScoutError {
    /// The request is malformed or names unknown airports.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("cache error: {0}")]
    Cache(#[from] CacheError),
}

/// Per-request overrides shared by both search modes.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SearchOptions {
    /// Origin airport codes; empty means the configured default.
    #[serde(default)]
    pub airports: Vec<String>,
    /// Per-traveller ceiling.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub adults: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_departure_hour: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_return_hour: Option<u32>,
}

/// Open-ended discovery over every affordable destination.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DiscoveryRequest {
    #[serde(flatten)]
    pub plan: TripPlan,
    #[serde(flatten)]
    pub options: SearchOptions,
    /// Country display names to skip (case-insensitive).
    #[serde(default)]
    pub excluded_countries: Vec<String>,
}

/// Detail lookups for a caller-supplied city list, skipping the funnel.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CitySearchRequest {
    #[serde(flatten)]
    pub plan: TripPlan,
    #[serde(flatten)]
    pub options: SearchOptions,
    /// City names as they appear in the catalog (case-insensitive).
    pub cities: Vec<String>,
}

impl DiscoveryRequest {
    pub fn new(plan: TripPlan) -> Self {
        Self {
            plan,
            options: SearchOptions::default(),
            excluded_countries: Vec::new(),
        }
    }
}

impl CitySearchRequest {
    pub fn new<I, S>(plan: TripPlan, cities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            plan,
            options: SearchOptions::default(),
            cities: cities.into_iter().map(Into::into).collect(),
        }
    }
}

/// Receives results while a search runs.
///
/// Methods are called concurrently from several workers; implementations
/// must synchronize their own state.
pub trait SearchObserver: Send + Sync {
    /// A city resolved into a deal.
    fn on_deal(&self, _deal: &FlightDeal) {}

    /// Human-readable funnel progress.
    fn on_status(&self, _message: &str) {}

    /// A trip unit ran to completion; `completed` counts such units so far.
    ///
    /// Units cut short by cancellation or a failure do not fire, so the last
    /// call of a cancelled search may stop short of `total`. A unit that gave
    /// up after being blocked still counts as completed.
    fn on_progress(&self, _completed: usize, _total: usize) {}
}

/// Observer that ignores everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl SearchObserver for NoopObserver {}

/// Channel form of the observer callbacks.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchEvent {
    Deal(FlightDeal),
    Status(String),
    Progress { completed: usize, total: usize },
}

/// Forwards observer callbacks into an unbounded channel.
///
/// Events sent after the receiver is dropped are discarded.
#[derive(Debug, Clone)]
pub struct ChannelObserver {
    tx: mpsc::UnboundedSender<SearchEvent>,
}

impl ChannelObserver {
    pub fn new(tx: mpsc::UnboundedSender<SearchEvent>) -> Self {
        Self { tx }
    }

    /// Observer plus the receiving end of its channel.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<SearchEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }
}

impl SearchObserver for ChannelObserver {
    fn on_deal(&self, deal: &FlightDeal) {
        let _ = self.tx.send(SearchEvent::Deal(deal.clone()));
    }

    fn on_status(&self, message: &str) {
        let _ = self.tx.send(SearchEvent::Status(message.to_string()));
    }

    fn on_progress(&self, completed: usize, total: usize) {
        let _ = self.tx.send(SearchEvent::Progress { completed, total });
    }
}

/// Fully resolved search parameters for one run.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ResolvedOptions {
    pub adults: u32,
    pub max_price: f64,
    pub min_departure_hour: u32,
    pub max_return_hour: Option<u32>,
}

pub(crate) fn check_plan(plan: &TripPlan) -> Result<(), ScoutError> {
    if plan.range_end < plan.range_start {
        return Err(ScoutError::InvalidRequest(format!(
            "range ends ({}) before it starts ({})",
            plan.range_end, plan.range_start
        )));
    }
    Ok(())
}
