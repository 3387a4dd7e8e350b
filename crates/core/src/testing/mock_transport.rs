//! Scripted upstream for testing.

use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::upstream::{
    Headers, QueryKind, Transport, TransportError, TransportResponse, TransportSession,
};

/// A recorded request for test assertions.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    /// "GET" or "POST".
    pub method: String,
    pub url: String,
    /// Proxy the session was opened with.
    pub proxy: Option<String>,
    /// Query kind for API calls; `None` for page loads.
    pub kind: Option<QueryKind>,
    /// Destination entity of the outbound leg.
    pub destination: Option<String>,
    /// Outbound date.
    pub departure: Option<NaiveDate>,
    /// `x-skyscanner-viewid` header, identifying the identity used.
    pub view_id: Option<String>,
    pub headers: Headers,
}

#[derive(Default)]
struct MockState {
    everywhere: Option<String>,
    everywhere_by_date: HashMap<NaiveDate, String>,
    countries: HashMap<String, String>,
    details: HashMap<String, String>,
    blocked_dates: HashSet<NaiveDate>,
    denied_cities: HashSet<String>,
    denied_kinds: HashSet<QueryKind>,
    deny_remaining: u32,
    failing_proxies: HashSet<String>,
    latency: Duration,
    requests: Vec<RecordedRequest>,
}

/// Mock implementation of the Transport trait.
///
/// Provides controllable behavior for testing:
/// - Scripted bodies per query kind and destination
/// - Denied (403) responses per departure date, per query kind, per city, or for the next N calls
/// - Proxy endpoints that always fail
/// - Recorded requests for assertions
///
/// Page loads always succeed unless the proxy fails. Unscripted API queries
/// return `200 {}`.
///
/// # Example
///
/// ```rust,ignore
/// use flightscout_core::testing::{fixtures, MockTransport};
///
/// let transport = MockTransport::new();
/// transport
///     .set_everywhere(fixtures::everywhere_response(&[("Italien", "29475437", 60.0)]))
///     .await;
/// transport.block_date(NaiveDate::from_ymd_opt(2026, 1, 16).unwrap()).await;
/// ```
#[derive(Clone, Default)]
pub struct MockTransport {
    state: Arc<RwLock<MockState>>,
}

impl std::fmt::Debug for MockTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockTransport")
            .field("state", &"<state>")
            .finish()
    }
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Body for every everywhere query without a date-specific body.
    pub async fn set_everywhere(&self, body: String) {
        self.state.write().await.everywhere = Some(body);
    }

    /// Body for everywhere queries departing on `date`.
    pub async fn set_everywhere_for(&self, date: NaiveDate, body: String) {
        self.state.write().await.everywhere_by_date.insert(date, body);
    }

    /// Body for country queries to `country_entity`.
    pub async fn set_country(&self, country_entity: &str, body: String) {
        self.state
            .write()
            .await
            .countries
            .insert(country_entity.to_string(), body);
    }

    /// Body for detail queries to `city_entity`.
    pub async fn set_detail(&self, city_entity: &str, body: String) {
        self.state
            .write()
            .await
            .details
            .insert(city_entity.to_string(), body);
    }

    /// Deny every API query departing on `date`.
    pub async fn block_date(&self, date: NaiveDate) {
        self.state.write().await.blocked_dates.insert(date);
    }

    /// Deny every detail query to `city_entity`.
    pub async fn deny_city(&self, city_entity: &str) {
        self.state
            .write()
            .await
            .denied_cities
            .insert(city_entity.to_string());
    }

    /// Deny every API query of `kind`.
    pub async fn deny_kind(&self, kind: QueryKind) {
        self.state.write().await.denied_kinds.insert(kind);
    }

    /// Deny the next `count` API queries.
    pub async fn deny_next(&self, count: u32) {
        self.state.write().await.deny_remaining = count;
    }

    /// Fail every request made through `proxy`.
    pub async fn fail_proxy(&self, proxy: &str) {
        self.state
            .write()
            .await
            .failing_proxies
            .insert(proxy.to_string());
    }

    /// Delay every response.
    pub async fn set_latency(&self, latency: Duration) {
        self.state.write().await.latency = latency;
    }

    /// Get all recorded requests, page loads included.
    pub async fn recorded_requests(&self) -> Vec<RecordedRequest> {
        self.state.read().await.requests.clone()
    }

    /// Recorded API queries of one kind.
    pub async fn api_requests(&self, kind: QueryKind) -> Vec<RecordedRequest> {
        self.state
            .read()
            .await
            .requests
            .iter()
            .filter(|r| r.kind == Some(kind))
            .cloned()
            .collect()
    }

    /// Number of API queries (page loads excluded).
    pub async fn api_request_count(&self) -> usize {
        self.state
            .read()
            .await
            .requests
            .iter()
            .filter(|r| r.kind.is_some())
            .count()
    }

    /// Clear recorded requests.
    pub async fn clear_requests(&self) {
        self.state.write().await.requests.clear();
    }
}

impl Transport for MockTransport {
    fn name(&self) -> &str {
        "mock"
    }

    fn open_session(
        &self,
        proxy: Option<&str>,
    ) -> Result<Box<dyn TransportSession>, TransportError> {
        Ok(Box::new(MockSession {
            state: self.state.clone(),
            proxy: proxy.map(String::from),
        }))
    }
}

struct MockSession {
    state: Arc<RwLock<MockState>>,
    proxy: Option<String>,
}

fn header_value(headers: &Headers, name: &str) -> Option<String> {
    headers
        .iter()
        .find(|(n, _)| n == name)
        .map(|(_, v)| v.clone())
}

fn leg_date(dates: &Value) -> Option<NaiveDate> {
    let field = |name: &str| {
        dates[name]
            .as_i64()
            .or_else(|| dates[name].as_str().and_then(|s| s.parse().ok()))
    };
    NaiveDate::from_ymd_opt(
        field("year")? as i32,
        field("month")? as u32,
        field("day")? as u32,
    )
}

fn classify(body: &Value) -> (QueryKind, Option<String>, Option<NaiveDate>) {
    let leg = &body["legs"][0];
    let destination = &leg["legDestination"];

    let kind = if destination["@type"] == "everywhere" {
        QueryKind::Everywhere
    } else if leg["dates"]["day"].is_string() {
        QueryKind::Detail
    } else {
        QueryKind::Country
    };

    (
        kind,
        destination["entityId"].as_str().map(String::from),
        leg_date(&leg["dates"]),
    )
}

impl MockSession {
    /// Record the request and apply latency; returns the proxy failure if any.
    async fn enter(&self, request: RecordedRequest) -> Result<(), TransportError> {
        let latency = {
            let mut state = self.state.write().await;
            state.requests.push(request);
            state.latency
        };
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        let failing = match &self.proxy {
            Some(proxy) => self.state.read().await.failing_proxies.contains(proxy),
            None => false,
        };
        if failing {
            return Err(TransportError::Proxy(
                "unsuccessful tunnel (mock)".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl TransportSession for MockSession {
    async fn get(&self, url: &str, headers: &Headers) -> Result<TransportResponse, TransportError> {
        self.enter(RecordedRequest {
            method: "GET".to_string(),
            url: url.to_string(),
            proxy: self.proxy.clone(),
            kind: None,
            destination: None,
            departure: None,
            view_id: None,
            headers: headers.clone(),
        })
        .await?;

        Ok(TransportResponse::new(200, "<html></html>"))
    }

    async fn post_json(
        &self,
        url: &str,
        headers: &Headers,
        body: &Value,
    ) -> Result<TransportResponse, TransportError> {
        let (kind, destination, departure) = classify(body);
        self.enter(RecordedRequest {
            method: "POST".to_string(),
            url: url.to_string(),
            proxy: self.proxy.clone(),
            kind: Some(kind),
            destination: destination.clone(),
            departure,
            view_id: header_value(headers, "x-skyscanner-viewid"),
            headers: headers.clone(),
        })
        .await?;

        let mut state = self.state.write().await;

        if state.denied_kinds.contains(&kind)
            || departure.is_some_and(|d| state.blocked_dates.contains(&d))
        {
            return Ok(TransportResponse::new(403, "blocked"));
        }
        if state.deny_remaining > 0 {
            state.deny_remaining -= 1;
            return Ok(TransportResponse::new(403, "blocked"));
        }

        let destination = destination.unwrap_or_default();
        let body = match kind {
            QueryKind::Everywhere => departure
                .and_then(|d| state.everywhere_by_date.get(&d))
                .or(state.everywhere.as_ref())
                .cloned(),
            QueryKind::Country => state.countries.get(&destination).cloned(),
            QueryKind::Detail => {
                if state.denied_cities.contains(&destination) {
                    return Ok(TransportResponse::new(429, "rate limited"));
                }
                state.details.get(&destination).cloned()
            }
        };

        Ok(TransportResponse::new(200, body.unwrap_or_else(|| "{}".to_string())))
    }
}
