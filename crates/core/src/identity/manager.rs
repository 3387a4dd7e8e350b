use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::seq::IndexedRandom;
use rand::Rng;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::{IdentityConfig, PauseRange, UpstreamConfig};
use crate::metrics;
use crate::upstream::{QueryKind, Transport, TransportError, TransportResponse};

use super::session::{SearchIdentity, SessionState};
use super::SessionError;

/// Wait for `duration` unless `cancel` fires first.
pub async fn pause(duration: Duration, cancel: &CancellationToken) -> Result<(), SessionError> {
    if cancel.is_cancelled() {
        return Err(SessionError::Cancelled);
    }
    if duration.is_zero() {
        return Ok(());
    }
    tokio::select! {
        _ = cancel.cancelled() => Err(SessionError::Cancelled),
        _ = tokio::time::sleep(duration) => Ok(()),
    }
}

fn random_pause(range: PauseRange) -> Duration {
    let ms = if range.max_ms > range.min_ms {
        rand::rng().random_range(range.min_ms..=range.max_ms)
    } else {
        range.min_ms
    };
    Duration::from_millis(ms)
}

/// Builds search identities and issues API requests through them.
///
/// Stateless apart from configuration; every piece of mutable session state
/// lives in the caller's [`SessionState`].
pub struct IdentityManager {
    transport: Arc<dyn Transport>,
    upstream: UpstreamConfig,
    config: IdentityConfig,
}

impl IdentityManager {
    pub fn new(
        transport: Arc<dyn Transport>,
        upstream: UpstreamConfig,
        config: IdentityConfig,
    ) -> Self {
        Self {
            transport,
            upstream,
            config,
        }
    }

    pub fn upstream(&self) -> &UpstreamConfig {
        &self.upstream
    }

    /// Random proxy from the pool, avoiding `previous` when there is a choice.
    fn pick_proxy(&self, previous: Option<&str>) -> Option<String> {
        let candidates: Vec<&String> = self
            .config
            .proxies
            .iter()
            .filter(|p| Some(p.as_str()) != previous)
            .collect();

        let pool: Vec<&String> = if candidates.is_empty() {
            self.config.proxies.iter().collect()
        } else {
            candidates
        };
        pool.choose(&mut rand::rng()).map(|p| (*p).clone())
    }

    /// Create a fresh identity and warm up its session.
    ///
    /// Proxy failures during warmup rotate to another proxy, up to
    /// `max_proxy_retries` times. A warmup that still fails is logged and the
    /// session is returned anyway.
    pub async fn acquire(&self, cancel: &CancellationToken) -> Result<SessionState, SessionError> {
        self.acquire_avoiding(None, cancel).await
    }

    /// [`acquire`](Self::acquire), starting on a proxy other than `previous`
    /// when the pool has one.
    pub async fn acquire_avoiding(
        &self,
        previous: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<SessionState, SessionError> {
        let mut identity = SearchIdentity::generate(self.pick_proxy(previous));
        let mut rotations = 0;

        loop {
            if cancel.is_cancelled() {
                return Err(SessionError::Cancelled);
            }

            let session = match self.transport.open_session(identity.proxy.as_deref()) {
                Ok(session) => session,
                Err(e) if identity.proxy.is_some() && rotations < self.config.max_proxy_retries => {
                    warn!(proxy = %identity.proxy_label(), error = %e, "Failed to open proxied session, rotating");
                    rotations += 1;
                    metrics::PROXY_ROTATIONS.inc();
                    identity = SearchIdentity::generate(self.pick_proxy(identity.proxy.as_deref()));
                    continue;
                }
                Err(e) => return Err(SessionError::Transport(e)),
            };
            let state = SessionState::new(identity, session);

            if !self.config.warmup {
                metrics::IDENTITY_ACQUISITIONS
                    .with_label_values(&["skipped"])
                    .inc();
                return Ok(state);
            }

            match self.warmup(&state, cancel).await {
                Ok(()) => {
                    debug!(proxy = %state.identity.proxy_label(), "Session warmed up");
                    metrics::IDENTITY_ACQUISITIONS
                        .with_label_values(&["complete"])
                        .inc();
                    return Ok(state);
                }
                Err(SessionError::Cancelled) => return Err(SessionError::Cancelled),
                Err(SessionError::Transport(e))
                    if e.is_proxy_failure() && rotations < self.config.max_proxy_retries =>
                {
                    warn!(proxy = %state.identity.proxy_label(), error = %e, "Proxy failed during warmup, rotating");
                    rotations += 1;
                    metrics::PROXY_ROTATIONS.inc();
                    identity = SearchIdentity::generate(
                        self.pick_proxy(state.identity.proxy.as_deref()),
                    );
                }
                Err(e) => {
                    warn!(proxy = %state.identity.proxy_label(), error = %e, "Warmup incomplete, continuing without cookies");
                    metrics::IDENTITY_ACQUISITIONS
                        .with_label_values(&["incomplete"])
                        .inc();
                    return Ok(state);
                }
            }
        }
    }

    async fn warmup(&self, state: &SessionState, cancel: &CancellationToken) -> Result<(), SessionError> {
        let headers = state.identity.page_headers(&self.upstream);
        let site = self.upstream.site_url.trim_end_matches('/');

        state.session.get(site, &headers).await?;
        pause(random_pause(self.config.warmup_pause), cancel).await?;

        let search_page = format!("{}{}", site, self.upstream.warmup_path);
        state.session.get(&search_page, &headers).await?;
        pause(random_pause(self.config.warmup_pause), cancel).await?;

        Ok(())
    }

    /// Send one API query through `state`.
    ///
    /// Proxy failures rebuild the session on another proxy (bounded). Denied
    /// responses walk the `backoff_secs` stages, re-acquiring the identity
    /// before each retry. When the stages are exhausted the last denied
    /// response is returned and the state is left marked blocked.
    pub async fn issue(
        &self,
        state: &mut SessionState,
        kind: QueryKind,
        body: &serde_json::Value,
        label: &str,
        cancel: &CancellationToken,
    ) -> Result<TransportResponse, SessionError> {
        let mut proxy_failures = 0;
        let mut stage = 0;

        loop {
            if cancel.is_cancelled() {
                return Err(SessionError::Cancelled);
            }

            let headers = state.identity.api_headers(&self.upstream, kind);
            let started = Instant::now();
            let result = state
                .session
                .post_json(&self.upstream.api_url, &headers, body)
                .await;
            metrics::UPSTREAM_DURATION
                .with_label_values(&[kind.as_str()])
                .observe(started.elapsed().as_secs_f64());

            let response = match result {
                Ok(response) => response,
                Err(e) => {
                    metrics::UPSTREAM_REQUESTS
                        .with_label_values(&[kind.as_str(), "transport_error"])
                        .inc();
                    if e.is_proxy_failure() && proxy_failures < self.config.max_proxy_retries {
                        proxy_failures += 1;
                        warn!(label, proxy = %state.identity.proxy_label(), error = %e, "Proxy failure, rotating identity");
                        metrics::PROXY_ROTATIONS.inc();
                        let failing = state.identity.proxy.clone();
                        *state = self.acquire_avoiding(failing.as_deref(), cancel).await?;
                        continue;
                    }
                    return Err(transport_failure(label, e));
                }
            };

            if !response.is_denied() {
                let outcome = if response.is_success() { "ok" } else { "http_error" };
                metrics::UPSTREAM_REQUESTS
                    .with_label_values(&[kind.as_str(), outcome])
                    .inc();
                state.blocked = false;
                return Ok(response);
            }

            metrics::UPSTREAM_REQUESTS
                .with_label_values(&[kind.as_str(), "denied"])
                .inc();
            metrics::UPSTREAM_DENIED
                .with_label_values(&[kind.as_str()])
                .inc();
            state.blocked = true;

            let Some(&wait_secs) = self.config.backoff_secs.get(stage) else {
                warn!(label, status = response.status, "Still denied after all backoff stages");
                return Ok(response);
            };
            stage += 1;

            info!(label, status = response.status, wait_secs, stage, "Denied by upstream, backing off");
            pause(Duration::from_secs(wait_secs), cancel).await?;
            *state = self.acquire(cancel).await?;
        }
    }
}

fn transport_failure(label: &str, e: TransportError) -> SessionError {
    warn!(label, error = %e, "Request failed");
    SessionError::Transport(e)
}
