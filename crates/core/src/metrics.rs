//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Upstream traffic (requests by query kind and outcome, denials)
//! - Identity management (acquisitions, proxy rotations)
//! - Phase-1 cache effectiveness
//! - Search output (deals emitted, trip units completed)

use once_cell::sync::Lazy;
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, TextEncoder,
};

// =============================================================================
// Upstream
// =============================================================================

/// Upstream requests by query kind and outcome.
pub static UPSTREAM_REQUESTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "flightscout_upstream_requests_total",
            "Total requests sent to the flight-search API",
        ),
        &["kind", "outcome"], // outcome: "ok", "denied", "http_error", "transport_error"
    )
    .unwrap()
});

/// Denied (403/429) responses by query kind.
pub static UPSTREAM_DENIED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "flightscout_upstream_denied_total",
            "Total denied responses from the flight-search API",
        ),
        &["kind"],
    )
    .unwrap()
});

/// Upstream request duration in seconds.
pub static UPSTREAM_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "flightscout_upstream_request_duration_seconds",
            "Duration of flight-search API requests",
        )
        .buckets(vec![0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]),
        &["kind"],
    )
    .unwrap()
});

// =============================================================================
// Identity
// =============================================================================

/// Identities acquired (initial and after blocking).
pub static IDENTITY_ACQUISITIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "flightscout_identity_acquisitions_total",
            "Total search identities acquired",
        ),
        &["warmup"], // "complete", "incomplete", "skipped"
    )
    .unwrap()
});

/// Proxy rotations after connectivity failures.
pub static PROXY_ROTATIONS: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "flightscout_proxy_rotations_total",
        "Total proxy rotations after connectivity failures",
    )
    .unwrap()
});

// =============================================================================
// Cache
// =============================================================================

/// Phase-1 cache hits.
pub static CACHE_HITS: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("flightscout_cache_hits_total", "Total phase-1 cache hits").unwrap()
});

/// Phase-1 cache misses (including failed lookups).
pub static CACHE_MISSES: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("flightscout_cache_misses_total", "Total phase-1 cache misses").unwrap()
});

// =============================================================================
// Search output
// =============================================================================

/// Deals emitted by source.
pub static DEALS_EMITTED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("flightscout_deals_emitted_total", "Total deals emitted"),
        &["source"], // "confirmed", "early", "degraded"
    )
    .unwrap()
});

/// Trip units (airport x window) finished.
pub static UNITS_COMPLETED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "flightscout_units_completed_total",
            "Total trip units finished",
        ),
        &["result"], // "ok", "cancelled", "failed"
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        // Upstream
        Box::new(UPSTREAM_REQUESTS.clone()),
        Box::new(UPSTREAM_DENIED.clone()),
        Box::new(UPSTREAM_DURATION.clone()),
        // Identity
        Box::new(IDENTITY_ACQUISITIONS.clone()),
        Box::new(PROXY_ROTATIONS.clone()),
        // Cache
        Box::new(CACHE_HITS.clone()),
        Box::new(CACHE_MISSES.clone()),
        // Output
        Box::new(DEALS_EMITTED.clone()),
        Box::new(UNITS_COMPLETED.clone()),
    ]
}

/// Register the core metrics in a fresh registry and encode them in the text format.
pub fn render_metrics() -> Result<String, prometheus::Error> {
    let registry = prometheus::Registry::new();
    for metric in all_metrics() {
        registry.register(metric)?;
    }

    let mut buffer = Vec::new();
    TextEncoder::new().encode(&registry.gather(), &mut buffer)?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}
