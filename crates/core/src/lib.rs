pub mod cache;
pub mod catalog;
pub mod config;
pub mod deal;
pub mod funnel;
pub mod identity;
pub mod metrics;
pub mod orchestrator;
pub mod resolver;
pub mod schedule;
pub mod testing;
pub mod upstream;

pub use cache::{create_cache, CacheError, CacheKey, MemoryCache, ResultCache, SqliteCache};
pub use catalog::{Airport, CatalogError, CityCatalog, CityInfo};
pub use config::{
    load_config, load_config_from_env, load_config_from_str, validate_config, BlockedFallback,
    CacheBackend, Config, ConfigError, SanitizedConfig,
};
pub use deal::{DealAlternative, FlightDeal, UNKNOWN_TIME};
pub use identity::{IdentityManager, SearchIdentity, SessionError, SessionState};
pub use orchestrator::{
    ChannelObserver, CitySearchRequest, DiscoveryRequest, FlightScout, NoopObserver, ScoutError,
    SearchEvent, SearchObserver, SearchOptions,
};
pub use schedule::{generate_trips, upcoming_trips, TripPlan, TripWindow};
pub use upstream::{ReqwestTransport, Transport, TransportError, TransportSession};
