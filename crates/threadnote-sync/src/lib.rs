//! The sync engine: mirrors a Threads account into a Notion database and
//! keeps engagement metrics current.
//!
//! [`SyncEngine`] is the entry point. Everything else is the machinery it is
//! built from: request pacing, pagination, write retries, schema detection,
//! single-flight coordination, follower caching, and credential rotation.

pub mod engine;
pub mod insights;
pub mod limited;
pub mod paginate;
pub mod properties;
pub mod rate_limit;
pub mod retry;
pub mod schema;
pub mod single_flight;
pub mod token;

pub use engine::{ItemOutcome, RunKind, SyncEngine, SyncPhase, SyncSettings};
pub use insights::{InsightsCache, InsightsReport, Window, FOLLOWER_TTL};
pub use limited::{RateLimitedDestination, RateLimitedSource};
pub use paginate::{collect_all, walk, PageLimits, StopReason};
pub use rate_limit::{ApiKey, RateLimiter};
pub use retry::{retry_with_backoff, RetryPolicy};
pub use schema::{detect, SchemaCache};
pub use single_flight::{KeyedFlight, SingleFlight};
pub use token::{InstallOutcome, TokenManager, TokenState};
