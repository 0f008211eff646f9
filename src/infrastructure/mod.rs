//! Infrastructure Layer - External concerns and implementations
//!
//! Provider HTTP clients, caching and durable storage, and the leaf runtime
//! components the call orchestrator composes: circuit breakers, retry, rate
//! limiters, spend tracking, policy gates and the provider registry.

pub mod api_clients;
pub mod cache;
pub mod policy;
pub mod provider_registry;
pub mod rate_limit;
pub mod resilience;
pub mod spend;

pub use api_clients::ProviderAdapter;
pub use cache::*;
pub use policy::{PolicyGate, PolicyGates};
pub use provider_registry::ProviderRegistry;
pub use rate_limit::{MultiWindowLimiter, QueryWindow, TokenBucketLimiter};
pub use resilience::*;
pub use spend::{SpendDecision, SpendRecord, SpendSnapshot, SpendTracker};
