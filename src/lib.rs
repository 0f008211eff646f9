//! Intel Relay - governed access to external threat-intelligence providers
//!
//! Every provider call runs through one orchestration path that applies
//! caching, circuit breaking, rate limiting, policy gates and spend tracking.
//! Vendor responses are reduced to a vendor-neutral [`domain::AbstractedSignal`]
//! before they leave the crate.

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod logging;
pub mod presentation;

pub use config::Config;
pub use logging::init_tracing;
