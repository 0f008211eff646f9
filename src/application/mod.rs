//! Application Layer - Call orchestration and provider services
//!
//! The orchestrator composes the infrastructure gates around every outbound
//! provider call. The enrichment service and the adapter runner are the two
//! entry points the presentation layer calls.

pub mod adapters;
pub mod errors;
pub mod orchestrator;
pub mod services;

pub use adapters::AdapterRunner;
pub use errors::*;
pub use orchestrator::{CallOptions, CallOrchestrator, CallOutcome, RuntimeContext};
pub use services::{EnrichmentQuery, EnrichmentService, LookupKind};
