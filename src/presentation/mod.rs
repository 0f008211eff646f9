//! Presentation Layer - Web API and HTTP handling
//!
//! This module contains the Axum router, controllers, and API models.

pub mod controllers;
pub mod middleware;
pub mod models;
pub mod routes;


pub use controllers::AppState;
pub use models::*;
pub use routes::{ApiDoc, create_router};
