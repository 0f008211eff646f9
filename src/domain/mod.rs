//! Domain Layer - Core types and vendor-neutral threat abstraction
//!
//! This module contains the value objects and entities shared by every provider
//! integration, the abstraction layer that reduces raw vendor indicators to
//! generic categories, and the compliance sanitizer that guards its output.

pub mod abstraction;
pub mod compliance;
pub mod entities;
pub mod errors;
pub mod validation;
pub mod value_objects;

pub use abstraction::*;
pub use compliance::*;
pub use entities::*;
pub use errors::*;
pub use value_objects::*;
