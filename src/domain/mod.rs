//! Domain layer containing business logic and domain types.
//!
//! # Module Organization
//!
//! - `foundation` - Shared domain primitives (value objects, IDs, errors)
//! - `workout` - Workout observation records and the scraper boundary

pub mod foundation;
pub mod workout;
