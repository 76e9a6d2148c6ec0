//! Workout Tracker - gym session capacity tracking
//!
//! Collects scraped snapshots of gym workout sessions, stores them as an
//! append-only observation log in PostgreSQL, serves them over GraphQL and
//! archives every scrape batch to S3 as Parquet.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
