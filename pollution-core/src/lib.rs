//! Core library for the `pollution` CLI and server.
//!
//! This crate defines:
//! - Configuration & credentials handling
//! - Clients for the pollution readings API and the description lookup service
//! - The pipeline that aggregates, validates, describes and sorts cities
//!
//! It is used by `pollution-cli`, but can also be reused by other binaries or services.

pub mod aggregator;
pub mod assemble;
pub mod auth;
pub mod cache;
pub mod config;
pub mod describe;
pub mod error;
pub mod model;
pub mod normalize;
pub mod source;

#[cfg(test)]
pub(crate) mod testing;

pub use assemble::{Caches, CitiesService};
pub use config::Config;
pub use error::{AuthError, Error, UpstreamError, ValidationError};
pub use model::{CitiesQuery, CitiesResponse, Country, EnrichedCity};
