#![doc(hidden)]
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Core library for repo-pulse
//!
//! This library holds all functionality for the repo-pulse tool, which polls the
//! GitHub API for a catalog of tracked repositories, records point-in-time
//! statistics with deltas against the previous observation, tracks contributors,
//! and rolls raw observations into daily aggregates.
//!
//! # Module Organization
//!
//! - [`commands`]: Command-line interface and orchestration entry points
//! - [`collect`]: Rate limiting, target resolution, collection and aggregation
//! - [`model`]: Persisted record types
//! - [`store`]: Persistence backends

pub type Result<T, E = ohno::AppError> = core::result::Result<T, E>;

#[cfg(any(debug_assertions, test))]
pub mod commands;
#[cfg(not(any(debug_assertions, test)))]
mod commands;

pub mod collect;
pub mod model;
pub mod store;

pub use crate::commands::{Host, run};
