//! Check runner of the guardia monitoring agent
//!
//! A bounded pool of workers pulls checks off a shared queue, runs each check
//! identifier at most once at a time, records per-check runtime statistics and
//! throttles lifecycle logging of frequently run checks.
//!
//! ## Modules
//!
//! - [`check`]: the check contract, runtime aggregates and built-in checks
//! - [`runner`]: worker pool, stats store and running-checks tracker
//! - [`worker`]: per-check execution pipeline and lifecycle logging
//! - [`scheduler`]: fixed-interval feed of the runner queue
//! - [`sender`], [`hostname`]: collaborators used when reporting service checks
//! - `api`: read-only status endpoints (feature `api`)

#[cfg(feature = "api")]
pub mod api;
pub mod check;
pub mod config;
pub mod hostname;
pub mod runner;
pub mod scheduler;
pub mod sender;
pub mod worker;
