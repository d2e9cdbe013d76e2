//! Terminal harness for the kizuna session core.
//!
//! Joins one channel through a `ConnectionManager`, prints lifecycle events,
//! and accepts `/mic`, `/cam`, `/who`, `/link` and `/leave` from stdin.

pub mod domain;
pub mod error;
mod formatter;
mod runner;
mod session;
mod ui;

pub use runner::{ClientOptions, build_manager, build_request, run_client};
