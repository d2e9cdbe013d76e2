//! `SessionBackend` implementations.

pub mod http;
pub mod inmemory;

pub use http::{HttpBackendConfig, HttpSessionBackend};
pub use inmemory::InMemorySessionBackend;
