//! Utilities shared by the kizuna session core, development backend and client.

pub mod api;
pub mod logger;
pub mod time;
