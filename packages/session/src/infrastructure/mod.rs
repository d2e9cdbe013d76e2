//! Infrastructure layer of the session core.
//!
//! Concrete implementations of the domain traits:
//!
//! - `backend`: `SessionBackend` over HTTP (reqwest) and in memory
//! - `provider`: `MediaProvider` over the kizuna signaling relay (WebSocket)
//!   and an in-process loopback
//! - `media`: virtual capture devices and a headless video surface

pub mod backend;
pub mod media;
pub mod provider;
