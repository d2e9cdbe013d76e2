//! Infrastructure 層

pub mod dto;
pub mod message_pusher;
pub mod repository;
