//! Core penman library (streaming client, generation session, export, config).

pub mod client;
pub mod config;
pub mod export;
pub mod profile;
pub mod session;
pub mod stream;
