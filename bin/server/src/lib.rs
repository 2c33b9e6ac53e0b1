//! rubber-soul HTTP server.
//!
//! This crate provides the JSON API in front of the conversation relay:
//! conversation creation, message sending, history and session settings.

pub mod config;
pub mod error;
pub mod routes;
pub mod state;
pub mod telemetry;
