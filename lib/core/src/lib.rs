//! Core types shared by the rubber-soul crates.
//!
//! This crate provides the strongly-typed identifiers and the error
//! handling alias used throughout the conversation relay.

pub mod error;
pub mod id;

pub use error::Result;
pub use id::{ConversationId, MessageId, ParseIdError};
