//! Conversation service for rubber-soul.
//!
//! This crate provides:
//!
//! - **Conversation Store**: live conversations, their history and session
//!   settings, behind the injectable [`ConversationStore`] trait
//! - **Message Relay**: one user utterance in, one assistant utterance out,
//!   with the model fallback in between

pub mod conversation;
pub mod error;
pub mod message;
pub mod relay;
pub mod session;
pub mod store;

pub use conversation::Conversation;
pub use error::{RelayError, StoreError};
pub use message::{Message, MessageRole};
pub use relay::{MessageRelay, RelayReply};
pub use session::{Footnotes, SessionPatch, SessionSettings};
pub use store::{ConversationStore, MemoryConversationStore};
