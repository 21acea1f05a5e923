//! Message protocol for msgrelay.
//!
//! Every unit flowing through the router is a [`Message`]:
//! - an identifier correlating requests with their responses
//! - an opaque payload
//! - control metadata (the relay flag)

pub mod message;
pub mod types;

pub use message::Message;
pub use types::{Control, MessageId};
