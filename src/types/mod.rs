//! Wire-format request/response types
//!
//! The chat completion shapes follow the OpenAI conventions the original
//! clients of this service already speak; errors use the `{"detail": ...}`
//! envelope.

mod chat;
mod error;
mod info;

pub use chat::*;
pub use error::*;
pub use info::*;
