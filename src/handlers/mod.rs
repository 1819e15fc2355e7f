pub mod chat;
pub mod health;
mod helpers;
