//! Relays the most recently rated level of a GDPS moderation dashboard as JSON.

#[macro_use]
mod macros;

pub mod api;
pub mod config;
pub mod parser;
pub mod pipeline;
pub mod schema;
pub mod server;
