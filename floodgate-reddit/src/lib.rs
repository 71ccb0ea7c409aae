//! Thin Reddit HTTP adapter: submission stream polling, inbox commands,
//! wiki-hosted policy documents and the moderation action transport.

mod client;
mod model;

pub use client::{RedditClient, fullname};
pub use model::Moderator;
