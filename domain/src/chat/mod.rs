//! Chat domain.
//!
//! - [`entities::Message`]: a persisted chat message
//! - [`entities::ChatId`] / [`entities::Author`]: value objects
//! - [`submission::Submission`]: a validated form submission

pub mod entities;
pub mod submission;
