//! Use cases
//!
//! Application-level operations that orchestrate domain logic.

pub mod load_history;
pub mod submit_message;

#[cfg(test)]
pub(crate) mod testing;
