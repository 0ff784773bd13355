//! User Rules Storage
//!
//! Durable [`RuleRepository`](ur_core::RuleRepository) implementations.
//! The rule file is a small versioned JSON document rewritten atomically on
//! every change.

pub mod error;
pub mod file;

pub use error::StoreError;
pub use file::{JsonFileRepository, FORMAT_VERSION};
