//! User Rules Core Library
//!
//! This crate provides the dynamic, per-site filtering engine: rules the user
//! creates to block or allow requests on one site or on every site. For each
//! outgoing request it answers block, allow, or undecided; undecided leaves
//! the call to the static filter list engine.
//!
//! # Architecture
//!
//! Rules are atomic [`Filter`] values indexed by scope (the page host, or
//! `""` for global rules). A lookup consults the page's own bucket first and
//! the global bucket second; within a bucket the most recently added
//! eligible filter wins.
//!
//! # Modules
//!
//! - `types`: content types, third-party policy, responses, requests
//! - `filter`: the filter value and its domain constraint
//! - `host`: host validation, extraction and suffix walking
//! - `container`: scope-indexed filter container and matching
//! - `builder`: canonical filters from rule-creation inputs
//! - `repository`: persistence contract
//! - `engine`: the `UserRules` façade
//! - `config`: engine configuration
//! - `error`: error types

pub mod builder;
pub mod config;
pub mod container;
pub mod engine;
pub mod error;
pub mod filter;
pub mod host;
pub mod repository;
pub mod types;

// Re-export commonly used types
pub use builder::{build_filter, page_allow_filter};
pub use config::EngineConfig;
pub use container::FilterContainer;
pub use engine::UserRules;
pub use error::{MalformedRuleError, PersistenceError, Result, UserRulesError};
pub use filter::{DomainConstraint, Filter, FilterShape};
pub use repository::{MemoryRepository, RuleRepository};
pub use types::{ContentRequest, ContentType, Decision, Response, ThirdPartyPolicy};
