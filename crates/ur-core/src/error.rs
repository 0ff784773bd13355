//! Error types for the user rule engine

use thiserror::Error;

/// Why a filter could not be constructed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MalformedRuleError {
    #[error("Domain constraint requested without a request domain")]
    EmptyDomainConstraint,
    #[error("Invalid page domain: '{0}'")]
    InvalidPageDomain(String),
    #[error("Invalid request domain: '{0}'")]
    InvalidRequestDomain(String),
    #[error("Filter covers no content type")]
    EmptyContentType,
    #[error("Global filter tied to page domain '{0}'")]
    ScopedGlobalFilter(String),
}

/// A fault reported by the persistence collaborator.
#[derive(Debug, Error)]
#[error("Persistence failure: {message}")]
pub struct PersistenceError {
    message: String,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
}

impl PersistenceError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source<E>(message: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Error type for engine operations.
#[derive(Debug, Error)]
pub enum UserRulesError {
    #[error("Malformed rule: {0}")]
    MalformedRule(#[from] MalformedRuleError),
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

pub type Result<T> = std::result::Result<T, UserRulesError>;
