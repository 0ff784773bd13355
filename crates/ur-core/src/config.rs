//! Engine configuration

use serde::{Deserialize, Serialize};

/// Tunables for [`UserRules`](crate::engine::UserRules).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Also consult rules scoped to parent domains of the page host.
    ///
    /// Off by default: a rule for `example.com` then does not apply on
    /// `mail.example.com`.
    pub subdomain_fallback: bool,
}

impl EngineConfig {
    pub fn with_subdomain_fallback(mut self, enabled: bool) -> Self {
        self.subdomain_fallback = enabled;
        self
    }
}
