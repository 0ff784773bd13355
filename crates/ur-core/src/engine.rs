//! User rules engine
//!
//! Owns the in-memory filter index and keeps it in step with the
//! persistence collaborator. Construct it once at startup with
//! [`UserRules::load`] and share it (for example through an `Arc`) with the
//! request interception threads; no query can run before loading finished
//! because the engine does not exist until then.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::slice;

use log::{debug, warn};
use parking_lot::Mutex;

use crate::builder::page_allow_filter;
use crate::config::EngineConfig;
use crate::container::{FilterContainer, GLOBAL_SCOPE};
use crate::error::Result;
use crate::filter::Filter;
use crate::host::{extract_host, fold_case, host_suffixes};
use crate::repository::RuleRepository;
use crate::types::{ContentRequest, Decision};

/// Number of mutation locks; scopes share them by hash.
const SCOPE_LOCK_STRIPES: usize = 16;

/// Per-request decision engine for user-created block/allow rules.
pub struct UserRules<R> {
    container: FilterContainer,
    repository: R,
    config: EngineConfig,
    scope_locks: [Mutex<()>; SCOPE_LOCK_STRIPES],
}

impl<R: RuleRepository> UserRules<R> {
    /// Load every persisted rule and build the index.
    ///
    /// Blocks for the duration of the repository read.
    pub fn load(repository: R, config: EngineConfig) -> Result<Self> {
        let rules = repository.get_all_rules()?;
        let container = FilterContainer::new();
        let total = rules.len();
        let mut duplicates = 0usize;
        for filter in rules {
            if !container.add(filter) {
                duplicates += 1;
            }
        }
        debug!(
            "loaded {} user rules in {} scopes ({} duplicates skipped)",
            total - duplicates,
            container.scope_count(),
            duplicates
        );

        Ok(Self {
            container,
            repository,
            config,
            scope_locks: std::array::from_fn(|_| Mutex::new(())),
        })
    }

    pub fn repository(&self) -> &R {
        &self.repository
    }

    /// Decide one request. Never fails; no applicable rule is `Undecided`.
    pub fn get_response(&self, request: &ContentRequest<'_>) -> Decision {
        if !self.config.subdomain_fallback {
            return self.container.get(request).into();
        }

        let response = request.with_folded_hosts(|request| {
            host_suffixes(request.page_host)
                .find_map(|scope| self.container.get_in_scope(scope, request))
                .or_else(|| self.container.get_in_scope(GLOBAL_SCOPE, request))
        });
        response.into()
    }

    /// Add a rule to the index and to storage.
    ///
    /// Returns `false` if the rule already existed. If storage fails the
    /// index is rolled back and the error is returned.
    pub fn add_user_rule(&self, filter: Filter) -> Result<bool> {
        let _guard = self.scope_lock(filter.scope()).lock();

        if !self.container.add(filter.clone()) {
            return Ok(false);
        }

        if let Err(err) = self.repository.add_rules(slice::from_ref(&filter)) {
            warn!("rolling back user rule for scope '{}': {}", filter.scope(), err);
            self.container.remove(&filter);
            return Err(err.into());
        }

        Ok(true)
    }

    /// Remove a rule from the index and from storage.
    ///
    /// Returns `false` if the rule was not in the index; storage is still
    /// asked to delete it so stale records get cleaned up. If storage fails
    /// the rule is put back where it was.
    pub fn remove_user_rule(&self, filter: &Filter) -> Result<bool> {
        let _guard = self.scope_lock(filter.scope()).lock();

        let index = self.container.remove_entry(filter);

        if let Err(err) = self.repository.remove_rule(filter) {
            warn!("restoring user rule for scope '{}': {}", filter.scope(), err);
            if let Some(index) = index {
                self.container.restore(filter.clone(), index);
            }
            return Err(err.into());
        }

        Ok(index.is_some())
    }

    /// Is the page at `url` free of a user rule blocking its document?
    ///
    /// Pages without a host, and pages no rule speaks about, count as
    /// allowed.
    pub fn is_allowed(&self, url: &str) -> bool {
        !self.page_decision(url).is_block()
    }

    /// Does a user rule explicitly allow the page at `url`?
    pub fn is_explicitly_allowed(&self, url: &str) -> bool {
        self.page_decision(url).is_allow()
    }

    /// Turn filtering off for a site by adding its page-wide allow rule.
    pub fn allow_page(&self, page_domain: &str) -> Result<bool> {
        self.add_user_rule(page_allow_filter(page_domain)?)
    }

    /// Remove the page-wide allow rule again.
    pub fn disallow_page(&self, page_domain: &str) -> Result<bool> {
        self.remove_user_rule(&page_allow_filter(page_domain)?)
    }

    /// All rules grouped by scope, global first, each in insertion order.
    pub fn rules(&self) -> Vec<(String, Vec<Filter>)> {
        self.container.snapshot()
    }

    /// Rules of one scope in insertion order.
    pub fn rules_for_scope(&self, scope: &str) -> Vec<Filter> {
        self.container.bucket(&fold_case(scope))
    }

    pub fn len(&self) -> usize {
        self.container.len()
    }

    pub fn is_empty(&self) -> bool {
        self.container.is_empty()
    }

    fn page_decision(&self, url: &str) -> Decision {
        match extract_host(url) {
            Some(host) => self.get_response(&ContentRequest::main_frame(host)),
            None => Decision::Undecided,
        }
    }

    fn scope_lock(&self, scope: &str) -> &Mutex<()> {
        &self.scope_locks[scope_stripe(scope)]
    }
}

fn scope_stripe(scope: &str) -> usize {
    let mut hasher = DefaultHasher::new();
    scope.hash(&mut hasher);
    (hasher.finish() as usize) % SCOPE_LOCK_STRIPES
}
