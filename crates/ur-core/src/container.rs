//! Scope-indexed filter container
//!
//! This is the hot path: every resource load asks it for a decision.
//! Filters live in buckets keyed by page host (`""` for global filters).
//! Each bucket is an immutable `Arc<Vec<Filter>>` that mutations replace
//! copy-on-write, so a lookup works on the buckets as they were when it
//! started and never holds the lock while scanning.

use std::collections::HashMap;
use std::sync::Arc;

use log::{debug, trace};
use parking_lot::RwLock;

use crate::filter::Filter;
use crate::host::fold_case;
use crate::types::{ContentRequest, Response};

/// Key of the global bucket.
pub const GLOBAL_SCOPE: &str = "";

type Bucket = Arc<Vec<Filter>>;

// =============================================================================
// Filter Container
// =============================================================================

/// Index of user filters by scope.
#[derive(Debug, Default)]
pub struct FilterContainer {
    buckets: RwLock<HashMap<String, Bucket>>,
}

impl FilterContainer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a filter into its scope bucket.
    ///
    /// Returns `false` if an identical filter is already present.
    pub fn add(&self, filter: Filter) -> bool {
        let mut buckets = self.buckets.write();
        let bucket = buckets.entry(filter.scope().to_string()).or_default();
        if bucket.contains(&filter) {
            return false;
        }
        debug!("user rule added to scope '{}'", filter.scope());
        Arc::make_mut(bucket).push(filter);
        true
    }

    /// Remove an exact-value match. Absent filters are not an error.
    pub fn remove(&self, filter: &Filter) -> bool {
        self.remove_entry(filter).is_some()
    }

    /// Remove an exact-value match, returning its position in the bucket.
    pub fn remove_entry(&self, filter: &Filter) -> Option<usize> {
        let mut buckets = self.buckets.write();
        let bucket = buckets.get_mut(filter.scope())?;
        let index = bucket.iter().position(|f| f == filter)?;
        Arc::make_mut(bucket).remove(index);
        if bucket.is_empty() {
            buckets.remove(filter.scope());
        }
        debug!("user rule removed from scope '{}'", filter.scope());
        Some(index)
    }

    /// Put a filter back at the position `remove_entry` reported.
    ///
    /// Positions past the end append. Already-present filters are left
    /// where they are.
    pub fn restore(&self, filter: Filter, index: usize) -> bool {
        let mut buckets = self.buckets.write();
        let bucket = buckets.entry(filter.scope().to_string()).or_default();
        if bucket.contains(&filter) {
            return false;
        }
        let bucket = Arc::make_mut(bucket);
        let index = index.min(bucket.len());
        bucket.insert(index, filter);
        true
    }

    /// Resolve a request: local bucket first, then global.
    ///
    /// Returns `None` when no filter is eligible.
    pub fn get(&self, request: &ContentRequest<'_>) -> Option<Response> {
        let response = request.with_folded_hosts(|request| {
            let (local, global) = {
                let buckets = self.buckets.read();
                let local = if request.page_host.is_empty() {
                    None
                } else {
                    buckets.get(request.page_host).cloned()
                };
                (local, buckets.get(GLOBAL_SCOPE).cloned())
            };

            local
                .and_then(|bucket| resolve(&bucket, request))
                .or_else(|| global.and_then(|bucket| resolve(&bucket, request)))
        });

        trace!(
            "user rules: {} -> {} ({:?}): {:?}",
            request.page_host,
            request.request_host,
            request.content_type,
            response
        );
        response
    }

    /// Resolve a request against one scope bucket only.
    ///
    /// Used for suffix walking, where the caller picks the scopes.
    pub fn get_in_scope(&self, scope: &str, request: &ContentRequest<'_>) -> Option<Response> {
        let bucket = self.buckets.read().get(&*fold_case(scope)).cloned()?;
        request.with_folded_hosts(|request| resolve(&bucket, request))
    }

    /// Filters of one scope, in insertion order.
    pub fn bucket(&self, scope: &str) -> Vec<Filter> {
        self.buckets
            .read()
            .get(scope)
            .map(|bucket| Vec::clone(bucket))
            .unwrap_or_default()
    }

    /// Every bucket, sorted by scope (global first).
    pub fn snapshot(&self) -> Vec<(String, Vec<Filter>)> {
        let buckets: Vec<(String, Bucket)> = self
            .buckets
            .read()
            .iter()
            .map(|(scope, bucket)| (scope.clone(), Arc::clone(bucket)))
            .collect();

        let mut out: Vec<(String, Vec<Filter>)> = buckets
            .into_iter()
            .map(|(scope, bucket)| (scope, Vec::clone(&bucket)))
            .collect();
        out.sort_by(|a, b| a.0.cmp(&b.0));
        out
    }

    /// Total number of filters.
    pub fn len(&self) -> usize {
        self.buckets.read().values().map(|bucket| bucket.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.read().is_empty()
    }

    /// Number of non-empty scopes (the global scope included).
    pub fn scope_count(&self) -> usize {
        self.buckets.read().len()
    }
}

/// Most recently added eligible filter wins. Hosts are already folded.
#[inline]
fn resolve(bucket: &[Filter], request: &ContentRequest<'_>) -> Option<Response> {
    bucket
        .iter()
        .rev()
        .find(|filter| filter.matches(request))
        .map(Filter::response)
}
