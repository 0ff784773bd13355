//! User filter definitions
//!
//! A [`Filter`] is one user rule: one scope, one decision. Filters are never
//! merged, so every entry shown to the user maps to exactly one value here
//! and can be removed on its own.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::MalformedRuleError;
use crate::host::{is_same_or_subdomain, normalize_host};
use crate::types::{ContentRequest, ContentType, Response, ThirdPartyPolicy};

// =============================================================================
// Domain Constraint
// =============================================================================

/// Restricts a filter to (or away from) a set of request domains.
///
/// A domain covers itself and its subdomains. Domains are stored
/// normalized; an include set is never empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "DomainConstraintRecord")]
pub struct DomainConstraint {
    include: bool,
    domains: BTreeSet<String>,
}

impl DomainConstraint {
    /// Normalize and validate every domain.
    ///
    /// An include constraint needs at least one domain; an empty exclude
    /// constraint excludes nothing.
    pub fn new<I, S>(include: bool, domains: I) -> Result<Self, MalformedRuleError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let domains = domains
            .into_iter()
            .map(|domain| {
                let raw = domain.as_ref();
                normalize_host(raw).ok_or_else(|| MalformedRuleError::InvalidRequestDomain(raw.to_string()))
            })
            .collect::<Result<BTreeSet<_>, _>>()?;

        if include && domains.is_empty() {
            return Err(MalformedRuleError::EmptyDomainConstraint);
        }
        Ok(Self { include, domains })
    }

    /// Constraint matching a single request domain.
    pub fn single(domain: &str) -> Result<Self, MalformedRuleError> {
        Self::new(true, [domain])
    }

    #[inline]
    pub fn include(&self) -> bool {
        self.include
    }

    pub fn domains(&self) -> impl Iterator<Item = &str> {
        self.domains.iter().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.domains.is_empty()
    }

    /// Evaluate against a lowercase request host.
    pub fn matches(&self, request_host: &str) -> bool {
        let covered = self
            .domains
            .iter()
            .any(|domain| is_same_or_subdomain(request_host, domain));
        covered == self.include
    }
}

#[derive(Deserialize)]
struct DomainConstraintRecord {
    include: bool,
    domains: Vec<String>,
}

impl TryFrom<DomainConstraintRecord> for DomainConstraint {
    type Error = MalformedRuleError;

    fn try_from(record: DomainConstraintRecord) -> Result<Self, Self::Error> {
        Self::new(record.include, record.domains)
    }
}

// =============================================================================
// Filter
// =============================================================================

/// The two rule shapes the user-rule engine supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FilterShape {
    /// Tied to a page host; stored in that host's bucket
    Host,
    /// Global reach; scope is always empty
    Contains,
}

/// One user rule.
///
/// Every constructor normalizes and validates its input, so a filter that
/// exists can always be matched.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "FilterRecord")]
pub struct Filter {
    scope: String,
    shape: FilterShape,
    content_type: ContentType,
    domain_constraint: Option<DomainConstraint>,
    third_party: ThirdPartyPolicy,
    response: Response,
}

impl Filter {
    /// Filter bound to one page host. `scope` is normalized.
    pub fn host(
        scope: &str,
        content_type: ContentType,
        domain_constraint: Option<DomainConstraint>,
        third_party: ThirdPartyPolicy,
        response: Response,
    ) -> Result<Self, MalformedRuleError> {
        let scope = normalize_host(scope).ok_or_else(|| MalformedRuleError::InvalidPageDomain(scope.to_string()))?;
        check_content_type(content_type)?;
        Ok(Self {
            scope,
            shape: FilterShape::Host,
            content_type,
            domain_constraint,
            third_party,
            response,
        })
    }

    /// Filter applying on every site.
    pub fn global(
        content_type: ContentType,
        domain_constraint: Option<DomainConstraint>,
        third_party: ThirdPartyPolicy,
        response: Response,
    ) -> Result<Self, MalformedRuleError> {
        check_content_type(content_type)?;
        Ok(Self {
            scope: String::new(),
            shape: FilterShape::Contains,
            content_type,
            domain_constraint,
            third_party,
            response,
        })
    }

    /// Page host this filter is tied to; empty for global filters.
    #[inline]
    pub fn scope(&self) -> &str {
        &self.scope
    }

    #[inline]
    pub fn is_global(&self) -> bool {
        self.scope.is_empty()
    }

    #[inline]
    pub fn shape(&self) -> FilterShape {
        self.shape
    }

    #[inline]
    pub fn content_type(&self) -> ContentType {
        self.content_type
    }

    #[inline]
    pub fn domain_constraint(&self) -> Option<&DomainConstraint> {
        self.domain_constraint.as_ref()
    }

    #[inline]
    pub fn third_party(&self) -> ThirdPartyPolicy {
        self.third_party
    }

    #[inline]
    pub fn response(&self) -> Response {
        self.response
    }

    /// Is this filter eligible for the request?
    ///
    /// Scope is not checked here; the container only offers filters from
    /// the buckets that apply. Hosts must already be lowercase, see
    /// [`ContentRequest::with_folded_hosts`].
    #[inline]
    pub fn matches(&self, request: &ContentRequest<'_>) -> bool {
        if !self.content_type.intersects(request.content_type) {
            return false;
        }
        if !self.third_party.matches(request.is_third_party) {
            return false;
        }
        match &self.domain_constraint {
            None => true,
            Some(constraint) => constraint.matches(request.request_host),
        }
    }
}

fn check_content_type(content_type: ContentType) -> Result<(), MalformedRuleError> {
    if content_type.intersects(ContentType::ALL) {
        Ok(())
    } else {
        Err(MalformedRuleError::EmptyContentType)
    }
}

/// Serialized form; goes through the constructors so a stored filter gets
/// the same checks as a new one and can never land in the wrong bucket.
#[derive(Deserialize)]
struct FilterRecord {
    scope: String,
    shape: FilterShape,
    content_type: ContentType,
    domain_constraint: Option<DomainConstraint>,
    third_party: ThirdPartyPolicy,
    response: Response,
}

impl TryFrom<FilterRecord> for Filter {
    type Error = MalformedRuleError;

    fn try_from(record: FilterRecord) -> Result<Self, Self::Error> {
        match record.shape {
            FilterShape::Host => Self::host(
                &record.scope,
                record.content_type,
                record.domain_constraint,
                record.third_party,
                record.response,
            ),
            FilterShape::Contains if record.scope.is_empty() => Self::global(
                record.content_type,
                record.domain_constraint,
                record.third_party,
                record.response,
            ),
            FilterShape::Contains => Err(MalformedRuleError::ScopedGlobalFilter(record.scope)),
        }
    }
}
