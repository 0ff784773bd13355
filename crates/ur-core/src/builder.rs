//! Rule builder
//!
//! Turns the inputs of the rule creation UI into canonical filters. Pure and
//! stateless; the decision polarity is always passed in by the caller.

use crate::error::MalformedRuleError;
use crate::filter::{DomainConstraint, Filter};
use crate::types::{ContentType, Response, ThirdPartyPolicy};

/// Build the filter for one user rule.
///
/// - empty `page_domain`: global filter, applies on every site
/// - empty `request_domain`: no domain constraint
/// - `third_party` selects third-party-only or first-party-only requests
pub fn build_filter(
    page_domain: &str,
    request_domain: &str,
    content_type: ContentType,
    third_party: bool,
    response: Response,
) -> Result<Filter, MalformedRuleError> {
    let domain_constraint = if request_domain.is_empty() {
        None
    } else {
        Some(request_constraint(request_domain)?)
    };

    let third_party = ThirdPartyPolicy::from(third_party);

    if page_domain.is_empty() {
        return Filter::global(content_type, domain_constraint, third_party, response);
    }
    Filter::host(page_domain, content_type, domain_constraint, third_party, response)
}

/// The page-wide allow rule behind the "filtering on this site" toggle.
///
/// Covers every content type and both origin relations, so it shadows any
/// global block rule on that page.
pub fn page_allow_filter(page_domain: &str) -> Result<Filter, MalformedRuleError> {
    Filter::host(
        page_domain,
        ContentType::ALL,
        None,
        ThirdPartyPolicy::Either,
        Response::Allow,
    )
}

fn request_constraint(request_domain: &str) -> Result<DomainConstraint, MalformedRuleError> {
    if request_domain.trim().trim_end_matches('.').is_empty() {
        return Err(MalformedRuleError::EmptyDomainConstraint);
    }
    DomainConstraint::single(request_domain)
}
