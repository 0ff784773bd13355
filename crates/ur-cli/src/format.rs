use ur_core::{ContentType, Filter, Response, ThirdPartyPolicy};

/// Parse a comma-separated list of content type names.
pub fn parse_content_types(text: &str) -> Result<ContentType, String> {
    let mut mask = ContentType::empty();
    for name in text.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let name = name.to_ascii_lowercase();
        let ty = ContentType::from_request_type(&name);
        if ty == ContentType::OTHER && name != "other" {
            return Err(format!("Unknown content type '{name}'"));
        }
        mask |= ty;
    }
    if mask.is_empty() {
        return Err("No content type given".to_string());
    }
    Ok(mask)
}

/// One-line listing form of a filter.
pub fn describe_filter(filter: &Filter) -> String {
    let action = match filter.response() {
        Response::Block => "block",
        Response::Allow => "allow",
    };
    let scope = if filter.is_global() { "*" } else { filter.scope() };
    let target = match filter.domain_constraint() {
        None => "*".to_string(),
        Some(constraint) => {
            let domains = constraint.domains().collect::<Vec<_>>().join("|");
            if constraint.include() {
                domains
            } else {
                format!("~{domains}")
            }
        }
    };
    let party = match filter.third_party() {
        ThirdPartyPolicy::FirstPartyOnly => "1p",
        ThirdPartyPolicy::ThirdPartyOnly => "3p",
        ThirdPartyPolicy::Either => "any",
    };
    format!(
        "{action} {scope} -> {target} [{}] {party}",
        filter.content_type().describe()
    )
}
