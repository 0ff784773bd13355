//! Core type definitions for the user rule engine
//!
//! These types are shared by the filter index, the rule builder and the
//! host-side request interception layer.

use serde::{Deserialize, Serialize};

use crate::host::{extract_host, fold_case};

// =============================================================================
// Content Types (bit mask for type filtering)
// =============================================================================

bitflags::bitflags! {
    /// Content type bit mask.
    ///
    /// A request carries exactly one bit; a filter carries the set of
    /// categories it covers.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct ContentType: u32 {
        const OTHER = 1 << 0;
        const SCRIPT = 1 << 1;
        const IMAGE = 1 << 2;
        const STYLESHEET = 1 << 3;
        const OBJECT = 1 << 4;
        const SUBDOCUMENT = 1 << 5;  // iframe/frame
        const MAIN_FRAME = 1 << 6;   // main document
        const XMLHTTPREQUEST = 1 << 7;  // xhr and fetch
        const WEBSOCKET = 1 << 8;
        const FONT = 1 << 9;
        const MEDIA = 1 << 10;
        const PING = 1 << 11;

        /// All content types
        const ALL = 0x0FFF;
        /// Document types (main_frame + sub_frame)
        const DOCUMENT = Self::MAIN_FRAME.bits() | Self::SUBDOCUMENT.bits();
    }
}

const CONTENT_TYPE_NAMES: &[(&str, ContentType)] = &[
    ("main_frame", ContentType::MAIN_FRAME),
    ("sub_frame", ContentType::SUBDOCUMENT),
    ("stylesheet", ContentType::STYLESHEET),
    ("script", ContentType::SCRIPT),
    ("image", ContentType::IMAGE),
    ("font", ContentType::FONT),
    ("object", ContentType::OBJECT),
    ("xmlhttprequest", ContentType::XMLHTTPREQUEST),
    ("ping", ContentType::PING),
    ("media", ContentType::MEDIA),
    ("websocket", ContentType::WEBSOCKET),
    ("other", ContentType::OTHER),
];

impl ContentType {
    /// Parse from browser request type string.
    ///
    /// Unknown names fall back to `OTHER`, the same bucket the static list
    /// engine uses for them.
    pub fn from_request_type(s: &str) -> Self {
        match s {
            "fetch" => Self::XMLHTTPREQUEST,
            "all" | "*" => Self::ALL,
            _ => CONTENT_TYPE_NAMES
                .iter()
                .find(|(name, _)| *name == s)
                .map(|(_, ty)| *ty)
                .unwrap_or(Self::OTHER),
        }
    }

    /// Browser request type string for a single-category value.
    pub fn name(self) -> Option<&'static str> {
        CONTENT_TYPE_NAMES
            .iter()
            .find(|(_, ty)| *ty == self)
            .map(|(name, _)| *name)
    }

    /// Comma-separated names of every category in the mask, or `all`.
    pub fn describe(self) -> String {
        if self.contains(Self::ALL) {
            return "all".to_string();
        }
        CONTENT_TYPE_NAMES
            .iter()
            .filter(|(_, ty)| self.contains(*ty))
            .map(|(name, _)| *name)
            .collect::<Vec<_>>()
            .join(",")
    }
}

// =============================================================================
// Third-party policy
// =============================================================================

/// Which origin relation a filter applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ThirdPartyPolicy {
    /// Only requests to the page's own host (legacy `0`)
    FirstPartyOnly,
    /// Only requests to another host (legacy `1`)
    ThirdPartyOnly,
    /// Both (legacy `-1`)
    Either,
}

impl ThirdPartyPolicy {
    /// Decode the legacy integer encoding.
    pub fn from_legacy(value: i8) -> Option<Self> {
        Self::try_from(value).ok()
    }

    /// Encode as the legacy integer.
    pub const fn to_legacy(self) -> i8 {
        match self {
            Self::FirstPartyOnly => 0,
            Self::ThirdPartyOnly => 1,
            Self::Either => -1,
        }
    }

    /// Does a request with this third-party flag satisfy the policy?
    #[inline]
    pub const fn matches(self, is_third_party: bool) -> bool {
        match self {
            Self::FirstPartyOnly => !is_third_party,
            Self::ThirdPartyOnly => is_third_party,
            Self::Either => true,
        }
    }
}

impl TryFrom<i8> for ThirdPartyPolicy {
    type Error = ();

    fn try_from(value: i8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::FirstPartyOnly),
            1 => Ok(Self::ThirdPartyOnly),
            -1 => Ok(Self::Either),
            _ => Err(()),
        }
    }
}

impl From<bool> for ThirdPartyPolicy {
    fn from(third_party: bool) -> Self {
        if third_party {
            Self::ThirdPartyOnly
        } else {
            Self::FirstPartyOnly
        }
    }
}

// =============================================================================
// Responses and decisions
// =============================================================================

/// The decision a single filter contributes when it matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Response {
    /// Cancel the request
    Block,
    /// Let the request through, overriding less specific rules
    Allow,
}

/// Final answer of the engine for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Decision {
    /// A user rule blocks the request
    Block,
    /// A user rule explicitly allows the request
    Allow,
    /// No user rule applies; defer to the static list engine
    #[default]
    Undecided,
}

impl Decision {
    #[inline]
    pub const fn is_block(self) -> bool {
        matches!(self, Self::Block)
    }

    #[inline]
    pub const fn is_allow(self) -> bool {
        matches!(self, Self::Allow)
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Block => "block",
            Self::Allow => "allow",
            Self::Undecided => "undecided",
        }
    }
}

impl From<Option<Response>> for Decision {
    fn from(response: Option<Response>) -> Self {
        match response {
            Some(Response::Block) => Self::Block,
            Some(Response::Allow) => Self::Allow,
            None => Self::Undecided,
        }
    }
}

impl From<Response> for Decision {
    fn from(response: Response) -> Self {
        Some(response).into()
    }
}

// =============================================================================
// Content Request
// =============================================================================

/// One outgoing resource fetch, as seen by the interception layer.
///
/// Hosts are expected in lowercase; the container normalizes them when
/// they are not.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentRequest<'a> {
    /// Host of the page issuing the request
    pub page_host: &'a str,
    /// Host the request goes to
    pub request_host: &'a str,
    /// Single-bit content category
    pub content_type: ContentType,
    /// Does `request_host` differ from `page_host`?
    pub is_third_party: bool,
}

impl<'a> ContentRequest<'a> {
    pub fn new(
        page_host: &'a str,
        request_host: &'a str,
        content_type: ContentType,
        is_third_party: bool,
    ) -> Self {
        Self {
            page_host,
            request_host,
            content_type,
            is_third_party,
        }
    }

    /// Build a request from page and resource URLs.
    ///
    /// Returns `None` when either URL has no host.
    pub fn from_url(page_url: &'a str, request_url: &'a str, content_type: ContentType) -> Option<Self> {
        let page_host = extract_host(page_url)?;
        let request_host = extract_host(request_url)?;
        Some(Self {
            page_host,
            request_host,
            content_type,
            is_third_party: !page_host.eq_ignore_ascii_case(request_host),
        })
    }

    /// Run `f` on a copy of this request with both hosts lowercased.
    ///
    /// Allocates only when a host actually contains uppercase letters.
    pub fn with_folded_hosts<T>(&self, f: impl FnOnce(&ContentRequest<'_>) -> T) -> T {
        let page_host = fold_case(self.page_host);
        let request_host = fold_case(self.request_host);
        f(&ContentRequest {
            page_host: &page_host,
            request_host: &request_host,
            ..*self
        })
    }

    /// Synthetic first-party document request for a page host.
    pub fn main_frame(page_host: &'a str) -> Self {
        Self {
            page_host,
            request_host: page_host,
            content_type: ContentType::MAIN_FRAME,
            is_third_party: false,
        }
    }
}
