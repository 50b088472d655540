//! Backend endpoint resolution.
//!
//! # Responsibilities
//! - Join the configured base URL with the inbound catch-all suffix and query
//! - Reject paths that could escape the base: dot segments, backslashes,
//!   control characters, embedded schemes, query or fragment markers
//! - Produce the entry URL a caller in a given execution context targets
//!
//! # Design Decisions
//! - One resolver for every execution context; the backend URL never depends
//!   on where resolution happens
//! - The raw query string is forwarded as received
//! - Trailing slashes are preserved (`api/tasks/` stays `api/tasks/`)

use thiserror::Error;
use url::Url;

/// Errors produced while resolving an endpoint.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ResolveError {
    #[error("invalid backend base URL '{0}'")]
    InvalidBase(String),

    #[error("path contains a forbidden segment: {0}")]
    ForbiddenSegment(String),

    #[error("path contains a forbidden character: {0:?}")]
    ForbiddenCharacter(char),

    #[error("resolved URL escapes the backend origin")]
    OriginEscape,

    #[error("resolved URL is malformed: {0}")]
    Malformed(String),
}

/// Where a caller runs when it asks for an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionContext {
    /// A browser page; it must stay same-origin and go through the gateway.
    Browser,
    /// Server-side code that can reach the backend directly.
    Server,
}

/// Maps inbound paths onto the single configured backend.
#[derive(Debug, Clone)]
pub struct EndpointResolver {
    base: Url,
    base_str: String,
    proxy_prefix: String,
}

impl EndpointResolver {
    pub fn new(base_url: &str, proxy_prefix: &str) -> Result<Self, ResolveError> {
        let base = Url::parse(base_url).map_err(|_| ResolveError::InvalidBase(base_url.to_string()))?;
        if base.cannot_be_a_base() || base.host_str().is_none() {
            return Err(ResolveError::InvalidBase(base_url.to_string()));
        }
        let base_str = base.as_str().trim_end_matches('/').to_string();
        Ok(Self {
            base,
            base_str,
            proxy_prefix: proxy_prefix.trim_end_matches('/').to_string(),
        })
    }

    /// Base URL without a trailing slash.
    pub fn base_url(&self) -> &str {
        &self.base_str
    }

    /// Same-origin prefix browser callers target.
    pub fn proxy_prefix(&self) -> &str {
        &self.proxy_prefix
    }

    /// Backend URL for `path` (catch-all suffix, leading slash optional) and
    /// the raw `query` string.
    pub fn resolve(
        &self,
        context: ExecutionContext,
        path: &str,
        query: Option<&str>,
    ) -> Result<Url, ResolveError> {
        let suffix = validate_path(path)?;
        let mut joined = format!("{}/{}", self.base_str, suffix);
        if let Some(query) = query.filter(|q| !q.is_empty()) {
            if let Some(c) = query.chars().find(|c| c.is_control() || *c == '#') {
                return Err(ResolveError::ForbiddenCharacter(c));
            }
            joined.push('?');
            joined.push_str(query);
        }

        let url = Url::parse(&joined).map_err(|e| ResolveError::Malformed(e.to_string()))?;
        if url.origin() != self.base.origin() || !url.path().starts_with(self.base.path().trim_end_matches('/')) {
            return Err(ResolveError::OriginEscape);
        }

        tracing::trace!(context = ?context, url = %url, "Resolved backend endpoint");
        Ok(url)
    }

    /// The URL a caller in `context` should request for `path`.
    ///
    /// Browser callers get the same-origin gateway path; server callers get
    /// the backend URL itself.
    pub fn entry_url(
        &self,
        context: ExecutionContext,
        path: &str,
        query: Option<&str>,
    ) -> Result<String, ResolveError> {
        match context {
            ExecutionContext::Server => Ok(self.resolve(context, path, query)?.to_string()),
            ExecutionContext::Browser => {
                let suffix = validate_path(path)?;
                let mut entry = format!("{}/{}", self.proxy_prefix, suffix);
                if let Some(query) = query.filter(|q| !q.is_empty()) {
                    entry.push('?');
                    entry.push_str(query);
                }
                Ok(entry)
            }
        }
    }

    /// URL of the liveness probe on the backend.
    pub fn probe_url(&self, probe_path: &str) -> Result<Url, ResolveError> {
        self.resolve(ExecutionContext::Server, probe_path, None)
    }
}

/// Returns the suffix without leading slashes, or the reason it is unsafe.
fn validate_path(path: &str) -> Result<&str, ResolveError> {
    if let Some(c) = path
        .chars()
        .find(|c| c.is_control() || matches!(c, '\\' | '?' | '#'))
    {
        return Err(ResolveError::ForbiddenCharacter(c));
    }

    let suffix = path.trim_start_matches('/');
    if suffix.contains("://") {
        return Err(ResolveError::ForbiddenSegment(suffix.to_string()));
    }
    for segment in suffix.split('/') {
        let lowered = segment.to_ascii_lowercase().replace("%2e", ".");
        if lowered == "." || lowered == ".." {
            return Err(ResolveError::ForbiddenSegment(segment.to_string()));
        }
    }
    Ok(suffix)
}
