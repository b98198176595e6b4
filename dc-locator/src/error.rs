use std::time::Duration;
use hickory_resolver::error::{ResolveError, ResolveErrorKind};
use thiserror::Error;

/// Caller mistakes, raised at the discovery entry points. Network failures
/// never show up here.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DiscoveryError {
    #[error("Invalid domain name {domain:?}: {reason}")]
    InvalidDomain { domain: String, reason: String },
    #[error("Invalid site name {site:?}: {reason}")]
    InvalidSite { site: String, reason: String },
    #[error("Server limit must be greater than zero")]
    InvalidLimit,
    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Why an SRV lookup produced nothing. Only seen inside the resolver.
#[derive(Debug, Error)]
pub enum LookupError {
    /// The DNS exchange itself failed: no records, timeout, bad response
    #[error("DNS Error: {0}")]
    Dns(ResolveError),
    #[error("DNS lookup timed out after {0:?}")]
    Timeout(Duration),
    /// Local failures outside the DNS exchange, such as socket I/O
    #[error("Unexpected lookup failure: {0}")]
    Unexpected(#[from] anyhow::Error),
}

impl From<ResolveError> for LookupError {
    fn from(e: ResolveError) -> Self {
        let local = matches!(
            e.kind(),
            ResolveErrorKind::Io(_) | ResolveErrorKind::Message(_) | ResolveErrorKind::Msg(_)
        );
        if local {
            LookupError::Unexpected(anyhow::Error::new(e))
        } else {
            LookupError::Dns(e)
        }
    }
}
