//! Error taxonomy for the scrape pipeline.
//!
//! Only request-shape errors ([`ResolveError`]) and the upload credential
//! precondition ([`UploadError`]) ever reach the caller. Fetch failures are
//! absorbed at the scraper or orchestrator boundary.

use thiserror::Error;

/// Failure of a single request made through the fetcher.
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    /// Connection refused, DNS failure, timeout, truncated body.
    #[error("transport error: {0}")]
    Transport(String),
    /// The remote answered with a non-2xx status.
    #[error("HTTP {status}")]
    HttpStatus { status: u16 },
    /// Retry budget used up; carries the error seen on the final attempt.
    #[error("gave up after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: Box<FetchError> },
    /// The body was not the JSON shape the caller asked for.
    #[error("could not decode response body: {0}")]
    Decode(String),
}

/// Caller asked for a domain or source that is not registered.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("unknown scraper type '{domain}'")]
    UnknownDomain {
        domain: String,
        available: Vec<String>,
    },
    #[error("invalid source '{selector}' for type '{domain}'")]
    UnknownSource {
        domain: String,
        selector: String,
        valid_sources: Vec<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UploadError {
    #[error("datastore credentials are not configured")]
    MissingCredentials,
}

/// A source scraper could not produce any result at all.
#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl From<url::ParseError> for ScrapeError {
    fn from(e: url::ParseError) -> Self {
        ScrapeError::InvalidRequest(e.to_string())
    }
}
