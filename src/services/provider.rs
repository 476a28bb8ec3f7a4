//! Movie catalog provider abstraction.

use async_trait::async_trait;
use chrono::NaiveDate;
use thiserror::Error;

/// One search hit as reported by an external catalog.
#[derive(Debug, Clone, PartialEq)]
pub struct RawMovie {
    pub external_id: u64,
    pub title: String,
    pub original_title: String,
    pub overview: Option<String>,
    pub poster_path: Option<String>,
    pub release_date: Option<NaiveDate>,
    pub original_language: Option<String>,
}

#[derive(Error, Debug)]
pub enum ProviderError {
    /// Unreachable host or timeout, after retries.
    #[error("connection failed: {0}")]
    Connection(String),

    /// Non-success status, after retries where they apply.
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    /// Payload did not have the expected shape.
    #[error("malformed response: {0}")]
    Parse(String),

    #[error("{0}")]
    Unexpected(String),
}

/// An external movie catalog searchable by title.
#[async_trait]
pub trait MovieProvider: Send + Sync {
    /// Searches the catalog. Performs exactly one logical request; retries
    /// are the implementation's concern.
    async fn search_by_title(&self, term: &str) -> Result<Vec<RawMovie>, ProviderError>;

    /// Identifier stored as `external_service` on cached movies.
    fn name(&self) -> &'static str;
}
