use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use url::Url;

use crate::config::TmdbConfig;
use crate::error::{AppError, Result};

use super::provider::{MovieProvider, ProviderError, RawMovie};

const SERVICE_NAME: &str = "tmdb";
const USER_AGENT: &str = concat!("movie-shelf/", env!("CARGO_PKG_VERSION"));
// Error bodies are logged; keep them short.
const MAX_ERROR_BODY: usize = 200;

#[derive(Debug, Deserialize)]
struct SearchResponse {
    results: Vec<TmdbMovie>,
}

#[derive(Debug, Deserialize)]
struct TmdbMovie {
    id: Option<u64>,
    title: Option<String>,
    original_title: Option<String>,
    overview: Option<String>,
    poster_path: Option<String>,
    release_date: Option<String>,
    original_language: Option<String>,
}

impl TryFrom<TmdbMovie> for RawMovie {
    type Error = ProviderError;

    fn try_from(movie: TmdbMovie) -> std::result::Result<Self, Self::Error> {
        let external_id = movie
            .id
            .ok_or_else(|| ProviderError::Parse("result without id".to_string()))?;
        let title = non_empty(movie.title).ok_or_else(|| {
            ProviderError::Parse(format!("result {external_id} without title"))
        })?;
        // Optional, so a malformed date is dropped rather than failing the result.
        let release_date = non_empty(movie.release_date).and_then(|date| {
            NaiveDate::parse_from_str(&date, "%Y-%m-%d")
                .map_err(|e| {
                    tracing::warn!(
                        external_id,
                        release_date = %date,
                        error = %e,
                        "Ignoring unparseable TMDB release date"
                    );
                })
                .ok()
        });

        Ok(RawMovie {
            external_id,
            original_title: non_empty(movie.original_title).unwrap_or_else(|| title.clone()),
            title,
            overview: non_empty(movie.overview),
            poster_path: non_empty(movie.poster_path),
            release_date,
            original_language: non_empty(movie.original_language),
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

/// Decodes a `/search/movie` response body. Fails on the first result that
/// lacks a required field (`id`, `title`).
pub(crate) fn parse_search_response(body: &str) -> std::result::Result<Vec<RawMovie>, ProviderError> {
    let response: SearchResponse =
        serde_json::from_str(body).map_err(|e| ProviderError::Parse(e.to_string()))?;

    response
        .results
        .into_iter()
        .map(RawMovie::try_from)
        .collect()
}

/// TMDB `/search/movie` client with a request timeout and bounded retry.
pub struct TmdbClient {
    client: Client,
    api_url: Url,
    api_key: String,
    language: String,
    attempts: u32,
    retry_delay: Duration,
}

impl TmdbClient {
    pub fn new(config: &TmdbConfig) -> Result<Self> {
        let api_url = Url::parse(&config.api_url)
            .map_err(|e| AppError::Config(format!("invalid tmdb.api_url {:?}: {e}", config.api_url)))?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            client,
            api_url,
            api_key: config.api_key.clone(),
            language: config.language.clone(),
            attempts: config.retries.max(1),
            retry_delay: Duration::from_millis(config.retry_delay_ms),
        })
    }

    /// Searches movies by title, retrying transient failures with a fixed delay.
    pub async fn search(&self, term: &str) -> std::result::Result<Vec<RawMovie>, ProviderError> {
        let mut attempt = 1;
        loop {
            match self.request(term).await {
                Ok(body) => return parse_search_response(&body),
                Err(err) if attempt < self.attempts && is_transient(&err) => {
                    tracing::debug!(
                        search_term = term,
                        attempt,
                        error = %err,
                        "TMDB request failed, retrying"
                    );
                    attempt += 1;
                    tokio::time::sleep(self.retry_delay).await;
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn request(&self, term: &str) -> std::result::Result<String, ProviderError> {
        let response = self
            .client
            .get(self.api_url.clone())
            .query(&[
                ("api_key", self.api_key.as_str()),
                ("query", term),
                ("include_adult", "false"),
                ("language", self.language.as_str()),
            ])
            .send()
            .await
            .map_err(classify)?;

        let status = response.status();
        if !status.is_success() {
            let mut message = response.text().await.unwrap_or_default();
            if message.len() > MAX_ERROR_BODY {
                let cut = (0..=MAX_ERROR_BODY)
                    .rev()
                    .find(|i| message.is_char_boundary(*i))
                    .unwrap_or(0);
                message.truncate(cut);
            }
            return Err(ProviderError::Http {
                status: status.as_u16(),
                message,
            });
        }

        response.text().await.map_err(classify)
    }
}

#[async_trait]
impl MovieProvider for TmdbClient {
    async fn search_by_title(&self, term: &str) -> std::result::Result<Vec<RawMovie>, ProviderError> {
        self.search(term).await
    }

    fn name(&self) -> &'static str {
        SERVICE_NAME
    }
}

fn classify(err: reqwest::Error) -> ProviderError {
    if err.is_connect() || err.is_timeout() {
        ProviderError::Connection(err.to_string())
    } else if err.is_decode() {
        ProviderError::Parse(err.to_string())
    } else {
        ProviderError::Unexpected(err.to_string())
    }
}

/// Connection failures, 429 and 5xx are retried. Other 4xx responses (bad API
/// key, malformed query) cannot succeed on repeat and are returned at once.
fn is_transient(err: &ProviderError) -> bool {
    match err {
        ProviderError::Connection(_) => true,
        ProviderError::Http { status, .. } => {
            *status == StatusCode::TOO_MANY_REQUESTS.as_u16() || *status >= 500
        }
        _ => false,
    }
}
