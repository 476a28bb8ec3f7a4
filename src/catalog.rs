use std::sync::Arc;

use crate::db::Repository;
use crate::error::Result;
use crate::models::{Movie, NewMovie, Page};
use crate::services::{MovieProvider, ProviderError, RawMovie};

const POSTER_SIZE: &str = "w200/";

/// Read-through cache over a [`MovieProvider`].
///
/// A search only reaches the provider when no cached movie is titled exactly
/// like the term. Whatever the provider returns is stored, and the page the
/// caller gets is always read back from the store.
pub struct MovieCatalog {
    repository: Repository,
    provider: Arc<dyn MovieProvider>,
    image_base_url: String,
    page_size: u32,
}

impl MovieCatalog {
    pub fn new(
        repository: Repository,
        provider: Arc<dyn MovieProvider>,
        image_base_url: impl Into<String>,
        page_size: u32,
    ) -> Self {
        Self {
            repository,
            provider,
            image_base_url: image_base_url.into(),
            page_size: page_size.max(1),
        }
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Returns one page of cached movies whose title or original title
    /// contains `term`, seeding the cache from the provider on a miss.
    ///
    /// Provider failures are logged and never returned; only store errors are.
    pub async fn search(&self, term: &str, page: u32) -> Result<Page<Movie>> {
        if !self.repository.has_exact_match(term).await? {
            self.refresh(term).await;
        }

        self.repository.search_movies(term, page, self.page_size).await
    }

    async fn refresh(&self, term: &str) {
        let provider = self.provider.name();

        let results = match self.provider.search_by_title(term).await {
            Ok(results) => results,
            Err(err) => {
                log_provider_error(provider, term, &err);
                return;
            }
        };

        let fetched = results.len();
        let movies = results
            .into_iter()
            .map(|raw| self.to_new_movie(raw))
            .collect();

        match self.repository.upsert_movies(movies).await {
            Ok(ids) => {
                tracing::debug!(provider, search_term = term, fetched, stored = ids.len(), "Cached provider results");
            }
            Err(err) => {
                tracing::error!(
                    provider,
                    search_term = term,
                    error = %err,
                    severity = "critical",
                    "Unexpected movie provider error"
                );
            }
        }
    }

    fn to_new_movie(&self, raw: RawMovie) -> NewMovie {
        NewMovie {
            external_service: self.provider.name().to_string(),
            external_id: raw.external_id,
            poster_url: raw
                .poster_path
                .as_deref()
                .map(|path| poster_url(&self.image_base_url, path)),
            title: raw.title,
            original_title: raw.original_title,
            overview: raw.overview,
            release_date: raw.release_date,
            original_language: raw.original_language,
        }
    }
}

/// `<base>/w200/<path>`, with exactly one slash at each join.
fn poster_url(base: &str, poster_path: &str) -> String {
    format!(
        "{}/{}{}",
        base.trim_end_matches('/'),
        POSTER_SIZE,
        poster_path.trim_start_matches('/')
    )
}

fn log_provider_error(provider: &str, term: &str, err: &ProviderError) {
    match err {
        ProviderError::Connection(message) => {
            tracing::warn!(provider, search_term = term, error = %message, "Movie provider connection failed");
        }
        ProviderError::Http { status, message } => {
            tracing::error!(provider, search_term = term, status, error = %message, "Movie provider HTTP error");
        }
        ProviderError::Parse(_) | ProviderError::Unexpected(_) => {
            tracing::error!(
                provider,
                search_term = term,
                error = %err,
                severity = "critical",
                "Unexpected movie provider error"
            );
        }
    }
}
