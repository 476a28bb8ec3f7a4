use std::sync::Arc;

use serde::Serialize;

use crate::catalog::MovieCatalog;
use crate::config::Config;
use crate::db::Repository;
use crate::error::Result;
use crate::models::{Movie, MovieWithRatings, Page, Stars};
use crate::ratings::RatingAggregator;
use crate::services::{MovieProvider, TmdbClient};

pub const MSG_NO_MOVIES: &str = "No movies found for your search term.";

/// A movie as listed to a user.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MovieCard {
    pub movie: Movie,
    pub average_rating: f64,
    pub current_user_rating: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BrowseResult {
    pub cards: Page<MovieCard>,
    pub error_message: Option<&'static str>,
}

pub struct App {
    pub repository: Repository,
    catalog: MovieCatalog,
    ratings: RatingAggregator,
    min_search_length: usize,
}

impl App {
    pub async fn new(config: &Config) -> Result<Self> {
        let repository = Repository::new(&config.db_path).await?;
        let provider = Arc::new(TmdbClient::new(&config.tmdb)?);
        Ok(Self::with_provider(repository, provider, config))
    }

    pub fn with_provider(
        repository: Repository,
        provider: Arc<dyn MovieProvider>,
        config: &Config,
    ) -> Self {
        let catalog = MovieCatalog::new(
            repository.clone(),
            provider,
            config.tmdb.image_url.clone(),
            config.page_size,
        );
        let ratings = RatingAggregator::new(repository.clone());

        Self {
            repository,
            catalog,
            ratings,
            min_search_length: config.min_search_length,
        }
    }

    /// Searches when the term is long enough, otherwise lists the movies the
    /// user has rated.
    pub async fn browse(&self, user_id: i64, term: &str, page: u32) -> Result<BrowseResult> {
        let term = term.trim();

        let movies = if term.chars().count() < self.min_search_length {
            self.repository
                .rated_movies(user_id, page, self.catalog.page_size())
                .await?
        } else {
            self.catalog.search(term, page).await?
        };

        let cards = self.cards(movies, user_id).await?;
        let error_message = cards.is_empty().then_some(MSG_NO_MOVIES);

        Ok(BrowseResult {
            cards,
            error_message,
        })
    }

    pub async fn rate(&self, user_id: i64, movie_id: i64, stars: i64) -> Result<Stars> {
        self.ratings.rate(user_id, movie_id, stars).await
    }

    async fn cards(&self, movies: Page<Movie>, user_id: i64) -> Result<Page<MovieCard>> {
        let ids: Vec<i64> = movies.items.iter().map(|m| m.id).collect();
        let mut ratings = self.repository.ratings_for_movies(&ids).await?;

        let entries = movies.map(|movie| {
            let loaded = ratings.remove(&movie.id).unwrap_or_default();
            MovieWithRatings::preloaded(movie, loaded)
        });

        let mut cards = Vec::with_capacity(entries.items.len());
        for entry in &entries.items {
            cards.push(MovieCard {
                average_rating: self.ratings.average_rating(entry).await?,
                current_user_rating: self.ratings.current_user_rating(entry, user_id).await?,
                movie: entry.movie.clone(),
            });
        }

        Ok(Page::new(cards, entries.page, entries.per_page, entries.total))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::db::testing::{new_movie, temp_repository};
    use crate::services::{ProviderError, RawMovie};

    struct StaticProvider {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl MovieProvider for StaticProvider {
        async fn search_by_title(&self, term: &str) -> std::result::Result<Vec<RawMovie>, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if term != "Inception" {
                return Ok(Vec::new());
            }
            Ok(vec![RawMovie {
                external_id: 27205,
                title: "Inception".to_string(),
                original_title: "Inception".to_string(),
                overview: None,
                poster_path: None,
                release_date: None,
                original_language: Some("en".to_string()),
            }])
        }

        fn name(&self) -> &'static str {
            "tmdb"
        }
    }

    async fn app() -> (App, Arc<StaticProvider>, tempfile::TempDir) {
        let (repo, dir) = temp_repository().await;
        let provider = Arc::new(StaticProvider {
            calls: AtomicUsize::new(0),
        });
        let config = Config {
            db_path: String::new(),
            ..Config::default()
        };
        (App::with_provider(repo, provider.clone(), &config), provider, dir)
    }

    #[tokio::test]
    async fn search_shows_ratings_on_cards() {
        let (app, _provider, _dir) = app().await;
        let alice = app.repository.create_user("alice").await.unwrap();
        let bob = app.repository.create_user("bob").await.unwrap();

        let result = app.browse(alice, "Inception", 1).await.unwrap();
        assert_eq!(result.error_message, None);
        let movie_id = result.cards.items[0].movie.id;

        app.rate(alice, movie_id, 2).await.unwrap();
        app.rate(bob, movie_id, 4).await.unwrap();

        let result = app.browse(alice, "incep", 1).await.unwrap();
        let card = &result.cards.items[0];
        assert_eq!(card.average_rating, 3.0);
        assert_eq!(card.current_user_rating, 2);
    }

    #[tokio::test]
    async fn empty_search_reports_no_movies() {
        let (app, provider, _dir) = app().await;
        let alice = app.repository.create_user("alice").await.unwrap();

        let result = app.browse(alice, "Zzyzx Road", 1).await.unwrap();
        assert!(result.cards.is_empty());
        assert_eq!(result.error_message, Some(MSG_NO_MOVIES));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn short_term_lists_rated_movies_without_searching() {
        let (app, provider, _dir) = app().await;
        let alice = app.repository.create_user("alice").await.unwrap();
        let heat = app.repository.upsert_movie(new_movie(1, "Heat")).await.unwrap();
        app.repository.upsert_movie(new_movie(2, "Up")).await.unwrap();
        app.rate(alice, heat, 5).await.unwrap();

        let result = app.browse(alice, "Up", 1).await.unwrap();
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
        assert_eq!(result.cards.items.len(), 1);
        assert_eq!(result.cards.items[0].movie.id, heat);
        assert_eq!(result.cards.items[0].current_user_rating, 5);
    }

    #[tokio::test]
    async fn rating_out_of_range_is_rejected() {
        let (app, _provider, _dir) = app().await;
        let alice = app.repository.create_user("alice").await.unwrap();
        let heat = app.repository.upsert_movie(new_movie(1, "Heat")).await.unwrap();

        assert!(app.rate(alice, heat, 6).await.is_err());
        assert_eq!(app.repository.count_ratings().await.unwrap(), 0);
    }
}
