use crate::db::Repository;
use crate::error::Result;
use crate::models::{MovieWithRatings, Rating, Stars};

/// Shown when a movie has no ratings, or the user has not rated it.
pub const DEFAULT_RATING: u8 = 0;

/// Star ratings per user and movie, and the aggregates shown next to a movie.
#[derive(Clone)]
pub struct RatingAggregator {
    repository: Repository,
}

impl RatingAggregator {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    /// Records the user's rating for the movie, replacing an earlier one.
    /// Nothing is written when `stars` is outside `1..=5`.
    pub async fn rate(&self, user_id: i64, movie_id: i64, stars: i64) -> Result<Stars> {
        let stars = Stars::try_from(stars)?;
        self.repository.upsert_rating(user_id, movie_id, stars).await?;
        tracing::debug!(user_id, movie_id, stars = stars.value(), "Rated movie");
        Ok(stars)
    }

    /// Mean of the movie's ratings, `0.0` when there are none.
    pub async fn average_rating(&self, entry: &MovieWithRatings) -> Result<f64> {
        if let Some(ratings) = preloaded(entry) {
            return Ok(mean_rating(ratings));
        }

        let average = self.repository.average_rating(entry.movie.id).await?;
        Ok(average.unwrap_or(f64::from(DEFAULT_RATING)))
    }

    /// The given user's rating of the movie, `0` when absent.
    pub async fn current_user_rating(&self, entry: &MovieWithRatings, user_id: i64) -> Result<u8> {
        if let Some(ratings) = preloaded(entry) {
            return Ok(ratings
                .iter()
                .find(|r| r.user_id == user_id)
                .map_or(DEFAULT_RATING, |r| r.rating));
        }

        let rating = self.repository.user_rating(entry.movie.id, user_id).await?;
        Ok(rating.unwrap_or(DEFAULT_RATING))
    }
}

// An empty preloaded set is not trusted; the store is asked instead.
fn preloaded(entry: &MovieWithRatings) -> Option<&[Rating]> {
    entry
        .ratings
        .as_deref()
        .filter(|ratings| !ratings.is_empty())
}

fn mean_rating(ratings: &[Rating]) -> f64 {
    if ratings.is_empty() {
        return f64::from(DEFAULT_RATING);
    }
    let sum: u32 = ratings.iter().map(|r| u32::from(r.rating)).sum();
    f64::from(sum) / ratings.len() as f64
}

#[cfg(test)]
mod tests {
    use tokio_test::{assert_err, assert_ok};

    use super::*;
    use crate::db::testing::{new_movie, temp_repository};
    use crate::error::AppError;

    async fn setup() -> (RatingAggregator, Repository, tempfile::TempDir, i64) {
        let (repo, dir) = temp_repository().await;
        let movie_id = repo.upsert_movie(new_movie(27205, "Inception")).await.unwrap();
        (RatingAggregator::new(repo.clone()), repo, dir, movie_id)
    }

    async fn entry(repo: &Repository, movie_id: i64, preload: bool) -> MovieWithRatings {
        let movie = repo.get_movie(movie_id).await.unwrap().unwrap();
        if preload {
            let ratings = repo.ratings_for_movie(movie_id).await.unwrap();
            MovieWithRatings::preloaded(movie, ratings)
        } else {
            MovieWithRatings::bare(movie)
        }
    }

    #[tokio::test]
    async fn rate_then_read_back_every_valid_value() {
        let (ratings, repo, _dir, movie_id) = setup().await;
        let user = repo.create_user("alice").await.unwrap();

        for stars in 1..=5 {
            assert_ok!(ratings.rate(user, movie_id, stars).await);
            let movie = entry(&repo, movie_id, false).await;
            assert_eq!(
                ratings.current_user_rating(&movie, user).await.unwrap(),
                stars as u8
            );
        }
        assert_eq!(repo.count_ratings().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn invalid_stars_write_nothing() {
        let (ratings, repo, _dir, movie_id) = setup().await;
        let user = repo.create_user("alice").await.unwrap();

        for stars in [0, 6, -1, 100] {
            let err = assert_err!(ratings.rate(user, movie_id, stars).await);
            assert!(matches!(err, AppError::InvalidRating(_)));
        }
        assert_eq!(repo.count_ratings().await.unwrap(), 0);

        ratings.rate(user, movie_id, 4).await.unwrap();
        assert_err!(ratings.rate(user, movie_id, 9).await);
        assert_eq!(repo.user_rating(movie_id, user).await.unwrap(), Some(4));
    }

    #[tokio::test]
    async fn rating_twice_keeps_the_latest_value() {
        let (ratings, repo, _dir, movie_id) = setup().await;
        let user = repo.create_user("alice").await.unwrap();

        ratings.rate(user, movie_id, 2).await.unwrap();
        ratings.rate(user, movie_id, 5).await.unwrap();

        let stored = repo.ratings_for_movie(movie_id).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].rating, 5);
    }

    #[tokio::test]
    async fn average_and_user_rating_agree_across_paths() {
        let (ratings, repo, _dir, movie_id) = setup().await;
        let alice = repo.create_user("alice").await.unwrap();
        let bob = repo.create_user("bob").await.unwrap();
        let carol = repo.create_user("carol").await.unwrap();

        ratings.rate(alice, movie_id, 2).await.unwrap();
        ratings.rate(bob, movie_id, 4).await.unwrap();

        for preload in [true, false] {
            let movie = entry(&repo, movie_id, preload).await;
            assert_eq!(ratings.average_rating(&movie).await.unwrap(), 3.0);
            assert_eq!(ratings.current_user_rating(&movie, alice).await.unwrap(), 2);
            assert_eq!(ratings.current_user_rating(&movie, bob).await.unwrap(), 4);
            assert_eq!(ratings.current_user_rating(&movie, carol).await.unwrap(), 0);
        }
    }

    #[tokio::test]
    async fn unrated_movie_defaults_to_zero() {
        let (ratings, repo, _dir, movie_id) = setup().await;
        let alice = repo.create_user("alice").await.unwrap();

        for preload in [true, false] {
            let movie = entry(&repo, movie_id, preload).await;
            assert_eq!(ratings.average_rating(&movie).await.unwrap(), 0.0);
            assert_eq!(ratings.current_user_rating(&movie, alice).await.unwrap(), 0);
        }
    }

    #[tokio::test]
    async fn stale_empty_preload_falls_back_to_the_store() {
        let (ratings, repo, _dir, movie_id) = setup().await;
        let alice = repo.create_user("alice").await.unwrap();

        let movie = entry(&repo, movie_id, true).await;
        ratings.rate(alice, movie_id, 5).await.unwrap();

        assert_eq!(ratings.average_rating(&movie).await.unwrap(), 5.0);
        assert_eq!(ratings.current_user_rating(&movie, alice).await.unwrap(), 5);
    }

    #[test]
    fn mean_of_no_ratings_is_zero() {
        assert_eq!(mean_rating(&[]), 0.0);
    }
}
