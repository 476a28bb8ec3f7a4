use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::Rating;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Movie {
    pub id: i64,
    pub external_service: String,
    pub external_id: u64,
    pub title: String,
    pub original_title: String,
    pub overview: Option<String>,
    pub poster_url: Option<String>,
    pub release_date: Option<NaiveDate>,
    pub original_language: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Movie metadata keyed by `(external_service, external_id)`, ready to upsert.
#[derive(Debug, Clone, PartialEq)]
pub struct NewMovie {
    pub external_service: String,
    pub external_id: u64,
    pub title: String,
    pub original_title: String,
    pub overview: Option<String>,
    pub poster_url: Option<String>,
    pub release_date: Option<NaiveDate>,
    pub original_language: Option<String>,
}

/// A movie together with its ratings, when they were loaded alongside it.
///
/// `ratings` is `None` when the relation was not preloaded; aggregates then
/// have to be queried from the store.
#[derive(Debug, Clone, PartialEq)]
pub struct MovieWithRatings {
    pub movie: Movie,
    pub ratings: Option<Vec<Rating>>,
}

impl MovieWithRatings {
    pub fn bare(movie: Movie) -> Self {
        Self {
            movie,
            ratings: None,
        }
    }

    pub fn preloaded(movie: Movie, ratings: Vec<Rating>) -> Self {
        Self {
            movie,
            ratings: Some(ratings),
        }
    }
}
