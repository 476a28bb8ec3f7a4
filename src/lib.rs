//! Movie search backed by a local SQLite cache of TMDB results, with
//! per-user star ratings.

pub mod app;
pub mod catalog;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod ratings;
pub mod services;

pub use app::{App, BrowseResult, MovieCard};
pub use catalog::MovieCatalog;
pub use config::Config;
pub use db::Repository;
pub use error::{AppError, Result};
pub use ratings::RatingAggregator;
