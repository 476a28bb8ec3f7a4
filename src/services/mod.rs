mod provider;
mod tmdb;

pub use provider::{MovieProvider, ProviderError, RawMovie};
pub use tmdb::TmdbClient;
