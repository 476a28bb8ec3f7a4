use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{AppError, Result};

const API_KEY_ENV: &str = "TMDB_API_KEY";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_db_path")]
    pub db_path: String,

    /// Stands in for the signed-in user of a session.
    #[serde(default = "default_user_id")]
    pub user_id: i64,

    #[serde(default = "default_page_size")]
    pub page_size: u32,

    /// Terms shorter than this list the user's rated movies instead of searching.
    #[serde(default = "default_min_search_length")]
    pub min_search_length: usize,

    #[serde(default)]
    pub tmdb: TmdbConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TmdbConfig {
    #[serde(default = "default_api_url")]
    pub api_url: String,

    #[serde(default)]
    pub api_key: String,

    #[serde(default = "default_image_url")]
    pub image_url: String,

    #[serde(default = "default_language")]
    pub language: String,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Total attempts, including the first one.
    #[serde(default = "default_retries")]
    pub retries: u32,

    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

fn default_db_path() -> String {
    let data_dir = dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("movie-shelf");
    std::fs::create_dir_all(&data_dir).ok();
    data_dir.join("movies.db").to_string_lossy().to_string()
}

fn default_user_id() -> i64 {
    1
}

fn default_page_size() -> u32 {
    12
}

fn default_min_search_length() -> usize {
    3
}

fn default_api_url() -> String {
    "https://api.themoviedb.org/3/search/movie".to_string()
}

fn default_image_url() -> String {
    "https://image.tmdb.org/t/p/".to_string()
}

fn default_language() -> String {
    "de-DE".to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_retries() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    100
}

impl Default for TmdbConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            api_key: String::new(),
            image_url: default_image_url(),
            language: default_language(),
            timeout_secs: default_timeout_secs(),
            retries: default_retries(),
            retry_delay_ms: default_retry_delay_ms(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            user_id: default_user_id(),
            page_size: default_page_size(),
            min_search_length: default_min_search_length(),
            tmdb: TmdbConfig::default(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        let mut config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            Self::from_toml(&content)?
        } else {
            let config = Config::default();
            config.save()?;
            config
        };

        if let Ok(key) = std::env::var(API_KEY_ENV) {
            if !key.trim().is_empty() {
                config.tmdb.api_key = key.trim().to_string();
            }
        }

        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        if config.page_size == 0 {
            return Err(AppError::Config("page_size must be at least 1".to_string()));
        }
        if config.tmdb.retries == 0 {
            return Err(AppError::Config("tmdb.retries must be at least 1".to_string()));
        }
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| AppError::Config(e.to_string()))?;
        std::fs::write(config_path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("movie-shelf")
            .join("config.toml")
    }
}
