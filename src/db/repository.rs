use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, params_from_iter, OptionalExtension, Row};
use tokio_rusqlite::Connection;

use crate::error::{AppError, Result};
use crate::models::{Movie, NewMovie, Page, Rating, Stars};

use super::schema::SCHEMA;

const MOVIE_COLUMNS: &str = "m.id, m.external_service, m.external_id, m.title, m.original_title, \
     m.overview, m.poster_url, m.release_date, m.original_language, m.created_at, m.updated_at";

const RATING_COLUMNS: &str = "id, user_id, movie_id, rating, created_at, updated_at";

const UPSERT_MOVIE: &str = r#"INSERT INTO movies (external_service, external_id, title, original_title,
                                title_folded, original_title_folded,
                                overview, poster_url, release_date, original_language)
       VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
       ON CONFLICT(external_service, external_id) DO UPDATE SET
           title = excluded.title,
           original_title = excluded.original_title,
           title_folded = excluded.title_folded,
           original_title_folded = excluded.original_title_folded,
           overview = excluded.overview,
           poster_url = excluded.poster_url,
           release_date = excluded.release_date,
           original_language = excluded.original_language,
           updated_at = datetime('now')
       RETURNING id"#;

// Both filters compare against the folded columns; bind a folded term.
const EXACT_FILTER: &str = "m.title_folded = ?1 OR m.original_title_folded = ?1";
const FUZZY_FILTER: &str =
    r"m.title_folded LIKE ?1 ESCAPE '\' OR m.original_title_folded LIKE ?1 ESCAPE '\'";

#[derive(Clone)]
pub struct Repository {
    conn: Connection,
}

impl Repository {
    pub async fn new(db_path: &str) -> Result<Self> {
        let conn = Connection::open(db_path).await?;

        conn.call(|conn| {
            conn.execute_batch("PRAGMA foreign_keys = ON;")?;
            conn.execute_batch(SCHEMA)?;
            Ok(())
        })
        .await?;

        Ok(Self { conn })
    }

    // Movie operations

    /// Inserts the movie, or overwrites the cached metadata of the row with
    /// the same `(external_service, external_id)`. Returns the row id.
    pub async fn upsert_movie(&self, movie: NewMovie) -> Result<i64> {
        let mut ids = self.upsert_movies(vec![movie]).await?;
        ids.pop()
            .ok_or_else(|| AppError::Other(anyhow::anyhow!("upsert returned no row id")))
    }

    /// Upserts a batch of movies inside one transaction.
    pub async fn upsert_movies(&self, movies: Vec<NewMovie>) -> Result<Vec<i64>> {
        if movies.is_empty() {
            return Ok(Vec::new());
        }

        let rows = movies
            .into_iter()
            .map(|movie| Ok((external_id_param(movie.external_id)?, movie)))
            .collect::<Result<Vec<_>>>()?;

        let ids = self
            .conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                let mut ids = Vec::with_capacity(rows.len());
                {
                    let mut stmt = tx.prepare(UPSERT_MOVIE)?;
                    for (external_id, movie) in &rows {
                        let id: i64 = stmt.query_row(
                            params![
                                movie.external_service,
                                external_id,
                                movie.title,
                                movie.original_title,
                                fold_case(&movie.title),
                                fold_case(&movie.original_title),
                                movie.overview,
                                movie.poster_url,
                                movie.release_date.map(format_date),
                                movie.original_language,
                            ],
                            |row| row.get(0),
                        )?;
                        ids.push(id);
                    }
                }
                tx.commit()?;
                Ok(ids)
            })
            .await?;
        Ok(ids)
    }

    pub async fn get_movie(&self, id: i64) -> Result<Option<Movie>> {
        let movie = self
            .conn
            .call(move |conn| {
                let sql = format!("SELECT {MOVIE_COLUMNS} FROM movies m WHERE m.id = ?1");
                let movie = conn
                    .query_row(&sql, params![id], movie_from_row)
                    .optional()?;
                Ok(movie)
            })
            .await?;
        Ok(movie)
    }

    pub async fn delete_movie(&self, id: i64) -> Result<bool> {
        let deleted = self
            .conn
            .call(move |conn| {
                let count = conn.execute("DELETE FROM movies WHERE id = ?1", params![id])?;
                Ok(count > 0)
            })
            .await?;
        Ok(deleted)
    }

    pub async fn count_movies(&self) -> Result<u64> {
        let count = self
            .conn
            .call(|conn| {
                let count: i64 = conn.query_row("SELECT COUNT(*) FROM movies", [], |row| row.get(0))?;
                Ok(count)
            })
            .await?;
        Ok(count as u64)
    }

    /// Whether any movie's title or original title equals `term`, ignoring
    /// case (Unicode-aware).
    pub async fn has_exact_match(&self, term: &str) -> Result<bool> {
        let term = fold_case(term);
        let exists = self
            .conn
            .call(move |conn| {
                let sql = format!("SELECT EXISTS(SELECT 1 FROM movies m WHERE {EXACT_FILTER})");
                let exists: bool = conn.query_row(&sql, params![term], |row| row.get(0))?;
                Ok(exists)
            })
            .await?;
        Ok(exists)
    }

    /// Case-insensitive substring search over title and original title.
    pub async fn search_movies(&self, term: &str, page: u32, per_page: u32) -> Result<Page<Movie>> {
        let pattern = format!("%{}%", escape_like(&fold_case(term)));
        let page = page.max(1);
        let offset = Page::<Movie>::offset(page, per_page);

        let (movies, total) = self
            .conn
            .call(move |conn| {
                let count_sql = format!("SELECT COUNT(*) FROM movies m WHERE {FUZZY_FILTER}");
                let total: i64 = conn.query_row(&count_sql, params![pattern], |row| row.get(0))?;

                let sql = format!(
                    "SELECT {MOVIE_COLUMNS} FROM movies m WHERE {FUZZY_FILTER} \
                     ORDER BY m.id LIMIT ?2 OFFSET ?3"
                );
                let mut stmt = conn.prepare(&sql)?;
                let movies = stmt
                    .query_map(params![pattern, per_page, offset as i64], movie_from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok((movies, total))
            })
            .await?;

        Ok(Page::new(movies, page, per_page, total as u64))
    }

    /// Movies the user has rated, paginated.
    pub async fn rated_movies(&self, user_id: i64, page: u32, per_page: u32) -> Result<Page<Movie>> {
        let page = page.max(1);
        let offset = Page::<Movie>::offset(page, per_page);

        let (movies, total) = self
            .conn
            .call(move |conn| {
                let total: i64 = conn.query_row(
                    "SELECT COUNT(*) FROM ratings WHERE user_id = ?1",
                    params![user_id],
                    |row| row.get(0),
                )?;

                let sql = format!(
                    "SELECT {MOVIE_COLUMNS} FROM movies m \
                     JOIN ratings r ON r.movie_id = m.id \
                     WHERE r.user_id = ?1 \
                     ORDER BY m.id LIMIT ?2 OFFSET ?3"
                );
                let mut stmt = conn.prepare(&sql)?;
                let movies = stmt
                    .query_map(params![user_id, per_page, offset as i64], movie_from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok((movies, total))
            })
            .await?;

        Ok(Page::new(movies, page, per_page, total as u64))
    }

    // Rating operations

    /// Inserts or replaces the user's rating for the movie in one statement.
    pub async fn upsert_rating(&self, user_id: i64, movie_id: i64, stars: Stars) -> Result<()> {
        let rating = stars.value();
        self.conn
            .call(move |conn| {
                conn.execute(
                    r#"INSERT INTO ratings (user_id, movie_id, rating)
                       VALUES (?1, ?2, ?3)
                       ON CONFLICT(user_id, movie_id) DO UPDATE SET
                           rating = excluded.rating,
                           updated_at = datetime('now')"#,
                    params![user_id, movie_id, rating],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    pub async fn ratings_for_movie(&self, movie_id: i64) -> Result<Vec<Rating>> {
        let ratings = self
            .conn
            .call(move |conn| {
                let sql = format!(
                    "SELECT {RATING_COLUMNS} FROM ratings WHERE movie_id = ?1 ORDER BY id"
                );
                let mut stmt = conn.prepare(&sql)?;
                let ratings = stmt
                    .query_map(params![movie_id], rating_from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(ratings)
            })
            .await?;
        Ok(ratings)
    }

    /// Loads the ratings of several movies at once, grouped by movie id.
    /// Movies without ratings map to an empty list.
    pub async fn ratings_for_movies(&self, movie_ids: &[i64]) -> Result<HashMap<i64, Vec<Rating>>> {
        let mut grouped: HashMap<i64, Vec<Rating>> =
            movie_ids.iter().map(|id| (*id, Vec::new())).collect();
        if movie_ids.is_empty() {
            return Ok(grouped);
        }

        let ids = movie_ids.to_vec();
        let ratings = self
            .conn
            .call(move |conn| {
                let placeholders = vec!["?"; ids.len()].join(", ");
                let sql = format!(
                    "SELECT {RATING_COLUMNS} FROM ratings WHERE movie_id IN ({placeholders}) ORDER BY id"
                );
                let mut stmt = conn.prepare(&sql)?;
                let ratings = stmt
                    .query_map(params_from_iter(ids.iter()), rating_from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(ratings)
            })
            .await?;

        for rating in ratings {
            grouped.entry(rating.movie_id).or_default().push(rating);
        }
        Ok(grouped)
    }

    /// Mean rating of the movie, `None` when it has no ratings.
    pub async fn average_rating(&self, movie_id: i64) -> Result<Option<f64>> {
        let average = self
            .conn
            .call(move |conn| {
                let average: Option<f64> = conn.query_row(
                    "SELECT AVG(rating) FROM ratings WHERE movie_id = ?1",
                    params![movie_id],
                    |row| row.get(0),
                )?;
                Ok(average)
            })
            .await?;
        Ok(average)
    }

    pub async fn user_rating(&self, movie_id: i64, user_id: i64) -> Result<Option<u8>> {
        let rating = self
            .conn
            .call(move |conn| {
                let rating: Option<u8> = conn
                    .query_row(
                        "SELECT rating FROM ratings WHERE movie_id = ?1 AND user_id = ?2",
                        params![movie_id, user_id],
                        |row| row.get(0),
                    )
                    .optional()?;
                Ok(rating)
            })
            .await?;
        Ok(rating)
    }

    pub async fn count_ratings(&self) -> Result<u64> {
        let count = self
            .conn
            .call(|conn| {
                let count: i64 =
                    conn.query_row("SELECT COUNT(*) FROM ratings", [], |row| row.get(0))?;
                Ok(count)
            })
            .await?;
        Ok(count as u64)
    }

    // User operations

    pub async fn create_user(&self, name: &str) -> Result<i64> {
        let name = name.to_string();
        let id = self
            .conn
            .call(move |conn| {
                conn.execute("INSERT INTO users (name) VALUES (?1)", params![name])?;
                Ok(conn.last_insert_rowid())
            })
            .await?;
        Ok(id)
    }

    /// Makes sure a user row with this id exists.
    pub async fn ensure_user(&self, id: i64) -> Result<()> {
        self.conn
            .call(move |conn| {
                conn.execute(
                    "INSERT OR IGNORE INTO users (id, name) VALUES (?1, ?2)",
                    params![id, format!("user-{id}")],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    pub async fn delete_user(&self, id: i64) -> Result<bool> {
        let deleted = self
            .conn
            .call(move |conn| {
                let count = conn.execute("DELETE FROM users WHERE id = ?1", params![id])?;
                Ok(count > 0)
            })
            .await?;
        Ok(deleted)
    }
}

fn external_id_param(external_id: u64) -> Result<i64> {
    i64::try_from(external_id).map_err(|_| {
        AppError::Other(anyhow::anyhow!("external id {external_id} does not fit the store"))
    })
}

/// Case folding applied to stored titles and to search terms alike.
fn fold_case(s: &str) -> String {
    s.to_lowercase()
}

/// Escapes `LIKE` wildcards so the term matches literally.
fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()
}

fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    // SQLite datetime('now') format
    if let Ok(naive) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Some(naive.and_utc());
    }
    None
}

fn timestamp(row: &Row, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    Ok(row
        .get::<_, String>(idx)
        .ok()
        .and_then(|s| parse_datetime(&s))
        .unwrap_or_else(Utc::now))
}

fn movie_from_row(row: &Row) -> rusqlite::Result<Movie> {
    Ok(Movie {
        id: row.get(0)?,
        external_service: row.get(1)?,
        external_id: row.get::<_, i64>(2)? as u64,
        title: row.get(3)?,
        original_title: row.get(4)?,
        overview: row.get(5)?,
        poster_url: row.get(6)?,
        release_date: row
            .get::<_, Option<String>>(7)?
            .and_then(|s| parse_date(&s)),
        original_language: row.get(8)?,
        created_at: timestamp(row, 9)?,
        updated_at: timestamp(row, 10)?,
    })
}

fn rating_from_row(row: &Row) -> rusqlite::Result<Rating> {
    Ok(Rating {
        id: row.get(0)?,
        user_id: row.get(1)?,
        movie_id: row.get(2)?,
        rating: row.get(3)?,
        created_at: timestamp(row, 4)?,
        updated_at: timestamp(row, 5)?,
    })
}
