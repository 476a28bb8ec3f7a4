pub const SCHEMA: &str = r#"
-- users table (only what the ratings foreign key needs)
CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- movies table
CREATE TABLE IF NOT EXISTS movies (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    external_service TEXT NOT NULL,
    external_id INTEGER NOT NULL CHECK (external_id >= 0),
    title TEXT NOT NULL,
    original_title TEXT NOT NULL,
    -- lowercased copies; SQLite only folds ASCII case itself
    title_folded TEXT NOT NULL,
    original_title_folded TEXT NOT NULL,
    original_language TEXT,
    overview TEXT,
    release_date TEXT,
    poster_url TEXT,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now')),
    UNIQUE(external_service, external_id)
);

CREATE INDEX IF NOT EXISTS idx_movies_title ON movies(title);
CREATE INDEX IF NOT EXISTS idx_movies_original_title ON movies(original_title);
CREATE INDEX IF NOT EXISTS idx_movies_title_folded ON movies(title_folded);
CREATE INDEX IF NOT EXISTS idx_movies_original_title_folded ON movies(original_title_folded);

-- ratings table
CREATE TABLE IF NOT EXISTS ratings (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    movie_id INTEGER NOT NULL REFERENCES movies(id) ON DELETE CASCADE,
    rating INTEGER NOT NULL CHECK (rating BETWEEN 1 AND 5),
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now')),
    UNIQUE(user_id, movie_id)
);

CREATE INDEX IF NOT EXISTS idx_ratings_movie_rating ON ratings(movie_id, rating);
"#;
