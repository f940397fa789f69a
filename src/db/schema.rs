//! SQL DDL for initializing the image metadata store.

/// SQLite schema with:
/// - `images`: one row per stored image; `timestamp` is RFC3339 UTC text with
///   fixed precision so lexical order is chronological order
/// - `admin`: administrator credentials, created for completeness and not
///   read by the service
/// - indexes backing the session-scoped and most-recent-first listings
pub const SQLITE_INIT: &str = r#"
CREATE TABLE IF NOT EXISTS images (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    session_id TEXT NOT NULL,
    prompt TEXT NOT NULL,
    model TEXT NOT NULL,
    size TEXT NOT NULL,
    quality TEXT NULL,
    response_format TEXT NOT NULL, -- 'url' | 'b64_json'
    image_path TEXT NOT NULL,
    timestamp TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
);

CREATE INDEX IF NOT EXISTS idx_images_session_id ON images(session_id, timestamp);
CREATE INDEX IF NOT EXISTS idx_images_timestamp ON images(timestamp);

CREATE TABLE IF NOT EXISTS admin (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    username TEXT NOT NULL UNIQUE,
    password_hash TEXT NOT NULL
);
"#;
