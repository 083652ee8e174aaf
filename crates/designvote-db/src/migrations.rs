use rusqlite::Connection;
use tracing::info;

use crate::error::Result;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 =
        conn.query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |r| r.get(0))?;

    if version < 1 {
        info!("Running migration v1 (initial schema)");
        conn.execute_batch(
            "
            BEGIN;

            CREATE TABLE users (
                id          TEXT PRIMARY KEY,
                username    TEXT NOT NULL UNIQUE,
                password    TEXT NOT NULL,
                created_at  TEXT NOT NULL
            );

            CREATE TABLE designs (
                id          TEXT PRIMARY KEY,
                image_url   TEXT NOT NULL CHECK (length(image_url) > 0),
                votes       INTEGER NOT NULL DEFAULT 0 CHECK (votes >= 0),
                contact     TEXT,
                created_at  TEXT NOT NULL
            );

            CREATE TABLE comments (
                id          TEXT PRIMARY KEY,
                design_id   TEXT NOT NULL REFERENCES designs(id),
                user_id     TEXT NOT NULL REFERENCES users(id),
                parent_id   TEXT REFERENCES comments(id),
                body        TEXT NOT NULL CHECK (length(body) <= 1024),
                likes       INTEGER NOT NULL DEFAULT 0 CHECK (likes >= 0),
                created_at  TEXT NOT NULL
            );

            CREATE INDEX idx_comments_design
                ON comments(design_id, parent_id, created_at);

            CREATE INDEX idx_comments_parent
                ON comments(parent_id, created_at);

            INSERT INTO schema_version (version) VALUES (1);

            COMMIT;
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}
