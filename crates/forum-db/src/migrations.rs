use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            id          TEXT PRIMARY KEY,
            username    TEXT NOT NULL UNIQUE,
            email       TEXT NOT NULL UNIQUE,
            password    TEXT NOT NULL,
            created_at  TEXT NOT NULL,
            updated_at  TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS sessions (
            token       TEXT PRIMARY KEY,
            user_id     TEXT NOT NULL REFERENCES users(id),
            expires_at  TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_sessions_user
            ON sessions(user_id);

        CREATE TABLE IF NOT EXISTS posts (
            id          TEXT PRIMARY KEY,
            author_id   TEXT NOT NULL REFERENCES users(id),
            title       TEXT NOT NULL,
            body        TEXT NOT NULL,
            created_at  TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS comments (
            id          TEXT PRIMARY KEY,
            post_id     TEXT NOT NULL REFERENCES posts(id),
            author_id   TEXT NOT NULL REFERENCES users(id),
            body        TEXT NOT NULL,
            created_at  TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_comments_post
            ON comments(post_id, created_at);

        -- One reaction per user per target, enforced by the store so
        -- concurrent writers cannot slip a duplicate past the engine.
        CREATE TABLE IF NOT EXISTS post_reactions (
            id          TEXT PRIMARY KEY,
            user_id     TEXT NOT NULL REFERENCES users(id),
            post_id     TEXT NOT NULL REFERENCES posts(id),
            liked       INTEGER NOT NULL,
            created_at  TEXT NOT NULL,
            UNIQUE(user_id, post_id)
        );

        CREATE INDEX IF NOT EXISTS idx_post_reactions_post
            ON post_reactions(post_id);

        CREATE TABLE IF NOT EXISTS comment_reactions (
            id          TEXT PRIMARY KEY,
            user_id     TEXT NOT NULL REFERENCES users(id),
            comment_id  TEXT NOT NULL REFERENCES comments(id),
            liked       INTEGER NOT NULL,
            created_at  TEXT NOT NULL,
            UNIQUE(user_id, comment_id)
        );

        CREATE INDEX IF NOT EXISTS idx_comment_reactions_comment
            ON comment_reactions(comment_id);
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
