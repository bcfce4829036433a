//! SQL schema for the game store.
//!
//! Executed once at connection startup via `PRAGMA user_version`. Future
//! migrations will be gated on that version number.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

-- Catalog reference data. Never written by the engine.
CREATE TABLE IF NOT EXISTS titles (
    title_id  INTEGER PRIMARY KEY,
    name      TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS images (
    title_id    INTEGER NOT NULL REFERENCES titles(title_id),
    asset_name  TEXT NOT NULL,
    PRIMARY KEY (title_id, asset_name)
);

-- How often a title was the winning answer for an identity.
CREATE TABLE IF NOT EXISTS exposure_stats (
    identity         TEXT    NOT NULL,
    title_id         INTEGER NOT NULL REFERENCES titles(title_id),
    times_offered    INTEGER NOT NULL,
    last_offered_at  TEXT    NOT NULL,   -- RFC 3339 UTC, microseconds
    PRIMARY KEY (identity, title_id)
);

-- How often an asset was shown to an identity.
CREATE TABLE IF NOT EXISTS view_history (
    identity    TEXT    NOT NULL,
    title_id    INTEGER NOT NULL,
    asset_name  TEXT    NOT NULL,
    view_count  INTEGER NOT NULL,
    shown_at    TEXT    NOT NULL,
    PRIMARY KEY (identity, title_id, asset_name),
    FOREIGN KEY (title_id, asset_name) REFERENCES images(title_id, asset_name)
);

-- At most one round per identity; a new round replaces the row.
CREATE TABLE IF NOT EXISTS rounds (
    identity          TEXT PRIMARY KEY,
    winning_title_id  INTEGER NOT NULL REFERENCES titles(title_id),
    winning_index     INTEGER NOT NULL,
    created_at        TEXT NOT NULL,
    expires_at        TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS web_sessions (
    session_id  TEXT PRIMARY KEY,
    identity    TEXT NOT NULL,
    created_at  TEXT NOT NULL,
    expires_at  TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS exposure_offered_idx ON exposure_stats(last_offered_at);
CREATE INDEX IF NOT EXISTS views_shown_idx      ON view_history(shown_at);
CREATE INDEX IF NOT EXISTS rounds_expires_idx   ON rounds(expires_at);
CREATE INDEX IF NOT EXISTS sessions_expires_idx ON web_sessions(expires_at);

PRAGMA user_version = 1;
";
