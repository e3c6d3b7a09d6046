use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);"
    )?;

    let version: i64 = conn
        .query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |r| r.get(0))?;

    if version < 1 {
        info!("Running migration v1 (initial schema)");
        conn.execute_batch(
            "
            CREATE TABLE users (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                email           TEXT NOT NULL UNIQUE,
                password_hash   TEXT NOT NULL,
                role            TEXT NOT NULL DEFAULT 'cidadao',
                active          INTEGER NOT NULL DEFAULT 1,
                created_at      TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE TABLE issue_types (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                key         TEXT NOT NULL UNIQUE,
                title       TEXT NOT NULL,
                category    TEXT NOT NULL,
                icon        TEXT NOT NULL DEFAULT ''
            );

            -- type_key is not a foreign key; catalog removals leave issues intact.
            CREATE TABLE issues (
                id                  INTEGER PRIMARY KEY AUTOINCREMENT,
                type_key            TEXT NOT NULL,
                description         TEXT NOT NULL,
                lat                 REAL NOT NULL,
                lng                 REAL NOT NULL,
                status              TEXT NOT NULL DEFAULT 'aberto',
                confirmations       INTEGER NOT NULL DEFAULT 1,
                citizen_validations INTEGER NOT NULL DEFAULT 0,
                authority_note      TEXT,
                reporter_id         INTEGER REFERENCES users(id),
                created_at          TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE INDEX idx_issues_status ON issues(status);

            CREATE TABLE photos (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                url         TEXT NOT NULL,
                issue_id    INTEGER NOT NULL REFERENCES issues(id) ON DELETE CASCADE
            );

            CREATE INDEX idx_photos_issue ON photos(issue_id);

            CREATE TABLE issue_votes (
                issue_id    INTEGER NOT NULL REFERENCES issues(id) ON DELETE CASCADE,
                user_id     INTEGER NOT NULL REFERENCES users(id),
                created_at  TEXT NOT NULL DEFAULT (datetime('now')),
                PRIMARY KEY (issue_id, user_id)
            );

            CREATE TABLE issue_validations (
                issue_id    INTEGER NOT NULL REFERENCES issues(id) ON DELETE CASCADE,
                user_id     INTEGER NOT NULL REFERENCES users(id),
                created_at  TEXT NOT NULL DEFAULT (datetime('now')),
                PRIMARY KEY (issue_id, user_id)
            );

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}
