use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub const LATEST_VERSION: i64 = 1;

pub fn current_version(conn: &Connection) -> Result<i64> {
    let version = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |r| r.get(0),
    )?;
    Ok(version)
}

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version = current_version(conn)?;

    if version < 1 {
        info!("Running migration v1 (initial schema)");
        // user_id and study_id on chat_messages are deliberately not foreign
        // keys: removing a user or study must leave the chat log untouched.
        conn.execute_batch(
            "
            CREATE TABLE users (
                id                      TEXT PRIMARY KEY,
                first_name              TEXT NOT NULL,
                last_name               TEXT NOT NULL,
                email                   TEXT NOT NULL UNIQUE COLLATE NOCASE,
                password                TEXT NOT NULL,
                user_type               TEXT NOT NULL
                    CHECK (user_type IN ('entrepreneur', 'student', 'investor')),
                avatar                  TEXT,
                subscription_plan       TEXT
                    CHECK (subscription_plan IS NULL OR subscription_plan IN ('free', 'basic', 'premium')),
                subscription_expires_at TEXT,
                created_at              TEXT NOT NULL
            );

            CREATE TABLE studies (
                id          TEXT PRIMARY KEY,
                user_id     TEXT NOT NULL,
                title       TEXT NOT NULL,
                created_at  TEXT NOT NULL
            );

            CREATE INDEX idx_studies_user ON studies(user_id);

            CREATE TABLE chat_messages (
                id              TEXT PRIMARY KEY,
                user_id         TEXT,
                session_id      TEXT NOT NULL CHECK (session_id <> ''),
                type            TEXT NOT NULL CHECK (type IN ('user', 'bot')),
                content         TEXT NOT NULL CHECK (content <> ''),
                study_id        TEXT,
                intent          TEXT,
                confidence      REAL CHECK (confidence IS NULL OR confidence BETWEEN 0 AND 1),
                response_time   REAL CHECK (response_time IS NULL OR response_time >= 0),
                created_at      TEXT NOT NULL
            );

            CREATE INDEX idx_chat_messages_user_created
                ON chat_messages(user_id, created_at DESC);

            CREATE INDEX idx_chat_messages_session_created
                ON chat_messages(session_id, created_at ASC);

            CREATE INDEX idx_chat_messages_study
                ON chat_messages(study_id);

            CREATE INDEX idx_chat_messages_session
                ON chat_messages(session_id);

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    info!("Database migrations complete (schema v{})", LATEST_VERSION);
    Ok(())
}
