use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS clients (
            id            TEXT PRIMARY KEY,
            name          TEXT NOT NULL,
            email         TEXT NOT NULL UNIQUE,
            password      TEXT NOT NULL,
            is_validated  INTEGER NOT NULL DEFAULT 0,
            created_at    TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS admins (
            id            TEXT PRIMARY KEY,
            name          TEXT NOT NULL,
            email         TEXT NOT NULL UNIQUE,
            password      TEXT NOT NULL,
            created_at    TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS password_reset_tokens (
            token         TEXT PRIMARY KEY,
            user_id       TEXT NOT NULL,
            user_type     TEXT NOT NULL CHECK (user_type IN ('client', 'admin')),
            email         TEXT NOT NULL,
            expires_at    TEXT NOT NULL,
            used          INTEGER NOT NULL DEFAULT 0,
            used_at       TEXT,
            created_at    TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_reset_tokens_expires
            ON password_reset_tokens(expires_at);

        -- step range is a caller concern; storage only guarantees one row
        -- per (client, step)
        CREATE TABLE IF NOT EXISTS wizard_responses (
            client_id     TEXT NOT NULL REFERENCES clients(id) ON DELETE CASCADE,
            step          INTEGER NOT NULL,
            data          TEXT NOT NULL,
            is_draft      INTEGER NOT NULL DEFAULT 1,
            updated_at    TEXT NOT NULL,
            PRIMARY KEY (client_id, step)
        );

        CREATE TABLE IF NOT EXISTS leads (
            id            TEXT PRIMARY KEY,
            name          TEXT NOT NULL,
            email         TEXT NOT NULL,
            phone         TEXT,
            service       TEXT,
            message       TEXT NOT NULL,
            source        TEXT NOT NULL CHECK (source IN ('contact', 'quote', 'booking')),
            status        TEXT NOT NULL DEFAULT 'new'
                          CHECK (status IN ('new', 'contacted', 'closed')),
            created_at    TEXT NOT NULL,
            updated_at    TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_leads_created
            ON leads(created_at);
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
