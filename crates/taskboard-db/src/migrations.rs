use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |r| r.get(0),
    )?;

    if version < 1 {
        info!("Running migration v1 (users, boards, memberships, invites)");
        conn.execute_batch(
            "
            BEGIN;

            CREATE TABLE users (
                id          TEXT PRIMARY KEY,
                username    TEXT NOT NULL UNIQUE,
                password    TEXT NOT NULL,
                created_at  TEXT NOT NULL
            );

            CREATE TABLE boards (
                id          TEXT PRIMARY KEY,
                title       TEXT NOT NULL,
                owner_id    TEXT NOT NULL REFERENCES users(id),
                created_at  TEXT NOT NULL
            );

            CREATE TABLE board_members (
                board_id    TEXT NOT NULL REFERENCES boards(id) ON DELETE CASCADE,
                user_id     TEXT NOT NULL REFERENCES users(id),
                role        TEXT NOT NULL,
                created_at  TEXT NOT NULL,
                PRIMARY KEY (board_id, user_id)
            );

            CREATE INDEX idx_board_members_user ON board_members(user_id);

            CREATE TABLE invites (
                id          TEXT PRIMARY KEY,
                board_id    TEXT NOT NULL REFERENCES boards(id) ON DELETE CASCADE,
                email       TEXT NOT NULL,
                role        TEXT NOT NULL,
                token_hash  TEXT NOT NULL,
                used        INTEGER NOT NULL DEFAULT 0,
                cancelled   INTEGER NOT NULL DEFAULT 0,
                invited_by  TEXT REFERENCES users(id),
                accepted_by TEXT REFERENCES users(id),
                created_at  TEXT NOT NULL,
                expires_at  TEXT NOT NULL,
                used_at     TEXT
            );

            -- Bounds the token scan to live rows.
            CREATE INDEX idx_invites_live ON invites(used, cancelled, expires_at);
            CREATE INDEX idx_invites_board ON invites(board_id, created_at);

            INSERT INTO schema_version (version) VALUES (1);

            COMMIT;
            ",
        )?;
    }

    if version < 2 {
        info!("Running migration v2 (audit log)");
        conn.execute_batch(
            "
            BEGIN;

            CREATE TABLE audit_events (
                id          TEXT PRIMARY KEY,
                board_id    TEXT NOT NULL REFERENCES boards(id) ON DELETE CASCADE,
                actor_id    TEXT,
                action      TEXT NOT NULL,
                detail      TEXT NOT NULL DEFAULT '',
                created_at  TEXT NOT NULL
            );

            CREATE INDEX idx_audit_board ON audit_events(board_id, created_at);

            INSERT INTO schema_version (version) VALUES (2);

            COMMIT;
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrations_are_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        run(&conn).unwrap();
        run(&conn).unwrap();

        let version: i64 = conn
            .query_row("SELECT MAX(version) FROM schema_version", [], |r| r.get(0))
            .unwrap();
        assert_eq!(version, 2);

        let rows: i64 = conn
            .query_row("SELECT COUNT(*) FROM schema_version", [], |r| r.get(0))
            .unwrap();
        assert_eq!(rows, 2);
    }
}
