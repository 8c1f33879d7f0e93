// Declarative schema bootstrap. `CREATE TABLE IF NOT EXISTS` semantics
// throughout; migrations are additive only, applied via `execute_batch`.

use rusqlite::Connection;

use crate::error::CoreResult;

pub fn run_migrations(conn: &Connection) -> CoreResult<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS translations (
            cache_key TEXT PRIMARY KEY,
            source_lang TEXT NOT NULL,
            target_lang TEXT NOT NULL,
            original_text TEXT NOT NULL,
            translated_text TEXT NOT NULL,
            refined_text TEXT,
            provider TEXT NOT NULL,
            is_refined INTEGER NOT NULL DEFAULT 0,
            refinement_model TEXT,
            char_count INTEGER NOT NULL,
            created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
            last_accessed_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
            expires_at DATETIME
        );

        CREATE TABLE IF NOT EXISTS daily_usage_stats (
            date TEXT NOT NULL,
            provider TEXT NOT NULL,
            request_count INTEGER NOT NULL DEFAULT 0,
            char_count INTEGER NOT NULL DEFAULT 0,
            token_input INTEGER NOT NULL DEFAULT 0,
            token_output INTEGER NOT NULL DEFAULT 0,
            cost_estimated REAL NOT NULL DEFAULT 0.0,
            PRIMARY KEY (date, provider)
        );

        CREATE TABLE IF NOT EXISTS external_data (
            category TEXT PRIMARY KEY,
            data TEXT NOT NULL,
            updated_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP
        );

        CREATE INDEX IF NOT EXISTS idx_translations_last_accessed
            ON translations(last_accessed_at);

        CREATE INDEX IF NOT EXISTS idx_translations_expires
            ON translations(expires_at);
        "#,
    )?;

    // Additive column migrations, tolerant of "duplicate column name" when
    // the column already exists from a prior run.
    for stmt in [
        "ALTER TABLE translations ADD COLUMN refined_text TEXT",
    ] {
        if let Err(e) = conn.execute(stmt, []) {
            let msg = e.to_string();
            if !msg.contains("duplicate column name") {
                return Err(e.into());
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrations_are_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        run_migrations(&conn).unwrap();

        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='translations'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 1);
    }
}
