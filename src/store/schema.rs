use rusqlite::{Connection, OptionalExtension};

use crate::util::now_utc_string;

pub const DB_SCHEMA_VERSION: &str = "1";

pub fn configure_connection(connection: &Connection) -> rusqlite::Result<()> {
    connection.pragma_update(None, "journal_mode", "WAL")?;
    connection.pragma_update(None, "synchronous", "NORMAL")?;
    Ok(())
}

pub fn ensure_schema(connection: &Connection) -> rusqlite::Result<()> {
    connection.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS metadata (
          key TEXT PRIMARY KEY,
          value TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS categories (
          id TEXT PRIMARY KEY,
          mall_name TEXT NOT NULL,
          category_name TEXT NOT NULL,
          category_id TEXT NOT NULL,
          full_path TEXT,
          parent_category_id TEXT,
          created_at TEXT NOT NULL,
          updated_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS mapping_learnings (
          id TEXT PRIMARY KEY,
          source_mall TEXT NOT NULL,
          source_category_name TEXT NOT NULL,
          source_category_id TEXT NOT NULL,
          target_mall TEXT NOT NULL,
          target_category_name TEXT NOT NULL,
          target_category_id TEXT NOT NULL,
          is_manual_correction INTEGER NOT NULL DEFAULT 0,
          created_at TEXT NOT NULL
        );

        CREATE UNIQUE INDEX IF NOT EXISTS idx_categories_mall_category
          ON categories(mall_name, category_id);
        CREATE INDEX IF NOT EXISTS idx_learnings_source
          ON mapping_learnings(source_mall, source_category_id);
        ",
    )?;

    connection.execute(
        "INSERT INTO metadata(key, value) VALUES('db_schema_version', ?1)
         ON CONFLICT(key) DO UPDATE SET value=excluded.value",
        [DB_SCHEMA_VERSION],
    )?;
    connection.execute(
        "INSERT INTO metadata(key, value) VALUES('db_updated_at', ?1)
         ON CONFLICT(key) DO UPDATE SET value=excluded.value",
        [now_utc_string()],
    )?;

    Ok(())
}

pub fn read_metadata(connection: &Connection, key: &str) -> rusqlite::Result<Option<String>> {
    connection
        .query_row("SELECT value FROM metadata WHERE key = ?1", [key], |row| {
            row.get(0)
        })
        .optional()
}
