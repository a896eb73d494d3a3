/*!
 * Database schema definitions and migrations.
 *
 * This module contains the SQL schema for all database tables
 * and handles schema migrations for version upgrades.
 */

use anyhow::{Context, Result};
use rusqlite::Connection;
use log::{debug, info};

/// Current schema version
pub const SCHEMA_VERSION: i32 = 1;

/// Initialize the database schema
pub fn initialize_schema(conn: &Connection) -> Result<()> {
    let current_version = get_schema_version(conn)?;

    if current_version == 0 {
        info!("Initializing database schema v{}", SCHEMA_VERSION);
        create_all_tables(conn)?;
        set_schema_version(conn, SCHEMA_VERSION)?;
    } else if current_version < SCHEMA_VERSION {
        info!(
            "Migrating database schema from v{} to v{}",
            current_version, SCHEMA_VERSION
        );
        migrate_schema(conn, current_version)?;
    } else {
        debug!("Database schema is up to date (v{})", current_version);
    }

    Ok(())
}

/// Get the current schema version from the database
fn get_schema_version(conn: &Connection) -> Result<i32> {
    let table_exists: bool = conn
        .query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='schema_version'",
            [],
            |row| row.get(0),
        )
        .context("Failed to check schema_version table existence")?;

    if !table_exists {
        return Ok(0);
    }

    let version: i32 = conn
        .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| {
            row.get(0)
        })
        .unwrap_or(0);

    Ok(version)
}

/// Set the schema version in the database
fn set_schema_version(conn: &Connection, version: i32) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO schema_version (id, version, updated_at) VALUES (1, ?1, datetime('now'))",
        [version],
    )?;
    Ok(())
}

/// Create all database tables
fn create_all_tables(conn: &Connection) -> Result<()> {
    conn.execute_batch("PRAGMA journal_mode=WAL;")?;

    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            version INTEGER NOT NULL,
            updated_at TEXT NOT NULL
        );
        "#,
    )?;

    // Work queue. Timestamps are unix seconds, priority is a numeric rank.
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS work_items (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            page_id INTEGER NOT NULL,
            target_language_id INTEGER NOT NULL,
            priority INTEGER NOT NULL DEFAULT 2,
            mode TEXT NOT NULL DEFAULT 'add_new',
            frequency TEXT NOT NULL DEFAULT 'once',
            scheduled_at INTEGER NOT NULL,
            completed_at INTEGER,
            last_error TEXT NOT NULL DEFAULT '',
            disabled INTEGER NOT NULL DEFAULT 0,
            created_at INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_work_items_pickup
            ON work_items(disabled, last_error, priority DESC, scheduled_at);
        CREATE INDEX IF NOT EXISTS idx_work_items_page ON work_items(page_id, target_language_id);
        "#,
    )?;

    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS run_statistics (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            run_at INTEGER NOT NULL,
            processed INTEGER NOT NULL,
            succeeded INTEGER NOT NULL,
            failed INTEGER NOT NULL,
            remaining INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS queue_locks (
            name TEXT PRIMARY KEY,
            owner TEXT NOT NULL,
            acquired_at INTEGER NOT NULL,
            expires_at INTEGER NOT NULL
        );
        "#,
    )?;

    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS translation_cache (
            fingerprint TEXT PRIMARY KEY,
            payload TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            expires_at INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_cache_expiry ON translation_cache(expires_at);
        "#,
    )?;

    // CMS content records; translatable values live in the JSON `fields` column
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS records (
            tablename TEXT NOT NULL,
            uid INTEGER NOT NULL,
            pid INTEGER NOT NULL DEFAULT 0,
            sys_language_uid INTEGER NOT NULL DEFAULT 0,
            l10n_parent INTEGER NOT NULL DEFAULT 0,
            hidden INTEGER NOT NULL DEFAULT 0,
            deleted INTEGER NOT NULL DEFAULT 0,
            tstamp INTEGER NOT NULL DEFAULT 0,
            autotranslate_last INTEGER,
            autotranslate_exclude INTEGER NOT NULL DEFAULT 0,
            autotranslate_languages TEXT NOT NULL DEFAULT '',
            fields TEXT NOT NULL DEFAULT '{}',
            PRIMARY KEY (tablename, uid)
        );

        CREATE INDEX IF NOT EXISTS idx_records_page ON records(tablename, pid, sys_language_uid);
        CREATE INDEX IF NOT EXISTS idx_records_parent ON records(tablename, l10n_parent, sys_language_uid);
        "#,
    )?;

    info!("Database schema created successfully");
    Ok(())
}

/// Migrate the schema from one version to another
fn migrate_schema(conn: &Connection, from_version: i32) -> Result<()> {
    let current = from_version;

    if current < SCHEMA_VERSION {
        return Err(anyhow::anyhow!(
            "Unknown schema version: {}. Cannot migrate.",
            current
        ));
    }

    set_schema_version(conn, SCHEMA_VERSION)?;
    info!("Schema migration completed to v{}", SCHEMA_VERSION);
    Ok(())
}
