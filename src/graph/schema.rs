//! SQLite schema and migrations for the knowledge graph.

use rusqlite::{Connection, Result as SqliteResult};

/// Current schema version.
pub const SCHEMA_VERSION: i32 = 1;

/// Lock-wait timeout for contended access to a shared backing file.
pub const BUSY_TIMEOUT_MS: i32 = 5000;

/// Initialize the database schema.
pub fn initialize_schema(conn: &Connection) -> SqliteResult<()> {
    // WAL allows concurrent readers with a single in-flight writer
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "busy_timeout", BUSY_TIMEOUT_MS)?;
    conn.pragma_update(None, "foreign_keys", "ON")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        )",
        [],
    )?;

    let current_version: i32 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_version",
            [],
            |row| row.get(0),
        )
        .unwrap_or(0);

    if current_version < 1 {
        apply_v1_schema(conn)?;
    }

    Ok(())
}

/// Apply version 1 schema.
fn apply_v1_schema(conn: &Connection) -> SqliteResult<()> {
    // Entities: id is derived from the canonical name, scoped per agent
    conn.execute(
        "CREATE TABLE IF NOT EXISTS entities (
            id TEXT NOT NULL,
            agent_id TEXT NOT NULL,
            canonical_name TEXT NOT NULL,
            entity_type TEXT NOT NULL,
            first_seen TEXT NOT NULL,
            last_seen TEXT NOT NULL,
            mention_count INTEGER NOT NULL DEFAULT 1,
            aliases TEXT NOT NULL DEFAULT '[]',
            metadata TEXT,
            PRIMARY KEY (id, agent_id)
        )",
        [],
    )?;

    // Triples: one row per (subject, predicate, object, agent) fact
    conn.execute(
        "CREATE TABLE IF NOT EXISTS triples (
            id TEXT PRIMARY KEY,
            agent_id TEXT NOT NULL,
            subject TEXT NOT NULL,
            predicate TEXT NOT NULL,
            object TEXT NOT NULL,
            confidence REAL NOT NULL DEFAULT 1.0,
            source_exchange_id TEXT,
            source_date TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            pending_resolution INTEGER NOT NULL DEFAULT 0,
            UNIQUE (subject, predicate, object, agent_id)
        )",
        [],
    )?;

    // Co-occurrences: one row per unordered pair, keyed entity_a < entity_b.
    // No agent column; see the stats contract.
    conn.execute(
        "CREATE TABLE IF NOT EXISTS cooccurrences (
            entity_a TEXT NOT NULL,
            entity_b TEXT NOT NULL,
            count INTEGER NOT NULL DEFAULT 1,
            last_seen TEXT NOT NULL,
            PRIMARY KEY (entity_a, entity_b)
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_triples_subject ON triples(subject, agent_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_triples_object ON triples(object, agent_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_triples_exchange ON triples(source_exchange_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_triples_updated ON triples(updated_at)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_entities_seen ON entities(agent_id, last_seen)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_cooccurrences_count ON cooccurrences(count)",
        [],
    )?;

    conn.execute("INSERT INTO schema_version (version) VALUES (1)", [])?;

    Ok(())
}

/// Get the current schema version.
pub fn get_schema_version(conn: &Connection) -> SqliteResult<i32> {
    conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |row| row.get(0),
    )
}

/// Check if the schema is initialized.
pub fn is_initialized(conn: &Connection) -> bool {
    conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='triples'",
        [],
        |row| row.get::<_, i32>(0),
    )
    .map(|count| count > 0)
    .unwrap_or(false)
}
