use rusqlite::{Connection, Result};

/// Version stamped into `PRAGMA user_version` once all migrations have run
pub const SCHEMA_VERSION: i64 = 1;

/// Initialize the registry schema
pub fn initialize_schema(conn: &Connection) -> Result<()> {
    // Watched addresses; labels are a JSON array stored as text
    conn.execute(
        "CREATE TABLE IF NOT EXISTS addresses (
            address TEXT PRIMARY KEY,
            first_seen TEXT,
            last_seen TEXT,
            labels TEXT,
            created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
            updated_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
        )",
        [],
    )?;

    // Matched transactions, one row per hash
    conn.execute(
        "CREATE TABLE IF NOT EXISTS transactions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            hash TEXT NOT NULL UNIQUE,
            from_address TEXT NOT NULL,
            to_address TEXT NOT NULL,
            value_wei TEXT NOT NULL,
            gas_used INTEGER NOT NULL,
            gas_price_wei TEXT NOT NULL,
            block_num INTEGER NOT NULL,
            block_timestamp INTEGER NOT NULL,
            input_hex TEXT NOT NULL,
            created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_transactions_block ON transactions(block_num)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_transactions_from ON transactions(from_address)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_transactions_to ON transactions(to_address)",
        [],
    )?;

    Ok(())
}

/// Bring an existing registry up to [`SCHEMA_VERSION`]
pub fn run_migrations(conn: &Connection) -> Result<()> {
    let version: i64 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;

    if version < 1 {
        initialize_schema(conn)?;
    }

    if version < SCHEMA_VERSION {
        conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;
    }

    Ok(())
}
