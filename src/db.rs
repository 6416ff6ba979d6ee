//! Local SQLite storage layer.
//!
//! Uses rusqlite with WAL mode, versioned migrations recorded in a
//! `schema_version` table, and a seed pass that installs a small default menu
//! into an empty catalog. The connection is shared behind a mutex; every
//! handler locks it for the duration of one operation and releases it before
//! rendering.

use rusqlite::{params, Connection};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{error, info, warn};

use crate::error::{Error, Result};

/// Shared database handle passed into every handler.
pub struct DbState {
    pub conn: Mutex<Connection>,
    pub db_path: PathBuf,
}

/// Current schema version. Bump when adding new migrations.
const CURRENT_SCHEMA_VERSION: i32 = 2;

/// Seed rows installed when the catalog is empty: (name, price, category,
/// description).
const DEFAULT_MENU: &[(&str, f64, &str, &str)] = &[
    (
        "Signature Beef Rice Bowl",
        28.0,
        "Mains",
        "Braised beef over steamed rice",
    ),
    (
        "Fried Chicken Set",
        26.0,
        "Mains",
        "Crispy chicken leg with sides",
    ),
    ("Lime Soda", 10.0, "Drinks", "Fresh and fizzy"),
    ("Americano", 12.0, "Drinks", "Hot or iced"),
    ("Fries", 9.0, "Snacks", "Golden and crisp"),
];

/// Initialize the database at the given path.
///
/// Creates the parent directory if needed, opens the connection, sets
/// pragmas, runs any pending migrations, and seeds the default menu into an
/// empty catalog. On corruption or open failure, deletes the file and retries
/// once.
pub fn init(db_path: &Path) -> Result<DbState> {
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    info!("Opening database at {}", db_path.display());

    let conn = match open_and_configure(db_path) {
        Ok(c) => c,
        Err(first_err) => {
            warn!(
                "Database open failed ({}), deleting and retrying once",
                first_err
            );
            if db_path.exists() {
                let _ = fs::remove_file(db_path);
                // Also remove WAL/SHM files if present
                let _ = fs::remove_file(db_path.with_extension("db-wal"));
                let _ = fs::remove_file(db_path.with_extension("db-shm"));
            }
            open_and_configure(db_path)?
        }
    };

    run_migrations(&conn)?;
    seed_default_menu(&conn)?;

    info!("Database initialized (schema v{CURRENT_SCHEMA_VERSION})");

    Ok(DbState {
        conn: Mutex::new(conn),
        db_path: db_path.to_path_buf(),
    })
}

/// Open the database file and apply pragmas.
fn open_and_configure(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path)?;

    conn.execute_batch(
        "PRAGMA journal_mode = WAL;
         PRAGMA foreign_keys = ON;
         PRAGMA busy_timeout = 5000;
         PRAGMA synchronous = NORMAL;",
    )?;

    Ok(conn)
}

/// Run all pending migrations up to `CURRENT_SCHEMA_VERSION`.
fn run_migrations(conn: &Connection) -> Result<()> {
    // Ensure schema_version table exists first
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT DEFAULT (datetime('now'))
        );",
    )?;

    let current: i32 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_version",
            [],
            |row| row.get(0),
        )
        .unwrap_or(0);

    if current >= CURRENT_SCHEMA_VERSION {
        info!("Database schema up to date (v{current})");
        return Ok(());
    }

    info!("Migrating database from v{current} to v{CURRENT_SCHEMA_VERSION}");

    if current < 1 {
        migrate_v1(conn)?;
    }
    if current < 2 {
        migrate_v2(conn)?;
    }

    Ok(())
}

/// Migration v1: catalog, order headers, order line snapshots.
fn migrate_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        -- menu_items (the catalog)
        CREATE TABLE IF NOT EXISTS menu_items (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            price REAL NOT NULL DEFAULT 0,
            category TEXT NOT NULL DEFAULT 'Main',
            description TEXT NOT NULL DEFAULT '',
            image_url TEXT NOT NULL DEFAULT '',
            is_available INTEGER NOT NULL DEFAULT 1
        );

        -- orders (headers; status/updated_at are the only post-creation mutations)
        CREATE TABLE IF NOT EXISTS orders (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            customer_name TEXT NOT NULL DEFAULT '',
            table_no TEXT NOT NULL DEFAULT '',
            contact TEXT NOT NULL DEFAULT '',
            note TEXT NOT NULL DEFAULT '',
            status TEXT NOT NULL DEFAULT 'NEW',
            total_price REAL NOT NULL DEFAULT 0,
            channel TEXT NOT NULL DEFAULT 'onsite',
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        -- order_items (immutable snapshots; weak reference to the catalog row)
        CREATE TABLE IF NOT EXISTS order_items (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            order_id INTEGER NOT NULL REFERENCES orders(id) ON DELETE CASCADE,
            item_id INTEGER REFERENCES menu_items(id) ON DELETE SET NULL,
            item_name TEXT NOT NULL,
            unit_price REAL NOT NULL,
            quantity INTEGER NOT NULL CHECK (quantity > 0)
        );

        -- Indexes
        CREATE INDEX IF NOT EXISTS idx_menu_items_category ON menu_items(category);
        CREATE INDEX IF NOT EXISTS idx_orders_status ON orders(status);
        CREATE INDEX IF NOT EXISTS idx_orders_created_at ON orders(created_at);
        CREATE INDEX IF NOT EXISTS idx_order_items_order_id ON order_items(order_id);

        -- Record migration
        INSERT INTO schema_version (version) VALUES (1);
        ",
    )
    .map_err(|e| {
        error!("Migration v1 failed: {e}");
        Error::Storage(e)
    })?;

    info!("Applied migration v1");
    Ok(())
}

/// Migration v2: record the submitting client's address on order headers.
fn migrate_v2(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        ALTER TABLE orders ADD COLUMN source_ip TEXT NOT NULL DEFAULT '';

        -- Record migration
        INSERT INTO schema_version (version) VALUES (2);
        ",
    )
    .map_err(|e| {
        error!("Migration v2 failed: {e}");
        Error::Storage(e)
    })?;

    info!("Applied migration v2 (orders.source_ip)");
    Ok(())
}

/// Install the default menu when the catalog is empty. No-op otherwise.
fn seed_default_menu(conn: &Connection) -> Result<()> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM menu_items", [], |row| row.get(0))?;
    if count > 0 {
        return Ok(());
    }

    for (name, price, category, description) in DEFAULT_MENU {
        conn.execute(
            "INSERT INTO menu_items (name, price, category, description, image_url, is_available)
             VALUES (?1, ?2, ?3, ?4, '', 1)",
            params![name, price, category, description],
        )?;
    }

    info!("Seeded default menu ({} items)", DEFAULT_MENU.len());
    Ok(())
}

/// Test helper: apply pragmas and run all migrations on an existing
/// (usually in-memory) connection.
pub fn run_migrations_for_test(conn: &Connection) {
    conn.execute_batch(
        "PRAGMA foreign_keys = ON;
         PRAGMA busy_timeout = 5000;
         PRAGMA synchronous = NORMAL;",
    )
    .expect("pragma setup");
    run_migrations(conn).expect("test migrations");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_db() -> Connection {
        let conn = Connection::open_in_memory().expect("open in-memory db");
        run_migrations_for_test(&conn);
        conn
    }

    #[test]
    fn migrations_are_idempotent() {
        let conn = test_db();
        run_migrations(&conn).expect("second run should succeed");

        let version: i32 = conn
            .query_row("SELECT MAX(version) FROM schema_version", [], |row| {
                row.get(0)
            })
            .expect("read schema version");
        assert_eq!(version, CURRENT_SCHEMA_VERSION);
    }

    #[test]
    fn order_items_cascade_with_their_order() {
        let conn = test_db();
        conn.execute(
            "INSERT INTO orders (customer_name, created_at, updated_at)
             VALUES ('Ana', '2024-01-01T10:00:00Z', '2024-01-01T10:00:00Z')",
            [],
        )
        .expect("insert order");
        let order_id = conn.last_insert_rowid();
        conn.execute(
            "INSERT INTO order_items (order_id, item_id, item_name, unit_price, quantity)
             VALUES (?1, NULL, 'Fries', 9.0, 2)",
            params![order_id],
        )
        .expect("insert line");

        conn.execute("DELETE FROM orders WHERE id = ?1", params![order_id])
            .expect("delete order");

        let remaining: i64 = conn
            .query_row("SELECT COUNT(*) FROM order_items", [], |row| row.get(0))
            .expect("count lines");
        assert_eq!(remaining, 0, "lines should cascade-delete with the order");
    }

    #[test]
    fn deleting_menu_item_nulls_weak_reference_and_keeps_snapshot() {
        let conn = test_db();
        conn.execute(
            "INSERT INTO menu_items (name, price, category) VALUES ('Tea', 5.0, 'Drinks')",
            [],
        )
        .expect("insert item");
        let item_id = conn.last_insert_rowid();
        conn.execute(
            "INSERT INTO orders (created_at, updated_at)
             VALUES ('2024-01-01T10:00:00Z', '2024-01-01T10:00:00Z')",
            [],
        )
        .expect("insert order");
        let order_id = conn.last_insert_rowid();
        conn.execute(
            "INSERT INTO order_items (order_id, item_id, item_name, unit_price, quantity)
             VALUES (?1, ?2, 'Tea', 5.0, 1)",
            params![order_id, item_id],
        )
        .expect("insert line");

        conn.execute("DELETE FROM menu_items WHERE id = ?1", params![item_id])
            .expect("delete item");

        let (ref_id, name, price): (Option<i64>, String, f64) = conn
            .query_row(
                "SELECT item_id, item_name, unit_price FROM order_items WHERE order_id = ?1",
                params![order_id],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .expect("read line");
        assert_eq!(ref_id, None, "weak reference should be nulled");
        assert_eq!(name, "Tea");
        assert!((price - 5.0).abs() < f64::EPSILON);
    }

    #[test]
    fn seed_installs_default_menu_only_into_empty_catalog() {
        let conn = test_db();
        seed_default_menu(&conn).expect("first seed");
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM menu_items", [], |row| row.get(0))
            .expect("count");
        assert_eq!(count, DEFAULT_MENU.len() as i64);

        seed_default_menu(&conn).expect("second seed");
        let count_after: i64 = conn
            .query_row("SELECT COUNT(*) FROM menu_items", [], |row| row.get(0))
            .expect("count again");
        assert_eq!(count_after, count, "seed must not duplicate entries");
    }

    #[test]
    fn quantity_check_rejects_non_positive_lines() {
        let conn = test_db();
        conn.execute(
            "INSERT INTO orders (created_at, updated_at)
             VALUES ('2024-01-01T10:00:00Z', '2024-01-01T10:00:00Z')",
            [],
        )
        .expect("insert order");
        let order_id = conn.last_insert_rowid();

        let result = conn.execute(
            "INSERT INTO order_items (order_id, item_id, item_name, unit_price, quantity)
             VALUES (?1, NULL, 'Tea', 5.0, 0)",
            params![order_id],
        );
        assert!(result.is_err(), "zero quantity should violate the CHECK");
    }
}
