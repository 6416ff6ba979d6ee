//! Catalog management: listing, CRUD, cart views, and CSV bulk import.
//!
//! The ordering page sees only available items; the back-office views see
//! everything. Deletion is immediate and unguarded — historical order lines
//! keep their name/price snapshot and the storage layer nulls the weak
//! reference.

use std::collections::HashMap;
use std::io::Read;

use rusqlite::{params, params_from_iter};
use tracing::info;

use crate::db::DbState;
use crate::error::{Error, Result};
use crate::models::{MenuItem, NewMenuItem, DEFAULT_CATEGORY};
use crate::session::Session;

const MENU_ITEM_COLUMNS: &str = "id, name, price, category, description, image_url, is_available";

// ---------------------------------------------------------------------------
// Listing
// ---------------------------------------------------------------------------

/// Ordering-page filter. `category` is matched by equality; `keyword` is a
/// case-insensitive substring match across name, description, and category.
#[derive(Debug, Clone, Default)]
pub struct CatalogFilter {
    pub category: Option<String>,
    pub keyword: Option<String>,
}

/// All catalog entries regardless of availability (back-office view),
/// ordered by category then name.
pub fn list_all(db: &DbState) -> Result<Vec<MenuItem>> {
    let conn = db.conn.lock().map_err(|_| Error::Lock)?;
    let mut stmt = conn.prepare(&format!(
        "SELECT {MENU_ITEM_COLUMNS} FROM menu_items ORDER BY category, name"
    ))?;
    let items = stmt
        .query_map([], MenuItem::from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(items)
}

/// Available entries only, with optional category/keyword filtering
/// (ordering-page view).
pub fn list_available(db: &DbState, filter: &CatalogFilter) -> Result<Vec<MenuItem>> {
    let mut sql = format!("SELECT {MENU_ITEM_COLUMNS} FROM menu_items WHERE is_available = 1");
    let mut args: Vec<String> = Vec::new();

    if let Some(category) = filter.category.as_deref().filter(|c| !c.is_empty()) {
        sql.push_str(" AND category = ?");
        args.push(category.to_string());
    }
    if let Some(keyword) = filter.keyword.as_deref().filter(|k| !k.is_empty()) {
        // SQLite LIKE is ASCII case-insensitive, matching the substring
        // search contract.
        sql.push_str(" AND (name LIKE ? OR description LIKE ? OR category LIKE ?)");
        let pattern = format!("%{keyword}%");
        args.push(pattern.clone());
        args.push(pattern.clone());
        args.push(pattern);
    }
    sql.push_str(" ORDER BY category, name");

    let conn = db.conn.lock().map_err(|_| Error::Lock)?;
    let mut stmt = conn.prepare(&sql)?;
    let items = stmt
        .query_map(params_from_iter(args), MenuItem::from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(items)
}

/// Distinct category labels, for the ordering-page filter control.
pub fn categories(db: &DbState) -> Result<Vec<String>> {
    let conn = db.conn.lock().map_err(|_| Error::Lock)?;
    let mut stmt = conn.prepare("SELECT DISTINCT category FROM menu_items ORDER BY category")?;
    let rows = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

/// Fetch a single entry.
pub fn get(db: &DbState, id: i64) -> Result<MenuItem> {
    let conn = db.conn.lock().map_err(|_| Error::Lock)?;
    conn.query_row(
        &format!("SELECT {MENU_ITEM_COLUMNS} FROM menu_items WHERE id = ?1"),
        params![id],
        MenuItem::from_row,
    )
    .map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => Error::NotFound("menu item"),
        other => Error::Storage(other),
    })
}

// ---------------------------------------------------------------------------
// Create / update / delete
// ---------------------------------------------------------------------------

/// Trim fields, require a non-empty name, fall back to the default category,
/// and clamp the price to non-negative.
fn normalize(input: &NewMenuItem) -> Result<NewMenuItem> {
    let name = input.name.trim();
    if name.is_empty() {
        return Err(Error::Validation("Name is required".to_string()));
    }
    let category = input.category.trim();
    Ok(NewMenuItem {
        name: name.to_string(),
        price: input.price.max(0.0),
        category: if category.is_empty() {
            DEFAULT_CATEGORY.to_string()
        } else {
            category.to_string()
        },
        description: input.description.trim().to_string(),
        image_url: input.image_url.trim().to_string(),
        is_available: input.is_available,
    })
}

/// Create a catalog entry. Returns the new id.
pub fn create(db: &DbState, input: &NewMenuItem) -> Result<i64> {
    let item = normalize(input)?;
    let conn = db.conn.lock().map_err(|_| Error::Lock)?;
    conn.execute(
        "INSERT INTO menu_items (name, price, category, description, image_url, is_available)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            item.name,
            item.price,
            item.category,
            item.description,
            item.image_url,
            item.is_available,
        ],
    )?;
    let id = conn.last_insert_rowid();
    info!(id, name = %item.name, "Menu item created");
    Ok(id)
}

/// Overwrite a catalog entry in place.
pub fn update(db: &DbState, id: i64, input: &NewMenuItem) -> Result<()> {
    let item = normalize(input)?;
    let conn = db.conn.lock().map_err(|_| Error::Lock)?;
    let changed = conn.execute(
        "UPDATE menu_items
         SET name = ?1, price = ?2, category = ?3, description = ?4,
             image_url = ?5, is_available = ?6
         WHERE id = ?7",
        params![
            item.name,
            item.price,
            item.category,
            item.description,
            item.image_url,
            item.is_available,
            id,
        ],
    )?;
    if changed == 0 {
        return Err(Error::NotFound("menu item"));
    }
    Ok(())
}

/// Delete a catalog entry. Unguarded: historical order lines keep their
/// snapshot, only the weak reference is cleared.
pub fn delete(db: &DbState, id: i64) -> Result<()> {
    let conn = db.conn.lock().map_err(|_| Error::Lock)?;
    let changed = conn.execute("DELETE FROM menu_items WHERE id = ?1", params![id])?;
    if changed == 0 {
        return Err(Error::NotFound("menu item"));
    }
    info!(id, "Menu item deleted");
    Ok(())
}

// ---------------------------------------------------------------------------
// Cart views
// ---------------------------------------------------------------------------

/// One display row of the cart. Entries whose catalog row has vanished are
/// skipped; unavailable ones are shown but excluded from the total.
#[derive(Debug, Clone)]
pub struct CartRow {
    pub item_id: i64,
    pub name: String,
    pub unit_price: f64,
    pub quantity: u32,
    pub line_total: f64,
    pub is_available: bool,
}

/// Resolve the cart against the current catalog for display.
pub fn cart_rows(db: &DbState, session: &Session) -> Result<Vec<CartRow>> {
    let conn = db.conn.lock().map_err(|_| Error::Lock)?;
    let mut rows = Vec::new();
    for (&item_id, &quantity) in &session.cart {
        let found = conn
            .query_row(
                "SELECT name, price, is_available FROM menu_items WHERE id = ?1",
                params![item_id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, f64>(1)?,
                        row.get::<_, bool>(2)?,
                    ))
                },
            )
            .map(Some)
            .or_else(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => Ok(None),
                other => Err(Error::Storage(other)),
            })?;
        if let Some((name, unit_price, is_available)) = found {
            rows.push(CartRow {
                item_id,
                name,
                unit_price,
                quantity,
                line_total: unit_price * f64::from(quantity),
                is_available,
            });
        }
    }
    Ok(rows)
}

/// Cart total over entries that still resolve and are currently available.
pub fn cart_total(db: &DbState, session: &Session) -> Result<f64> {
    Ok(cart_rows(db, session)?
        .iter()
        .filter(|row| row.is_available)
        .map(|row| row.line_total)
        .sum())
}

// ---------------------------------------------------------------------------
// CSV bulk import
// ---------------------------------------------------------------------------

/// Recognized bulk-import columns. Matching is case-insensitive; the
/// required columns must all be present in the header row, the optional ones
/// fall back to their defaults when absent or blank.
pub struct ImportColumns {
    pub required: &'static [&'static str],
    pub default_category: &'static str,
    pub default_description: &'static str,
    pub default_image_url: &'static str,
    pub default_is_available: bool,
}

pub const IMPORT_COLUMNS: ImportColumns = ImportColumns {
    required: &["name", "price", "category"],
    default_category: DEFAULT_CATEGORY,
    default_description: "",
    default_image_url: "",
    default_is_available: true,
};

/// Lenient boolean coercion for the `is_available` column. Unrecognized
/// values fall back to the default (available).
fn parse_available(raw: Option<&str>) -> bool {
    match raw.map(|s| s.trim().to_ascii_lowercase()) {
        Some(v) if ["false", "0", "no"].contains(&v.as_str()) => false,
        Some(v) if ["true", "1", "yes"].contains(&v.as_str()) => true,
        _ => IMPORT_COLUMNS.default_is_available,
    }
}

/// Bulk-import catalog entries from CSV.
///
/// The header row must declare at least `name, price, category`
/// (case-insensitive). Every row is validated before anything is written and
/// the insert runs as one transaction, so a structurally invalid file imports
/// nothing. Each valid row becomes a new entry — there is no upsert, so
/// re-importing a file duplicates its rows. Returns the number of rows
/// imported.
pub fn import_csv<R: Read>(db: &DbState, reader: R) -> Result<usize> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);

    let headers = rdr
        .headers()
        .map_err(|e| Error::Import(format!("unreadable header row: {e}")))?
        .clone();
    let index: HashMap<String, usize> = headers
        .iter()
        .enumerate()
        .map(|(i, h)| (h.trim().to_ascii_lowercase(), i))
        .collect();

    for required in IMPORT_COLUMNS.required {
        if !index.contains_key(*required) {
            return Err(Error::Import(
                "file must declare name, price, category columns".to_string(),
            ));
        }
    }
    let field = |record: &csv::StringRecord, column: &str| -> Option<String> {
        index
            .get(column)
            .and_then(|&i| record.get(i))
            .map(|s| s.to_string())
            .filter(|s| !s.is_empty())
    };

    // Validate every row up front; a single bad row rejects the whole file.
    let mut parsed: Vec<NewMenuItem> = Vec::new();
    for (row_no, record) in rdr.records().enumerate() {
        let record = record.map_err(|e| Error::Import(format!("row {}: {e}", row_no + 1)))?;
        let price_raw = field(&record, "price").unwrap_or_default();
        let price: f64 = price_raw.parse().map_err(|_| {
            Error::Import(format!("row {}: unparsable price '{price_raw}'", row_no + 1))
        })?;
        let item = normalize(&NewMenuItem {
            name: field(&record, "name").unwrap_or_default(),
            price,
            category: field(&record, "category")
                .unwrap_or_else(|| IMPORT_COLUMNS.default_category.to_string()),
            description: field(&record, "description")
                .unwrap_or_else(|| IMPORT_COLUMNS.default_description.to_string()),
            image_url: field(&record, "image_url")
                .unwrap_or_else(|| IMPORT_COLUMNS.default_image_url.to_string()),
            is_available: parse_available(field(&record, "is_available").as_deref()),
        })
        .map_err(|e| Error::Import(format!("row {}: {e}", row_no + 1)))?;
        parsed.push(item);
    }

    let conn = db.conn.lock().map_err(|_| Error::Lock)?;
    conn.execute_batch("BEGIN IMMEDIATE")?;

    let result = (|| -> Result<()> {
        for item in &parsed {
            conn.execute(
                "INSERT INTO menu_items (name, price, category, description, image_url, is_available)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    item.name,
                    item.price,
                    item.category,
                    item.description,
                    item.image_url,
                    item.is_available,
                ],
            )?;
        }
        Ok(())
    })();

    match result {
        Ok(()) => {
            conn.execute_batch("COMMIT")?;
        }
        Err(e) => {
            let _ = conn.execute_batch("ROLLBACK");
            return Err(e);
        }
    }

    info!(rows = parsed.len(), "Menu import committed");
    Ok(parsed.len())
}
