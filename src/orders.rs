//! Order submission and back-office lifecycle management.
//!
//! Submission turns the session cart into one order header plus line
//! snapshots inside a single transaction: either the header, all its lines,
//! and the final total land together, or nothing does. After creation only
//! the status and `updated_at` are ever mutated.

use chrono::{NaiveDate, SecondsFormat, TimeZone, Utc};
use chrono_tz::Tz;
use rusqlite::{params, params_from_iter};
use tracing::info;

use crate::db::DbState;
use crate::error::{Error, Result};
use crate::models::{Order, OrderItem, OrderStatus};
use crate::session::Session;
use crate::{format_currency, format_local, now_utc_string};

const ORDER_COLUMNS: &str = "id, customer_name, table_no, contact, note, status, total_price, \
                             channel, source_ip, created_at, updated_at";

// ---------------------------------------------------------------------------
// Submission
// ---------------------------------------------------------------------------

/// Contact fields entered on the ordering page. All free text, all optional.
#[derive(Debug, Clone, Default)]
pub struct ContactInfo {
    pub customer_name: String,
    pub table_no: String,
    pub contact: String,
    pub note: String,
}

/// Outcome of a successful submission, for the confirmation display.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmittedOrder {
    pub id: i64,
    pub total: f64,
}

/// Submit the session cart as a new order.
///
/// Cart entries whose catalog row has been deleted since they were added are
/// skipped silently — not an error, not a line item. Entries that resolve are
/// captured with their current name and price regardless of availability.
/// On success the cart is cleared; on any storage failure the transaction is
/// rolled back and the cart is left untouched.
pub fn submit_order(
    db: &DbState,
    session: &mut Session,
    contact: &ContactInfo,
    source_ip: Option<&str>,
) -> Result<SubmittedOrder> {
    if session.cart_is_empty() {
        return Err(Error::Validation("Cart is empty".to_string()));
    }

    let now = now_utc_string();
    let conn = db.conn.lock().map_err(|_| Error::Lock)?;

    conn.execute_batch("BEGIN IMMEDIATE")?;

    let result = (|| -> Result<SubmittedOrder> {
        conn.execute(
            "INSERT INTO orders (
                customer_name, table_no, contact, note, status,
                total_price, channel, source_ip, created_at, updated_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, 0, 'onsite', ?6, ?7, ?7)",
            params![
                contact.customer_name.trim(),
                contact.table_no.trim(),
                contact.contact.trim(),
                contact.note.trim(),
                OrderStatus::New.as_str(),
                source_ip.unwrap_or(""),
                now,
            ],
        )?;
        let order_id = conn.last_insert_rowid();

        let mut total = 0.0;
        for (&item_id, &quantity) in &session.cart {
            let found: Option<(String, f64)> = conn
                .query_row(
                    "SELECT name, price FROM menu_items WHERE id = ?1",
                    params![item_id],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .map(Some)
                .or_else(|e| match e {
                    rusqlite::Error::QueryReturnedNoRows => Ok(None),
                    other => Err(Error::Storage(other)),
                })?;
            let Some((name, price)) = found else {
                // Deleted after being added to the cart.
                continue;
            };
            conn.execute(
                "INSERT INTO order_items (order_id, item_id, item_name, unit_price, quantity)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![order_id, item_id, name, price, quantity],
            )?;
            total += price * f64::from(quantity);
        }

        conn.execute(
            "UPDATE orders SET total_price = ?1, updated_at = ?2 WHERE id = ?3",
            params![total, now, order_id],
        )?;

        Ok(SubmittedOrder {
            id: order_id,
            total,
        })
    })();

    match result {
        Ok(submitted) => {
            conn.execute_batch("COMMIT")?;
            drop(conn);
            session.clear_cart();
            info!(
                order_id = submitted.id,
                total = submitted.total,
                "Order submitted"
            );
            Ok(submitted)
        }
        Err(e) => {
            let _ = conn.execute_batch("ROLLBACK");
            Err(e)
        }
    }
}

// ---------------------------------------------------------------------------
// Admin listing
// ---------------------------------------------------------------------------

/// Back-office listing filter.
///
/// The date range is inclusive at day granularity in the display timezone.
/// An empty `statuses` set means "no status filter" (all statuses), matching
/// how an all-deselected control behaves on the admin page. `keyword` is a
/// case-insensitive substring match across customer name, table number, and
/// contact.
#[derive(Debug, Clone)]
pub struct OrderFilter {
    pub date_from: NaiveDate,
    pub date_to: NaiveDate,
    pub statuses: Vec<OrderStatus>,
    pub keyword: Option<String>,
}

/// Convert an inclusive local-day range to UTC RFC3339 bounds matching the
/// stored timestamp form.
fn day_bounds_utc(date_from: NaiveDate, date_to: NaiveDate, tz: Tz) -> (String, String) {
    let to_utc = |date: NaiveDate, h: u32, m: u32, s: u32| -> String {
        let naive = date
            .and_hms_opt(h, m, s)
            .unwrap_or_else(|| date.and_time(chrono::NaiveTime::MIN));
        let local = match tz.from_local_datetime(&naive).earliest() {
            Some(dt) => dt,
            // DST gap at the boundary: interpret the wall time as UTC.
            None => Utc.from_utc_datetime(&naive).with_timezone(&tz),
        };
        local
            .with_timezone(&Utc)
            .to_rfc3339_opts(SecondsFormat::Secs, true)
    };
    (
        to_utc(date_from, 0, 0, 0),
        to_utc(date_to, 23, 59, 59),
    )
}

/// List orders matching the filter, newest first.
pub fn list_orders(db: &DbState, tz: Tz, filter: &OrderFilter) -> Result<Vec<Order>> {
    let (lower, upper) = day_bounds_utc(filter.date_from, filter.date_to, tz);

    let mut sql =
        format!("SELECT {ORDER_COLUMNS} FROM orders WHERE created_at >= ? AND created_at <= ?");
    let mut args: Vec<String> = vec![lower, upper];

    if !filter.statuses.is_empty() {
        let placeholders = vec!["?"; filter.statuses.len()].join(", ");
        sql.push_str(&format!(" AND status IN ({placeholders})"));
        args.extend(filter.statuses.iter().map(|s| s.as_str().to_string()));
    }
    if let Some(keyword) = filter.keyword.as_deref().filter(|k| !k.is_empty()) {
        sql.push_str(" AND (customer_name LIKE ? OR table_no LIKE ? OR contact LIKE ?)");
        let pattern = format!("%{keyword}%");
        args.push(pattern.clone());
        args.push(pattern.clone());
        args.push(pattern);
    }
    sql.push_str(" ORDER BY created_at DESC, id DESC");

    let conn = db.conn.lock().map_err(|_| Error::Lock)?;
    let mut stmt = conn.prepare(&sql)?;
    let orders = stmt
        .query_map(params_from_iter(args), Order::from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(orders)
}

/// Fetch one order header for the detail view.
pub fn get_order(db: &DbState, id: i64) -> Result<Order> {
    let conn = db.conn.lock().map_err(|_| Error::Lock)?;
    conn.query_row(
        &format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = ?1"),
        params![id],
        Order::from_row,
    )
    .map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => Error::NotFound("order"),
        other => Error::Storage(other),
    })
}

/// Fetch the line snapshots of an order.
pub fn get_order_items(db: &DbState, order_id: i64) -> Result<Vec<OrderItem>> {
    let conn = db.conn.lock().map_err(|_| Error::Lock)?;
    let mut stmt = conn.prepare(
        "SELECT id, order_id, item_id, item_name, unit_price, quantity
         FROM order_items WHERE order_id = ?1 ORDER BY id",
    )?;
    let items = stmt
        .query_map(params![order_id], OrderItem::from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(items)
}

// ---------------------------------------------------------------------------
// Lifecycle mutations
// ---------------------------------------------------------------------------

/// Overwrite the status. Any status may replace any other; only
/// `updated_at` is refreshed alongside.
pub fn update_status(db: &DbState, id: i64, status: OrderStatus) -> Result<()> {
    let now = now_utc_string();
    let conn = db.conn.lock().map_err(|_| Error::Lock)?;
    let changed = conn.execute(
        "UPDATE orders SET status = ?1, updated_at = ?2 WHERE id = ?3",
        params![status.as_str(), now, id],
    )?;
    if changed == 0 {
        return Err(Error::NotFound("order"));
    }
    info!(order_id = id, status = %status, "Order status updated");
    Ok(())
}

/// Delete an order and, by cascade, all of its lines. Irreversible.
pub fn delete_order(db: &DbState, id: i64) -> Result<()> {
    let conn = db.conn.lock().map_err(|_| Error::Lock)?;
    let changed = conn.execute("DELETE FROM orders WHERE id = ?1", params![id])?;
    if changed == 0 {
        return Err(Error::NotFound("order"));
    }
    info!(order_id = id, "Order deleted");
    Ok(())
}

// ---------------------------------------------------------------------------
// Export
// ---------------------------------------------------------------------------

/// Serialize a listing (header-level only) to CSV with a header row.
/// Creation times are rendered in the display timezone.
pub fn export_csv(orders: &[Order], tz: Tz) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(Vec::new());
    wtr.write_record(["id", "created_at", "customer_name", "table_no", "status", "total"])?;
    for order in orders {
        wtr.write_record([
            order.id.to_string(),
            format_local(&order.created_at, tz, "%Y-%m-%d %H:%M"),
            order.customer_name.clone(),
            order.table_no.clone(),
            order.status.as_str().to_string(),
            format_currency(order.total_price),
        ])?;
    }
    let bytes = wtr.into_inner().map_err(|e| Error::Io(e.into_error()))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}
