//! Data model for the catalog and the order ledger.
//!
//! Order lines carry a denormalized snapshot of the item name and unit price
//! taken at submission time, plus an optional weak reference back to the
//! originating catalog row. The snapshot is authoritative for display; the
//! reference is only for best-effort cross-linking and may be NULL once the
//! catalog row is deleted.

use std::fmt;

use rusqlite::Row;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Fallback category label applied when none is given.
pub const DEFAULT_CATEGORY: &str = "Main";

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

/// A sellable menu item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MenuItem {
    pub id: i64,
    pub name: String,
    pub price: f64,
    pub category: String,
    pub description: String,
    pub image_url: String,
    pub is_available: bool,
}

impl MenuItem {
    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(MenuItem {
            id: row.get(0)?,
            name: row.get(1)?,
            price: row.get(2)?,
            category: row.get(3)?,
            description: row.get(4)?,
            image_url: row.get(5)?,
            is_available: row.get(6)?,
        })
    }
}

/// Fields for creating or overwriting a menu item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewMenuItem {
    pub name: String,
    pub price: f64,
    pub category: String,
    pub description: String,
    pub image_url: String,
    pub is_available: bool,
}

impl Default for NewMenuItem {
    fn default() -> Self {
        NewMenuItem {
            name: String::new(),
            price: 0.0,
            category: String::new(),
            description: String::new(),
            image_url: String::new(),
            is_available: true,
        }
    }
}

// ---------------------------------------------------------------------------
// Order lifecycle
// ---------------------------------------------------------------------------

/// Lifecycle status of an order. Staff may overwrite any status with any
/// other; no forward-only transition order is enforced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderStatus {
    New,
    Confirmed,
    Preparing,
    Served,
    Cancelled,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 5] = [
        OrderStatus::New,
        OrderStatus::Confirmed,
        OrderStatus::Preparing,
        OrderStatus::Served,
        OrderStatus::Cancelled,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::New => "NEW",
            OrderStatus::Confirmed => "CONFIRMED",
            OrderStatus::Preparing => "PREPARING",
            OrderStatus::Served => "SERVED",
            OrderStatus::Cancelled => "CANCELLED",
        }
    }

    /// Parse the stored wire form (case-insensitive).
    pub fn parse(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        Self::ALL
            .into_iter()
            .find(|v| v.as_str().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| Error::Validation(format!("Unknown order status: {trimmed}")))
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The durable record of one completed submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: i64,
    pub customer_name: String,
    pub table_no: String,
    pub contact: String,
    pub note: String,
    pub status: OrderStatus,
    pub total_price: f64,
    pub channel: String,
    pub source_ip: String,
    /// UTC RFC3339, seconds precision.
    pub created_at: String,
    pub updated_at: String,
}

impl Order {
    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let status_raw: String = row.get(5)?;
        let status = OrderStatus::parse(&status_raw).map_err(|_| {
            rusqlite::Error::FromSqlConversionFailure(
                5,
                rusqlite::types::Type::Text,
                format!("unknown order status: {status_raw}").into(),
            )
        })?;
        Ok(Order {
            id: row.get(0)?,
            customer_name: row.get(1)?,
            table_no: row.get(2)?,
            contact: row.get(3)?,
            note: row.get(4)?,
            status,
            total_price: row.get(6)?,
            channel: row.get(7)?,
            source_ip: row.get(8)?,
            created_at: row.get(9)?,
            updated_at: row.get(10)?,
        })
    }
}

/// One immutable snapshot line of an order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: i64,
    pub order_id: i64,
    /// Weak reference to the originating menu item; NULL once that row is
    /// deleted. Never dereferenced for display.
    pub item_id: Option<i64>,
    pub item_name: String,
    pub unit_price: f64,
    pub quantity: u32,
}

impl OrderItem {
    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(OrderItem {
            id: row.get(0)?,
            order_id: row.get(1)?,
            item_id: row.get(2)?,
            item_name: row.get(3)?,
            unit_price: row.get(4)?,
            quantity: row.get(5)?,
        })
    }

    pub fn line_total(&self) -> f64 {
        self.unit_price * f64::from(self.quantity)
    }
}
