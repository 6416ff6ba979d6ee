//! Tableside — restaurant self-ordering and back-office backend.
//!
//! Customers browse the catalog and submit orders against a per-session
//! cart; staff manage the menu, walk orders through their lifecycle, and
//! print table QR codes. State lives in SQLite behind [`db::DbState`];
//! transient per-session state (cart, admin flag) lives in
//! [`session::Session`], which the embedding UI passes into every handler.

use chrono::{DateTime, SecondsFormat, Utc};
use chrono_tz::Tz;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod menu;
pub mod models;
pub mod orders;
pub mod qr;
pub mod session;

pub use config::AppConfig;
pub use error::{Error, Result};
pub use session::Session;

/// Initialize structured logging. Honors `RUST_LOG`; safe to call more than
/// once (later calls are no-ops).
pub fn init_logging() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,tableside=debug"));
    let console_layer = fmt::layer().with_target(true);
    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .try_init();
}

/// Current time in the stored timestamp form: UTC RFC3339 at seconds
/// precision with a `Z` suffix. Fixed-width, so string comparison matches
/// chronological order.
pub fn now_utc_string() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Render a price for display, e.g. `¥1,234.50`.
pub fn format_currency(amount: f64) -> String {
    let negative = amount < 0.0;
    let formatted = format!("{:.2}", amount.abs());
    let (int_part, frac_part) = formatted.split_once('.').unwrap_or((formatted.as_str(), "00"));

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    format!("¥{}{grouped}.{frac_part}", if negative { "-" } else { "" })
}

/// Render a stored timestamp in the display timezone. Falls back to the raw
/// string if it does not parse.
pub fn format_local(raw: &str, tz: Tz, fmt_str: &str) -> String {
    match DateTime::parse_from_rfc3339(raw) {
        Ok(dt) => dt.with_timezone(&tz).format(fmt_str).to_string(),
        Err(_) => raw.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono_tz::Asia::Tokyo;

    #[test]
    fn currency_groups_thousands_and_keeps_two_decimals() {
        assert_eq!(format_currency(0.0), "¥0.00");
        assert_eq!(format_currency(9.5), "¥9.50");
        assert_eq!(format_currency(1234.5), "¥1,234.50");
        assert_eq!(format_currency(1_234_567.0), "¥1,234,567.00");
        assert_eq!(format_currency(-28.0), "¥-28.00");
    }

    #[test]
    fn stored_timestamps_sort_lexicographically() {
        let earlier = "2024-03-09T23:59:59Z";
        let later = "2024-03-10T00:00:00Z";
        assert!(earlier < later);
        let now = now_utc_string();
        assert!(now.ends_with('Z'));
        assert_eq!(now.len(), earlier.len());
    }

    #[test]
    fn format_local_converts_into_the_display_timezone() {
        let rendered = format_local("2024-03-09T15:00:00Z", Tokyo, "%Y-%m-%d %H:%M");
        assert_eq!(rendered, "2024-03-10 00:00");
    }

    #[test]
    fn format_local_falls_back_on_unparsable_input() {
        assert_eq!(format_local("not a date", Tokyo, "%Y"), "not a date");
    }
}
