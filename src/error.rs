//! Crate-wide error type.
//!
//! Variants map onto the distinct failure classes the handlers report
//! differently: validation problems are shown inline and abort the operation
//! with no state change, referential misses become "not found", a missing QR
//! encoder produces an instructional message while the page stays usable, and
//! storage failures roll back and surface as-is.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// User input rejected before any state change.
    #[error("{0}")]
    Validation(String),

    /// A referenced entity no longer exists.
    #[error("{0} not found")]
    NotFound(&'static str),

    /// Structurally invalid bulk-import file. Nothing was written.
    #[error("import rejected: {0}")]
    Import(String),

    /// QR rendering support was compiled out.
    #[error("QR rendering is unavailable: rebuild with the `qr` feature enabled")]
    QrUnavailable,

    #[error("configuration: {0}")]
    Config(String),

    #[error("database lock poisoned")]
    Lock,

    #[error("storage: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("csv: {0}")]
    Csv(#[from] csv::Error),

    #[error("zip: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[cfg(feature = "qr")]
    #[error("qr encode: {0}")]
    Qr(#[from] qrcode::types::QrError),

    #[cfg(feature = "qr")]
    #[error("image encode: {0}")]
    Image(#[from] image::ImageError),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Whether the error is safe to report inline without aborting the page
    /// (validation feedback, missing rows, absent QR encoder).
    pub fn is_user_facing(&self) -> bool {
        matches!(
            self,
            Error::Validation(_) | Error::NotFound(_) | Error::Import(_) | Error::QrUnavailable
        )
    }
}
