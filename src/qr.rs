//! Ordering-link and table QR generation.
//!
//! URL building is pure and always available. PNG rendering sits behind the
//! `qr` cargo feature; without it the rendering entry points return an
//! instructional error and the rest of the page keeps working.

use std::io::Write;

use tracing::info;

use crate::error::Result;

/// Query parameter the ordering page reads the table id from.
pub const DEFAULT_TABLE_PARAM: &str = "table";

/// Build the fully-qualified ordering URL for one table.
///
/// `mobile` appends `&mode=list` so the ordering page defaults to the
/// vertical single-column layout.
pub fn ordering_url(base_url: &str, param_key: &str, table_id: &str, mobile: bool) -> String {
    let mut url = format!(
        "{}/?{}={}",
        base_url.trim_end_matches('/'),
        param_key,
        table_id
    );
    if mobile {
        url.push_str("&mode=list");
    }
    url
}

/// Table ids `prefix + n` for `n` in `[start, start + count)`, each paired
/// with its ordering URL.
pub fn batch_urls(
    base_url: &str,
    param_key: &str,
    prefix: &str,
    start: u32,
    count: u32,
    mobile: bool,
) -> Vec<(String, String)> {
    (start..start.saturating_add(count))
        .map(|n| {
            let table_id = format!("{prefix}{n}");
            let url = ordering_url(base_url, param_key, &table_id, mobile);
            (table_id, url)
        })
        .collect()
}

/// Render a URL as a QR code PNG.
#[cfg(feature = "qr")]
pub fn render_png(url: &str) -> Result<Vec<u8>> {
    use image::Luma;
    use qrcode::QrCode;

    let code = QrCode::new(url.as_bytes())?;
    let img = code.render::<Luma<u8>>().min_dimensions(256, 256).build();

    let mut bytes = Vec::new();
    image::DynamicImage::ImageLuma8(img)
        .write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)?;
    Ok(bytes)
}

/// Render a URL as a QR code PNG. Compiled without the `qr` feature, so this
/// always reports the encoder as unavailable.
#[cfg(not(feature = "qr"))]
pub fn render_png(_url: &str) -> Result<Vec<u8>> {
    Err(crate::error::Error::QrUnavailable)
}

/// Batch-render table QR codes into a deflate ZIP, one `qr_{table_id}.png`
/// per table. Returns the archive bytes.
pub fn batch_zip(
    base_url: &str,
    param_key: &str,
    prefix: &str,
    start: u32,
    count: u32,
    mobile: bool,
) -> Result<Vec<u8>> {
    let mut zip = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
    let options = zip::write::SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated);

    for (table_id, url) in batch_urls(base_url, param_key, prefix, start, count, mobile) {
        let png = render_png(&url)?;
        zip.start_file(format!("qr_{table_id}.png"), options)?;
        zip.write_all(&png)?;
    }

    let cursor = zip.finish()?;
    info!(count, prefix, "Generated table QR archive");
    Ok(cursor.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mobile_url_carries_table_and_list_mode() {
        let url = ordering_url("https://x.test", "table", "A1", true);
        assert_eq!(url, "https://x.test/?table=A1&mode=list");
    }

    #[test]
    fn desktop_url_omits_the_mode_flag() {
        let url = ordering_url("https://x.test", "table", "A1", false);
        assert_eq!(url, "https://x.test/?table=A1");
    }

    #[test]
    fn trailing_slashes_do_not_double_up() {
        let url = ordering_url("https://x.test/", "t", "9", false);
        assert_eq!(url, "https://x.test/?t=9");
    }

    #[test]
    fn batch_ids_walk_the_numeric_range() {
        let pairs = batch_urls("https://x.test", "table", "A", 3, 4, false);
        let ids: Vec<&str> = pairs.iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(ids, ["A3", "A4", "A5", "A6"]);
        assert_eq!(pairs[0].1, "https://x.test/?table=A3");
    }

    #[cfg(feature = "qr")]
    #[test]
    fn render_png_produces_a_png() {
        let bytes = render_png("https://x.test/?table=A1").expect("render");
        assert_eq!(&bytes[..8], b"\x89PNG\r\n\x1a\n");
    }

    #[cfg(feature = "qr")]
    #[test]
    fn batch_zip_names_members_by_table_id() {
        let bytes = batch_zip("https://x.test", "table", "A", 1, 3, true).expect("zip");
        let mut archive =
            zip::ZipArchive::new(std::io::Cursor::new(bytes)).expect("open archive");
        let mut names: Vec<String> = (0..archive.len())
            .map(|i| archive.by_index(i).expect("entry").name().to_string())
            .collect();
        names.sort();
        assert_eq!(names, ["qr_A1.png", "qr_A2.png", "qr_A3.png"]);
    }

    #[cfg(not(feature = "qr"))]
    #[test]
    fn rendering_without_the_feature_reports_unavailable() {
        let err = render_png("https://x.test").expect_err("feature off");
        assert!(matches!(err, crate::error::Error::QrUnavailable));
    }
}
