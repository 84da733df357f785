//! Centralized filename conventions.
//!
//! Every file this crate writes is named from a record's timestamp, so the
//! rules live in one place and the pipeline and renderer cannot drift apart:
//!
//! - Downloaded images: `2023-04-01T08:00:00.000Z.png` (ISO-8601, millisecond
//!   precision, UTC; the same string a browser's `Date.toISOString()` gives)
//! - Gallery pages: `1680336000000.html` (Unix epoch milliseconds)
//! - The newest page is always `index.html`
//!
//! Page names depend only on the record's own timestamp and its position
//! (newest or not), so they are stable across rebuilds.

use chrono::{DateTime, SecondsFormat, Utc};
use std::path::Path;

/// Filename of the gallery landing page (the newest record).
pub const INDEX_PAGE: &str = "index.html";

/// Extension of downloaded images. The provider always serves PNG.
pub const IMAGE_EXTENSION: &str = "png";

/// Image filename for a capture time: `<ISO-8601>.png`.
pub fn image_file_name(captured_at: DateTime<Utc>) -> String {
    format!(
        "{}.{}",
        captured_at.to_rfc3339_opts(SecondsFormat::Millis, true),
        IMAGE_EXTENSION
    )
}

/// Page filename for a record timestamp: `<epoch millis>.html`.
pub fn timestamp_page_name(date: DateTime<Utc>) -> String {
    format!("{}.html", date.timestamp_millis())
}

/// Page filename for the record at `position` in the newest-first listing.
///
/// - `0` → [`INDEX_PAGE`]
/// - otherwise → [`timestamp_page_name`]
pub fn page_file_name(position: usize, date: DateTime<Utc>) -> String {
    if position == 0 {
        INDEX_PAGE.to_string()
    } else {
        timestamp_page_name(date)
    }
}

/// The `src` used by a page to embed its image: the file-name component only.
///
/// Pages are served from the same directory as the images, so the stored
/// directory part (which may be absolute or root-relative) is dropped.
pub fn image_src(image_path: &str) -> String {
    Path::new(image_path)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| image_path.to_string())
}

/// Express `path` relative to `root` for storage.
///
/// Paths outside `root` are kept as given.
pub fn relative_to(path: &Path, root: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::path::PathBuf;

    fn at(millis: i64) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(millis).unwrap()
    }

    #[test]
    fn image_name_is_iso_with_millis() {
        assert_eq!(
            image_file_name(at(1_680_336_000_123)),
            "2023-04-01T08:00:00.123Z.png"
        );
    }

    #[test]
    fn image_name_keeps_zero_millis() {
        assert_eq!(
            image_file_name(at(1_680_336_000_000)),
            "2023-04-01T08:00:00.000Z.png"
        );
    }

    #[test]
    fn first_position_is_index() {
        assert_eq!(page_file_name(0, at(1_680_336_000_000)), "index.html");
    }

    #[test]
    fn later_positions_use_epoch_millis() {
        assert_eq!(page_file_name(1, at(1_680_336_000_000)), "1680336000000.html");
        assert_eq!(page_file_name(7, at(42)), "42.html");
    }

    #[test]
    fn image_src_strips_directories() {
        assert_eq!(image_src("/images/2023-04-01T08:00:00.000Z.png"), "2023-04-01T08:00:00.000Z.png");
        assert_eq!(image_src("images/a.png"), "a.png");
        assert_eq!(image_src("a.png"), "a.png");
    }

    #[test]
    fn relative_to_strips_root() {
        let root = PathBuf::from("/srv/bunny");
        let path = root.join("images/a.png");
        assert_eq!(relative_to(&path, &root), "images/a.png");
    }

    #[test]
    fn relative_to_keeps_foreign_paths() {
        let path = PathBuf::from("/elsewhere/a.png");
        assert_eq!(relative_to(&path, Path::new("/srv/bunny")), "/elsewhere/a.png");
    }
}
