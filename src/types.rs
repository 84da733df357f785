//! Shared types used by both the generation pipeline and the site renderer.
//!
//! The record is the only thing the two halves have in common: the pipeline
//! writes one per run, the renderer reads all of them back. Field names on
//! the wire are camelCase so documents written by earlier deployments
//! (which also carry `_id` and `__v`) deserialize unchanged.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One generated image, as persisted in the record store.
///
/// Records are immutable once inserted. `date` is both the sort key and the
/// source of the page filename, so it is kept at millisecond precision to
/// survive a round trip through BSON unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedImageRecord {
    /// Provider-hosted URL the image was downloaded from. Audit only.
    pub image_url: String,
    /// Local image path, relative to the root directory.
    pub image_path: String,
    /// Prompt the image was generated from; doubles as the caption.
    pub description: String,
    /// Capture time.
    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub date: DateTime<Utc>,
}

#[derive(Error, Debug, PartialEq, Eq)]
#[error("record field `{0}` is required")]
pub struct MissingField(pub &'static str);

impl GeneratedImageRecord {
    pub fn new(
        image_url: impl Into<String>,
        image_path: impl Into<String>,
        description: impl Into<String>,
        date: DateTime<Utc>,
    ) -> Self {
        Self {
            image_url: image_url.into(),
            image_path: image_path.into(),
            description: description.into(),
            date,
        }
    }

    /// Check that every required field is present and non-empty.
    ///
    /// Stores call this before inserting so a half-filled record never lands.
    pub fn validate(&self) -> Result<(), MissingField> {
        let fields = [
            ("imageUrl", &self.image_url),
            ("imagePath", &self.image_path),
            ("description", &self.description),
        ];
        for (name, value) in fields {
            if value.trim().is_empty() {
                return Err(MissingField(name));
            }
        }
        Ok(())
    }
}

/// Sort direction for record listings, keyed on `date`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    Ascending,
    #[default]
    Descending,
}

impl SortOrder {
    /// The MongoDB sort specifier value for this direction.
    pub fn as_mongo(self) -> i32 {
        match self {
            SortOrder::Ascending => 1,
            SortOrder::Descending => -1,
        }
    }
}
