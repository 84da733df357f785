//! Static gallery rendering.
//!
//! Reads every record newest-first and writes one HTML page per record. The
//! whole gallery is rebuilt on every run; nothing is incremental.
//!
//! ## Page Chain
//!
//! ```text
//! records (newest first)    page              ← Prev        Next →
//! R[0]  2023-04-03          index.html        1680480000000  (disabled)
//! R[1]  2023-04-02          1680393600000     1680307200000  index.html
//! R[2]  2023-04-01          1680307200000     (disabled)     1680393600000
//! ```
//!
//! "Prev" walks back in time, "Next" walks forward. The newest page is always
//! `index.html`, so the landing page moves forward one day each time a new
//! record appears, and the page that used to be `index.html` gets its
//! timestamp name.
//!
//! Neighbors are resolved once into a list of [`GalleryPage`]s before any HTML
//! is produced; rendering never indexes back into the record list.
//!
//! ## Output
//!
//! Pages go in the same directory as the images and embed them by bare
//! filename. Pages for records that no longer exist are left on disk.
//!
//! ## HTML Generation
//!
//! Uses [maud](https://maud.lambda.xyz/). Captions are escaped with
//! [`escape_html`] instead of maud's own escaping because captions come
//! straight from a language model and maud leaves `'` as-is.

use crate::config::SiteConfig;
use crate::naming;
use crate::store::{RecordStore, StoreError};
use crate::types::{GeneratedImageRecord, SortOrder};
use maud::{DOCTYPE, Markup, PreEscaped, html};
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum SiteError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to read records: {0}")]
    Store(#[from] StoreError),
}

const CSS: &str = include_str!("../static/style.css");

/// One record paired with its page name and its neighbors' page names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GalleryPage {
    pub record: GeneratedImageRecord,
    /// This page's filename.
    pub file_name: String,
    /// Page of the next-older record, target of "Prev".
    pub older: Option<String>,
    /// Page of the next-newer record, target of "Next".
    pub newer: Option<String>,
}

/// A rendered page ready to be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedPage {
    pub file_name: String,
    pub html: String,
}

/// Pair each record with its page name and neighbors.
///
/// `records` must be sorted newest first.
pub fn plan_pages(records: &[GeneratedImageRecord]) -> Vec<GalleryPage> {
    let names: Vec<String> = records
        .iter()
        .enumerate()
        .map(|(pos, record)| naming::page_file_name(pos, record.date))
        .collect();

    records
        .iter()
        .zip(&names)
        .enumerate()
        .map(|(pos, (record, file_name))| GalleryPage {
            record: record.clone(),
            file_name: file_name.clone(),
            older: names.get(pos + 1).cloned(),
            newer: pos.checked_sub(1).map(|newer| names[newer].clone()),
        })
        .collect()
}

/// Render every planned page.
pub fn render_pages(pages: &[GalleryPage], site: &SiteConfig) -> Vec<RenderedPage> {
    pages
        .iter()
        .map(|page| RenderedPage {
            file_name: page.file_name.clone(),
            html: render_page(page, site).into_string(),
        })
        .collect()
}

/// Write rendered pages into `site_dir`, overwriting existing files.
pub async fn write_pages(pages: &[RenderedPage], site_dir: &Path) -> Result<(), SiteError> {
    tokio::fs::create_dir_all(site_dir).await?;
    for page in pages {
        tokio::fs::write(site_dir.join(&page.file_name), &page.html).await?;
        debug!(page = %page.file_name, "Wrote page");
    }
    Ok(())
}

/// Rebuild the whole gallery from the store.
///
/// Returns the page plan so callers can report what was written.
pub async fn build_site(
    store: &dyn RecordStore,
    site_dir: &Path,
    site: &SiteConfig,
) -> Result<Vec<GalleryPage>, SiteError> {
    let records = store.list_sorted_by_date(SortOrder::Descending).await?;
    let pages = plan_pages(&records);
    let rendered = render_pages(&pages, site);
    write_pages(&rendered, site_dir).await?;
    info!(
        pages = pages.len(),
        dir = %site_dir.display(),
        "Site generated"
    );
    Ok(pages)
}

/// Escape text for use in both element content and quoted attributes.
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

// ============================================================================
// HTML Components
// ============================================================================

/// Renders a single gallery page.
fn render_page(page: &GalleryPage, site: &SiteConfig) -> Markup {
    let caption = PreEscaped(escape_html(&page.record.description));
    let src = naming::image_src(&page.record.image_path);

    html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="UTF-8";
                meta name="viewport" content="width=device-width, initial-scale=1.0";
                title { (site.title) }
                style { (PreEscaped(CSS)) }
            }
            body {
                figure {
                    img src=(src) alt=(caption);
                    p.caption { (caption) }
                }
                nav.nav-links {
                    (nav_link(page.older.as_deref(), PreEscaped("&larr; Prev")))
                    (nav_link(page.newer.as_deref(), PreEscaped("Next &rarr;")))
                }
            }
        }
    }
}

/// A neighbor link, or an inert placeholder with no `href` at either end.
fn nav_link(target: Option<&str>, label: PreEscaped<&str>) -> Markup {
    html! {
        @match target {
            Some(href) => { a href=(href) { (label) } }
            None => { a.disabled aria-disabled="true" { (label) } }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
