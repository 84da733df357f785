//! CLI output formatting for every command.
//!
//! Logs go through `tracing`; this module is the human-readable summary a
//! command prints to stdout when it finishes.
//!
//! # Output Format
//!
//! ## Generate
//!
//! ```text
//! Generated 2023-04-01T08:00:00.123Z
//!     Description: A sweet bunny in the style of Monet
//!     Image: images/2023-04-01T08:00:00.123Z.png
//!     Source: https://provider.example/abc.png
//! ```
//!
//! ## Site
//!
//! ```text
//! 001 2023-04-03T08:00:00.000Z → index.html
//!     Prev: 1680393600000.html
//! 002 2023-04-02T08:00:00.000Z → 1680393600000.html
//!     Prev: 1680307200000.html
//!     Next: index.html
//! 003 2023-04-01T08:00:00.000Z → 1680307200000.html
//!     Next: 1680393600000.html
//!
//! Generated 3 pages in images
//! ```
//!
//! ## List
//!
//! ```text
//! 001 2023-04-03T08:00:00.000Z A bunny reading in a Vermeer kitchen...
//!     Image: images/2023-04-03T08:00:00.000Z.png
//! ```
//!
//! Each command has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout.

use crate::site::GalleryPage;
use crate::types::GeneratedImageRecord;
use chrono::{DateTime, SecondsFormat, Utc};
use std::path::Path;

/// Longest description shown on a list line.
const LIST_DESCRIPTION_CHARS: usize = 60;

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

fn format_date(date: DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Truncate text to `max` characters, appending `...` if truncated.
fn truncate_desc(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

// ============================================================================
// Generate
// ============================================================================

pub fn format_generate_output(record: &GeneratedImageRecord) -> Vec<String> {
    vec![
        format!("Generated {}", format_date(record.date)),
        format!("{}Description: {}", indent(1), record.description),
        format!("{}Image: {}", indent(1), record.image_path),
        format!("{}Source: {}", indent(1), record.image_url),
    ]
}

pub fn print_generate_output(record: &GeneratedImageRecord) {
    for line in format_generate_output(record) {
        println!("{}", line);
    }
}

// ============================================================================
// Site
// ============================================================================

pub fn format_site_output(pages: &[GalleryPage], site_dir: &Path) -> Vec<String> {
    let mut lines = Vec::new();
    for (i, page) in pages.iter().enumerate() {
        lines.push(format!(
            "{} {} \u{2192} {}",
            format_index(i + 1),
            format_date(page.record.date),
            page.file_name
        ));
        if let Some(older) = &page.older {
            lines.push(format!("{}Prev: {}", indent(1), older));
        }
        if let Some(newer) = &page.newer {
            lines.push(format!("{}Next: {}", indent(1), newer));
        }
    }
    if !pages.is_empty() {
        lines.push(String::new());
    }
    let noun = if pages.len() == 1 { "page" } else { "pages" };
    lines.push(format!(
        "Generated {} {} in {}",
        pages.len(),
        noun,
        site_dir.display()
    ));
    lines
}

pub fn print_site_output(pages: &[GalleryPage], site_dir: &Path) {
    for line in format_site_output(pages, site_dir) {
        println!("{}", line);
    }
}

// ============================================================================
// List
// ============================================================================

pub fn format_record_list(records: &[GeneratedImageRecord]) -> Vec<String> {
    if records.is_empty() {
        return vec!["No records yet".to_string()];
    }
    let mut lines = Vec::new();
    for (i, record) in records.iter().enumerate() {
        lines.push(format!(
            "{} {} {}",
            format_index(i + 1),
            format_date(record.date),
            truncate_desc(&record.description, LIST_DESCRIPTION_CHARS)
        ));
        lines.push(format!("{}Image: {}", indent(1), record.image_path));
    }
    lines
}

pub fn print_record_list(records: &[GeneratedImageRecord]) {
    for line in format_record_list(records) {
        println!("{}", line);
    }
}
