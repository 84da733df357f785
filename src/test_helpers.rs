//! Shared test utilities for the daily-bunny test suite.
//!
//! Record fixtures, a throwaway HTTP server for provider and image-host
//! stand-ins, a warning counter for log assertions, and page lookups that panic with a clear message on miss.
//!
//! # Usage
//!
//! ```rust,ignore
//! use crate::test_helpers::*;
//!
//! let records = newest_first(&[1_000, 2_000, 3_000]);
//! let pages = plan_pages(&records);
//! let index = find_page(&pages, "index.html");
//! assert_eq!(index.older.as_deref(), Some("2000.html"));
//! ```

use chrono::{TimeZone, Utc};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::subscriber::DefaultGuard;
use tracing_subscriber::Layer;
use tracing_subscriber::layer::{Context, SubscriberExt};

use crate::site::GalleryPage;
use crate::types::GeneratedImageRecord;

// =========================================================================
// Record fixtures
// =========================================================================

/// A valid record dated `millis` after the epoch, with the given caption.
pub fn record_at(millis: i64, description: &str) -> GeneratedImageRecord {
    let date = Utc
        .timestamp_millis_opt(millis)
        .single()
        .unwrap_or_else(|| panic!("{millis} is not a valid timestamp"));
    GeneratedImageRecord::new(
        format!("https://images.example/{millis}.png"),
        format!("images/{millis}.png"),
        description,
        date,
    )
}

/// Records for the given timestamps, sorted newest first (as a store returns them).
pub fn newest_first(millis: &[i64]) -> Vec<GeneratedImageRecord> {
    let mut records: Vec<_> = millis
        .iter()
        .map(|&m| record_at(m, &format!("bunny {m}")))
        .collect();
    records.sort_by(|a, b| b.date.cmp(&a.date));
    records
}

// =========================================================================
// HTTP fixtures
// =========================================================================

/// Serve `router` on an ephemeral local port and return its base URL.
pub async fn serve(router: axum::Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

// =========================================================================
// Log capture
// =========================================================================

/// Counts `WARN` events while installed as the thread's default subscriber.
#[derive(Clone, Default)]
pub struct WarnCounter(Arc<AtomicUsize>);

impl WarnCounter {
    /// Install on the current thread until the guard drops.
    pub fn install(&self) -> DefaultGuard {
        tracing::subscriber::set_default(tracing_subscriber::registry().with(self.clone()))
    }

    pub fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

impl<S: tracing::Subscriber> Layer<S> for WarnCounter {
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        if *event.metadata().level() == tracing::Level::WARN {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }
}

// =========================================================================
// Page lookups
// =========================================================================

/// Find a planned page by filename. Panics if not found.
pub fn find_page<'a>(pages: &'a [GalleryPage], file_name: &str) -> &'a GalleryPage {
    pages
        .iter()
        .find(|p| p.file_name == file_name)
        .unwrap_or_else(|| {
            let names: Vec<&str> = pages.iter().map(|p| p.file_name.as_str()).collect();
            panic!("page '{file_name}' not found. Available: {names:?}")
        })
}
