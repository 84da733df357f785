//! # Daily Bunny
//!
//! Generates one AI image per day, records it, and publishes a static gallery
//! of every image so far with chronological prev/next navigation.
//!
//! # Architecture: Two Decoupled Halves
//!
//! ```text
//! generate   provider → prompt → image URL → images/<timestamp>.png → store
//! site       store → newest-first records → images/index.html, <millis>.html, ...
//! ```
//!
//! The halves share nothing but the record store. `generate` can fail
//! without touching the gallery, and `site` can be rerun any number of times
//! against the same records with byte-identical results. A scheduler runs
//! `daily`, which is `generate` followed by `site`.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`pipeline`] | The generate half: prompt, image, download, record |
//! | [`site`] | The site half: page planning, neighbor links, HTML rendering |
//! | [`retry`] | Bounded exponential-backoff retry around provider calls |
//! | [`download`] | Streams the generated image to disk |
//! | [`openai`] | Provider client behind the [`openai::GenerationClient`] trait |
//! | [`store`] | Record storage behind the [`store::RecordStore`] trait (MongoDB, in-memory) |
//! | [`config`] | `config.toml` loading, validation, merging, and environment overrides |
//! | [`types`] | The persisted [`types::GeneratedImageRecord`] |
//! | [`naming`] | Timestamp-derived image and page filenames |
//! | [`output`] | CLI summaries for each command |
//!
//! # Design Decisions
//!
//! ## Explicit Configuration
//!
//! The environment and `config.toml` are read once, in `main`. Every module
//! below takes what it needs as parameters, so tests construct a config value
//! instead of setting environment variables.
//!
//! ## Retry Only Where It Helps
//!
//! Both provider calls are retried independently: a flaky image call does not
//! cost a second prompt. The download is not retried, because provider image
//! URLs expire and a failure there usually means the URL is already gone.
//!
//! ## `index.html` Is Always the Newest Day
//!
//! The newest record's page is `index.html`; every other page is named by its
//! record's epoch milliseconds. Page names are a function of the record set
//! alone, which is what makes full rebuilds idempotent.
//!
//! ## Maud Over Template Engines
//!
//! HTML is generated with [Maud](https://maud.lambda.xyz/): a malformed page is
//! a build error, and there are no template files to ship.

pub mod config;
pub mod download;
pub mod naming;
pub mod openai;
pub mod output;
pub mod pipeline;
pub mod retry;
pub mod site;
pub mod store;
pub mod types;

#[cfg(test)]
pub(crate) mod test_helpers;
