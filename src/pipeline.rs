//! Daily image generation.
//!
//! One run produces one gallery entry:
//!
//! ```text
//! 1. describe   chat completion → prompt text        (retried)
//! 2. paint      image generation → provider URL      (retried, independently)
//! 3. download   URL → <image_dir>/<ISO timestamp>.png (not retried)
//! 4. record     insert { imageUrl, imagePath, description, date }
//! 5. confirm    read every record back, newest first
//! ```
//!
//! Each step either succeeds or ends the run. Nothing is recorded unless the
//! image is on disk, so the store never references a file that does not exist.

use crate::config::AppConfig;
use crate::download::{DownloadError, download_image};
use crate::naming;
use crate::openai::{GenerationClient, GenerationError};
use crate::retry::{RetryPolicy, with_retry};
use crate::store::{RecordStore, StoreError};
use crate::types::{GeneratedImageRecord, SortOrder};
use chrono::{DateTime, SubsecRound, Utc};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

/// Images requested per run.
const IMAGE_COUNT: u32 = 1;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Prompt generation failed")]
    Prompt(#[source] GenerationError),
    #[error("Image generation failed")]
    Image(#[source] GenerationError),
    #[error("Image download failed")]
    Download(#[from] DownloadError),
    #[error("Record store failed")]
    Store(#[from] StoreError),
}

/// Everything a run needs from the configuration, resolved against the root.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub system_prompt: String,
    pub user_prompt: String,
    pub image_size: String,
    pub retry: RetryPolicy,
    /// Directory images are written to.
    pub image_dir: PathBuf,
    /// Stored image paths are made relative to this.
    pub root: PathBuf,
}

impl PipelineSettings {
    pub fn from_config(config: &AppConfig, root: &Path) -> Self {
        Self {
            system_prompt: config.prompt.system.clone(),
            user_prompt: config.prompt.user.clone(),
            image_size: config.openai.image_size.clone(),
            retry: config.retry.policy(),
            image_dir: config.paths.image_dir_in(root),
            root: root.to_path_buf(),
        }
    }
}

pub struct Pipeline<'a> {
    client: &'a dyn GenerationClient,
    store: &'a dyn RecordStore,
    http: &'a reqwest::Client,
    settings: PipelineSettings,
    clock: fn() -> DateTime<Utc>,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        client: &'a dyn GenerationClient,
        store: &'a dyn RecordStore,
        http: &'a reqwest::Client,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            client,
            store,
            http,
            settings,
            clock: Utc::now,
        }
    }

    /// Replace the capture-time source.
    pub fn with_clock(mut self, clock: fn() -> DateTime<Utc>) -> Self {
        self.clock = clock;
        self
    }

    /// Run all five steps and return the stored record.
    pub async fn run(&self) -> Result<GeneratedImageRecord, PipelineError> {
        let settings = &self.settings;

        let prompt = with_retry(&settings.retry, || {
            self.client
                .complete_text(&settings.system_prompt, &settings.user_prompt)
        })
        .await
        .map_err(PipelineError::Prompt)?;
        info!(prompt = %prompt, "Generated prompt");

        // Mongo keeps milliseconds; truncating now keeps the page name stable.
        let captured_at = (self.clock)().trunc_subsecs(3);

        let image_url = with_retry(&settings.retry, || {
            self.client
                .generate_image(&prompt, IMAGE_COUNT, &settings.image_size)
        })
        .await
        .map_err(PipelineError::Image)?;
        info!(url = %image_url, "Generated image URL");

        let image_path = settings
            .image_dir
            .join(naming::image_file_name(captured_at));
        let bytes = download_image(self.http, &image_url, &image_path).await?;
        info!(path = %image_path.display(), bytes, "Image downloaded");

        let record = GeneratedImageRecord::new(
            image_url,
            naming::relative_to(&image_path, &settings.root),
            prompt,
            captured_at,
        );
        let saved = self.store.insert(record).await?;
        info!(path = %saved.image_path, date = %saved.date, "Record saved");

        let all = self.store.list_sorted_by_date(SortOrder::Descending).await?;
        info!(records = all.len(), "Gallery records after insert");

        Ok(saved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::test_helpers::serve;
    use async_trait::async_trait;
    use axum::Router;
    use axum::http::StatusCode;
    use axum::routing::get;
    use chrono::TimeZone;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;
    use tempfile::TempDir;

    /// Fails each call kind a set number of times, then succeeds.
    struct ScriptedClient {
        image_url: String,
        prompt_failures: u32,
        image_failures: u32,
        prompt_calls: AtomicU32,
        image_calls: AtomicU32,
    }

    impl ScriptedClient {
        fn new(image_url: String) -> Self {
            Self {
                image_url,
                prompt_failures: 0,
                image_failures: 0,
                prompt_calls: AtomicU32::new(0),
                image_calls: AtomicU32::new(0),
            }
        }
    }

    fn flaky(call: u32) -> GenerationError {
        GenerationError::Api {
            status: reqwest::StatusCode::SERVICE_UNAVAILABLE,
            message: format!("call {call} failed"),
        }
    }

    #[async_trait]
    impl GenerationClient for ScriptedClient {
        async fn complete_text(&self, _: &str, _: &str) -> Result<String, GenerationError> {
            let call = self.prompt_calls.fetch_add(1, Ordering::SeqCst) + 1;
            if call <= self.prompt_failures {
                return Err(flaky(call));
            }
            Ok("A sweet bunny in the style of Monet".to_string())
        }

        async fn generate_image(
            &self,
            prompt: &str,
            count: u32,
            size: &str,
        ) -> Result<String, GenerationError> {
            assert_eq!(prompt, "A sweet bunny in the style of Monet");
            assert_eq!(count, 1);
            assert_eq!(size, "1024x1024");
            let call = self.image_calls.fetch_add(1, Ordering::SeqCst) + 1;
            if call <= self.image_failures {
                return Err(flaky(call));
            }
            Ok(self.image_url.clone())
        }
    }

    fn settings(root: &Path, retries: u32) -> PipelineSettings {
        let mut settings = PipelineSettings::from_config(&AppConfig::default(), root);
        settings.retry = RetryPolicy::new(retries, Duration::ZERO);
        settings
    }

    fn fixed_clock() -> DateTime<Utc> {
        Utc.timestamp_nanos(1_680_336_000_123_456_789)
    }

    async fn image_host() -> String {
        let router = Router::new()
            .route("/ok.png", get(|| async { &b"png bytes"[..] }))
            .route("/expired.png", get(|| async { StatusCode::FORBIDDEN }));
        serve(router).await
    }

    #[test]
    fn settings_resolve_image_dir_under_root() {
        let settings = PipelineSettings::from_config(&AppConfig::default(), Path::new("/srv/bunny"));
        assert_eq!(settings.image_dir, PathBuf::from("/srv/bunny/images"));
        assert_eq!(settings.retry, RetryPolicy::default());
    }

    #[tokio::test]
    async fn run_downloads_then_records() {
        let host = image_host().await;
        let tmp = TempDir::new().unwrap();
        let client = ScriptedClient::new(format!("{host}/ok.png"));
        let store = MemoryStore::new();
        let http = reqwest::Client::new();

        let record = Pipeline::new(&client, &store, &http, settings(tmp.path(), 0))
            .with_clock(fixed_clock)
            .run()
            .await
            .unwrap();

        assert_eq!(record.image_path, "images/2023-04-01T08:00:00.123Z.png");
        assert_eq!(record.date.timestamp_millis(), 1_680_336_000_123);
        assert_eq!(record.date.timestamp_subsec_nanos(), 123_000_000);
        assert_eq!(record.image_url, format!("{host}/ok.png"));
        assert_eq!(record.description, "A sweet bunny in the style of Monet");
        assert_eq!(
            std::fs::read(tmp.path().join(&record.image_path)).unwrap(),
            b"png bytes"
        );
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn image_retry_does_not_repeat_prompt() {
        let host = image_host().await;
        let tmp = TempDir::new().unwrap();
        let mut client = ScriptedClient::new(format!("{host}/ok.png"));
        client.image_failures = 2;
        let store = MemoryStore::new();
        let http = reqwest::Client::new();

        Pipeline::new(&client, &store, &http, settings(tmp.path(), 3))
            .run()
            .await
            .unwrap();

        assert_eq!(client.prompt_calls.load(Ordering::SeqCst), 1);
        assert_eq!(client.image_calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn exhausted_prompt_retries_stop_the_run() {
        let tmp = TempDir::new().unwrap();
        let mut client = ScriptedClient::new("http://unused.invalid/x.png".to_string());
        client.prompt_failures = 10;
        let store = MemoryStore::new();
        let http = reqwest::Client::new();

        let err = Pipeline::new(&client, &store, &http, settings(tmp.path(), 2))
            .run()
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::Prompt(_)));
        assert_eq!(err.to_string(), "Prompt generation failed");
        let cause = std::error::Error::source(&err).unwrap().to_string();
        assert!(cause.contains("call 3 failed"), "{cause}");
        assert_eq!(client.image_calls.load(Ordering::SeqCst), 0);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn failed_download_records_nothing() {
        let host = image_host().await;
        let tmp = TempDir::new().unwrap();
        let client = ScriptedClient::new(format!("{host}/expired.png"));
        let store = MemoryStore::new();
        let http = reqwest::Client::new();

        let err = Pipeline::new(&client, &store, &http, settings(tmp.path(), 3))
            .run()
            .await
            .unwrap_err();

        match err {
            PipelineError::Download(DownloadError::Status { status, .. }) => {
                assert_eq!(status, reqwest::StatusCode::FORBIDDEN);
            }
            other => panic!("expected download status error, got {other:?}"),
        }
        assert!(store.is_empty());
        assert_eq!(client.image_calls.load(Ordering::SeqCst), 1);
    }
}
