//! Application configuration.
//!
//! Configuration is layered: stock defaults are overridden by an optional
//! `config.toml` in the root directory, which is in turn overridden by a few
//! environment variables for secrets and deployment-specific values.
//!
//! ## Config File Location
//!
//! ```text
//! <root>/
//! ├── config.toml     # optional, sparse overrides of the stock defaults
//! ├── .env            # optional, loaded into the environment at startup
//! ├── config/.env     # optional, same (legacy location)
//! └── images/         # downloaded images and rendered pages
//! ```
//!
//! ## Environment
//!
//! | Variable         | Effect                                   |
//! |------------------|------------------------------------------|
//! | `OPENAI_API_KEY` | Provider credential (required to generate) |
//! | `MONGODB_URI`    | Overrides `database.uri`                 |
//! | `IMAGE_DIR`      | Overrides `paths.image_dir`              |
//!
//! The environment is read once, in `main`. Everything downstream receives
//! the resolved [`AppConfig`] by reference.
//!
//! Unknown keys are rejected to catch typos early.

use crate::retry::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
    #[error("Environment variable {0} is not set")]
    MissingEnv(&'static str),
}

/// Application configuration loaded from `config.toml`.
///
/// All fields have defaults; a config file only needs the values it changes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    /// Where images are downloaded and pages are written.
    pub paths: PathsConfig,
    /// Record store connection.
    pub database: DatabaseConfig,
    /// Generative provider endpoint and models.
    pub openai: OpenAiConfig,
    /// Prompts sent to the text model.
    pub prompt: PromptConfig,
    /// Backoff for the provider calls.
    pub retry: RetryConfig,
    /// Gallery presentation.
    pub site: SiteConfig,
}

impl AppConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if parse_image_size(&self.openai.image_size).is_none() {
            return Err(ConfigError::Validation(format!(
                "openai.image_size must look like 1024x1024, got {:?}",
                self.openai.image_size
            )));
        }
        if self.database.name.trim().is_empty() {
            return Err(ConfigError::Validation(
                "database.name must not be empty".into(),
            ));
        }
        if self.database.collection.trim().is_empty() {
            return Err(ConfigError::Validation(
                "database.collection must not be empty".into(),
            ));
        }
        if self.site.title.trim().is_empty() {
            return Err(ConfigError::Validation(
                "site.title must not be empty".into(),
            ));
        }
        Ok(())
    }

    /// Apply environment overrides, looking variables up through `lookup`.
    ///
    /// Taking a lookup function keeps this testable without mutating the
    /// process environment.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        if let Some(uri) = non_empty("MONGODB_URI") {
            self.database.uri = uri;
        }
        if let Some(dir) = non_empty("IMAGE_DIR") {
            self.paths.image_dir = PathBuf::from(dir);
        }
    }
}

/// Filesystem locations, relative to the root directory unless absolute.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PathsConfig {
    /// Directory downloaded images are written to.
    pub image_dir: PathBuf,
    /// Directory pages are written to. Defaults to `image_dir`, since pages
    /// reference images by bare filename.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub site_dir: Option<PathBuf>,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            image_dir: PathBuf::from("images"),
            site_dir: None,
        }
    }
}

impl PathsConfig {
    /// Absolute-or-root-joined image directory.
    pub fn image_dir_in(&self, root: &Path) -> PathBuf {
        root.join(&self.image_dir)
    }

    /// Absolute-or-root-joined page directory.
    pub fn site_dir_in(&self, root: &Path) -> PathBuf {
        root.join(self.site_dir.as_ref().unwrap_or(&self.image_dir))
    }
}

/// Record store connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DatabaseConfig {
    /// MongoDB connection string.
    pub uri: String,
    /// Database name.
    pub name: String,
    /// Collection holding the records.
    pub collection: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            uri: "mongodb://localhost:27017".to_string(),
            name: "daily-bunny".to_string(),
            collection: "generatedimagedatas".to_string(),
        }
    }
}

/// Generative provider settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OpenAiConfig {
    /// Base URL of an OpenAI-compatible API, without trailing slash.
    pub api_base: String,
    /// Model used for the image description.
    pub chat_model: String,
    /// Requested image resolution, `<width>x<height>`.
    pub image_size: String,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.openai.com/v1".to_string(),
            chat_model: "gpt-3.5-turbo".to_string(),
            image_size: "1024x1024".to_string(),
        }
    }
}

/// Prompts for the description request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PromptConfig {
    pub system: String,
    pub user: String,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            system: "You are ChatGPT, a large language model trained by OpenAI. \
                     Answer as concisely as possible."
                .to_string(),
            user: "Generate an interesting image description for today. \
                   It should be linked with a \"sweet bunny\". \
                   It should be in the style of a famous painter."
                .to_string(),
        }
    }
}

/// Backoff settings for provider calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetryConfig {
    /// Retries after the first attempt.
    pub retries: u32,
    /// Wait before the first retry, in milliseconds. Doubles each retry.
    pub initial_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        let policy = RetryPolicy::default();
        Self {
            retries: policy.retries,
            initial_delay_ms: policy.initial_delay.as_millis() as u64,
        }
    }
}

impl RetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.retries, Duration::from_millis(self.initial_delay_ms))
    }
}

/// Gallery presentation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SiteConfig {
    /// `<title>` of every page.
    pub title: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            title: "Daily Bunny".to_string(),
        }
    }
}

/// Secrets that never live in `config.toml`.
#[derive(Clone)]
pub struct Credentials {
    pub openai_api_key: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("openai_api_key", &"<redacted>")
            .finish()
    }
}

impl Credentials {
    /// Read credentials through `lookup`. Fails if the API key is absent or empty.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let openai_api_key = lookup("OPENAI_API_KEY")
            .filter(|v| !v.trim().is_empty())
            .ok_or(ConfigError::MissingEnv("OPENAI_API_KEY"))?;
        Ok(Self { openai_api_key })
    }
}

/// Parse `"1024x1024"` into `(1024, 1024)`. Both sides must be positive.
pub fn parse_image_size(size: &str) -> Option<(u32, u32)> {
    let (w, h) = size.split_once('x')?;
    let w: u32 = w.parse().ok()?;
    let h: u32 = h.parse().ok()?;
    (w > 0 && h > 0).then_some((w, h))
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    toml::Value::try_from(AppConfig::default())
        .map_err(|e| ConfigError::Validation(format!("default config must serialize: {e}")))
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load `config.toml` from a directory as a raw TOML value.
///
/// Returns `Ok(None)` if the directory has no `config.toml`.
pub fn load_raw_config(root: &Path) -> Result<Option<toml::Value>, ConfigError> {
    let config_path = root.join("config.toml");
    if !config_path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(&config_path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<AppConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: AppConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from `config.toml` in `root`, merged over the stock defaults.
///
/// Environment overrides are not applied here; see [`AppConfig::apply_env`].
pub fn load_config(root: &Path) -> Result<AppConfig, ConfigError> {
    let base = stock_defaults_value()?;
    let overlay = load_raw_config(root)?;
    resolve_config(base, overlay)
}

/// Returns a fully-commented stock `config.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# Daily Bunny Configuration
# =========================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.
#
# Secrets are never read from this file. Set OPENAI_API_KEY in the
# environment or in .env / config/.env next to this file.
# MONGODB_URI and IMAGE_DIR, when set, override the values below.
#
# Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Paths (relative to --root unless absolute)
# ---------------------------------------------------------------------------
[paths]
# Downloaded images land here.
image_dir = "images"

# Rendered pages land here. Defaults to image_dir, because pages
# reference their image by bare filename.
# site_dir = "images"

# ---------------------------------------------------------------------------
# Record store
# ---------------------------------------------------------------------------
[database]
uri = "mongodb://localhost:27017"
name = "daily-bunny"
collection = "generatedimagedatas"

# ---------------------------------------------------------------------------
# Generative provider (any OpenAI-compatible API)
# ---------------------------------------------------------------------------
[openai]
api_base = "https://api.openai.com/v1"
chat_model = "gpt-3.5-turbo"
# Resolution of the single image requested per run.
image_size = "1024x1024"

# ---------------------------------------------------------------------------
# Prompts for the daily image description
# ---------------------------------------------------------------------------
[prompt]
system = "You are ChatGPT, a large language model trained by OpenAI. Answer as concisely as possible."
user = "Generate an interesting image description for today. It should be linked with a \"sweet bunny\". It should be in the style of a famous painter."

# ---------------------------------------------------------------------------
# Retry for provider calls (delay doubles after every retry, no cap)
# ---------------------------------------------------------------------------
[retry]
retries = 3
initial_delay_ms = 1000

# ---------------------------------------------------------------------------
# Gallery
# ---------------------------------------------------------------------------
[site]
title = "Daily Bunny"
"##
}
