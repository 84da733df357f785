use clap::{Parser, Subcommand};
use daily_bunny::config::{self, AppConfig, Credentials};
use daily_bunny::openai::OpenAiClient;
use daily_bunny::pipeline::{Pipeline, PipelineSettings};
use daily_bunny::store::{MongoStore, RecordStore};
use daily_bunny::types::SortOrder;
use daily_bunny::{output, site};
use std::error::Error;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "daily-bunny")]
#[command(about = "Daily AI image generator and static gallery")]
#[command(long_about = "\
Daily AI image generator and static gallery

Once a day, `daily-bunny daily` asks a language model for an image
description, has it painted, downloads the result, records it, and
rebuilds the gallery. The newest image is always index.html; every
page links to the day before and the day after.

Root directory layout:

  <root>/
  ├── config.toml      # Optional overrides (see gen-config)
  ├── .env             # OPENAI_API_KEY, MONGODB_URI, IMAGE_DIR
  └── images/
      ├── index.html                       # Newest image
      ├── 1680307200000.html               # One page per older image
      └── 2023-04-01T00:00:00.000Z.png     # Downloaded images

Run 'daily-bunny gen-config' to generate a documented config.toml.")]
#[command(version)]
struct Cli {
    /// Root directory holding config.toml, .env, and the image directory
    #[arg(long, default_value = ".", global = true)]
    root: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Clone, Copy, PartialEq, Eq)]
enum Command {
    /// Generate today's image and record it
    Generate,
    /// Rebuild the static gallery from every record
    Site,
    /// Generate, then rebuild the gallery (the scheduled job)
    Daily,
    /// Print stored records, newest first
    List,
    /// Print a stock config.toml with all options documented
    GenConfig,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = %error_chain(err.as_ref()), "Run failed");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("daily_bunny=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// `outer: inner: innermost`, for one-line logging.
fn error_chain(err: &dyn Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let cause_message = cause.to_string();
        // thiserror variants often embed their source's message already.
        if !message.ends_with(&cause_message) {
            message.push_str(": ");
            message.push_str(&cause_message);
        }
        source = cause.source();
    }
    message
}

async fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    if cli.command == Command::GenConfig {
        print!("{}", config::stock_config_toml());
        return Ok(());
    }

    let config = load_config(&cli.root)?;
    let store = MongoStore::connect(
        &config.database.uri,
        &config.database.name,
        &config.database.collection,
    )
    .await?;

    let result = execute(cli.command, &config, &cli.root, &store).await;
    if let Err(err) = store.disconnect().await {
        tracing::warn!(error = %err, "Failed to close database connection");
    }
    result
}

/// Load `.env` files, `config.toml`, and environment overrides, in that order.
fn load_config(root: &Path) -> Result<AppConfig, Box<dyn Error>> {
    for env_file in [root.join(".env"), root.join("config/.env")] {
        if dotenvy::from_path(&env_file).is_ok() {
            tracing::debug!(path = %env_file.display(), "Loaded environment file");
        }
    }
    let mut config = config::load_config(root)?;
    config.apply_env(|name| std::env::var(name).ok());
    Ok(config)
}

async fn execute(
    command: Command,
    config: &AppConfig,
    root: &Path,
    store: &dyn RecordStore,
) -> Result<(), Box<dyn Error>> {
    match command {
        Command::Generate => generate(config, root, store).await,
        Command::Site => build_site(config, root, store).await,
        Command::Daily => {
            tracing::info!("==> Stage 1: Generating today's image");
            generate(config, root, store).await?;
            tracing::info!("==> Stage 2: Rebuilding gallery");
            build_site(config, root, store).await
        }
        Command::List => {
            let records = store.list_sorted_by_date(SortOrder::Descending).await?;
            output::print_record_list(&records);
            Ok(())
        }
        Command::GenConfig => Ok(()),
    }
}

async fn generate(
    config: &AppConfig,
    root: &Path,
    store: &dyn RecordStore,
) -> Result<(), Box<dyn Error>> {
    let credentials = Credentials::from_lookup(|name| std::env::var(name).ok())?;
    let http = reqwest::Client::builder().build()?;
    let client = OpenAiClient::new(
        http.clone(),
        credentials.openai_api_key,
        &config.openai.api_base,
        &config.openai.chat_model,
    );

    let settings = PipelineSettings::from_config(config, root);
    let record = Pipeline::new(&client, store, &http, settings).run().await?;
    output::print_generate_output(&record);
    Ok(())
}

async fn build_site(
    config: &AppConfig,
    root: &Path,
    store: &dyn RecordStore,
) -> Result<(), Box<dyn Error>> {
    let site_dir = config.paths.site_dir_in(root);
    let pages = site::build_site(store, &site_dir, &config.site).await?;
    output::print_site_output(&pages, &site_dir);
    Ok(())
}
