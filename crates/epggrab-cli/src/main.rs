//! epggrab - incremental EPG grabber producing XMLTV.

/// Application configuration (TOML).
mod config;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::instrument;
use tracing_subscriber::filter::EnvFilter;
#[cfg(not(feature = "otel"))]
use tracing_subscriber::fmt;
#[cfg(feature = "otel")]
use tracing_subscriber::layer::SubscriberExt;
#[cfg(feature = "otel")]
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::AppConfig;
use epggrab_api::feed::FeedClient;
use epggrab_core::{
    ChannelMap, GrabPlan, GuideOptions, LogoCache, ProgramStore, SyncEngine, SyncOptions,
    write_guide,
};
use epggrab_db::{load_snapshot, load_store, open_db, resolve_data_dir, save_store};

/// CLI argument parser.
#[derive(Parser)]
#[command(about, version)]
struct Cli {
    /// Override config/data directory.
    #[arg(long, global = true)]
    dir: Option<PathBuf>,

    /// Subcommand to run.
    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Sync the snapshot with the feed and write the XMLTV guide.
    Grab(GrabArgs),
    /// Write the XMLTV guide from the stored snapshot (no network).
    Render(RenderArgs),
    /// List channels in the stored snapshot.
    Channels,
}

/// Arguments for the `grab` subcommand.
#[derive(clap::Args)]
struct GrabArgs {
    /// Days to scan starting today (1-7). Falls back to `grab.max_days`.
    #[arg(long)]
    days: Option<u32>,

    /// Do not fetch program details.
    #[arg(long)]
    no_details: bool,

    /// XMLTV output file. Falls back to `output.xmltv_file`.
    #[arg(long)]
    output: Option<PathBuf>,
}

/// Arguments for the `render` subcommand.
#[derive(clap::Args)]
struct RenderArgs {
    /// XMLTV output file. Falls back to `output.xmltv_file`.
    #[arg(long)]
    output: Option<PathBuf>,
}

/// Loads `config.toml` from `dir` or the default config directory.
fn load_config(dir: Option<&Path>) -> Result<AppConfig> {
    let config_path = AppConfig::path(dir).context("failed to resolve config path")?;
    AppConfig::load(&config_path).context("failed to load config")
}

/// Builds the engine settings from the config.
fn sync_options(config: &AppConfig, no_details: bool) -> Result<SyncOptions> {
    Ok(SyncOptions {
        timezone: config.grab.timezone()?,
        grab_details: config.grab.details && !no_details,
        channels: ChannelMap::new(config.channels.clone()),
    })
}

/// Builds the feed client from the `[server]` section.
fn build_client(config: &AppConfig) -> Result<FeedClient> {
    let mut builder = FeedClient::builder()
        .base_url(config.server.url()?)
        .user_agent(concat!(
            env!("CARGO_PKG_NAME"),
            "/",
            env!("CARGO_PKG_VERSION")
        ))
        .retry_delay(config.server.retry_delay());
    if let Some(addr) = config.server.bind_address {
        builder = builder.local_address(addr);
    }
    builder.build().context("failed to build feed client")
}

/// Resolves logos already on disk for every stored channel.
fn attach_local_logos(store: &ProgramStore, logos: Option<LogoCache>) -> Option<LogoCache> {
    let mut cache = logos?;
    for channel in store.channel_ids() {
        cache.resolve_local(channel);
    }
    Some(cache)
}

/// Writes the XMLTV guide to `--output` or the configured file.
fn write_output(
    output: Option<&Path>,
    data_dir: &Path,
    config: &AppConfig,
    store: &ProgramStore,
    logos: Option<&LogoCache>,
) -> Result<()> {
    let path = output.map_or_else(
        || data_dir.join(&config.output.xmltv_file),
        Path::to_path_buf,
    );
    let url = config.server.url()?;
    let channels = ChannelMap::new(config.channels.clone());
    let options = GuideOptions {
        source_url: url.as_str(),
        source_name: url.host_str().unwrap_or(env!("CARGO_PKG_NAME")),
        language: &config.output.language,
        channels: &channels,
        logos,
    };
    write_guide(&path, store, &options)?;
    tracing::info!("Wrote {}", path.display());
    Ok(())
}

/// Runs the `grab` subcommand.
///
/// Loads the snapshot, merges the feed into it, saves it and writes the
/// guide. When the feed transport fails nothing is saved or written.
///
/// # Errors
///
/// Returns an error if the config is invalid, the feed transport fails, or
/// the database or output file cannot be written.
#[instrument(skip_all)]
async fn run_grab(args: &GrabArgs, dir: Option<&Path>) -> Result<()> {
    let config = load_config(dir)?;
    let data_dir = resolve_data_dir(dir)?;
    let client = build_client(&config)?;
    let options = sync_options(&config, args.no_details)?;

    let conn = open_db(dir).context("failed to open database")?;
    let today = options.today();
    let (mut store, _) =
        load_store(&conn, today, &options.channels).context("failed to load snapshot")?;

    let plan = GrabPlan::new(
        today,
        args.days.unwrap_or(config.grab.max_days),
        config.grab.slots_per_day,
    );
    let mut engine = SyncEngine::new(&client, &options);
    if config.logos.download {
        engine = engine.with_logos(LogoCache::new(data_dir.join(&config.logos.dir)));
    }

    let report = engine
        .run(&mut store, &plan)
        .await
        .context("grab aborted, snapshot not saved")?;
    if let Some(horizon) = report.horizon {
        tracing::info!("Feed ends at slot {horizon}");
    }

    save_store(&conn, &mut store).context("failed to save snapshot")?;

    let logos = attach_local_logos(&store, engine.into_logos());
    write_output(
        args.output.as_deref(),
        &data_dir,
        &config,
        &store,
        logos.as_ref(),
    )
}

/// Runs the `render` subcommand.
///
/// # Errors
///
/// Returns an error if the config is invalid or the database or output file
/// cannot be accessed.
#[instrument(skip_all)]
fn run_render(args: &RenderArgs, dir: Option<&Path>) -> Result<()> {
    let config = load_config(dir)?;
    let data_dir = resolve_data_dir(dir)?;
    let options = sync_options(&config, true)?;

    let conn = open_db(dir).context("failed to open database")?;
    let (store, _) = load_store(&conn, options.today(), &options.channels)
        .context("failed to load snapshot")?;

    let logos = config
        .logos
        .download
        .then(|| LogoCache::new(data_dir.join(&config.logos.dir)));
    let logos = attach_local_logos(&store, logos);
    write_output(
        args.output.as_deref(),
        &data_dir,
        &config,
        &store,
        logos.as_ref(),
    )
}

/// Runs the `channels` subcommand.
///
/// # Errors
///
/// Returns an error if the config or the database cannot be read.
#[instrument(skip_all)]
fn run_channels(dir: Option<&Path>) -> Result<()> {
    let config = load_config(dir)?;
    let conn = open_db(dir).context("failed to open database")?;
    let store = load_snapshot(&conn).context("failed to load snapshot")?;

    if store.channel_count() == 0 {
        tracing::info!("No channels stored. Run `grab` first.");
        return Ok(());
    }

    let names = ChannelMap::new(config.channels);
    tracing::info!("Stored channels ({}):", store.channel_count());
    for (channel, programs) in store.channels() {
        tracing::info!(
            "  {:<16}  {:<24}  {:>5} programmes",
            channel,
            names.display_name(channel),
            programs.len()
        );
    }

    Ok(())
}

/// Entry point.
///
/// # Errors
///
/// Returns an error if subcommand execution fails.
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    #[cfg(not(feature = "otel"))]
    {
        fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
            )
            .with_target(false)
            .init();
    }

    #[cfg(feature = "otel")]
    {
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        let fmt_layer = tracing_subscriber::fmt::layer().with_target(false);

        let otel_layer = std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT")
            .ok()
            .and_then(|_| {
                let exporter = opentelemetry_otlp::SpanExporter::builder()
                    .with_http()
                    .build()
                    .ok()?;

                let tracer_provider = opentelemetry_sdk::trace::SdkTracerProvider::builder()
                    .with_simple_exporter(exporter)
                    .build();

                let tracer = opentelemetry::trace::TracerProvider::tracer(
                    &tracer_provider,
                    env!("CARGO_PKG_NAME"),
                );
                opentelemetry::global::set_tracer_provider(tracer_provider);

                Some(tracing_opentelemetry::layer().with_tracer(tracer))
            });

        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .with(otel_layer)
            .init();
    }

    let cli = Cli::parse();
    match cli.command {
        Commands::Grab(args) => run_grab(&args, cli.dir.as_deref()).await,
        Commands::Render(args) => run_render(&args, cli.dir.as_deref()),
        Commands::Channels => run_channels(cli.dir.as_deref()),
    }
}
