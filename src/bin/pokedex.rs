use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use pokedex_cache::catalog::CatalogHttpClient;
use pokedex_cache::config::{CatalogConfig, DEFAULT_BASE_URL, DEFAULT_CATALOG_SIZE};
use pokedex_cache::domain::{ItemId, PocketId};
use pokedex_cache::error::PokedexError;
use pokedex_cache::output::{JsonOutput, OutputMode, ReleaseAck, TextOutput, WatchAck};
use pokedex_cache::projector::{DetailProjector, DetailState, HomeProjector};
use pokedex_cache::store::Store;
use pokedex_cache::sync::Synchronizer;
use pokedex_cache::worker::spawn_periodic_sync;

#[derive(Parser)]
#[command(name = "pokedex")]
#[command(about = "Offline-first Pokedex backed by a local SQLite cache of PokeAPI")]
#[command(version, author)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args)]
struct GlobalArgs {
    /// Cache file (defaults to the platform data directory)
    #[arg(long, global = true)]
    db: Option<Utf8PathBuf>,

    #[arg(long, global = true, default_value = DEFAULT_BASE_URL)]
    base_url: String,

    #[arg(long, global = true, default_value_t = DEFAULT_CATALOG_SIZE)]
    catalog_size: i64,

    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Command {
    #[command(about = "Fetch catalog entries missing from the cache")]
    Sync(SyncArgs),
    #[command(about = "List cached items grouped by type")]
    List,
    #[command(about = "Show captured items, newest first")]
    Pocket,
    #[command(about = "Show one item with its evolution link and description")]
    Detail { id: ItemId },
    #[command(about = "Add an item to the pocket")]
    Capture { id: ItemId },
    #[command(about = "Remove a pocket entry by its pocket id")]
    Release { pocket_id: PocketId },
}

#[derive(Args)]
struct SyncArgs {
    /// Keep running and re-sync every N seconds
    #[arg(long, value_name = "SECS")]
    watch: Option<u64>,
}

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(report) = run().await {
        eprintln!("{report:?}");
        if let Some(err) = report.downcast_ref::<PokedexError>() {
            return ExitCode::from(map_exit_code(err));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &PokedexError) -> u8 {
    match error {
        PokedexError::NotCached(_) | PokedexError::Config(_) => 2,
        PokedexError::Connection(_)
        | PokedexError::CatalogHttp(_)
        | PokedexError::CatalogStatus { .. }
        | PokedexError::CatalogDecode(_) => 3,
        PokedexError::Storage(_) => 1,
    }
}

async fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mode = if cli.global.json {
        OutputMode::Json
    } else {
        OutputMode::Text
    };

    let config = CatalogConfig {
        base_url: cli.global.base_url.clone(),
        catalog_size: cli.global.catalog_size,
        ..CatalogConfig::default()
    }
    .validate()?;
    let store = match &cli.global.db {
        Some(path) => Store::open(path)?,
        None => Store::open_default()?,
    };
    let client = CatalogHttpClient::new(&config)?;
    let sync = Synchronizer::shared(store, client, config);

    match cli.command {
        Command::Sync(args) => run_sync(sync, args, mode).await,
        Command::List => run_list(sync, mode),
        Command::Pocket => run_pocket(sync, mode),
        Command::Detail { id } => run_detail(sync, id, mode).await,
        Command::Capture { id } => run_capture(sync, id, mode),
        Command::Release { pocket_id } => run_release(sync, pocket_id, mode),
    }
}

type SharedSync = Arc<Synchronizer<CatalogHttpClient>>;

async fn run_sync(sync: SharedSync, args: SyncArgs, mode: OutputMode) -> miette::Result<()> {
    if let Some(secs) = args.watch {
        let period = Duration::from_secs(secs.max(1));
        match mode {
            OutputMode::Json => {
                JsonOutput::print(&WatchAck::new(period))
                    .into_diagnostic()?
            }
            OutputMode::Text => TextOutput::print(&format!(
                "syncing every {}s, press ctrl-c to stop\n",
                period.as_secs()
            ))
            .into_diagnostic()?,
        }
        let handle = spawn_periodic_sync(sync, period);
        tokio::signal::ctrl_c().await.into_diagnostic()?;
        handle.abort();
        return Ok(());
    }

    let report = sync.bulk_sync().await?;
    match mode {
        OutputMode::Json => JsonOutput::print(&report).into_diagnostic(),
        OutputMode::Text => {
            TextOutput::print(&format!("{}\n", TextOutput::render_sync(&report))).into_diagnostic()
        }
    }
}

fn run_list(sync: SharedSync, mode: OutputMode) -> miette::Result<()> {
    let home = HomeProjector::new(sync);
    let collections = home.collections()?.current();
    match mode {
        OutputMode::Json => JsonOutput::print(&collections).into_diagnostic(),
        OutputMode::Text => {
            TextOutput::print(&TextOutput::render_collections(&collections)).into_diagnostic()
        }
    }
}

fn run_pocket(sync: SharedSync, mode: OutputMode) -> miette::Result<()> {
    let home = HomeProjector::new(sync);
    let items = home.pocket_items()?.current();
    match mode {
        OutputMode::Json => JsonOutput::print(&items).into_diagnostic(),
        OutputMode::Text => TextOutput::print(&TextOutput::render_pocket(&items)).into_diagnostic(),
    }
}

async fn run_detail(sync: SharedSync, id: ItemId, mode: OutputMode) -> miette::Result<()> {
    let detail = DetailProjector::new(sync, id);
    let state = detail.load().await;
    match mode {
        OutputMode::Json => JsonOutput::print(&state).into_diagnostic()?,
        OutputMode::Text => TextOutput::print(&TextOutput::render_detail(&state)).into_diagnostic()?,
    }
    if let DetailState::Error(message) = state {
        return Err(miette::Report::msg(message));
    }
    Ok(())
}

fn run_capture(sync: SharedSync, id: ItemId, mode: OutputMode) -> miette::Result<()> {
    let home = HomeProjector::new(sync);
    let pocket_id = home.capture(id);
    report_event(&home)?;
    match (mode, pocket_id) {
        (OutputMode::Json, Some(pocket_id)) => JsonOutput::print(&pocket_id).into_diagnostic(),
        (OutputMode::Text, Some(pocket_id)) => {
            TextOutput::print(&format!("captured #{id} as pocket entry {pocket_id}\n"))
                .into_diagnostic()
        }
        (_, None) => Ok(()),
    }
}

fn run_release(sync: SharedSync, pocket_id: PocketId, mode: OutputMode) -> miette::Result<()> {
    let home = HomeProjector::new(sync);
    home.release(pocket_id);
    report_event(&home)?;
    match mode {
        OutputMode::Json => JsonOutput::print(&ReleaseAck { released: pocket_id }).into_diagnostic(),
        OutputMode::Text => {
            TextOutput::print(&format!("released pocket entry {pocket_id}\n")).into_diagnostic()
        }
    }
}

fn report_event(home: &HomeProjector<CatalogHttpClient>) -> miette::Result<()> {
    if let Some(event) = home.errors().latest() {
        if let Some(message) = event.content_if_not_handled() {
            return Err(miette::Report::msg(message.clone()));
        }
    }
    Ok(())
}
