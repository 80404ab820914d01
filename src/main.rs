/// Version injected at compile time via UPSWEEP_VERSION env var (set by CI/CD),
/// or the crate version for local builds.
pub const VERSION: &str = match option_env!("UPSWEEP_VERSION") {
    Some(v) => v,
    None => env!("CARGO_PKG_VERSION"),
};

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::Level;
use tracing_subscriber::fmt::writer::MakeWriterExt;
use upsweep::api::client::DEFAULT_WAIT_TIMEOUT;
use upsweep::api::{format_api_error, ApiClient, Credentials, ResourceApi};
use upsweep::config::{self, Config};
use upsweep::output::{self, OutputFormat};
use upsweep::progress::ProgressMode;
use upsweep::purge::{BulkDeleter, PurgeError};
use upsweep::resource::{ListError, Resource, ResourceKind, ResourceLister};

/// Resolve and bulk-delete UpCloud resources
#[derive(Parser, Debug)]
#[command(name = "upsweep", version = VERSION, about, long_about = None)]
struct Args {
    /// Config file to use instead of the default location
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// API base URL
    #[arg(long, global = true, value_name = "URL")]
    api_url: Option<String>,

    /// Seconds before a single API request is abandoned
    #[arg(long, global = true, value_name = "SECS", value_parser = clap::value_parser!(u64).range(1..))]
    client_timeout: Option<u64>,

    /// Log level for debugging
    #[arg(long, value_enum, default_value = "off", global = true)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the resources matching the filters
    List {
        #[command(flatten)]
        filter: FilterArgs,

        /// Output format
        #[arg(short = 'o', long = "output", value_enum, default_value = "human")]
        format: OutputFormat,
    },
    /// Delete every resource matching the filters
    Purge(PurgeArgs),
    /// Show the one resource of a type that a name or UUID refers to
    Resolve {
        /// Resource type to look in
        #[arg(value_enum)]
        kind: ResourceKind,

        /// Name, UUID or glob; must match a single resource
        arg: String,

        /// Output format
        #[arg(short = 'o', long = "output", value_enum, default_value = "human")]
        format: OutputFormat,
    },
}

#[derive(clap::Args, Debug)]
struct FilterArgs {
    /// Include resources matching this name, UUID or glob (default: everything)
    #[arg(short, long = "include", value_name = "PATTERN")]
    include: Vec<String>,

    /// Exclude resources matching this name, UUID or glob
    #[arg(short, long = "exclude", value_name = "PATTERN")]
    exclude: Vec<String>,

    /// Only consider these resource types
    #[arg(long = "type", value_enum, value_name = "KIND")]
    kinds: Vec<ResourceKind>,
}

#[derive(clap::Args, Debug)]
struct PurgeArgs {
    #[command(flatten)]
    filter: FilterArgs,

    /// Maximum number of deletions in flight
    #[arg(long)]
    concurrency: Option<usize>,

    /// Seconds to wait before retrying a failed deletion
    #[arg(long, value_name = "SECS")]
    retry_delay: Option<u64>,

    /// Give up on a resource after this many attempts
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    max_attempts: Option<u32>,

    /// Skip the confirmation prompt
    #[arg(short, long)]
    yes: bool,

    /// Where to report deletion progress
    #[arg(long, value_enum, default_value = "console")]
    progress: ProgressMode,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn to_tracing_level(self) -> Option<Level> {
        match self {
            LogLevel::Off => None,
            LogLevel::Error => Some(Level::ERROR),
            LogLevel::Warn => Some(Level::WARN),
            LogLevel::Info => Some(Level::INFO),
            LogLevel::Debug => Some(Level::DEBUG),
            LogLevel::Trace => Some(Level::TRACE),
        }
    }
}

fn setup_logging(level: LogLevel) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let tracing_level = level.to_tracing_level()?;

    let log_path = get_log_path();

    if let Some(parent) = log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    let file = match std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
    {
        Ok(file) => file,
        Err(e) => {
            eprintln!("Failed to open log file {:?}: {}", log_path, e);
            return None;
        }
    };

    let (non_blocking, guard) = tracing_appender::non_blocking(file);

    tracing_subscriber::fmt()
        .with_max_level(tracing_level)
        .with_writer(non_blocking.with_max_level(tracing_level))
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .init();

    tracing::info!("upsweep {} started with log level: {:?}", VERSION, level);
    tracing::info!("Log file: {:?}", log_path);

    Some(guard)
}

fn get_log_path() -> PathBuf {
    if let Some(dir) = config::config_dir() {
        return dir.join("upsweep.log");
    }
    if let Some(home) = dirs::home_dir() {
        return home.join(".upsweep").join("upsweep.log");
    }
    PathBuf::from("upsweep.log")
}

/// Effective configuration: CLI > environment > file > defaults
fn load_config(args: &Args) -> Config {
    let mut config = match &args.config {
        Some(path) => Config::load_from(path).with_env(|key| std::env::var(key).ok()),
        None => Config::load(),
    };

    if let Some(api_url) = &args.api_url {
        config.api_url = Some(api_url.clone());
    }
    if let Some(secs) = args.client_timeout {
        config.client_timeout_secs = secs;
    }
    if let Command::Purge(purge_args) = &args.command {
        apply_purge_overrides(&mut config, purge_args);
    }
    config
}

fn apply_purge_overrides(config: &mut Config, args: &PurgeArgs) {
    if let Some(concurrency) = args.concurrency {
        config.concurrency = concurrency;
    }
    if let Some(secs) = args.retry_delay {
        config.retry_delay_secs = secs;
    }
    if args.max_attempts.is_some() {
        config.max_attempts = args.max_attempts;
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let _log_guard = setup_logging(args.log_level);

    let config = load_config(&args);
    let credentials = Credentials::from_config(&config)?;
    let api_url = config.api_url()?;
    tracing::info!("Using API at {} with {:?}", api_url, credentials);

    // Managed services are polled for deletion at the retry pace
    let client = ApiClient::with_timeout(&api_url, credentials, config.client_timeout()?)?
        .with_polling(config.purge_options().retry_delay, DEFAULT_WAIT_TIMEOUT);
    let api: Arc<dyn ResourceApi> = Arc::new(client);

    match args.command {
        Command::List { filter, format } => {
            let resources = list(&api, &filter).await?;
            print!("{}", output::render(&resources, format)?);
        }
        Command::Purge(purge_args) => purge(api, &config, purge_args).await?,
        Command::Resolve { kind, arg, format } => {
            let resource = ResourceLister::new(api)
                .resolve_one(kind, &arg)
                .await
                .map_err(friendly)?;
            print!("{}", output::render(&[resource], format)?);
        }
    }

    Ok(())
}

/// Replace raw API errors with their user facing message
fn friendly(err: ListError) -> anyhow::Error {
    match err {
        ListError::Resolution { kind, source } => anyhow::anyhow!(
            "Failed to list {} resources: {}",
            kind,
            format_api_error(&source)
        ),
        other => other.into(),
    }
}

async fn list(api: &Arc<dyn ResourceApi>, filter: &FilterArgs) -> Result<Vec<Resource>> {
    let lister = ResourceLister::new(Arc::clone(api)).with_kinds(&filter.kinds);
    tracing::debug!("Listing {:?}", lister.kinds());

    lister
        .list_resources(&filter.include, &filter.exclude)
        .await
        .map_err(friendly)
}

async fn purge(api: Arc<dyn ResourceApi>, config: &Config, args: PurgeArgs) -> Result<()> {
    let resources = list(&api, &args.filter).await?;
    if resources.is_empty() {
        println!("Nothing to delete.");
        return Ok(());
    }

    print!("{}", output::render(&resources, OutputFormat::Human)?);

    if !args.yes {
        let stdin = io::stdin();
        let confirmed = confirm(&mut stdin.lock(), &mut io::stdout(), resources.len())?;
        if !confirmed {
            println!("Aborted.");
            return Ok(());
        }
    }

    let deleter = BulkDeleter::new(api, args.progress.sink()).with_options(config.purge_options());
    match deleter.delete_all(resources).await {
        Ok(summary) => {
            println!(
                "Deleted {} resources ({} retries).",
                summary.deleted, summary.retries
            );
            Ok(())
        }
        Err(PurgeError::Incomplete { failed }) => {
            eprintln!("Could not delete:");
            eprint!("{}", output::render(&failed, OutputFormat::Human)?);
            Err(PurgeError::Incomplete { failed }.into())
        }
        Err(e) => Err(e.into()),
    }
}

/// Ask before deleting; an empty answer or end of input means no
fn confirm<R: BufRead, W: Write>(input: &mut R, out: &mut W, count: usize) -> io::Result<bool> {
    write!(
        out,
        "This will delete {} resources! Are you sure? [y/N] ",
        count
    )?;
    out.flush()?;

    loop {
        let mut answer = String::new();
        if input.read_line(&mut answer)? == 0 {
            writeln!(out)?;
            return Ok(false);
        }

        match answer.trim().to_lowercase().as_str() {
            "y" | "yes" => return Ok(true),
            "" | "n" | "no" => return Ok(false),
            _ => {
                write!(out, "Please type Y or N: ")?;
                out.flush()?;
            }
        }
    }
}
