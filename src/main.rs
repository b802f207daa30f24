use anyhow::{Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};

use appcast_reader::config::{Config, OutputFormat};
use appcast_reader::{feed, report};

#[derive(Parser, Debug)]
#[command(
    name = "appcast-reader",
    about = "List the updates an appcast feed offers for this platform"
)]
struct Args {
    /// Appcast XML file to read
    #[arg(value_name = "FEED")]
    feed: PathBuf,

    /// Config file (default: ~/.config/appcast-reader/config.toml)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Match enclosures against this OS tag instead of the running OS
    #[arg(long)]
    os: Option<String>,

    /// Architecture tag to match (x64, x86, arm64)
    #[arg(long)]
    arch: Option<String>,

    /// Running OS version; enables the minimum OS version filter
    #[arg(long, value_name = "VERSION")]
    os_version: Option<String>,

    /// Print JSON instead of a table
    #[arg(long)]
    json: bool,
}

/// Reads the feed file, refusing anything over `max_bytes`.
fn read_feed(path: &Path, max_bytes: u64) -> Result<String> {
    let metadata = std::fs::metadata(path)
        .with_context(|| format!("Failed to read feed file: {}", path.display()))?;
    if !metadata.is_file() {
        anyhow::bail!("Feed path must be a regular file: {}", path.display());
    }
    if metadata.len() > max_bytes {
        anyhow::bail!(
            "Feed file is {} bytes (max {} bytes): {}",
            metadata.len(),
            max_bytes,
            path.display()
        );
    }

    std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read feed file: {}", path.display()))
}

fn main() -> Result<()> {
    // Initialize tracing for debug logging
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let mut config = match args.config.as_deref() {
        Some(path) => Config::load(path)
            .with_context(|| format!("Failed to load config: {}", path.display()))?,
        None => match Config::default_path() {
            Some(path) => Config::load(&path).context("Failed to load config")?,
            None => Config::default(),
        },
    };

    // Command line flags win over the config file
    if args.os.is_some() {
        config.os = args.os;
    }
    if args.arch.is_some() {
        config.arch = args.arch;
    }
    if args.os_version.is_some() {
        config.os_version = args.os_version;
    }
    if args.json {
        config.output = OutputFormat::Json;
    }

    let platform = config.platform().context("Invalid platform settings")?;
    tracing::debug!(platform = %platform, feed = %args.feed.display(), "Loading appcast");

    let xml = read_feed(&args.feed, config.max_feed_bytes)?;
    let records = feed::load_for(&xml, &platform)
        .with_context(|| format!("Failed to parse appcast: {}", args.feed.display()))?;

    for record in &records {
        report::warn_on_bad_urls(record);
    }

    match config.output {
        OutputFormat::Text => print!("{}", report::render_text(&records, &platform)),
        OutputFormat::Json => println!(
            "{}",
            report::render_json(&records, &platform).context("Failed to encode JSON report")?
        ),
    }

    Ok(())
}
