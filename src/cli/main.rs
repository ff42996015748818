use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

use metapho::config::{self, OutputFormat};
use metapho::pipeline::{self, Extractor};
use metapho::report::{render_error_html, render_error_text};

#[derive(Parser, Debug)]
#[command(
    name = "metapho",
    version,
    about = "Photo metadata viewer: EXIF, GPS with reverse geocoding, IPTC, XMP and file information"
)]
struct Cli {
    /// Image files or directories to inspect
    #[arg(value_name = "PATH")]
    paths: Vec<PathBuf>,

    /// Path to config file (default: config.json next to binary)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Initialize a default config.json and exit
    #[arg(long)]
    init: bool,

    /// Output format (default: from config)
    #[arg(short, long, value_enum)]
    format: Option<OutputFormat>,

    /// Skip reverse geocoding of GPS coordinates
    #[arg(long)]
    no_geocode: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

// ANSI codes for the per-file header
const DIM: &str = "\x1b[2m";
const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();

    // Handle --init
    if cli.init {
        let config = config::Config::default();
        let path = cli.config.as_deref();
        config.save(path)?;
        let save_path = match path {
            Some(p) => p.to_path_buf(),
            None => config::Config::config_path()?,
        };
        println!("Default config written to {}", save_path.display());
        return Ok(());
    }

    if cli.paths.is_empty() {
        anyhow::bail!("No input files or directories specified. Use --help for usage.");
    }

    let mut config = config::Config::load(cli.config.as_deref())?;
    if cli.no_geocode {
        config.geocoder.enabled = false;
    }
    let format = cli.format.unwrap_or(config.output.format);

    let images = pipeline::collect_images(&cli.paths);
    if images.is_empty() {
        anyhow::bail!("No supported image files found in the specified paths.");
    }
    log::info!("Found {} image(s) to inspect", images.len());

    let extractor = Extractor::from_config(&config);
    let total = images.len();
    let mut failed = 0;
    let mut json_results = Vec::new();

    for (i, image_path) in images.iter().enumerate() {
        log::debug!("[{}/{}] Reading: {}", i + 1, total, image_path.display());
        let result = extractor.extract(image_path).await;
        if let Err(ref e) = result {
            log::error!("{}: {e}", image_path.display());
            failed += 1;
        }

        match format {
            OutputFormat::Text => {
                println!();
                println!("{BOLD}File:{RESET} {}", image_path.display());
                println!("{DIM}{}{RESET}", "═".repeat(72));
                match &result {
                    Ok(report) => print!("{}", report.to_text()),
                    Err(e) => print!("{}", render_error_text(e)),
                }
            }
            OutputFormat::Html => match &result {
                Ok(report) => println!("{}", report.to_html()),
                Err(e) => println!("{}", render_error_html(e)),
            },
            OutputFormat::Json => {
                let path = image_path.display().to_string();
                json_results.push(match &result {
                    Ok(report) => serde_json::json!({ "path": path, "report": report }),
                    Err(e) => serde_json::json!({ "path": path, "error": e.to_string() }),
                });
            }
        }
    }

    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&json_results)?);
    }

    log::info!(
        "Done: {} succeeded, {failed} failed out of {total} images",
        total - failed
    );
    Ok(())
}
