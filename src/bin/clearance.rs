//! Issue clearance certificates from the command line.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use clearance::{Clearance, ClearanceBuilder, Locale, RenderedCertificate};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(
    name = "clearance",
    about = "Search the name registry and issue clearance certificates",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the registry search result for a name as JSON.
    Search {
        name: String,
    },
    /// Render the square PNG card.
    Image(RenderArgs),
    /// Render the landscape PDF document.
    Document(RenderArgs),
    /// Render both formats from the same content.
    Both(RenderArgs),
}

#[derive(Debug, Args)]
struct RenderArgs {
    name: String,
    /// Directory the certificate files are written to.
    #[arg(long, value_name = "DIR", default_value = ".")]
    out: PathBuf,
    /// Number of searched documents printed on the certificate.
    #[arg(long, value_name = "N")]
    count: Option<u64>,
    #[arg(long, env = "CLEARANCE_LOCALE", default_value = "en-US")]
    locale: Locale,
    /// Extra directory searched for fonts; may be repeated.
    #[arg(long = "font-dir", value_name = "DIR")]
    font_dirs: Vec<PathBuf>,
    /// Issue date as YYYY-MM-DD; defaults to today.
    #[arg(long, value_name = "DATE", value_parser = parse_date)]
    date: Option<NaiveDate>,
    /// Issue the certificate even when the registry reports the name as found.
    #[arg(long)]
    force: bool,
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    match cli.command {
        Command::Search { name } => {
            let outcome = clearance_registry::search(&name)?;
            println!("{}", serde_json::to_string_pretty(&outcome.to_json())?);
        }
        Command::Image(args) => {
            let engine = build_engine(&args)?;
            let date = issue_date(&args);
            let rendered = engine.render_image_on(&args.name, args.count, date)?;
            write_certificate(&args.out, &rendered)?;
        }
        Command::Document(args) => {
            let engine = build_engine(&args)?;
            let date = issue_date(&args);
            let rendered = engine.render_document_on(&args.name, args.count, date)?;
            write_certificate(&args.out, &rendered)?;
        }
        Command::Both(args) => {
            let engine = build_engine(&args)?;
            let date = issue_date(&args);
            let (image, document) = engine.render_both(&args.name, args.count, date)?;
            write_certificate(&args.out, &image)?;
            write_certificate(&args.out, &document)?;
        }
    }
    Ok(())
}

fn build_engine(args: &RenderArgs) -> Result<Clearance> {
    let outcome = clearance_registry::search(&args.name)?;
    if outcome.found && !args.force {
        bail!("the registry lists this name; no certificate is issued (use --force to override)");
    }
    let builder = args
        .font_dirs
        .iter()
        .fold(ClearanceBuilder::new().locale(args.locale), |builder, dir| {
            builder.register_font_dir(dir)
        });
    builder.build().context("failed to initialize certificate engine")
}

fn issue_date(args: &RenderArgs) -> NaiveDate {
    args.date
        .unwrap_or_else(|| chrono::Local::now().date_naive())
}

fn write_certificate(dir: &Path, rendered: &RenderedCertificate) -> Result<()> {
    fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;
    let path = dir.join(&rendered.suggested_filename);
    fs::write(&path, &rendered.bytes)
        .with_context(|| format!("failed to write {}", path.display()))?;
    tracing::info!(
        path = %path.display(),
        mime = rendered.mime_type(),
        bytes = rendered.bytes.len(),
        "certificate written"
    );
    println!("{}", path.display());
    Ok(())
}

fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|error| format!("expected YYYY-MM-DD: {error}"))
}

/// `RUST_LOG` selects levels; `RUST_LOG_FORMAT=json` switches to JSON lines.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_writer(std::io::stderr);
    if std::env::var("RUST_LOG_FORMAT").as_deref() == Ok("json") {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer.json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer)
            .init();
    }
}
