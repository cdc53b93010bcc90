use bytes::Bytes;
use clap::{Parser, Subcommand, ValueEnum};
use pixpress::compress::{FallbackReason, compress};
use pixpress::imaging::{Geometry, ImageProcessor, RustBackend, SourceFormat};
use pixpress::locator::BlobRegistry;
use pixpress::types::ImageRecord;
use pixpress::{config, output};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "pixpress")]
#[command(about = "Compress a single image locally")]
#[command(long_about = "\
Compress a single image locally

Supported inputs: JPEG, PNG, GIF (animation kept), AVIF, SVG, WebP.
Each format uses its own section of the options file:

  jpeg   quality 0.0 - 1.0 (also used for WebP)
  png    palette size + dithering
  gif    palette size per frame + dithering
  avif   quality 1 - 100 + encoder speed
  svg    coordinate precision

If the compressed result is not smaller than the input, the input is
written out unchanged and the reason is reported.

Run 'pixpress gen-config' to generate a documented options file.
Set RUST_LOG=debug to see what each stage is doing.")]
#[command(version)]
struct Cli {
    /// Options file (TOML), layered over the stock defaults
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Resize method. Defaults to toWidth/toHeight when only a target is given
    #[arg(long, value_enum, global = true)]
    method: Option<MethodArg>,

    /// Target width in pixels
    #[arg(long, global = true)]
    width: Option<f64>,

    /// Target height in pixels
    #[arg(long, global = true)]
    height: Option<f64>,

    /// Longest preview side in pixels
    #[arg(long, global = true)]
    max_preview_size: Option<u32>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, ValueEnum)]
enum MethodArg {
    Unchanged,
    #[value(name = "toWidth", alias = "to-width")]
    ToWidth,
    #[value(name = "toHeight", alias = "to-height")]
    ToHeight,
}

impl MethodArg {
    fn as_str(self) -> &'static str {
        match self {
            Self::Unchanged => "unchanged",
            Self::ToWidth => "toWidth",
            Self::ToHeight => "toHeight",
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// Compress an image, falling back to the original if that does not help
    Compress {
        input: PathBuf,
        /// Output file (default: <stem>.min.<ext> next to the input)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Also write a preview rendition here
        #[arg(long)]
        preview: Option<PathBuf>,
        /// Print a JSON report instead of text
        #[arg(long)]
        json: bool,
    },
    /// Write a downscaled preview rendition
    Preview {
        input: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Print format and natural dimensions
    Measure {
        input: PathBuf,
        #[arg(long)]
        json: bool,
    },
    /// Print a stock options file with all options documented
    GenConfig,
}

#[derive(Serialize)]
struct CompressReport<'a> {
    input: &'a Path,
    output: &'a Path,
    format: SourceFormat,
    natural: Geometry,
    original_size: usize,
    width: u32,
    height: u32,
    compressed_size: usize,
    fallback: Option<&'a FallbackReason>,
    #[serde(skip_serializing_if = "Option::is_none")]
    preview: Option<&'a Path>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing();

    let backend = Arc::new(RustBackend::new());
    let locators = Arc::new(BlobRegistry::new());

    match &cli.command {
        Command::Compress {
            input,
            output: destination,
            preview,
            json,
        } => {
            let options = resolve_options(&cli)?;
            let record = load_record(input, &backend, &locators).await?;
            let destination = destination
                .clone()
                .unwrap_or_else(|| default_output_path(input, record.format));
            let processor =
                ImageProcessor::new(record, options, Arc::clone(&backend), locators.clone());

            let outcome = compress(&processor).await;
            std::fs::write(&destination, &outcome.result.content)?;

            let preview_result = match preview {
                Some(path) => {
                    let result = processor.preview().await?;
                    std::fs::write(path, &result.content)?;
                    Some((path.as_path(), result))
                }
                None => None,
            };

            let record = processor.record();
            if *json {
                let report = CompressReport {
                    input,
                    output: &destination,
                    format: record.format,
                    natural: record.natural(),
                    original_size: record.content.len(),
                    width: outcome.result.width,
                    height: outcome.result.height,
                    compressed_size: outcome.result.content.len(),
                    fallback: outcome.fallback.as_ref(),
                    preview: preview_result.as_ref().map(|(p, _)| *p),
                };
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                output::print_compress_output(
                    record,
                    &outcome,
                    &destination,
                    preview_result.as_ref().map(|(p, r)| (*p, r)),
                );
            }
        }
        Command::Preview {
            input,
            output: destination,
        } => {
            let options = resolve_options(&cli)?;
            let record = load_record(input, &backend, &locators).await?;
            let processor =
                ImageProcessor::new(record, options, Arc::clone(&backend), locators.clone());
            let result = processor.preview().await?;
            std::fs::write(destination, &result.content)?;
            output::print_preview_output(processor.record(), destination, &result);
        }
        Command::Measure { input, json } => {
            let record = load_record(input, &backend, &locators).await?;
            if *json {
                println!("{}", serde_json::to_string_pretty(&record)?);
            } else {
                output::print_measure_output(&record);
            }
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// Log to stderr so stdout carries only the report. `RUST_LOG` overrides
/// the default `warn` level.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Stock defaults, then `--config`, then the resize/preview flags.
fn resolve_options(cli: &Cli) -> Result<config::CompressionOptions, config::ConfigError> {
    let mut overlays = Vec::new();
    if let Some(path) = &cli.config {
        overlays.push(config::load_raw_config(path)?);
    }
    overlays.push(cli_overlay(cli));
    config::resolve_config(config::stock_defaults_value(), overlays)
}

fn cli_overlay(cli: &Cli) -> toml::Value {
    let method = cli.method.or(match (cli.width, cli.height) {
        (Some(_), _) => Some(MethodArg::ToWidth),
        (None, Some(_)) => Some(MethodArg::ToHeight),
        (None, None) => None,
    });

    let mut resize = toml::Table::new();
    if let Some(method) = method {
        resize.insert("method".into(), method.as_str().into());
    }
    if let Some(width) = cli.width {
        resize.insert("width".into(), toml::Value::Float(width));
    }
    if let Some(height) = cli.height {
        resize.insert("height".into(), toml::Value::Float(height));
    }

    let mut root = toml::Table::new();
    if !resize.is_empty() {
        root.insert("resize".into(), toml::Value::Table(resize));
    }
    if let Some(size) = cli.max_preview_size {
        root.insert("max_preview_size".into(), toml::Value::Integer(size as i64));
    }
    toml::Value::Table(root)
}

async fn load_record(
    path: &Path,
    backend: &Arc<RustBackend>,
    locators: &BlobRegistry,
) -> Result<ImageRecord, Box<dyn std::error::Error>> {
    let content = Bytes::from(std::fs::read(path)?);
    let declared = path
        .extension()
        .and_then(|ext| SourceFormat::from_extension(&ext.to_string_lossy()))
        .map(SourceFormat::mime);
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    let record =
        ImageRecord::load(path.display().to_string(), name, declared, content, backend, locators)
            .await?;
    Ok(record)
}

/// `<stem>.min.<ext>` next to the input, keeping the input's extension.
fn default_output_path(input: &Path, format: SourceFormat) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string());
    let ext = input
        .extension()
        .map(|e| e.to_string_lossy().into_owned())
        .unwrap_or_else(|| format.extension().to_string());
    input.with_file_name(format!("{stem}.min.{ext}"))
}
