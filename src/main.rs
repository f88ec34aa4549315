use clap::{Parser, Subcommand};
use env_logger::Env;
use pixelgate::config::{self, ConverterConfig};
use pixelgate::imaging::{OutputFormat, Quality, RustBackend};
use pixelgate::output;
use pixelgate::types::InputFile;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, UNIX_EPOCH};

#[derive(Parser)]
#[command(name = "pixelgate")]
#[command(about = "Guarded PNG/JPEG re-encoding")]
#[command(long_about = "\
Guarded PNG/JPEG re-encoding

Every file is checked before it is decoded: size limit, true format from its
leading bytes (the file name is never trusted), then dimensions. Accepted
files are resized (never upscaled), re-encoded as WebP, JPEG or PNG, and
checksummed with SHA-256 in the background.

Conversions are rate limited with a sliding window; once the window is full
the remaining files of the batch are reported as unprocessed.

Output names follow the source name:
  My Photo.png, WebP q90            → my-photo-q90.webp
  dawn.jpg, JPEG q75, --resize 1024 → dawn-q75-1024px.jpg
  dawn.jpg, PNG, --resize 64        → dawn-64px.png

Run 'pixelgate gen-config' to generate a documented pixelgate.toml.")]
#[command(version)]
struct Cli {
    /// Config file (defaults to ./pixelgate.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

/// Flags for the convert command. Unset values come from the config file.
#[derive(clap::Args)]
struct ConvertArgs {
    /// PNG or JPEG files to convert
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Output format: webp, jpeg or png
    #[arg(long)]
    format: Option<OutputFormat>,

    /// Encoding quality, 0-100 (ignored for png)
    #[arg(long, value_parser = clap::value_parser!(u32).range(0..=100))]
    quality: Option<u32>,

    /// Bound the longer edge to one of the configured catalog sizes, or "original"
    #[arg(long)]
    resize: Option<String>,

    /// Directory to write converted files into
    #[arg(long)]
    out: Option<PathBuf>,

    /// Print a JSON summary instead of the text report
    #[arg(long)]
    json: bool,

    /// Seconds to wait for background checksums before reporting
    #[arg(long, default_value_t = 10)]
    wait: u64,
}

#[derive(Subcommand)]
enum Command {
    /// Validate and convert images
    Convert(ConvertArgs),
    /// Run the upload checks without converting
    Check {
        /// Files to check
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Print a stock pixelgate.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();

    match cli.command {
        Command::Convert(args) => {
            let config = resolve_config(cli.config.as_deref())?;
            convert(&config, args)?;
        }
        Command::Check { files } => {
            let config = resolve_config(cli.config.as_deref())?;
            let converter = config.converter(RustBackend::new());
            let inspections = files
                .iter()
                .map(|path| read_input(path).map(|file| converter.inspect(&file)))
                .collect::<Result<Vec<_>, _>>()?;
            output::print_check(&inspections);
            let rejected = inspections.iter().filter(|i| i.verdict.is_err()).count();
            if rejected > 0 {
                return Err(format!("{rejected} of {} files rejected", inspections.len()).into());
            }
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

fn convert(config: &ConverterConfig, args: ConvertArgs) -> Result<(), Box<dyn std::error::Error>> {
    let mut settings = config.settings();
    if let Some(format) = args.format {
        settings.format = format;
    }
    if let Some(quality) = args.quality {
        settings.quality = Quality::new(quality);
    }
    if let Some(raw) = &args.resize {
        let catalog = config.resize_catalog();
        settings.resize = catalog.select(raw).ok_or_else(|| {
            format!(
                "--resize {raw} is not one of the allowed sizes: {:?}",
                catalog.sizes()
            )
        })?;
    }

    let files = args
        .files
        .iter()
        .map(|path| read_input(path))
        .collect::<Result<Vec<_>, _>>()?;

    let mut converter = config.converter(RustBackend::new());
    let report = converter.convert_batch(&files, &settings);

    if let Some(dir) = &args.out {
        fs::create_dir_all(dir)?;
        for converted in report.converted() {
            fs::write(dir.join(&converted.download_file_name), &converted.result.bytes)?;
        }
    }

    let deadline = Instant::now() + Duration::from_secs(args.wait);
    for converted in report.converted() {
        converted
            .checksum
            .wait(deadline.saturating_duration_since(Instant::now()));
    }

    if args.json {
        let json = serde_json::to_string_pretty(&output::batch_summary(&report))?;
        println!("{json}");
    } else {
        output::print_batch_report(&report, args.out.as_deref());
    }

    converter.clear();
    Ok(())
}

/// An explicit `--config` must exist; the default file is optional.
fn resolve_config(explicit: Option<&Path>) -> Result<ConverterConfig, Box<dyn std::error::Error>> {
    match explicit {
        Some(path) if !path.exists() => {
            Err(format!("config file not found: {}", path.display()).into())
        }
        Some(path) => Ok(config::load_config(path)?),
        None => Ok(config::load_config(Path::new(config::DEFAULT_CONFIG_FILE))?),
    }
}

/// Read a file from disk as an upload: name, bytes and modification time.
fn read_input(path: &Path) -> Result<InputFile, std::io::Error> {
    let bytes = fs::read(path)?;
    let modified = fs::metadata(path)?
        .modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map_or(0, |d| d.as_millis() as u64);
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    Ok(InputFile::new(name, bytes).with_last_modified(modified))
}
