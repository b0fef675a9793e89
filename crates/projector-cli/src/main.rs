//! projector - Bundle a payload into a standalone projector executable
//!
//! This tool appends a payload (typically an SWF movie) and a trailer record
//! to a prebuilt runtime loader, and can recover the payload again from a
//! finished projector.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use projector_core::{
    Extractor, Layout, LocatedPayload, PayloadKind, ProjectorBuilder, RuntimeFormat,
};
use std::path::{Path, PathBuf};
use tracing::{debug, info, Level};
use tracing_subscriber::EnvFilter;

/// Bundle a payload into a standalone projector executable
#[derive(Parser, Debug)]
#[command(name = "projector")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Append a payload and trailer to a runtime loader
    Build(BuildArgs),
    /// Write the payload of a projector to a file
    Extract(ExtractArgs),
    /// Show where the payload of a projector is stored
    Inspect(InspectArgs),
}

#[derive(Args, Debug)]
struct BuildArgs {
    /// Prebuilt runtime loader executable
    #[arg(short, long)]
    runtime: PathBuf,

    /// Payload to bundle
    #[arg(short, long)]
    payload: PathBuf,

    /// Output projector path
    #[arg(short, long)]
    output: PathBuf,

    /// Trailer layout
    #[arg(long, value_enum, default_value = "windows")]
    layout: LayoutArg,

    /// Refuse to replace an existing output file
    #[arg(long)]
    no_clobber: bool,
}

#[derive(Args, Debug)]
struct ExtractArgs {
    /// Projector executable to read
    image: PathBuf,

    /// Output path for the payload
    #[arg(short, long)]
    output: PathBuf,

    /// Trailer layout
    #[arg(long, value_enum, default_value = "auto")]
    layout: LayoutArg,

    /// Fail unless the payload is an SWF movie
    #[arg(long)]
    require_swf: bool,

    /// Refuse to replace an existing output file
    #[arg(long)]
    no_clobber: bool,
}

#[derive(Args, Debug)]
struct InspectArgs {
    /// Projector executable to read
    image: PathBuf,

    /// Trailer layout
    #[arg(long, value_enum, default_value = "auto")]
    layout: LayoutArg,
}

/// Trailer layout selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LayoutArg {
    /// Detect from the runtime (build) or the trailer (extract, inspect)
    Auto,
    /// Payload, marker, 32-bit length at the end of the file
    Windows,
    /// 32-bit length and marker between runtime and payload
    #[value(name = "linux32")]
    Linux32,
    /// 64-bit length, marker and padding between runtime and payload
    #[value(name = "linux64")]
    Linux64,
}

impl LayoutArg {
    fn layout(self) -> Option<Layout> {
        match self {
            Self::Auto => None,
            Self::Windows => Some(Layout::Windows),
            Self::Linux32 => Some(Layout::Linux32),
            Self::Linux64 => Some(Layout::Linux64),
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.into()))
        .with_target(false)
        .init();

    match &cli.command {
        Command::Build(args) => run_build(args),
        Command::Extract(args) => run_extract(args),
        Command::Inspect(args) => run_inspect(args),
    }
}

fn run_build(args: &BuildArgs) -> Result<()> {
    ensure_file(&args.runtime, "Runtime")?;
    ensure_file(&args.payload, "Payload")?;

    let builder = match args.layout.layout() {
        Some(layout) => ProjectorBuilder::new().layout(layout),
        None => ProjectorBuilder::new().auto_layout(),
    }
    .overwrite(!args.no_clobber);

    let report = builder
        .build_file(&args.runtime, &args.payload, &args.output)
        .with_context(|| format!("Failed to build projector: {}", args.output.display()))?;

    debug!(
        "{} runtime ({} bytes), {} payload ({} bytes)",
        report.runtime_format, report.runtime_len, report.payload_kind, report.payload_len
    );
    println!(
        "Wrote {} ({} bytes, {} layout)",
        args.output.display(),
        report.output_len,
        report.layout
    );
    Ok(())
}

fn run_extract(args: &ExtractArgs) -> Result<()> {
    ensure_file(&args.image, "Input")?;

    let report = extractor(args.layout)
        .require_swf(args.require_swf)
        .overwrite(!args.no_clobber)
        .extract_file(&args.image, &args.output)
        .with_context(|| format!("Failed to extract payload: {}", args.image.display()))?;

    println!(
        "Wrote {} ({} bytes, {})",
        args.output.display(),
        report.located.payload_len(),
        report.payload_kind
    );
    Ok(())
}

fn run_inspect(args: &InspectArgs) -> Result<()> {
    ensure_file(&args.image, "Input")?;

    let image = projector_core::read_file(&args.image)
        .with_context(|| format!("Failed to read input file: {}", args.image.display()))?;
    let located = extractor(args.layout)
        .locate(&image)
        .with_context(|| format!("No payload found in {}", args.image.display()))?;

    info!("Inspecting {}", args.image.display());
    print!("{}", describe(&image, &located));
    Ok(())
}

fn extractor(layout: LayoutArg) -> Extractor {
    match layout.layout() {
        Some(layout) => Extractor::new().layout(layout),
        None => Extractor::new(),
    }
}

/// Human-readable summary of a located payload
fn describe(image: &[u8], located: &LocatedPayload) -> String {
    let payload = located.payload(image);
    let runtime_format = RuntimeFormat::detect(located.runtime(image));

    format!(
        "layout:   {}\n\
         runtime:  {} ({} bytes)\n\
         payload:  {} ({} bytes at offset {})\n\
         blake3:   {}\n",
        located.layout,
        runtime_format,
        located.runtime_len,
        PayloadKind::detect(payload),
        payload.len(),
        located.payload.start,
        blake3::hash(payload).to_hex()
    )
}

fn ensure_file(path: &Path, what: &str) -> Result<()> {
    if !path.exists() {
        bail!("{} file does not exist: {}", what, path.display());
    }
    if !path.is_file() {
        bail!("{} path is not a file: {}", what, path.display());
    }
    Ok(())
}
