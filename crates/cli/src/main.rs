use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};

use rvtx_config::RunManifest;

mod run;

const EXIT_PASS: u8 = 0;
const EXIT_ASSERT_FAIL: u8 = 1;
const EXIT_CONFIG_ERROR: u8 = 2;
const EXIT_RUNTIME_ERROR: u8 = 3;

#[derive(Parser, Debug)]
#[command(author, version, about = "rvtx transmit harness", long_about = None)]
struct Cli {
    /// Enable driver-level tracing
    #[arg(short, long, global = true)]
    trace: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the sequence generator against the modelled transmit register
    Run(RunArgs),
    /// Print where the transmit register lands for a memory size
    Layout {
        /// Memory size (decimal, 0x hex, or e.g. "8KiB"); defaults to the build's MEMSIZE
        #[arg(long)]
        memsize: Option<String>,
    },
}

#[derive(clap::Args, Debug)]
struct RunArgs {
    /// Path to a run manifest (YAML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the manifest memory size
    #[arg(long)]
    memsize: Option<String>,

    /// Override the number of terms to emit
    #[arg(long)]
    steps: Option<u64>,

    /// Override the device acknowledgement latency, in polls
    #[arg(long, conflicts_with = "silent")]
    ack_latency: Option<u32>,

    /// Model a device that never acknowledges
    #[arg(long)]
    silent: bool,

    /// Override the per-byte poll budget
    #[arg(long)]
    poll_limit: Option<u32>,

    /// How emitted bytes are printed
    #[arg(long, value_enum, default_value_t = Format::Dec)]
    format: Format,

    /// Write a JSON result report here
    #[arg(long)]
    json: Option<PathBuf>,

    /// Include every register write in the JSON report
    #[arg(long)]
    record_writes: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Format {
    Dec,
    Hex,
    Raw,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // stdout carries the byte stream; logs go to stderr.
    if cli.trace {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::TRACE)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::INFO)
            .with_writer(std::io::stderr)
            .init();
    }

    match cli.command {
        Commands::Run(args) => run_harness(args),
        Commands::Layout { memsize } => print_layout(memsize),
    }
}

fn load_manifest(args: &RunArgs) -> anyhow::Result<RunManifest> {
    let mut manifest = match &args.config {
        Some(path) => {
            info!("Loading run manifest: {:?}", path);
            RunManifest::from_file(path)?
        }
        None => RunManifest::default(),
    };

    if let Some(size) = &args.memsize {
        manifest.memsize = rvtx_config::SizeValue::Text(size.clone());
    }
    if let Some(steps) = args.steps {
        manifest.limits.steps = steps;
    }
    if args.silent {
        manifest.device.ack_latency = None;
    } else if let Some(latency) = args.ack_latency {
        manifest.device.ack_latency = Some(latency);
    }
    if let Some(limit) = args.poll_limit {
        manifest.limits.poll_limit = limit;
    }

    manifest.validate()?;
    Ok(manifest)
}

fn run_harness(args: RunArgs) -> ExitCode {
    let manifest = match load_manifest(&args) {
        Ok(m) => m,
        Err(e) => {
            error!("Configuration error: {:#}", e);
            return ExitCode::from(EXIT_CONFIG_ERROR);
        }
    };

    let report = match run::execute(&manifest, args.record_writes) {
        Ok(r) => r,
        Err(e) => {
            error!("Run failed: {:#}", e);
            return ExitCode::from(EXIT_RUNTIME_ERROR);
        }
    };

    print_stream(&report.output, args.format);

    for v in &report.violations {
        error!("Protocol violation: {}", v);
    }
    for a in report.assertions.iter().filter(|a| !a.passed) {
        error!("Assertion failed: {:?}", a.assertion);
    }

    if let Some(path) = &args.json {
        let written = std::fs::File::create(path)
            .map_err(anyhow::Error::from)
            .and_then(|f| serde_json::to_writer_pretty(f, &report).map_err(anyhow::Error::from));
        if let Err(e) = written {
            error!("Failed to write report {:?}: {}", path, e);
            return ExitCode::from(EXIT_RUNTIME_ERROR);
        }
    }

    info!(
        "Run finished: {:?}, {} terms sent, {} polls",
        report.stop_reason, report.steps_sent, report.polls
    );

    match report.status {
        run::Status::Pass => ExitCode::from(EXIT_PASS),
        run::Status::Fail => ExitCode::from(EXIT_ASSERT_FAIL),
    }
}

fn print_stream(output: &[u8], format: Format) {
    use std::io::Write;

    let mut stdout = std::io::stdout().lock();
    let res = match format {
        Format::Raw => stdout.write_all(output),
        Format::Dec | Format::Hex => {
            let line: Vec<String> = output
                .iter()
                .map(|b| match format {
                    Format::Hex => format!("{:02x}", b),
                    _ => b.to_string(),
                })
                .collect();
            writeln!(stdout, "{}", line.join(" "))
        }
    };
    if let Err(e) = res.and_then(|_| stdout.flush()) {
        error!("Failed to write output: {}", e);
    }
}

fn print_layout(memsize: Option<String>) -> ExitCode {
    let size = match memsize {
        Some(s) => match rvtx_config::parse_size(&s) {
            Ok(n) => n,
            Err(e) => {
                error!("Configuration error: {:#}", e);
                return ExitCode::from(EXIT_CONFIG_ERROR);
            }
        },
        None => rvtx_core::layout::MEMSIZE as u64,
    };

    match rvtx_config::layout_for(size) {
        Ok(layout) => {
            println!(
                "memsize {:#x} tx_register {:#x}",
                layout.memsize(),
                layout.tx_register()
            );
            ExitCode::from(EXIT_PASS)
        }
        Err(e) => {
            error!("Configuration error: {:#}", e);
            ExitCode::from(EXIT_CONFIG_ERROR)
        }
    }
}
