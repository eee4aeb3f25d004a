#[cfg(feature = "perf-tracing")]
mod perf;

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use color_eyre::Result;
use perfprobe::config::{self, CpuMode, OutputFormat, load_config, load_config_from_path};
use perfprobe::dispatch::{Operation, Response, dispatch};
use perfprobe::format::render_text;
use perfprobe::system::platform::NativeSource;
use perfprobe::system::snapshot::PerfSnapshot;
use perfprobe::{DeltaCpuSampler, MemoryScope, SampleError, Sampler};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "perfprobe",
    about = "Sample memory and CPU utilization of this process and its host"
)]
struct Cli {
    /// Operations to run, e.g. getMemoryInfo, cpu-usage, all
    #[arg(default_value = "all")]
    operations: Vec<String>,

    /// Path to config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(long, value_enum)]
    format: Option<FormatArg>,

    /// CPU measurement: cumulative since boot, or delta over an interval
    #[arg(long, value_enum)]
    cpu_mode: Option<CpuModeArg>,

    /// Interval between the two snapshots of delta mode, in milliseconds
    #[arg(long)]
    interval_ms: Option<u64>,

    /// Whose memory counts as used: the whole host or this process
    #[arg(long, value_enum)]
    memory_scope: Option<ScopeArg>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Run headless sampling iterations and record span timings.
    #[arg(long, default_value_t = false)]
    perf_capture: bool,

    /// Number of capture iterations for perf mode.
    #[arg(long, default_value_t = 200)]
    perf_iterations: usize,

    /// Perf tracing output file (JSON lines).
    #[arg(long, default_value = "target/perf/perf_spans.jsonl")]
    perf_output: PathBuf,
}

#[derive(Clone, Copy, ValueEnum)]
enum FormatArg {
    Text,
    Json,
}

#[derive(Clone, Copy, ValueEnum)]
enum CpuModeArg {
    Cumulative,
    Delta,
}

#[derive(Clone, Copy, ValueEnum)]
enum ScopeArg {
    Host,
    Process,
}

fn main() -> Result<ExitCode> {
    color_eyre::install()?;

    let cli = Cli::parse();
    if cli.perf_capture {
        return run_perf_capture(&cli).map(|()| ExitCode::SUCCESS);
    }

    init_logging(cli.verbose);
    let config = load_config_for_cli(&cli);
    run(&cli, &config)
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn load_config_for_cli(cli: &Cli) -> config::Config {
    let mut config = match &cli.config {
        Some(path) => load_config_from_path(path),
        None => load_config(),
    };

    if let Some(format) = cli.format {
        config.output.format = match format {
            FormatArg::Text => OutputFormat::Text,
            FormatArg::Json => OutputFormat::Json,
        };
    }
    if let Some(mode) = cli.cpu_mode {
        config.sampler.cpu_mode = match mode {
            CpuModeArg::Cumulative => CpuMode::Cumulative,
            CpuModeArg::Delta => CpuMode::Delta,
        };
    }
    if let Some(interval) = cli.interval_ms {
        config.sampler.delta_interval_ms = interval;
    }
    if let Some(scope) = cli.memory_scope {
        config.sampler.memory_scope = match scope {
            ScopeArg::Host => MemoryScope::Host,
            ScopeArg::Process => MemoryScope::Process,
        };
    }

    config
}

fn run(cli: &Cli, config: &config::Config) -> Result<ExitCode> {
    let source = NativeSource::new(config.sources.procfs_root.clone());
    let sampler = Sampler::with_source(source.clone()).with_memory_scope(config.sampler.memory_scope);
    let mut delta = DeltaCpuSampler::with_source(source).with_memory_scope(config.sampler.memory_scope);

    let mut exit = ExitCode::SUCCESS;
    for name in &cli.operations {
        let operation = match name.parse::<Operation>() {
            Ok(operation) => operation,
            Err(err @ SampleError::UnsupportedOperation(_)) => {
                eprintln!("{err}");
                exit = ExitCode::FAILURE;
                continue;
            }
            Err(err) => return Err(err.into()),
        };

        let response = if config.sampler.cpu_mode == CpuMode::Delta && operation.samples_cpu() {
            sample_with_delta(&sampler, &mut delta, operation, config.sampler.delta_interval_ms)
        } else {
            dispatch(&sampler, operation)
        };
        print_response(operation, &response, config.output.format)?;
    }

    Ok(exit)
}

/// Answers a cpu-bearing operation from two frames `interval_ms` apart.
fn sample_with_delta(
    sampler: &Sampler,
    delta: &mut DeltaCpuSampler,
    operation: Operation,
    interval_ms: u64,
) -> Response {
    if !delta.has_baseline() {
        delta.prime();
        std::thread::sleep(Duration::from_millis(interval_ms));
    }
    let cpu = delta.sample();
    match operation {
        Operation::All => Response::Snapshot(PerfSnapshot {
            memory: sampler.sample_memory(),
            cpu,
        }),
        _ => Response::Cpu(cpu),
    }
}

fn print_response(operation: Operation, response: &Response, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Text => println!("{}", render_text(response)),
        OutputFormat::Json => {
            let body = serde_json::json!({
                "operation": operation.method_name(),
                "result": response,
            });
            println!("{}", serde_json::to_string(&body)?);
        }
    }
    Ok(())
}

fn run_perf_capture(cli: &Cli) -> Result<()> {
    #[cfg(not(feature = "perf-tracing"))]
    {
        let _ = cli;
        Err(color_eyre::eyre::eyre!(
            "--perf-capture requires the `perf-tracing` feature; run with `cargo run --features perf-tracing -- --perf-capture`"
        ))
    }

    #[cfg(feature = "perf-tracing")]
    {
        if cli.perf_iterations == 0 {
            return Err(color_eyre::eyre::eyre!("--perf-iterations must be greater than 0"));
        }
        if cli.perf_output.exists() {
            std::fs::remove_file(&cli.perf_output)?;
        }
        perf::init_tracing_json(&cli.perf_output)?;

        let config = load_config_for_cli(cli);
        let sampler = Sampler::with_source(NativeSource::new(config.sources.procfs_root.clone()))
            .with_memory_scope(config.sampler.memory_scope);
        for _ in 0..cli.perf_iterations {
            let _ = sampler.sample_all();
        }

        let baseline = perf::write_baseline_artifacts(&cli.perf_output, cli.perf_iterations)?;
        println!("Perf baseline updated:");
        println!(" - {}", baseline.display());
        println!(" - {}", cli.perf_output.display());
        Ok(())
    }
}
