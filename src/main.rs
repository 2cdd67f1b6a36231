use anyhow::Result;
use cira_runtime::engine::{PipelineRuntime, RuntimeOptions};
use cira_runtime::loader::{BlockLoader, DEFAULT_BLOCK_PATH};
use cira_runtime::manifest::Manifest;
use cira_runtime::observability::PipelineMonitor;
use std::path::PathBuf;
use std::process::ExitCode;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

struct Args {
    manifest: PathBuf,
    block_path: PathBuf,
    iterations: Option<u64>,
    rate_hz: u32,
}

fn print_usage(program: &str) {
    println!("CiRA Block Runtime v{}", env!("CARGO_PKG_VERSION"));
    println!("Usage: {program} <manifest.json> [options]");
    println!();
    println!("Options:");
    println!("  --block-path <path>    Set custom block library path");
    println!("                         (default: {DEFAULT_BLOCK_PATH})");
    println!("  --iterations <n>       Run for N iterations then exit (default: infinite)");
    println!("  --rate <hz>            Execution rate in Hz (default: 10)");
    println!("  --help                 Show this help message");
}

fn parse_args() -> Result<Option<Args>, String> {
    let argv: Vec<String> = std::env::args().collect();
    let program = argv.first().map(String::as_str).unwrap_or("cira-runtime");

    if argv.iter().any(|a| a == "--help") {
        print_usage(program);
        return Ok(None);
    }
    if argv.len() < 2 {
        print_usage(program);
        return Err("missing manifest path".to_string());
    }

    let mut args = Args {
        manifest: PathBuf::from(&argv[1]),
        block_path: PathBuf::from(DEFAULT_BLOCK_PATH),
        iterations: None,
        rate_hz: 10,
    };

    let mut i = 2;
    while i < argv.len() {
        match argv[i].as_str() {
            "--block-path" if i + 1 < argv.len() => {
                i += 1;
                args.block_path = PathBuf::from(&argv[i]);
            }
            "--iterations" if i + 1 < argv.len() => {
                i += 1;
                args.iterations = Some(
                    argv[i]
                        .parse()
                        .map_err(|_| format!("invalid iteration count: {}", argv[i]))?,
                );
            }
            "--rate" if i + 1 < argv.len() => {
                i += 1;
                args.rate_hz = argv[i]
                    .parse()
                    .map_err(|_| format!("invalid rate: {}", argv[i]))?;
            }
            other => return Err(format!("unknown argument: {other}")),
        }
        i += 1;
    }

    Ok(Some(args))
}

async fn run(args: Args) -> Result<ExitCode> {
    let manifest = match Manifest::from_path(&args.manifest) {
        Ok(manifest) => manifest,
        Err(err) => {
            error!(error = ?err, "failed to load manifest");
            return Ok(ExitCode::from(1));
        }
    };

    let loader = BlockLoader::new(&args.block_path);
    info!(path = %args.block_path.display(), "block library path");

    let mut all_available = true;
    for block in &manifest.blocks {
        let available = loader.is_block_available(&block.id, &block.version);
        info!(
            block = %block.id,
            version = %block.version,
            available,
            "checked block"
        );
        if !available {
            all_available = false;
        }
    }
    if !all_available {
        warn!(
            path = %args.block_path.display(),
            "some required blocks are missing; their nodes will be skipped"
        );
    }

    let options = RuntimeOptions {
        rate_hz: args.rate_hz,
        max_iterations: args.iterations,
    };
    let mut runtime = match PipelineRuntime::build(&manifest, &loader, options) {
        Ok(runtime) => runtime,
        Err(err) => {
            error!(error = %err, "failed to build execution graph");
            return Ok(ExitCode::from(1));
        }
    };

    let (stop_tx, stop_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("received interrupt, shutting down");
            let _ = stop_tx.send(true);
        }
    });

    let monitor = PipelineMonitor::new(runtime.metrics());
    let result = runtime.run(stop_rx).await;

    runtime.shutdown();
    loader.unload_all();

    match result {
        Ok(stats) => {
            println!("\n=== Final Statistics ===");
            println!("  Total executions: {}", stats.total_executions);
            println!("  Total errors: {}", stats.total_errors);
            println!(
                "  Avg execution time: {:.3} ms",
                stats.avg_execution_time_ms
            );
            println!("\n{}", monitor.generate_report());
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => {
            error!(error = ?err, "fatal runtime error");
            Ok(ExitCode::from(2))
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = match parse_args() {
        Ok(Some(args)) => args,
        Ok(None) => return ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("ERROR: {message}");
            return ExitCode::from(1);
        }
    };

    match run(args).await {
        Ok(code) => code,
        Err(err) => {
            error!(error = ?err, "fatal error");
            ExitCode::from(2)
        }
    }
}
