//! SmartGrid - sensor sample ingestion service
//!
//! Entry point for the `serve` and `replay` commands.

use anyhow::{bail, Context, Result};
use smartgrid::config::{FFT_THRESHOLD_ENV, FREQUENCY_THRESHOLD_ENV};
use smartgrid::loader::{CsvLoader, DEFAULT_ROW_LIMIT};
use smartgrid::{
    FileSink, IngestionSession, LogListener, ServiceConfig, SessionError, Thresholds,
    TIMESTAMP_FORMAT,
};
use smartgrid_server::{AppState, ServerConfig};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{error, info};

const DEFAULT_CONFIG: &str = "smartgrid.json";
const DEFAULT_INVALID_ROWS_LOG: &str = "invalid_rows.log";

/// Options shared by both commands
#[derive(Default)]
struct Options {
    config: Option<PathBuf>,
    fft_threshold: Option<String>,
    frequency_threshold: Option<String>,
    limit: Option<usize>,
    invalid_log: Option<PathBuf>,
    dataset: Option<PathBuf>,
}

enum Command {
    Version,
    Help,
    Serve(Options),
    Replay(Options),
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("smartgrid=info".parse().unwrap()),
        )
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    match parse_command(&args)? {
        Command::Version => {
            println!("smartgrid {}", smartgrid::VERSION);
            Ok(())
        }
        Command::Help => {
            print_help();
            Ok(())
        }
        Command::Serve(opts) => serve(&opts),
        Command::Replay(opts) => replay(&opts),
    }
}

/// Parse the command line, without the program name
fn parse_command(args: &[String]) -> Result<Command> {
    let Some(command) = args.first() else {
        return Ok(Command::Help);
    };

    match command.as_str() {
        "--version" | "-v" => Ok(Command::Version),
        "--help" | "-h" => Ok(Command::Help),
        "serve" => Ok(Command::Serve(parse_options(&args[1..])?)),
        "replay" => Ok(Command::Replay(parse_options(&args[1..])?)),
        other => bail!("Unknown command: {} (run `smartgrid --help` for usage)", other),
    }
}

fn print_help() {
    println!("Usage: smartgrid <COMMAND> [OPTIONS]");
    println!();
    println!("Commands:");
    println!("  serve                        Host the ingestion service");
    println!("  replay CSV                   Push dataset rows through a local session");
    println!();
    println!("Options:");
    println!("  -c, --config PATH            Service config (default: {})", DEFAULT_CONFIG);
    println!("      --fft-threshold X        Override the spectral threshold");
    println!("      --frequency-threshold X  Override the frequency threshold");
    println!("  -n, --limit N                Rows to replay (default: {})", DEFAULT_ROW_LIMIT);
    println!("      --invalid-log PATH       Log for malformed rows (default: {})", DEFAULT_INVALID_ROWS_LOG);
    println!("  -v, --version                Show version");
    println!("  -h, --help                   Show this help");
    println!();
    println!("Thresholds may also be set with {} and {}.", FFT_THRESHOLD_ENV, FREQUENCY_THRESHOLD_ENV);
    println!();
    println!("Examples:");
    println!("  smartgrid serve --config smartgrid.json");
    println!("  smartgrid replay data/grid.csv --fft-threshold 5 --frequency-threshold 50");
}

fn parse_options(args: &[String]) -> Result<Options> {
    let mut opts = Options::default();
    let mut i = 0;

    while i < args.len() {
        let value = || {
            args.get(i + 1)
                .with_context(|| format!("{} requires a value", args[i]))
        };
        match args[i].as_str() {
            "--config" | "-c" => opts.config = Some(PathBuf::from(value()?)),
            "--fft-threshold" => opts.fft_threshold = Some(value()?.clone()),
            "--frequency-threshold" => opts.frequency_threshold = Some(value()?.clone()),
            "--limit" | "-n" => {
                let raw = value()?;
                opts.limit = Some(
                    raw.parse()
                        .with_context(|| format!("Invalid row limit: {}", raw))?,
                );
            }
            "--invalid-log" => opts.invalid_log = Some(PathBuf::from(value()?)),
            arg if arg.starts_with('-') => bail!("Unknown argument: {}", arg),
            _ => {
                if opts.dataset.is_some() {
                    bail!("Unexpected argument: {}", args[i]);
                }
                opts.dataset = Some(PathBuf::from(&args[i]));
                i += 1;
                continue;
            }
        }
        i += 2;
    }

    Ok(opts)
}

/// Resolve the service config from file, environment, and command line
///
/// An explicit `--config` must exist. Without one, `smartgrid.json` is used
/// when present, otherwise the thresholds come from the environment and the
/// command line alone.
fn resolve_config(opts: &Options) -> Result<ServiceConfig> {
    let path = opts
        .config
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG));

    let mut config = if opts.config.is_some() || path.exists() {
        ServiceConfig::load(&path)?
    } else {
        let fft = opts
            .fft_threshold
            .clone()
            .or_else(|| std::env::var(FFT_THRESHOLD_ENV).ok());
        let frequency = opts
            .frequency_threshold
            .clone()
            .or_else(|| std::env::var(FREQUENCY_THRESHOLD_ENV).ok());
        ServiceConfig::with_thresholds(Thresholds::parse(fft.as_deref(), frequency.as_deref())?)
    };

    config.apply_overrides(
        opts.fft_threshold.as_deref(),
        opts.frequency_threshold.as_deref(),
    )?;
    config.thresholds()?;
    Ok(config)
}

fn build_session(config: &ServiceConfig) -> Result<IngestionSession<FileSink>> {
    let sink = FileSink::new(config.accepted_path(), config.rejected_path());
    let mut session = IngestionSession::new(config.thresholds()?, sink);
    session.subscribe(LogListener);
    Ok(session)
}

fn serve(opts: &Options) -> Result<()> {
    let config = resolve_config(opts)?;
    let session = build_session(&config)?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(async {
        let state = AppState::new(session, ServerConfig::from(config.server.clone()))?;
        smartgrid_server::start_server(state).await
    })
}

fn replay(opts: &Options) -> Result<()> {
    let Some(dataset) = opts.dataset.as_deref() else {
        bail!("replay requires a CSV dataset path");
    };
    let config = resolve_config(opts)?;
    let invalid_log = opts
        .invalid_log
        .clone()
        .unwrap_or_else(|| config.data_dir.join(DEFAULT_INVALID_ROWS_LOG));

    let loader = CsvLoader::new(dataset, invalid_log);
    let report = loader.load(opts.limit.unwrap_or(DEFAULT_ROW_LIMIT))?;
    println!(
        "Loaded {} sample(s) from {} ({} invalid row(s) skipped)",
        report.samples.len(),
        dataset.display(),
        report.invalid_rows
    );

    let mut session = build_session(&config)?;
    session.start(&replay_meta(dataset))?;

    // Set up Ctrl+C handler
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })
    .ok();

    for sample in report.samples {
        if !running.load(Ordering::SeqCst) {
            info!("Replay interrupted, ending session early");
            break;
        }
        let stamp = sample.timestamp.format(TIMESTAMP_FORMAT).to_string();
        match session.push_sample(Some(sample)) {
            Ok(()) => println!("  [accepted] {}", stamp),
            Err(e @ (SessionError::ValidationFailed(_) | SessionError::PersistenceFailed(_))) => {
                println!("  [rejected] {} {}", stamp, e.reason());
            }
            Err(e) => {
                error!(error = %e, "Replay aborted");
                return Err(e.into());
            }
        }
    }

    let total = session.end()?;
    println!(
        "Session ended: {} accepted, {} rejected",
        total,
        session.state().rejected_count()
    );
    Ok(())
}

fn replay_meta(dataset: &Path) -> String {
    let name = dataset
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| dataset.display().to_string());
    format!("replay of {}", name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_unknown_command_is_an_error() {
        let err = parse_command(&args(&["ingest"])).err().unwrap();
        assert!(err.to_string().contains("Unknown command: ingest"));
    }

    #[test]
    fn test_no_command_shows_help() {
        assert!(matches!(parse_command(&[]).unwrap(), Command::Help));
        assert!(matches!(parse_command(&args(&["-v"])).unwrap(), Command::Version));
    }

    #[test]
    fn test_replay_options() {
        let Command::Replay(opts) = parse_command(&args(&[
            "replay",
            "grid.csv",
            "--fft-threshold",
            "5",
            "-n",
            "20",
        ]))
        .unwrap() else {
            panic!("expected replay");
        };
        assert_eq!(opts.dataset, Some(PathBuf::from("grid.csv")));
        assert_eq!(opts.fft_threshold.as_deref(), Some("5"));
        assert_eq!(opts.limit, Some(20));
    }

    #[test]
    fn test_bad_options_are_errors() {
        assert!(parse_command(&args(&["serve", "--bogus"])).is_err());
        assert!(parse_command(&args(&["replay", "--limit"])).is_err());
        assert!(parse_command(&args(&["replay", "-n", "many"])).is_err());
        assert!(parse_command(&args(&["replay", "a.csv", "b.csv"])).is_err());
    }

    #[test]
    fn test_replay_meta_uses_file_name() {
        assert_eq!(replay_meta(Path::new("data/grid.csv")), "replay of grid.csv");
    }
}
