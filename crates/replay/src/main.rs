use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};

use anyhow::{Context, bail};
use helios_boundary::{EngineConfig, MarketEvent, SignalEngine};
use log::{info, warn};

fn print_help() {
    eprintln!(
        r#"Helios Replay - feed recorded market events through the signal engine

USAGE:
    helios-replay --config <PATH> [--events <PATH>] [--ready-only]

OPTIONS:
    --config <PATH>     Engine configuration (JSON)
    --events <PATH>     Market events, one JSON object per line (default: stdin)
    --ready-only        Only print outputs whose estimator is past warm-up
    --help              Print this help message

Outputs are written to stdout as JSON lines, in event order.

ENVIRONMENT VARIABLES:
    RUST_LOG            Log level filter
"#
    );
}

struct Args {
    config: String,
    events: Option<String>,
    ready_only: bool,
}

fn parse_args() -> anyhow::Result<Option<Args>> {
    let args: Vec<String> = std::env::args().collect();
    let mut config = None;
    let mut events = None;
    let mut ready_only = false;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                print_help();
                return Ok(None);
            }
            "--config" | "-c" => {
                i += 1;
                config = Some(args.get(i).context("--config requires a path")?.clone());
            }
            "--events" | "-e" => {
                i += 1;
                events = Some(args.get(i).context("--events requires a path")?.clone());
            }
            "--ready-only" => ready_only = true,
            arg => {
                print_help();
                bail!("unknown argument: {arg}");
            }
        }
        i += 1;
    }

    let Some(config) = config else {
        print_help();
        bail!("--config is required");
    };
    Ok(Some(Args {
        config,
        events,
        ready_only,
    }))
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let Some(args) = parse_args()? else {
        return Ok(());
    };

    info!("[CONFIG] loading engine configuration from {}", args.config);
    let config = EngineConfig::from_file(&args.config)?;
    let engine = SignalEngine::from_config(&config)?;

    let input: Box<dyn BufRead> = match &args.events {
        Some(path) => Box::new(BufReader::new(
            File::open(path).with_context(|| format!("opening events file {path}"))?,
        )),
        None => Box::new(BufReader::new(io::stdin())),
    };
    let mut out = BufWriter::new(io::stdout().lock());

    let mut events = 0usize;
    let mut outputs = 0usize;
    let mut failures = 0usize;

    for (line_no, line) in input.lines().enumerate() {
        let line = line.with_context(|| format!("reading line {}", line_no + 1))?;
        if line.trim().is_empty() {
            continue;
        }
        let event: MarketEvent = serde_json::from_str(&line)
            .with_context(|| format!("line {}: not a market event", line_no + 1))?;
        events += 1;

        let report = engine.dispatch(&event)?;
        for failure in &report.failures {
            failures += 1;
            warn!(
                "line {}: {} on {} failed: {}",
                line_no + 1,
                failure.alpha_id,
                event.instrument_id(),
                failure.error
            );
        }
        for output in report.outputs {
            if args.ready_only && !output.is_ready() {
                continue;
            }
            serde_json::to_writer(&mut out, &output)?;
            out.write_all(b"\n")?;
            outputs += 1;
        }
    }
    out.flush()?;

    info!("replayed {events} events: {outputs} outputs written, {failures} estimator failures");
    engine.shutdown();
    Ok(())
}
