// src/main.rs
//
// hoopwatch batch [--config config.yaml]
//     every detection file under batch.input_dir → one report per file
// hoopwatch live [--config config.yaml]
//     JSONL frames on stdin → event deltas on stdout, final report at EOF

use anyhow::{bail, Context, Result};
use hoopwatch::batch::BatchProcessor;
use hoopwatch::pipeline::{LiveSession, SessionMode, SessionStore};
use hoopwatch::types::{Config, RawFrame};
use std::path::{Path, PathBuf};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

const DEFAULT_CONFIG: &str = "config.yaml";

enum Mode {
    Batch,
    Live,
}

struct Args {
    mode: Mode,
    config: Option<PathBuf>,
}

fn parse_args() -> Result<Args> {
    let mut args = std::env::args().skip(1);
    let mode = match args.next().as_deref() {
        Some("batch") => Mode::Batch,
        Some("live") => Mode::Live,
        other => bail!(
            "usage: hoopwatch <batch|live> [--config FILE] (got {:?})",
            other.unwrap_or("")
        ),
    };
    let mut config = None;
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" | "-c" => {
                let path = args.next().context("--config needs a file path")?;
                config = Some(PathBuf::from(path));
            }
            other => bail!("unknown argument: {}", other),
        }
    }
    Ok(Args { mode, config })
}

fn load_config(explicit: Option<&Path>) -> Result<Config> {
    match explicit {
        Some(path) => Config::load(path).with_context(|| format!("loading {}", path.display())),
        None if Path::new(DEFAULT_CONFIG).exists() => {
            Config::load(DEFAULT_CONFIG).with_context(|| format!("loading {}", DEFAULT_CONFIG))
        }
        None => Ok(Config::default()),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = parse_args()?;
    let config = load_config(args.config.as_deref())?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    info!("🏀 hoopwatch starting");
    if config.engine.shot.basket_zone.is_none() {
        warn!("No basket zone configured, shot detection is off");
    }

    match args.mode {
        Mode::Batch => run_batch(config).await,
        Mode::Live => run_live(config).await,
    }
}

async fn run_batch(config: Config) -> Result<()> {
    let processor = BatchProcessor::new(config.batch.clone());
    let files = processor.find_detection_files()?;
    if files.is_empty() {
        error!("No detection files found in {}", config.batch.input_dir);
        return Ok(());
    }

    // One session per file, each on its own blocking task
    let mut jobs = Vec::with_capacity(files.len());
    for path in files {
        let engine = config.engine.clone();
        let processor = BatchProcessor::new(config.batch.clone());
        jobs.push(tokio::task::spawn_blocking(move || -> Result<(PathBuf, u64)> {
            let (frames, unparseable) = processor.read_frames(&path)?;
            let out = processor.report_path(&path);
            let mut store = SessionStore::new();
            let id = store.start(SessionMode::Batch, engine)?;
            info!(
                "Session {}: {} ({} frames, {} unparseable lines)",
                id,
                path.display(),
                frames.len(),
                unparseable
            );
            let report = store.run_batch(id, frames, Some(out.display().to_string()))?;
            processor.write_report(&out, &report)?;
            Ok((path, report.summary.total_events))
        }));
    }

    let total = jobs.len();
    let mut failed = 0;
    for job in jobs {
        match job.await.context("batch task panicked")? {
            Ok((path, events)) => info!("✓ {}: {} events", path.display(), events),
            Err(e) => {
                failed += 1;
                error!("✗ {:#}", e);
            }
        }
    }
    info!("Batch done: {}/{} file(s) succeeded", total - failed, total);
    Ok(())
}

async fn run_live(config: Config) -> Result<()> {
    let (session, mut deltas) = LiveSession::spawn(config.engine, config.live.queue_capacity)?;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("reading stdin")? else {
                    break;
                };
                if line.trim().is_empty() {
                    continue;
                }
                match RawFrame::from_json(&line) {
                    // stdin may outpace the session; wait for queue space
                    Ok(frame) => session.send(frame).await?,
                    Err(e) => warn!("{}", e),
                }
            }
            Some(delta) = deltas.recv() => print_delta(delta)?,
        }
    }

    let report = session.stop().await?;
    while let Some(delta) = deltas.recv().await {
        print_delta(delta)?;
    }
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn print_delta(delta: hoopwatch::Result<hoopwatch::pipeline::FrameDelta>) -> Result<()> {
    match delta {
        Ok(d) if !d.events.is_empty() => println!("{}", serde_json::to_string(&d)?),
        Ok(_) => {}
        Err(e) => warn!("{}", e),
    }
    Ok(())
}
