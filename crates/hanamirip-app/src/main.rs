#![forbid(unsafe_code)]
#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls
)]
#![warn(missing_docs)]

//! `hanamirip` binary: fetch a single release from the terminal or tidy up the
//! work root.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use hanamirip_app::bootstrap::{self, App};
use hanamirip_app::commands::{self, TorrentStatusResponse};
use hanamirip_transfer_core::JobState;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "hanamirip", version, about = "Torrent download orchestrator")]
struct Cli {
    #[arg(long, global = true, env = "HANAMIRIP_CONFIG", help = "Path to a TOML settings file")]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Download one source into a folder and wait until it is finalized.
    Fetch(FetchArgs),
    /// List working folders left by earlier runs.
    Orphans(OrphansArgs),
}

#[derive(Args)]
struct FetchArgs {
    #[arg(help = "Magnet URI, http(s) link to a .torrent, or a local .torrent path")]
    source: String,
    #[arg(long, short)]
    output: PathBuf,
    #[arg(long, help = "Write Prometheus metrics to this file when the command exits")]
    metrics_out: Option<PathBuf>,
}

#[derive(Args)]
struct OrphansArgs {
    #[arg(long, help = "Remove the folders instead of only listing them")]
    purge: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let result = match cli.command {
        Command::Fetch(args) => fetch(cli.config.as_deref(), &args).await,
        Command::Orphans(args) => orphans(cli.config.as_deref(), &args),
    };
    match result {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn fetch(config: Option<&Path>, args: &FetchArgs) -> Result<ExitCode> {
    let app: App = bootstrap::start(config, "fetch")
        .await
        .context("failed to start services")?;
    let code = watch(&app, args).await;
    if let Some(path) = &args.metrics_out {
        bootstrap::write_metrics(app.orchestrator.metrics(), path)?;
    }
    code
}

async fn watch(app: &App, args: &FetchArgs) -> Result<ExitCode> {
    let orchestrator = &app.orchestrator;
    let output = args.output.display().to_string();
    let started = commands::start_torrent_download(orchestrator, &args.source, &output).await?;
    println!(
        "started job {} ({})",
        started.id,
        started.name.as_deref().unwrap_or(&started.info_hash)
    );

    let mut poll = tokio::time::interval(app.config.poll_interval());
    loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                signal.context("failed to listen for ctrl-c")?;
                warn!(job_id = started.id, "interrupted; deleting job");
                commands::delete_torrent(orchestrator, started.id).await?;
                return Ok(ExitCode::from(130));
            }
            _ = poll.tick() => {
                let status = commands::get_torrent_status(orchestrator, started.id).await?;
                println!("{}", status_line(&status));
                match status.state {
                    JobState::Completed if status.finalized => {
                        info!(job_id = started.id, "download finalized");
                        println!("saved to {}", started.final_folder);
                        return Ok(ExitCode::SUCCESS);
                    }
                    JobState::Failed => return Ok(ExitCode::FAILURE),
                    _ => {}
                }
            }
        }
    }
}

fn orphans(config: Option<&Path>, args: &OrphansArgs) -> Result<ExitCode> {
    let settings = bootstrap::load_settings(config)?;
    bootstrap::init_telemetry(&settings)?;
    let sweep = bootstrap::sweep_orphans(&settings.work_root, args.purge)?;
    for folder in &sweep.found {
        println!("{}", folder.display());
    }
    if args.purge {
        println!("removed {} of {} folders", sweep.removed, sweep.found.len());
    }
    Ok(ExitCode::SUCCESS)
}

fn status_line(status: &TorrentStatusResponse) -> String {
    let mut line = format!(
        "[{}] {} {}/{} bytes",
        status.id, status.state, status.progress_bytes, status.total_bytes
    );
    if let Some(speed) = &status.download_speed {
        line.push_str(&format!(" {speed}"));
    }
    if let Some(remaining) = &status.time_remaining {
        line.push_str(&format!(" eta {remaining}"));
    }
    if let Some(error) = &status.error {
        line.push_str(&format!(" error: {error}"));
    }
    line
}
