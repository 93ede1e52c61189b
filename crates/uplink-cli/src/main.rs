//! Uplink CLI: submit a batch of files and follow its progress.
//!
//! Reads UPLINK_API_URL (or API_URL), UPLINK_API_KEY and the other UPLINK_*
//! settings from the environment or a `.env` file.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Serialize;
use uplink_api_client::BatchSession;
use uplink_cli::{
    format_event, init_tracing, is_finished, items_from_status, state_from_status, summary,
    tracking_report,
};
use uplink_core::{BatchRequest, ClientConfig, UploadQueue};

#[derive(Parser)]
#[command(name = "uplink", about = "Batch upload client with live progress")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Submit files as one batch and follow its progress
    Submit {
        /// Files to upload
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Case the batch belongs to
        #[arg(long)]
        case_id: String,
        /// Processing quality (defaults to UPLINK_DEFAULT_QUALITY)
        #[arg(long)]
        quality: Option<String>,
        /// Request transcription
        #[arg(long)]
        transcription: bool,
        /// Request sync
        #[arg(long)]
        sync: bool,
        /// Print the batch handle and exit without following progress
        #[arg(long)]
        no_watch: bool,
    },
    /// Follow the progress of an existing batch
    Watch {
        /// Batch id returned by submit
        batch_id: String,
    },
    /// Show the server-side status of a batch
    Status {
        /// Batch id returned by submit
        batch_id: String,
    },
}

fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
    let out = serde_json::to_string_pretty(value).context("Serialize response")?;
    println!("{}", out);
    Ok(())
}

/// Track `batch_id` until it completes, fails, or Ctrl-C cancels it.
async fn watch(session: &mut BatchSession, batch_id: &str) -> anyhow::Result<()> {
    let token = session
        .cancel_token(batch_id)
        .with_context(|| format!("Batch {} is not tracked", batch_id))?;
    let ctrl_c = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupted, cancelling");
            token.cancel();
        }
    });

    let result = session
        .track(batch_id, |state, event| {
            println!(
                "[{}] {}",
                chrono::Local::now().format("%H:%M:%S"),
                format_event(state, event)
            );
        })
        .await;
    ctrl_c.abort();

    let state = session
        .state(batch_id)
        .with_context(|| format!("Batch {} is not tracked", batch_id))?;
    print_json(&tracking_report(state, &result))?;

    result.with_context(|| format!("Lost progress channel for batch {}", batch_id))?;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let config = ClientConfig::from_env()
        .context("Invalid configuration. Check UPLINK_API_URL and the other UPLINK_* variables")?;
    let mut session = BatchSession::from_config(&config)
        .context("Failed to create API client")?
        .with_escalation(|batch_id, err| {
            tracing::error!(batch_id = %batch_id, error = %err, "Progress updates unavailable");
        });

    match cli.command {
        Commands::Submit {
            files,
            case_id,
            quality,
            transcription,
            sync,
            no_watch,
        } => {
            let options = &config.upload_options;
            let mut queue = UploadQueue::new();
            for file in &files {
                queue
                    .add_path(file)
                    .with_context(|| format!("Cannot queue {}", file.display()))?;
            }

            let request = BatchRequest::new(
                &case_id,
                quality.as_deref().unwrap_or(&options.default_quality),
                transcription || options.default_transcription,
                sync || options.default_sync,
                options,
            )?;

            let handle = session
                .submit(&mut queue, &request)
                .await
                .context("Batch submission failed")?;
            print_json(&handle)?;

            if !no_watch {
                watch(&mut session, &handle.batch_id).await?;
            }
        }
        Commands::Watch { batch_id } => {
            let current = session
                .client()
                .get_batch_status(&batch_id)
                .await
                .with_context(|| format!("Failed to fetch batch {}", batch_id))?;
            if is_finished(&current) {
                tracing::info!(
                    batch_id = %batch_id,
                    status = %current.status,
                    "Batch already finished"
                );
                print_json(&summary(&state_from_status(&current)))?;
                return Ok(());
            }
            session.register(&batch_id, items_from_status(&current));
            watch(&mut session, &batch_id).await?;
        }
        Commands::Status { batch_id } => {
            let response = session.client().get_batch_status(&batch_id).await?;
            print_json(&response)?;
        }
    }

    Ok(())
}
