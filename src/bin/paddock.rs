// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! # Paddock CLI
//!
//! Command-line entrypoint for the vehicle-telemetry ingestion pipeline.
//!
//! ## Usage
//!
//! ```sh
//! # Show file information
//! paddock inspect info run.mcap
//!
//! # Run the ingestion service (HTTP edge + background job runner)
//! paddock serve --port 8080
//! ```

mod cmd;
mod common;

use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use clap::{Parser, Subcommand};
use cmd::InspectCmd;
use common::Result;

use paddock::admission::AdmissionGuard;
use paddock::config::Config;
use paddock::external::{HttpMatlabDispatcher, MongoRunRepository, S3ObjectStore};
use paddock::http::{build_router, AppState};
use paddock::orchestrator::{ingest_job, IngestContext};
use paddock::upload::queue::RECONCILE_INTERVAL_SECS;
use paddock::upload::UploadQueue;

/// Paddock - vehicle-telemetry ingestion and fan-out pipeline
#[derive(Parser)]
#[command(name = "paddock")]
#[command(about = "MCAP vehicle-telemetry ingestion and fan-out pipeline", long_about = None)]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(author = "ArcheBase")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Inspect an MCAP file's contents (info, topics, schema, stats)
    #[command(subcommand)]
    Inspect(InspectCmd),

    /// Run the HTTP edge and background ingest worker
    Serve {
        /// Port the HTTP edge listens on
        #[arg(long, default_value_t = 8080)]
        port: u16,
    },
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let result = run().await;

    if let Err(e) = &result {
        eprintln!("Error: {e}");
        process::exit(1);
    }

    result
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Inspect(cmd) => cmd.run(),
        Commands::Serve { port } => serve(port).await,
    }
}

async fn serve(port: u16) -> Result<()> {
    init_tracing();

    let config = Config::from_env()?;
    std::fs::create_dir_all(&config.upload_dir)?;

    let region = aws_sdk_s3::config::Region::new(config.aws_region.clone());
    let credentials = aws_sdk_s3::config::Credentials::new(
        &config.aws_access_key,
        &config.aws_secret_key,
        None,
        None,
        "paddock-config",
    );
    let shared_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(region)
        .credentials_provider(credentials)
        .load()
        .await;
    let s3_client = aws_sdk_s3::Client::new(&shared_config);
    let object_store = Arc::new(S3ObjectStore::new(s3_client, config.aws_s3_run_bucket.clone()));

    let mongo_client = mongodb::Client::with_uri_str(&config.mongodb_uri).await?;
    let collection = mongo_client.database("paddock").collection("runs");
    let run_repository = Arc::new(MongoRunRepository::new(collection));

    let matlab_dispatcher = Arc::new(HttpMatlabDispatcher::new(config.matlab_uri.clone()));

    let queue = Arc::new(UploadQueue::new(config.max_total_size));
    let admission = Arc::new(AdmissionGuard::new(queue.clone()));
    let upload_dir = std::path::PathBuf::from(&config.upload_dir);

    let cancel = Arc::new(AtomicBool::new(false));

    let worker_ctx = IngestContext {
        object_store: object_store.clone(),
        run_repository: run_repository.clone(),
        matlab_dispatcher,
        scratch_dir: upload_dir.clone(),
        field_paths: Default::default(),
        production_mode: config.production_mode,
        cancel: cancel.clone(),
    };
    let worker_handle = tokio::spawn(run_ingest_worker(queue.clone(), worker_ctx));

    let reconcile_queue = queue.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(RECONCILE_INTERVAL_SECS));
        loop {
            interval.tick().await;
            reconcile_queue.reconcile();
        }
    });

    let state = AppState {
        queue: queue.clone(),
        admission,
        run_repository,
        object_store,
        upload_dir,
    };
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    tracing::info!(port, "paddock HTTP edge listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(queue, cancel))
        .await?;

    // Stop() blocks until the runner returns (§4.F): an in-flight job is
    // allowed to finish before the process exits.
    worker_handle.await.ok();

    Ok(())
}

/// Resolves once the process receives a shutdown signal, requesting a
/// graceful stop of both the job runner and any in-flight pub/sub producer.
async fn shutdown_signal(queue: Arc<UploadQueue>, cancel: Arc<AtomicBool>) {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received, requesting graceful stop");
    queue.request_stop();
    cancel.store(true, Ordering::SeqCst);
}

/// Drains the upload queue one job at a time, ingesting serially so memory
/// use stays predictable (§4.F). Checked between jobs: once a graceful stop
/// is requested, the next dequeue is skipped and the loop returns rather
/// than picking up a new job.
async fn run_ingest_worker(queue: Arc<UploadQueue>, ctx: IngestContext) {
    loop {
        if queue.stop_requested() {
            tracing::info!("graceful stop requested, exiting ingest worker loop");
            return;
        }
        match queue.dequeue() {
            Some(mut job) => {
                let job_id = job.id;
                let enqueued_at = Utc::now();
                if let Err(err) = ingest_job(&ctx, &mut job, enqueued_at).await {
                    tracing::error!(job_id = %job_id, error = %err, "ingest job failed");
                    job.fail(Utc::now());
                }
                queue.release(job.size_bytes);
            }
            None => tokio::time::sleep(Duration::from_millis(250)).await,
        }
    }
}
