use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use error::AppError;
use m3u8d_engine::curl::{parse_curl, to_curl};
use m3u8d_engine::{DownloadRequest, SessionConfig, SessionManager};
use tokio_util::sync::CancellationToken;
use tracing::{Level, error, info, warn};
use tracing_subscriber::FmtSubscriber;
use tracing_subscriber::fmt::writer::MakeWriterExt;

mod cli;
mod error;
mod utils;

use cli::CliArgs;
use utils::parse_headers;
use utils::progress::ProgressReporter;

fn main() {
    if let Err(e) = bootstrap() {
        eprintln!("Error: {e}");
        error!(error = ?e, "Application failed");
        std::process::exit(1);
    }
}

/// Merge the curl import and explicit arguments into one request.
fn build_request(args: &CliArgs) -> Result<DownloadRequest, AppError> {
    let mut request = match &args.curl {
        Some(command) => parse_curl(command)?,
        None => DownloadRequest::default(),
    };

    if let Some(url) = &args.url {
        request.m3u8_url = url.clone();
    }
    if request.m3u8_url.trim().is_empty() {
        return Err(AppError::InvalidInput("no URL given".to_string()));
    }

    request.host_mode = args.host_type.parse()?;
    request.insecure |= args.insecure;
    request.skip_segments = args.skip;
    if let Some(dir) = &args.output_dir {
        request.save_dir = dir.clone();
    }
    if let Some(name) = &args.name {
        request.file_name = name.clone();
    }
    if let Some(proxy) = &args.proxy {
        request.proxy = proxy.clone();
    }
    for (name, values) in parse_headers(&args.headers) {
        request.headers.entry(name).or_default().extend(values);
    }

    Ok(request)
}

#[tokio::main]
async fn bootstrap() -> Result<(), AppError> {
    // Parse command-line arguments
    let args = CliArgs::parse();

    let request = build_request(&args)?;
    if args.print_curl {
        println!("{}", to_curl(&request));
        return Ok(());
    }

    // Setup logging
    let log_level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open("m3u8d.log")?;

    let multi_writer = MakeWriterExt::and(std::io::stdout, log_file);

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(multi_writer)
        .with_ansi(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| AppError::Initialization(e.to_string()))?;

    info!("m3u8d - HLS downloader, part of the rust-srec project by hua0512");
    info!("GitHub: https://github.com/hua0512/rust-srec");
    info!("==================================================================");

    let config = SessionConfig::builder()
        .with_download_concurrency(args.concurrency)
        .with_max_segment_attempts(args.retries)
        .with_timeout(Duration::from_secs(args.timeout))
        .with_connect_timeout(Duration::from_secs(args.connect_timeout))
        .build();
    info!(
        concurrency = config.download_concurrency,
        attempts = config.max_segment_attempts,
        "HTTP timeout configuration: overall={}s, connect={}s",
        args.timeout,
        args.connect_timeout
    );

    let manager = Arc::new(SessionManager::new(config));

    let interrupt_manager = Arc::clone(&manager);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, cancelling download");
            interrupt_manager.cancel_current();
        }
    });

    let stop = CancellationToken::new();
    let reporter = ProgressReporter::new(args.no_progress).spawn(Arc::clone(&manager), stop.clone());

    let result = manager.run(request).await;

    stop.cancel();
    if let Err(e) = reporter.await {
        warn!(error = %e, "Progress reporter task failed");
    }

    if result.cancelled {
        return Err(AppError::Cancelled);
    }
    if !result.error_message.is_empty() {
        return Err(AppError::Failed(result.error_message));
    }
    if let Some(path) = result.saved_path {
        if result.skipped {
            info!(path = %path.display(), "Already downloaded, nothing to do");
        } else {
            info!(path = %path.display(), "Saved video");
        }
    }
    Ok(())
}
