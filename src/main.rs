use anyhow::{Context, Result};
use channel_uploads::cli::{Args, Mode};
use channel_uploads::client::{ChannelApi, HttpChannelApi};
use channel_uploads::dashboard::Dashboard;
use channel_uploads::models::{SelectedFile, UploadedVideo};
use channel_uploads::state::StateManager;
use channel_uploads::uploader::Uploader;
use clap::Parser;
use std::sync::Arc;

async fn upload_and_watch(args: &Args, api: Arc<HttpChannelApi>, state: &StateManager) -> Result<()> {
    let channel = args.upload_channel()?;
    let mut files = Vec::with_capacity(args.files.len());
    for path in &args.files {
        files.push(SelectedFile::load(path).await?);
    }

    let mut uploader = Uploader::new(api, channel, args.uploader_config(), Dashboard::new())?;

    let total: u64 = files.iter().map(|f| f.size).sum();
    let report = uploader.upload(files).await;
    for failed in uploader.failures() {
        eprintln!(
            "Failed: {} after {} attempt(s): {}",
            failed.file_name, failed.attempts, failed.error
        );
    }
    let report = report.context("Upload batch failed")?;

    if report.is_empty() {
        println!("No files selected, nothing to upload");
        return Ok(());
    }

    println!(
        "\nUploaded {} of {} file(s) ({} bytes) to channel {}",
        report.uploaded,
        report.uploaded + report.failed.len(),
        total,
        channel
    );
    state.merge_state(uploader.videos().as_slice())?;

    watch(&mut uploader, state).await
}

async fn watch_saved(args: &Args, api: Arc<HttpChannelApi>, state: &StateManager) -> Result<()> {
    let pending: Vec<UploadedVideo> = state
        .load_state()?
        .into_iter()
        .filter(|v| !v.is_processed())
        .collect();

    if pending.is_empty() {
        println!("Nothing left to watch in {}", state.path().display());
        return Ok(());
    }
    println!("Watching {} video(s) from {}", pending.len(), state.path().display());

    let mut uploader = Uploader::watcher(api, args.uploader_config(), Dashboard::new());
    uploader.resume(pending);

    watch(&mut uploader, state).await
}

async fn watch<A: ChannelApi + 'static>(uploader: &mut Uploader<A>, state: &StateManager) -> Result<()> {
    let report = tokio::select! {
        report = uploader.watch_processing() => Some(report?),
        _ = tokio::signal::ctrl_c() => None,
    };

    let stopped = uploader.shutdown();
    state.merge_state(uploader.videos().as_slice())?;
    uploader.dashboard_mut().clear();

    match report {
        Some(report) => {
            println!(
                "\nDone: {} processed, {} still processing",
                report.processed.len(),
                report.timed_out.len()
            );
        }
        None => {
            println!(
                "\nInterrupted: stopped watching {} video(s), progress saved to {}",
                stopped.len(),
                state.path().display()
            );
        }
    }

    for video in uploader.videos().iter() {
        println!("  [{:>3}%] {} (id {})", video.percentage, video.title, video.id);
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args = Args::parse();

    let api = Arc::new(HttpChannelApi::new(
        &args.server,
        &args.session_auth(),
        args.proxy.as_deref(),
    )?);
    let state = StateManager::new(&args.state_file);

    match args.mode {
        Mode::Upload => upload_and_watch(&args, api, &state).await?,
        Mode::Watch => watch_saved(&args, api, &state).await?,
    }

    Ok(())
}
