use crate::client::ChannelApi;
use crate::dashboard::Dashboard;
use crate::errors::{UploadError, UploadResult};
use crate::models::{BatchReport, FailedUpload, SelectedFile, UploadedVideo, VideoId, WatchReport};
use crate::poller::{PollEvent, PollHandles, PollSchedule, spawn_poll};
use crate::progress::{ProgressCell, UploadProgress};
use crate::video_list::VideoList;
use clap::ValueEnum;
use futures::StreamExt;
use futures::stream::FuturesUnordered;
use log::{debug, error, info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;

/// What happens to a batch when one of its uploads fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum BatchPolicy {
    /// Every upload settles; successes are shown, failures are reported.
    Partial,
    /// The first failure aborts the batch and nothing is shown.
    AllOrNothing,
}

#[derive(Debug, Clone)]
pub struct UploaderConfig {
    pub policy: BatchPolicy,
    pub upload_retries: u32,
    pub schedule: PollSchedule,
    pub poll_timeout: Option<Duration>,
}

impl Default for UploaderConfig {
    fn default() -> Self {
        Self {
            policy: BatchPolicy::Partial,
            upload_retries: 0,
            schedule: PollSchedule::default(),
            poll_timeout: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Uploading,
    Uploaded,
    Polling,
    Done,
    Failed,
}

/// Upload widget, bound to one channel unless it only watches processing.
pub struct Uploader<A: ChannelApi + 'static> {
    api: Arc<A>,
    channel_id: Option<String>,
    config: UploaderConfig,
    phase: Phase,
    selected: bool,
    progress: UploadProgress,
    videos: VideoList,
    failures: Vec<FailedUpload>,
    polls: PollHandles,
    dashboard: Dashboard,
}

impl<A: ChannelApi + 'static> Uploader<A> {
    pub fn new(
        api: Arc<A>,
        channel_id: impl Into<String>,
        config: UploaderConfig,
        dashboard: Dashboard,
    ) -> UploadResult<Self> {
        let channel_id = channel_id.into();
        if channel_id.trim().is_empty() {
            return Err(UploadError::MissingChannel);
        }

        let mut uploader = Self::watcher(api, config, dashboard);
        uploader.channel_id = Some(channel_id);
        Ok(uploader)
    }

    /// An uploader without a channel. It can resume and watch videos but
    /// [`Uploader::upload`] fails with [`UploadError::MissingChannel`].
    pub fn watcher(api: Arc<A>, config: UploaderConfig, dashboard: Dashboard) -> Self {
        Self {
            api,
            channel_id: None,
            config,
            phase: Phase::Idle,
            selected: false,
            progress: UploadProgress::default(),
            videos: VideoList::default(),
            failures: Vec::new(),
            polls: PollHandles::default(),
            dashboard,
        }
    }

    /// Upload every file concurrently to `POST /channels/{channel}/videos`.
    ///
    /// The video list is replaced only once every upload has settled. Under
    /// [`BatchPolicy::AllOrNothing`] the first failure drops the remaining
    /// uploads and returns [`UploadError::BatchAborted`]. Under
    /// [`BatchPolicy::Partial`] failures are collected and returned in the
    /// report; the call fails only if nothing was uploaded.
    pub async fn upload(&mut self, files: Vec<SelectedFile>) -> UploadResult<BatchReport> {
        if files.is_empty() {
            debug!("Empty selection, nothing to upload");
            return Ok(BatchReport::default());
        }
        let Some(channel_id) = self.channel_id.clone() else {
            return Err(UploadError::MissingChannel);
        };

        self.selected = true;
        self.phase = Phase::Uploading;
        self.progress.clear();
        self.failures.clear();
        info!(
            "Uploading {} file(s) to channel {}",
            files.len(),
            channel_id
        );

        let mut cells = Vec::with_capacity(files.len());
        for (idx, file) in files.iter().enumerate() {
            let cell = self.progress.start(&file.name);
            self.dashboard.track_upload(idx, &file.name, cell.subscribe());
            cells.push(cell);
        }

        let api = self.api.as_ref();
        let dashboard = &self.dashboard;
        let channel_id = channel_id.as_str();
        let retries = self.config.upload_retries;
        let policy = self.config.policy;

        let mut pending: FuturesUnordered<_> = files
            .iter()
            .zip(cells)
            .map(|(file, cell)| async move {
                let (attempts, result) =
                    upload_with_retry(api, channel_id, file, cell, retries, dashboard).await;
                (file, attempts, result)
            })
            .collect();

        let mut uploads = Vec::new();
        let mut failed = Vec::new();
        let mut aborted = None;

        while let Some((file, attempts, result)) = pending.next().await {
            match result {
                Ok(video) => {
                    info!("Uploaded {} as video {}", file.name, video.id);
                    dashboard.upload_done(&file.name);
                    uploads.push(video);
                }
                Err(e) => {
                    error!("Upload of {} failed after {} attempt(s): {}", file.name, attempts, e);
                    dashboard.upload_failed(&file.name, &e.to_string());
                    if policy == BatchPolicy::AllOrNothing {
                        aborted = Some((file.name.clone(), e));
                        break;
                    }
                    failed.push(FailedUpload {
                        file_name: file.name.clone(),
                        error: e.to_string(),
                        attempts,
                    });
                }
            }
        }
        drop(pending);
        self.dashboard.finish_uploads();

        if let Some((file_name, source)) = aborted {
            self.phase = Phase::Failed;
            return Err(UploadError::BatchAborted {
                file_name,
                source: Box::new(source),
            });
        }

        self.failures = failed;
        if uploads.is_empty() {
            self.phase = Phase::Failed;
            return Err(UploadError::NothingUploaded {
                failed: self.failures.len(),
            });
        }

        for video in &uploads {
            self.dashboard.show_video(video);
        }
        self.videos.replace_all(uploads);
        self.phase = Phase::Uploaded;

        Ok(BatchReport {
            uploaded: self.videos.len(),
            failed: self.failures.clone(),
        })
    }

    /// Take over videos uploaded by an earlier run so their processing can
    /// be watched again.
    pub fn resume(&mut self, videos: Vec<UploadedVideo>) {
        for video in &videos {
            self.dashboard.show_video(video);
        }
        self.videos.replace_all(videos);
        self.phase = Phase::Uploaded;
    }

    /// Poll every video in the list until it reports 100%, merging each
    /// fresh status into the list. Returns once no poll is left, either
    /// because everything finished or the configured timeout elapsed.
    pub async fn watch_processing(&mut self) -> UploadResult<WatchReport> {
        let mut report = WatchReport::default();
        if self.videos.is_empty() {
            return Ok(report);
        }

        let (tx, mut rx) = mpsc::unbounded_channel();
        for video in self.videos.iter() {
            let handle = spawn_poll(
                Arc::clone(&self.api),
                video.id.clone(),
                self.config.schedule.clone(),
                tx.clone(),
            );
            self.polls.insert(video.id.clone(), handle);
        }
        drop(tx);
        self.phase = Phase::Polling;

        let deadline = self.config.poll_timeout.map(|t| Instant::now() + t);

        while !self.polls.is_empty() {
            let event = match deadline {
                Some(deadline) => match tokio::time::timeout_at(deadline, rx.recv()).await {
                    Ok(event) => event,
                    Err(_) => {
                        for id in self.polls.cancel_all() {
                            warn!("Video {} still processing after timeout", id);
                            self.dashboard.video_timed_out(&id);
                            report.timed_out.push(id);
                        }
                        break;
                    }
                },
                None => rx.recv().await,
            };

            match event {
                Some(event) => self.apply(event, &mut report),
                None => {
                    // Every poll task is gone without reporting completion.
                    report.timed_out.extend(self.polls.cancel_all());
                    break;
                }
            }
        }

        self.phase = Phase::Done;
        Ok(report)
    }

    fn apply(&mut self, event: PollEvent, report: &mut WatchReport) {
        match event {
            PollEvent::Status { id, video } => {
                if video.is_processed() && self.polls.cancel(&id) {
                    info!("Video {} finished processing", id);
                    report.processed.push(id);
                }
                self.dashboard.show_video(&video);
                if !self.videos.replace(video) {
                    debug!("Status for unknown video ignored");
                }
            }
            PollEvent::Failed { id, error } => {
                self.dashboard.video_check_failed(&id, &error);
            }
        }
    }

    /// Cancel every outstanding poll. Returns the ids that were still polling.
    pub fn shutdown(&mut self) -> Vec<VideoId> {
        let cancelled = self.polls.cancel_all();
        if !cancelled.is_empty() {
            info!("Stopped polling {} video(s)", cancelled.len());
        }
        cancelled
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_selected(&self) -> bool {
        self.selected
    }

    pub fn videos(&self) -> &VideoList {
        &self.videos
    }

    pub fn progress(&self) -> &UploadProgress {
        &self.progress
    }

    pub fn failures(&self) -> &[FailedUpload] {
        &self.failures
    }

    pub fn active_polls(&self) -> usize {
        self.polls.len()
    }

    pub fn is_polling(&self, id: &VideoId) -> bool {
        self.polls.contains(id)
    }

    pub fn dashboard_mut(&mut self) -> &mut Dashboard {
        &mut self.dashboard
    }
}

/// Exponential backoff: 1s, 2s, 4s... capped at 30s.
fn retry_delay(attempt: u32) -> Duration {
    let ms = 1000u64 << (attempt.saturating_sub(1)).min(5);
    Duration::from_millis(ms.min(30_000))
}

async fn upload_with_retry<A: ChannelApi + ?Sized>(
    api: &A,
    channel_id: &str,
    file: &SelectedFile,
    cell: ProgressCell,
    retries: u32,
    dashboard: &Dashboard,
) -> (u32, UploadResult<UploadedVideo>) {
    let mut attempt = 0u32;

    loop {
        attempt += 1;
        if attempt > 1 {
            cell.reset();
        }

        match api.upload_video(channel_id, file, cell.clone()).await {
            Ok(video) => return (attempt, Ok(video)),
            Err(e) if e.is_retryable() && attempt <= retries => {
                let delay = retry_delay(attempt);
                warn!(
                    "Upload of {} failed (attempt {}/{}), retrying in {:?}: {}",
                    file.name,
                    attempt,
                    retries + 1,
                    delay,
                    e
                );
                dashboard.upload_retrying(&file.name, attempt, retries, delay);
                tokio::time::sleep(delay).await;
            }
            Err(e) => return (attempt, Err(e)),
        }
    }
}
