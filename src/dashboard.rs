use crate::models::{UploadedVideo, VideoId};
use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

fn bar_style(template: &str) -> ProgressStyle {
    ProgressStyle::default_bar()
        .template(template)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=>-")
}

fn upload_style() -> ProgressStyle {
    bar_style("{msg:30} {bar:40} {pos:>3}% uploaded")
}

fn processing_style() -> ProgressStyle {
    bar_style("{msg:30} {bar:40} {pos:>3}% processed")
}

/// Terminal view of the upload widget: one bar per selected file while
/// uploading, then one bar per video while the server processes it.
pub struct Dashboard {
    mp: MultiProgress,
    uploads: HashMap<String, ProgressBar>,
    followers: Vec<JoinHandle<()>>,
    videos: HashMap<VideoId, ProgressBar>,
}

impl Dashboard {
    pub fn new() -> Self {
        Self::with_target(ProgressDrawTarget::stderr())
    }

    pub fn hidden() -> Self {
        Self::with_target(ProgressDrawTarget::hidden())
    }

    fn with_target(target: ProgressDrawTarget) -> Self {
        Self {
            mp: MultiProgress::with_draw_target(target),
            uploads: HashMap::new(),
            followers: Vec::new(),
            videos: HashMap::new(),
        }
    }

    /// Add a bar for `file_name` that follows its progress cell.
    pub fn track_upload(&mut self, idx: usize, file_name: &str, mut rx: watch::Receiver<u8>) {
        let pb = self.mp.add(ProgressBar::new(100));
        pb.set_style(upload_style());
        pb.set_message(format!("[{:>2}] {}", idx, file_name));
        pb.set_position(*rx.borrow_and_update() as u64);

        let follower = pb.clone();
        self.followers.push(tokio::spawn(async move {
            while rx.changed().await.is_ok() {
                let pct = *rx.borrow_and_update();
                follower.set_position(pct as u64);
            }
        }));

        self.uploads.insert(file_name.to_string(), pb);
    }

    pub fn upload_retrying(&self, file_name: &str, attempt: u32, retries: u32, delay: Duration) {
        if let Some(pb) = self.uploads.get(file_name) {
            pb.set_message(format!(
                "{} [Retry {}/{}: {}s wait...]",
                file_name,
                attempt,
                retries,
                delay.as_secs()
            ));
        }
    }

    pub fn upload_done(&self, file_name: &str) {
        if let Some(pb) = self.uploads.get(file_name) {
            pb.set_message(format!("{} uploaded", file_name));
            pb.finish();
        }
    }

    pub fn upload_failed(&self, file_name: &str, error: &str) {
        if let Some(pb) = self.uploads.get(file_name) {
            pb.abandon_with_message(format!("{} FAILED: {}", file_name, error));
        }
    }

    /// Stop following the upload cells once the batch has settled. Bars of
    /// uploads that never settled are marked as cancelled.
    pub fn finish_uploads(&mut self) {
        for handle in self.followers.drain(..) {
            handle.abort();
        }
        for (file_name, pb) in self.uploads.drain() {
            if !pb.is_finished() {
                pb.abandon_with_message(format!("{} cancelled", file_name));
            }
        }
    }

    /// Render the latest known state of a video.
    pub fn show_video(&mut self, video: &UploadedVideo) {
        let mp = &self.mp;
        let pb = self.videos.entry(video.id.clone()).or_insert_with(|| {
            let pb = mp.add(ProgressBar::new(100));
            pb.set_style(processing_style());
            pb
        });
        pb.set_position(video.percentage.min(100) as u64);
        if video.is_processed() {
            pb.finish_with_message(format!("{} ready", video.title));
        } else {
            pb.set_message(video.title.clone());
        }
    }

    pub fn video_check_failed(&self, id: &VideoId, error: &str) {
        if let Some(pb) = self.videos.get(id) {
            pb.set_message(format!("video {} [status check failed: {}]", id, error));
        }
    }

    pub fn video_timed_out(&self, id: &VideoId) {
        if let Some(pb) = self.videos.get(id) {
            pb.abandon_with_message(format!("video {} still processing, gave up", id));
        }
    }

    pub fn clear(&mut self) {
        self.finish_uploads();
        self.videos.clear();
        self.mp.clear().ok();
    }
}

impl Default for Dashboard {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Dashboard {
    fn drop(&mut self) {
        for handle in self.followers.drain(..) {
            handle.abort();
        }
    }
}
