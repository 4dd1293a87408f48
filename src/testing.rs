//! Scripted in-memory `ChannelApi` used by the unit tests.

use crate::client::ChannelApi;
use crate::errors::{UploadError, UploadResult};
use crate::models::{SelectedFile, UploadedVideo, VideoId};
use crate::progress::ProgressCell;
use async_trait::async_trait;
use reqwest::StatusCode;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Default)]
struct Script {
    next_id: u64,
    responses: HashMap<String, UploadedVideo>,
    upload_failures: HashMap<String, VecDeque<StatusCode>>,
    upload_delays: HashMap<String, Duration>,
    uploads: Vec<String>,
    progress_seen: HashMap<String, Vec<u8>>,
    statuses: HashMap<VideoId, VecDeque<u8>>,
    last_status: HashMap<VideoId, u8>,
    fetch_failures: HashMap<VideoId, u32>,
    fetch_delays: HashMap<VideoId, Duration>,
    fetches: Vec<(VideoId, Instant)>,
}

#[derive(Default)]
pub struct MockApi {
    script: Mutex<Script>,
}

impl MockApi {
    pub fn respond_to(&self, file_name: &str, video: UploadedVideo) {
        let mut script = self.script.lock().unwrap();
        script.responses.insert(file_name.to_string(), video);
    }

    /// Reject the next `times` uploads of `file_name` with `status`, after
    /// any rejections scripted before.
    pub fn fail_upload(&self, file_name: &str, status: StatusCode, times: u32) {
        let mut script = self.script.lock().unwrap();
        script
            .upload_failures
            .entry(file_name.to_string())
            .or_default()
            .extend(std::iter::repeat(status).take(times as usize));
    }

    pub fn delay_upload(&self, file_name: &str, delay: Duration) {
        let mut script = self.script.lock().unwrap();
        script.upload_delays.insert(file_name.to_string(), delay);
    }

    /// Percentages returned by successive `GET /videos/{id}`. The last one repeats.
    pub fn script_status(&self, id: &VideoId, percentages: impl IntoIterator<Item = u8>) {
        let mut script = self.script.lock().unwrap();
        script
            .statuses
            .entry(id.clone())
            .or_default()
            .extend(percentages);
    }

    pub fn fail_next_fetch(&self, id: &VideoId) {
        let mut script = self.script.lock().unwrap();
        *script.fetch_failures.entry(id.clone()).or_default() += 1;
    }

    /// Make every status check of `id` take `latency` to answer.
    pub fn delay_fetch(&self, id: &VideoId, latency: Duration) {
        let mut script = self.script.lock().unwrap();
        script.fetch_delays.insert(id.clone(), latency);
    }

    pub fn uploads(&self) -> Vec<String> {
        self.script.lock().unwrap().uploads.clone()
    }

    pub fn progress_seen(&self, file_name: &str) -> Vec<u8> {
        let script = self.script.lock().unwrap();
        script
            .progress_seen
            .get(file_name)
            .cloned()
            .unwrap_or_default()
    }

    pub fn fetches(&self) -> Vec<VideoId> {
        let script = self.script.lock().unwrap();
        script.fetches.iter().map(|(id, _)| id.clone()).collect()
    }

    /// When each status check of `id` was sent.
    pub fn fetch_times(&self, id: &VideoId) -> Vec<Instant> {
        let script = self.script.lock().unwrap();
        script
            .fetches
            .iter()
            .filter(|(fetched, _)| fetched == id)
            .map(|(_, at)| *at)
            .collect()
    }

    pub fn fetch_count(&self, id: &VideoId) -> usize {
        self.fetches().iter().filter(|f| *f == id).count()
    }
}

#[async_trait]
impl ChannelApi for MockApi {
    async fn upload_video(
        &self,
        _channel_id: &str,
        file: &SelectedFile,
        progress: ProgressCell,
    ) -> UploadResult<UploadedVideo> {
        let delay = {
            let mut script = self.script.lock().unwrap();
            script.uploads.push(file.name.clone());
            script.upload_delays.get(&file.name).copied()
        };

        for step in [0, file.size / 4, file.size / 2, file.size] {
            progress.report(step, file.size);
            {
                let mut script = self.script.lock().unwrap();
                script
                    .progress_seen
                    .entry(file.name.clone())
                    .or_default()
                    .push(progress.get());
            }
            tokio::task::yield_now().await;
        }

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut script = self.script.lock().unwrap();
        if let Some(status) = script
            .upload_failures
            .get_mut(&file.name)
            .and_then(VecDeque::pop_front)
        {
            return Err(UploadError::Status {
                status,
                body: "rejected".to_string(),
            });
        }

        if let Some(video) = script.responses.get(&file.name) {
            return Ok(video.clone());
        }
        script.next_id += 1;
        Ok(UploadedVideo::new(script.next_id, file.name.clone(), 0))
    }

    async fn fetch_video(&self, id: &VideoId) -> UploadResult<UploadedVideo> {
        let latency = {
            let mut script = self.script.lock().unwrap();
            script.fetches.push((id.clone(), Instant::now()));
            script.fetch_delays.get(id).copied()
        };
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        let mut script = self.script.lock().unwrap();

        if let Some(failures) = script.fetch_failures.get_mut(id) {
            if *failures > 0 {
                *failures -= 1;
                return Err(UploadError::Status {
                    status: StatusCode::SERVICE_UNAVAILABLE,
                    body: "busy".to_string(),
                });
            }
        }

        let percentage = match script.statuses.get_mut(id).and_then(VecDeque::pop_front) {
            Some(p) => p,
            None => script.last_status.get(id).copied().unwrap_or(0),
        };
        script.last_status.insert(id.clone(), percentage);

        let title = script
            .responses
            .values()
            .find(|v| &v.id == id)
            .map(|v| v.title.clone())
            .unwrap_or_else(|| id.to_string());
        Ok(UploadedVideo::new(id.clone(), title, percentage))
    }
}
