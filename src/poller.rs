use crate::client::ChannelApi;
use crate::models::{UploadedVideo, VideoId};
use log::{debug, warn};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Delay between two status requests for one video.
#[derive(Debug, Clone, PartialEq)]
pub struct PollSchedule {
    pub interval: Duration,
    /// Multiplier applied to the delay after every tick. 1.0 keeps it fixed.
    pub backoff: f64,
    pub max_interval: Duration,
}

impl Default for PollSchedule {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(3000),
            backoff: 1.0,
            max_interval: Duration::from_secs(60),
        }
    }
}

impl PollSchedule {
    pub fn next_delay(&self, current: Duration) -> Duration {
        if self.backoff <= 1.0 {
            return current;
        }
        let cap = self.max_interval.max(self.interval);
        Duration::try_from_secs_f64(current.as_secs_f64() * self.backoff)
            .map_or(cap, |next| next.min(cap))
    }
}

#[derive(Debug)]
pub enum PollEvent {
    Status { id: VideoId, video: UploadedVideo },
    Failed { id: VideoId, error: String },
}

/// Start polling `GET /videos/{id}` until the video reports 100%.
///
/// Ticks are measured from the start of the previous check, so a slow
/// response does not stretch the period. A check that outlasts the period
/// is followed immediately by the next one; two checks of the same video
/// are never in flight at once.
pub fn spawn_poll<A>(
    api: Arc<A>,
    id: VideoId,
    schedule: PollSchedule,
    events: mpsc::UnboundedSender<PollEvent>,
) -> JoinHandle<()>
where
    A: ChannelApi + ?Sized + 'static,
{
    tokio::spawn(async move {
        let mut delay = schedule.interval;
        let mut next_tick = Instant::now() + delay;
        loop {
            tokio::time::sleep_until(next_tick).await;
            let tick = next_tick;

            let event = match api.fetch_video(&id).await {
                Ok(video) => {
                    debug!("Video {} at {}%", id, video.percentage);
                    let done = video.is_processed();
                    let event = PollEvent::Status {
                        id: id.clone(),
                        video,
                    };
                    if done {
                        let _ = events.send(event);
                        return;
                    }
                    event
                }
                Err(e) => {
                    warn!("Status check for video {} failed: {}", id, e);
                    PollEvent::Failed {
                        id: id.clone(),
                        error: e.to_string(),
                    }
                }
            };

            if events.send(event).is_err() {
                return;
            }
            delay = schedule.next_delay(delay);
            next_tick = (tick + delay).max(Instant::now());
        }
    })
}

/// Video id to its running poll task. An entry exists exactly while that
/// video is being polled.
#[derive(Debug, Default)]
pub struct PollHandles {
    handles: HashMap<VideoId, JoinHandle<()>>,
}

impl PollHandles {
    pub fn insert(&mut self, id: VideoId, handle: JoinHandle<()>) {
        if let Some(previous) = self.handles.insert(id, handle) {
            previous.abort();
        }
    }

    /// Stop polling `id`. Calling it again is a no-op.
    pub fn cancel(&mut self, id: &VideoId) -> bool {
        match self.handles.remove(id) {
            Some(handle) => {
                handle.abort();
                true
            }
            None => false,
        }
    }

    pub fn cancel_all(&mut self) -> Vec<VideoId> {
        self.handles
            .drain()
            .map(|(id, handle)| {
                handle.abort();
                id
            })
            .collect()
    }

    pub fn contains(&self, id: &VideoId) -> bool {
        self.handles.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}

impl Drop for PollHandles {
    fn drop(&mut self) {
        self.cancel_all();
    }
}
