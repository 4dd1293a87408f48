use crate::models::UploadedVideo;
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// JSON snapshot of the video list, so a later run can keep watching
/// videos that were still processing.
pub struct StateManager {
    state_file: PathBuf,
}

impl StateManager {
    pub fn new(state_file: impl AsRef<Path>) -> Self {
        Self {
            state_file: state_file.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.state_file
    }

    pub fn load_state(&self) -> Result<Vec<UploadedVideo>> {
        if !self.state_file.exists() {
            return Ok(Vec::new());
        }

        let content = fs::read_to_string(&self.state_file)
            .context("Failed to read state file")?;

        serde_json::from_str(&content).context("Failed to parse state file")
    }

    pub fn save_state(&self, videos: &[UploadedVideo]) -> Result<()> {
        let content = serde_json::to_string_pretty(videos)
            .context("Failed to serialize state")?;

        fs::write(&self.state_file, content).context("Failed to write state file")?;

        Ok(())
    }

    /// Fold `fresh` into the saved snapshot: known ids are replaced in place,
    /// new ones are appended.
    pub fn merge_state(&self, fresh: &[UploadedVideo]) -> Result<Vec<UploadedVideo>> {
        let mut videos = self.load_state()?;
        for video in fresh {
            match videos.iter_mut().find(|v| v.id == video.id) {
                Some(existing) => *existing = video.clone(),
                None => videos.push(video.clone()),
            }
        }
        self.save_state(&videos)?;
        Ok(videos)
    }
}
