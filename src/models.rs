use anyhow::{Context, Result};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// A local video chosen by the user. `name` correlates progress and titles.
#[derive(Debug, Clone)]
pub struct SelectedFile {
    pub name: String,
    pub content: Bytes,
    pub size: u64,
}

impl SelectedFile {
    pub fn new(name: impl Into<String>, content: impl Into<Bytes>) -> Self {
        let content = content.into();
        Self {
            name: name.into(),
            size: content.len() as u64,
            content,
        }
    }

    pub async fn load(path: &Path) -> Result<Self> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .with_context(|| format!("Not a file path: {}", path.display()))?;
        let content = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Ok(Self::new(name, content))
    }
}

/// Server-assigned video identifier, numeric or string depending on the backend.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VideoId {
    Int(u64),
    Str(String),
}

impl fmt::Display for VideoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(id) => write!(f, "{}", id),
            Self::Str(id) => f.write_str(id),
        }
    }
}

impl From<u64> for VideoId {
    fn from(id: u64) -> Self {
        Self::Int(id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadedVideo {
    pub id: VideoId,
    pub title: String,
    #[serde(default)]
    pub percentage: u8,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl UploadedVideo {
    pub fn new(id: impl Into<VideoId>, title: impl Into<String>, percentage: u8) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            percentage,
            extra: serde_json::Map::new(),
        }
    }

    pub fn is_processed(&self) -> bool {
        self.percentage >= 100
    }
}

#[derive(Debug, Clone)]
pub struct FailedUpload {
    pub file_name: String,
    pub error: String,
    pub attempts: u32,
}

/// Outcome of one `upload` call.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub uploaded: usize,
    pub failed: Vec<FailedUpload>,
}

impl BatchReport {
    pub fn is_empty(&self) -> bool {
        self.uploaded == 0 && self.failed.is_empty()
    }
}

/// Outcome of one `watch_processing` call.
#[derive(Debug, Default)]
pub struct WatchReport {
    pub processed: Vec<VideoId>,
    pub timed_out: Vec<VideoId>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_numeric_and_string_ids_and_keeps_extra_fields() {
        let video: UploadedVideo = serde_json::from_str(
            r#"{"id":1,"title":"a.mp4","percentage":45,"channel_id":7,"path":"videos/a.mp4"}"#,
        )
        .unwrap();
        assert_eq!(video.id, VideoId::Int(1));
        assert_eq!(video.percentage, 45);
        assert_eq!(video.extra["channel_id"], 7);

        let video: UploadedVideo =
            serde_json::from_str(r#"{"id":"9f2c","title":"b.mp4"}"#).unwrap();
        assert_eq!(video.id, VideoId::Str("9f2c".to_string()));
        assert_eq!(video.id.to_string(), "9f2c");
        assert_eq!(video.percentage, 0);
        assert!(!video.is_processed());
    }

    #[test]
    fn selected_file_size_follows_content() {
        let file = SelectedFile::new("clip.mp4", vec![0u8; 2048]);
        assert_eq!(file.size, 2048);
        assert_eq!(file.name, "clip.mp4");
    }
}
