use crate::models::{UploadedVideo, VideoId};

/// Videos as shown to the user, in the order they finished uploading.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct VideoList {
    videos: Vec<UploadedVideo>,
}

impl VideoList {
    pub fn replace_all(&mut self, videos: Vec<UploadedVideo>) {
        self.videos = videos;
    }

    /// Swap in the fresh copy of the video with the same id. Every other
    /// entry is left as it was. Returns false when no entry matched.
    pub fn replace(&mut self, fresh: UploadedVideo) -> bool {
        match self.videos.iter_mut().find(|v| v.id == fresh.id) {
            Some(slot) => {
                *slot = fresh;
                true
            }
            None => false,
        }
    }

    pub fn get(&self, id: &VideoId) -> Option<&UploadedVideo> {
        self.videos.iter().find(|v| &v.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &UploadedVideo> {
        self.videos.iter()
    }

    pub fn as_slice(&self) -> &[UploadedVideo] {
        &self.videos
    }

    pub fn len(&self) -> usize {
        self.videos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.videos.is_empty()
    }
}
