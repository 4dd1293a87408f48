use crate::errors::{UploadError, UploadResult};
use crate::models::{SelectedFile, UploadedVideo, VideoId};
use crate::progress::ProgressCell;
use anyhow::{Context, Result};
use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use reqwest::header::{ACCEPT, COOKIE, HeaderMap, HeaderValue};
use reqwest::multipart::{Form, Part};
use reqwest::{Body, Client, ClientBuilder, Response};
use std::time::Duration;

const CHUNK_SIZE: usize = 64 * 1024;

/// The two endpoints the orchestrator talks to.
#[async_trait]
pub trait ChannelApi: Send + Sync {
    /// `POST /channels/{channel_id}/videos`, reporting byte progress into `progress`.
    async fn upload_video(
        &self,
        channel_id: &str,
        file: &SelectedFile,
        progress: ProgressCell,
    ) -> UploadResult<UploadedVideo>;

    /// `GET /videos/{id}`.
    async fn fetch_video(&self, id: &VideoId) -> UploadResult<UploadedVideo>;
}

/// Credentials of an already authenticated browser session.
#[derive(Debug, Clone, Default)]
pub struct SessionAuth {
    pub cookie: Option<String>,
    pub csrf_token: Option<String>,
}

pub struct HttpChannelApi {
    client: Client,
    server: String,
}

impl HttpChannelApi {
    pub fn new(server: &str, auth: &SessionAuth, proxy: Option<&str>) -> Result<Self> {
        let client = client_builder(auth, proxy)?
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self::with_client(server, client))
    }

    fn with_client(server: &str, client: Client) -> Self {
        Self {
            client,
            server: server.trim_end_matches('/').to_string(),
        }
    }

    fn upload_url(&self, channel_id: &str) -> String {
        format!("{}/channels/{}/videos", self.server, channel_id)
    }

    fn video_url(&self, id: &VideoId) -> String {
        format!("{}/videos/{}", self.server, id)
    }
}

/// Session headers sent with every request, plus the optional proxy.
fn client_builder(auth: &SessionAuth, proxy: Option<&str>) -> Result<ClientBuilder> {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
    headers.insert("X-Requested-With", HeaderValue::from_static("XMLHttpRequest"));
    if let Some(cookie) = &auth.cookie {
        headers.insert(
            COOKIE,
            HeaderValue::from_str(cookie).context("Invalid session cookie")?,
        );
    }
    if let Some(token) = &auth.csrf_token {
        headers.insert(
            "X-CSRF-TOKEN",
            HeaderValue::from_str(token).context("Invalid CSRF token")?,
        );
    }

    let mut client_builder = Client::builder()
        .default_headers(headers)
        .connect_timeout(Duration::from_secs(30));

    if let Some(proxy_url) = proxy {
        client_builder = client_builder.proxy(reqwest::Proxy::all(proxy_url)?);
    }

    Ok(client_builder)
}

#[async_trait]
impl ChannelApi for HttpChannelApi {
    async fn upload_video(
        &self,
        channel_id: &str,
        file: &SelectedFile,
        progress: ProgressCell,
    ) -> UploadResult<UploadedVideo> {
        let body = progress_body(file.content.clone(), progress);
        let part = Part::stream_with_length(body, file.size).file_name(file.name.clone());
        let form = Form::new()
            .part("video", part)
            .text("title", file.name.clone());

        let response = self
            .client
            .post(self.upload_url(channel_id))
            .multipart(form)
            .send()
            .await?;

        decode(response).await
    }

    async fn fetch_video(&self, id: &VideoId) -> UploadResult<UploadedVideo> {
        let response = self.client.get(self.video_url(id)).send().await?;
        decode(response).await
    }
}

fn progress_body(content: Bytes, progress: ProgressCell) -> Body {
    Body::wrap_stream(progress_stream(content, progress))
}

/// Yields `content` in chunks and reports the cumulative count as each chunk
/// is handed to the transport.
fn progress_stream(
    content: Bytes,
    progress: ProgressCell,
) -> impl futures::Stream<Item = std::io::Result<Bytes>> + Send + Sync + 'static {
    let total = content.len() as u64;
    progress.report(0, total);

    let chunks: Vec<Bytes> = (0..content.len())
        .step_by(CHUNK_SIZE)
        .map(|start| content.slice(start..(start + CHUNK_SIZE).min(content.len())))
        .collect();

    let mut loaded = 0u64;
    futures::stream::iter(chunks).map(move |chunk| {
        loaded += chunk.len() as u64;
        progress.report(loaded, total);
        Ok(chunk)
    })
}

async fn decode(response: Response) -> UploadResult<UploadedVideo> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(UploadError::Status { status, body });
    }

    let body = response.bytes().await?;
    Ok(serde_json::from_slice(&body)?)
}
