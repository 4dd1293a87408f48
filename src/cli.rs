use crate::client::SessionAuth;
use crate::poller::PollSchedule;
use crate::uploader::{BatchPolicy, UploaderConfig};
use anyhow::{Result, anyhow};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Mode {
    /// Upload the given files, then watch their processing
    Upload,
    /// Keep watching videos from the state file that are still processing
    Watch,
}

#[derive(Parser, Debug)]
#[command(name = "channel-uploads")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Video files to upload
    pub files: Vec<PathBuf>,

    /// Base URL of the video site (e.g. http://localhost:8000)
    #[arg(short, long, env = "CHANNEL_UPLOADS_SERVER")]
    pub server: String,

    /// Channel to upload into (required in upload mode)
    #[arg(short, long, env = "CHANNEL_UPLOADS_CHANNEL")]
    pub channel: Option<String>,

    /// Run mode
    #[arg(short, long, value_enum, default_value = "upload")]
    pub mode: Mode,

    /// Session cookie of a logged-in user
    #[arg(long, env = "CHANNEL_UPLOADS_COOKIE", hide_env_values = true)]
    pub cookie: Option<String>,

    /// CSRF token sent as X-CSRF-TOKEN
    #[arg(long, env = "CHANNEL_UPLOADS_CSRF_TOKEN", hide_env_values = true)]
    pub csrf_token: Option<String>,

    /// HTTP proxy (e.g., http://127.0.0.1:7890)
    #[arg(long)]
    pub proxy: Option<String>,

    /// What to do when one upload of the batch fails
    #[arg(short, long, value_enum, default_value = "partial")]
    pub policy: BatchPolicy,

    /// Resend an upload this many times when the server refused it (503, 429)
    /// or could not be reached
    #[arg(short, long, default_value = "0")]
    pub retries: u32,

    /// Delay between two status checks of a video, in milliseconds
    #[arg(long, default_value = "3000")]
    pub poll_interval_ms: u64,

    /// Multiplier applied to the status check delay after every check
    #[arg(long, default_value = "1.0")]
    pub poll_backoff: f64,

    /// Upper bound for the status check delay, in milliseconds
    #[arg(long, default_value = "60000")]
    pub max_poll_interval_ms: u64,

    /// Give up watching after this many seconds (default: never)
    #[arg(long)]
    pub poll_timeout_secs: Option<u64>,

    /// Where the uploaded video list is kept between runs
    #[arg(long, default_value = ".channel_uploads_state.json")]
    pub state_file: PathBuf,
}

impl Args {
    pub fn upload_channel(&self) -> Result<&str> {
        self.channel
            .as_deref()
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| anyhow!("--channel argument required for upload mode"))
    }

    pub fn session_auth(&self) -> SessionAuth {
        SessionAuth {
            cookie: self.cookie.clone(),
            csrf_token: self.csrf_token.clone(),
        }
    }

    pub fn uploader_config(&self) -> UploaderConfig {
        UploaderConfig {
            policy: self.policy,
            upload_retries: self.retries,
            schedule: PollSchedule {
                interval: Duration::from_millis(self.poll_interval_ms.max(1)),
                backoff: self.poll_backoff,
                max_interval: Duration::from_millis(self.max_poll_interval_ms),
            },
            poll_timeout: self.poll_timeout_secs.map(Duration::from_secs),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_widget() {
        let args = Args::try_parse_from([
            "channel-uploads",
            "--server",
            "http://localhost:8000",
            "--channel",
            "5",
            "a.mp4",
            "b.mp4",
        ])
        .unwrap();

        assert_eq!(args.mode, Mode::Upload);
        assert_eq!(args.upload_channel().unwrap(), "5");
        assert_eq!(args.files.len(), 2);
        let config = args.uploader_config();
        assert_eq!(config.policy, BatchPolicy::Partial);
        assert_eq!(config.upload_retries, 0);
        assert_eq!(config.schedule, PollSchedule::default());
        assert_eq!(config.poll_timeout, None);
    }

    #[test]
    fn polling_options_are_configurable() {
        let args = Args::try_parse_from([
            "channel-uploads",
            "--server",
            "http://localhost:8000",
            "--mode",
            "watch",
            "--policy",
            "all-or-nothing",
            "--poll-interval-ms",
            "500",
            "--poll-backoff",
            "1.5",
            "--poll-timeout-secs",
            "600",
        ])
        .unwrap();

        assert_eq!(args.mode, Mode::Watch);
        assert_eq!(args.channel, None);
        let config = args.uploader_config();
        assert_eq!(config.policy, BatchPolicy::AllOrNothing);
        assert_eq!(config.schedule.interval, Duration::from_millis(500));
        assert_eq!(config.schedule.backoff, 1.5);
        assert_eq!(config.poll_timeout, Some(Duration::from_secs(600)));
    }

    #[test]
    fn upload_mode_needs_a_channel() {
        let args = Args::try_parse_from([
            "channel-uploads",
            "--server",
            "http://localhost:8000",
            "a.mp4",
        ])
        .unwrap();
        assert!(args.upload_channel().is_err());

        let args = Args::try_parse_from([
            "channel-uploads",
            "--server",
            "http://localhost:8000",
            "--channel",
            " ",
            "a.mp4",
        ])
        .unwrap();
        assert!(args.upload_channel().is_err());
    }
}
