use std::fmt;
use std::process::ExitStatus;

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    Video,
    Audio,
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            StreamKind::Video => write!(f, "video"),
            StreamKind::Audio => write!(f, "audio"),
        }
    }
}

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid url: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("no playable content found in page")]
    NoPlayableContent,

    #[error("page state is missing {0}")]
    MissingState(&'static str),

    #[error("manifest request failed with code {code}: {message}")]
    Manifest { code: i64, message: String },

    #[error("manifest has no dash section")]
    MissingManifest,

    #[error("no {0} stream available")]
    NoStream(StreamKind),

    #[error("ffmpeg exited with {status}: {stderr}")]
    Remux { status: ExitStatus, stderr: String },

    #[error("part selection failed: {0}")]
    Prompt(#[from] inquire::InquireError),
}

pub type Result<T> = std::result::Result<T, DownloadError>;
