use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::error::{DownloadError, Result};

/// Joins a video-only and an audio-only file into one container without re-encoding.
#[async_trait]
pub trait Remux: Send + Sync {
    async fn remux(&self, video: &Path, audio: &Path, output: &Path) -> Result<()>;
}

pub struct Ffmpeg {
    binary: PathBuf,
}

impl Ffmpeg {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self { binary: binary.into() }
    }

    fn args(video: &Path, audio: &Path, output: &Path) -> Vec<String> {
        let mut args = Vec::new();

        args.extend(["-hide_banner".to_string(), "-loglevel".to_string(), "error".to_string()]);
        // the output was checked before downloading, anything there now is a failed earlier merge
        args.push("-y".to_string());

        args.extend(["-i".to_string(), video.to_string_lossy().to_string()]);
        args.extend(["-i".to_string(), audio.to_string_lossy().to_string()]);

        args.extend(["-c:v".to_string(), "copy".to_string()]);
        args.extend(["-c:a".to_string(), "copy".to_string()]);

        args.push(output.to_string_lossy().to_string());

        args
    }
}

#[async_trait]
impl Remux for Ffmpeg {
    async fn remux(&self, video: &Path, audio: &Path, output: &Path) -> Result<()> {
        let args = Self::args(video, audio, output);
        debug!("{} {}", self.binary.display(), args.join(" "));

        let result = Command::new(&self.binary)
            .args(&args)
            .stdin(Stdio::null())
            .output()
            .await?;

        if !result.status.success() {
            return Err(DownloadError::Remux {
                status: result.status,
                stderr: String::from_utf8_lossy(&result.stderr).trim().to_string(),
            });
        }

        Ok(())
    }
}

/// Remuxes and then removes both inputs. On failure the inputs stay so the merge can be retried.
pub async fn merge_and_cleanup(remuxer: &dyn Remux, video: &Path, audio: &Path, output: &Path) -> Result<()> {
    info!("Merging video and audio into {}", output.display());

    remuxer.remux(video, audio, output).await?;

    for input in [video, audio] {
        if let Err(err) = tokio::fs::remove_file(input).await {
            warn!("Could not remove temporary file {}: {}", input.display(), err);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ffmpeg_copies_both_streams() {
        let args = Ffmpeg::args(Path::new("a_video.m4s"), Path::new("a_audio.m4s"), Path::new("a.mp4"));

        assert_eq!(
            args,
            vec![
                "-hide_banner", "-loglevel", "error", "-y",
                "-i", "a_video.m4s",
                "-i", "a_audio.m4s",
                "-c:v", "copy", "-c:a", "copy",
                "a.mp4",
            ]
        );
    }

    #[tokio::test]
    async fn missing_binary_is_an_io_error() {
        let ffmpeg = Ffmpeg::new("/nonexistent/bin/ffmpeg-for-tests");
        let result = ffmpeg.remux(Path::new("v"), Path::new("a"), Path::new("o.mp4")).await;
        assert!(matches!(result, Err(DownloadError::Io(_))));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn non_zero_exit_keeps_inputs() {
        let dir = tempfile::tempdir().unwrap();
        let video = dir.path().join("v.m4s");
        let audio = dir.path().join("a.m4s");
        std::fs::write(&video, b"v").unwrap();
        std::fs::write(&audio, b"a").unwrap();

        // `false` ignores its arguments and exits 1
        let ffmpeg = Ffmpeg::new("false");
        let result = merge_and_cleanup(&ffmpeg, &video, &audio, &dir.path().join("out.mp4")).await;

        assert!(matches!(result, Err(DownloadError::Remux { .. })));
        assert!(video.exists());
        assert!(audio.exists());
    }
}
