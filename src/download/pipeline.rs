use serde_json::Value;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::download::collection::{PageState, PartPicker};
use crate::download::extract::{extract_state, Marker};
use crate::download::naming::DownloadTask;
use crate::download::playinfo::PlayInfo;
use crate::download::remux::{merge_and_cleanup, Remux};
use crate::download::MediaSource;
use crate::error::{DownloadError, Result};
use crate::options::Options;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub downloaded: usize,
    pub skipped: usize,
    pub failed: usize,
}

enum PartOutcome {
    Downloaded,
    Skipped,
}

pub struct Pipeline<'a> {
    source: &'a dyn MediaSource,
    remuxer: &'a dyn Remux,
    picker: &'a dyn PartPicker,
    options: &'a Options,
}

impl<'a> Pipeline<'a> {
    pub fn new(source: &'a dyn MediaSource, remuxer: &'a dyn Remux, picker: &'a dyn PartPicker, options: &'a Options) -> Self {
        Self { source, remuxer, picker, options }
    }

    pub fn with_options<'b>(&self, options: &'b Options) -> Pipeline<'b>
    where
        'a: 'b,
    {
        Pipeline { source: self.source, remuxer: self.remuxer, picker: self.picker, options }
    }

    /// Fetches the page at `url` and downloads every selected part, one after another.
    ///
    /// Page-level failures end the run with an error. A failing part is logged and
    /// counted, and the remaining parts still run.
    pub async fn run(&self, url: &str) -> Result<RunSummary> {
        let page_url = Url::parse(url)?;

        info!("Fetching video info from: {}", page_url);
        let page = self.source.fetch_page(&page_url).await?;
        let html = String::from_utf8_lossy(&page);

        let mut scripts = extract_state(&html);
        if scripts.is_empty() {
            error!("Could not find video info. The page might be captcha blocked or its structure changed");
            self.dump_page(&page).await;
            return Err(DownloadError::NoPlayableContent);
        }

        let embedded = scripts.take(Marker::PlayInfo);
        let state = match scripts.take(Marker::InitialState) {
            Some(value) => match PageState::from_initial_state(value) {
                Ok(state) => state,
                // a page carrying its own manifest is still playable without the state
                Err(err) if embedded.is_some() => {
                    warn!("Ignoring unusable page state: {}", err);
                    PageState::untitled()
                }
                Err(err) => return Err(err),
            },
            None => PageState::untitled(),
        };

        info!("Video Title: {}", state.title);
        if state.is_collection() {
            info!("Collection with {} parts", state.parts.len());
        }

        let selected = self.options.selection.resolve(&state.parts, self.picker)?;
        let mut summary = RunSummary::default();

        if selected.is_empty() {
            info!("No parts selected, nothing to download");
            return Ok(summary);
        }

        // the embedded manifest only ever describes the first part
        let mut embedded = if state.is_collection() { None } else { embedded };

        for part in selected {
            let output = self.options.output.output_for(&state.title, &part, state.is_collection());
            let task = DownloadTask::new(part, output);
            let label = task.part.to_string();

            match self.download_part(&state, task, embedded.take(), &page_url).await {
                Ok(PartOutcome::Downloaded) => summary.downloaded += 1,
                Ok(PartOutcome::Skipped) => summary.skipped += 1,
                Err(err) => {
                    error!("Error downloading {}: {}", label, err);
                    summary.failed += 1;
                }
            }
        }

        Ok(summary)
    }

    async fn download_part(&self, state: &PageState, task: DownloadTask, embedded: Option<Value>, referer: &Url) -> Result<PartOutcome> {
        if task.output.exists() {
            warn!("File {} already exists, therefore skipping {}", task.output.display(), task.part);
            return Ok(PartOutcome::Skipped);
        }

        let play_info = match embedded {
            Some(value) => PlayInfo::from_embedded(value)?,
            None => {
                let bvid = state.bvid.as_deref().ok_or(DownloadError::MissingState("bvid"))?;
                info!("Fetching stream manifest for {}", task.part);
                self.source.fetch_play_info(bvid, task.part.cid).await?
            }
        };

        let (video, audio) = play_info.best_streams()?;
        info!(
            "Video Quality: {}x{} ({} bps), audio {} bps",
            video.width.unwrap_or_default(),
            video.height.unwrap_or_default(),
            video.bandwidth,
            audio.bandwidth
        );
        debug!("Video stream {} [{}], audio stream {} [{}]", video.id, video.codecs, audio.id, audio.codecs);

        if let Some(dir) = task.output.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(dir).await?;
        }

        info!("Downloading video stream...");
        self.source.download(&video.base_url, &task.video_path, "Video", referer).await?;

        info!("Downloading audio stream...");
        self.source.download(&audio.base_url, &task.audio_path, "Audio", referer).await?;

        merge_and_cleanup(self.remuxer, &task.video_path, &task.audio_path, &task.output).await?;

        info!("Download complete! Saved to: {}", task.output.display());

        Ok(PartOutcome::Downloaded)
    }

    async fn dump_page(&self, page: &[u8]) {
        match tokio::fs::write(&self.options.dump_path, page).await {
            Ok(_) => info!("Saved page markup to {}", self.options.dump_path.display()),
            Err(err) => warn!("Could not save page markup to {}: {}", self.options.dump_path.display(), err),
        }
    }
}
