use std::collections::BTreeSet;
use std::fmt;

use inquire::MultiSelect;
use serde::Deserialize;
use serde_json::Value;

use crate::error::{DownloadError, Result};

const DEFAULT_TITLE: &str = "video";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Part {
    pub index: usize,
    pub label: String,
    pub cid: u64,
}

impl fmt::Display for Part {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "P{} {}", self.index, self.label)
    }
}

#[derive(Debug, Clone)]
pub struct PageState {
    pub bvid: Option<String>,
    pub title: String,
    pub parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InitialState {
    bvid: Option<String>,
    video_data: Option<VideoData>,
}

#[derive(Debug, Deserialize)]
struct VideoData {
    bvid: Option<String>,
    title: Option<String>,
    cid: Option<u64>,
    #[serde(default)]
    pages: Vec<PageEntry>,
}

#[derive(Debug, Deserialize)]
struct PageEntry {
    page: usize,
    #[serde(default)]
    part: String,
    cid: u64,
}

impl PageState {
    pub fn from_initial_state(value: Value) -> Result<Self> {
        let state: InitialState = serde_json::from_value(value)?;
        let video_data = state.video_data.ok_or(DownloadError::MissingState("videoData"))?;

        let bvid = video_data.bvid.or(state.bvid);
        let title = video_data
            .title
            .filter(|title| !title.is_empty())
            .unwrap_or_else(|| DEFAULT_TITLE.to_string());

        let parts = if video_data.pages.is_empty() {
            let cid = video_data.cid.ok_or(DownloadError::MissingState("videoData.cid"))?;
            vec![Part { index: 1, label: title.clone(), cid }]
        } else {
            video_data
                .pages
                .into_iter()
                .map(|page| Part { index: page.page, label: page.part, cid: page.cid })
                .collect()
        };

        Ok(Self { bvid, title, parts })
    }

    /// Stand-in for pages that only carry a manifest.
    pub fn untitled() -> Self {
        Self {
            bvid: None,
            title: DEFAULT_TITLE.to_string(),
            parts: vec![Part { index: 1, label: DEFAULT_TITLE.to_string(), cid: 0 }],
        }
    }

    pub fn is_collection(&self) -> bool {
        self.parts.len() > 1
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PartSelection {
    All,
    Indices(BTreeSet<usize>),
    Interactive,
}

impl PartSelection {
    /// `--all` wins over `--indices`; with neither we ask.
    pub fn from_flags(all: bool, indices: Option<&str>) -> Self {
        match (all, indices) {
            (true, _) => PartSelection::All,
            (false, Some(list)) => PartSelection::Indices(parse_indices(list)),
            (false, None) => PartSelection::Interactive,
        }
    }

    /// Working set of parts in collection order. A single part is returned as is.
    pub fn resolve(&self, parts: &[Part], picker: &dyn PartPicker) -> Result<Vec<Part>> {
        if parts.len() <= 1 {
            return Ok(parts.to_vec());
        }

        match self {
            PartSelection::All => Ok(parts.to_vec()),
            PartSelection::Indices(indices) => Ok(parts
                .iter()
                .filter(|part| indices.contains(&part.index))
                .cloned()
                .collect()),
            PartSelection::Interactive => picker.pick(parts),
        }
    }
}

/// Unparsable and zero entries are dropped.
pub fn parse_indices(list: &str) -> BTreeSet<usize> {
    list.split(',')
        .filter_map(|token| token.trim().parse::<usize>().ok())
        .filter(|index| *index > 0)
        .collect()
}

pub trait PartPicker: Send + Sync {
    fn pick(&self, parts: &[Part]) -> Result<Vec<Part>>;
}

pub struct PromptPicker;

impl PartPicker for PromptPicker {
    fn pick(&self, parts: &[Part]) -> Result<Vec<Part>> {
        let mut selected = MultiSelect::new("Select parts to download:", parts.to_vec())
            .with_page_size(15)
            .prompt()?;

        selected.sort_by_key(|part| part.index);
        Ok(selected)
    }
}
