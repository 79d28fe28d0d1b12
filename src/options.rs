use std::path::PathBuf;

use crate::download::collection::PartSelection;
use crate::download::naming::OutputTarget;

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

#[derive(Debug, Clone)]
pub struct Options {
    pub output: OutputTarget,
    pub selection: PartSelection,
    pub ffmpeg: PathBuf,
    pub user_agent: String,
    pub dump_path: PathBuf,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            output: OutputTarget::default(),
            selection: PartSelection::Interactive,
            ffmpeg: PathBuf::from("ffmpeg"),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            dump_path: PathBuf::from("debug.html"),
        }
    }
}

impl Options {
    /// Same options with a different output target, used per batch entry.
    pub fn with_output(&self, output: OutputTarget) -> Self {
        Self { output, ..self.clone() }
    }
}
