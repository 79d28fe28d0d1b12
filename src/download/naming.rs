use std::path::{Path, PathBuf};

use crate::download::collection::Part;

const DEFAULT_EXTENSION: &str = "mp4";

/// Longest file name most filesystems accept, in bytes.
const MAX_NAME_BYTES: usize = 255;

/// Longest suffix a stem gets: the temporary stream names.
const TEMP_SUFFIX_BYTES: usize = "_video.m4s".len();

/// Longest prefix of `name` that fits in `max` bytes without splitting a character.
fn truncate_to_bytes(name: &str, max: usize) -> &str {
    if name.len() <= max {
        return name;
    }

    let mut end = max;
    while !name.is_char_boundary(end) {
        end -= 1;
    }
    &name[..end]
}

/// Byte budget for a stem that will carry `extension` or a temporary suffix.
fn stem_budget(extension: &str) -> usize {
    MAX_NAME_BYTES.saturating_sub(TEMP_SUFFIX_BYTES.max(extension.len() + 1))
}

pub fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '\\' | '/' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect()
}

/// Where finished files go: a directory we name files in, or one explicit file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputTarget {
    Dir(PathBuf),
    File(PathBuf),
}

impl Default for OutputTarget {
    fn default() -> Self {
        OutputTarget::Dir(PathBuf::from("."))
    }
}

impl OutputTarget {
    pub fn resolve(path: Option<&Path>) -> Self {
        match path {
            None => OutputTarget::default(),
            Some(path) if path.is_dir() || path.extension().is_none() => OutputTarget::Dir(path.to_path_buf()),
            Some(path) => OutputTarget::File(path.to_path_buf()),
        }
    }

    pub fn dir(&self) -> &Path {
        match self {
            OutputTarget::Dir(dir) => dir,
            OutputTarget::File(file) => match file.parent() {
                Some(parent) if !parent.as_os_str().is_empty() => parent,
                _ => Path::new("."),
            },
        }
    }

    /// Final path for `part`. `multi_part` switches to per-part names so parts never share a file.
    ///
    /// Generated names are cut down to fit the filesystem's name limit; the `_P<n>` tag is always kept.
    pub fn output_for(&self, title: &str, part: &Part, multi_part: bool) -> PathBuf {
        match self {
            OutputTarget::File(file) if !multi_part => file.clone(),
            OutputTarget::File(file) => {
                let stem = file
                    .file_stem()
                    .map(|stem| stem.to_string_lossy().to_string())
                    .unwrap_or_else(|| sanitize_filename(title));
                let extension = file
                    .extension()
                    .map(|ext| ext.to_string_lossy().to_string())
                    .unwrap_or_else(|| DEFAULT_EXTENSION.to_string());
                let tag = format!("_P{}", part.index);
                let stem = truncate_to_bytes(&stem, stem_budget(&extension).saturating_sub(tag.len()));
                self.dir().join(format!("{}{}.{}", stem, tag, extension))
            }
            OutputTarget::Dir(dir) if !multi_part => {
                let title = sanitize_filename(title);
                let stem = truncate_to_bytes(&title, stem_budget(DEFAULT_EXTENSION));
                dir.join(format!("{}.{}", stem, DEFAULT_EXTENSION))
            }
            OutputTarget::Dir(dir) => {
                let title = sanitize_filename(title);
                let label = sanitize_filename(&part.label);
                let tag = format!("_P{}_", part.index);

                // when both are long the label is held to a third of the room
                let room = stem_budget(DEFAULT_EXTENSION).saturating_sub(tag.len());
                let label = truncate_to_bytes(&label, (room / 3).max(room.saturating_sub(title.len())));
                let title = truncate_to_bytes(&title, room - label.len());

                dir.join(format!("{}{}{}.{}", title, tag, label, DEFAULT_EXTENSION))
            }
        }
    }
}

/// One part's work: where it ends up and the two temporary streams feeding the remux.
#[derive(Debug, Clone)]
pub struct DownloadTask {
    pub part: Part,
    pub output: PathBuf,
    pub video_path: PathBuf,
    pub audio_path: PathBuf,
}

impl DownloadTask {
    pub fn new(part: Part, output: PathBuf) -> Self {
        let stem = output
            .file_stem()
            .map(|stem| stem.to_string_lossy().to_string())
            .unwrap_or_else(|| format!("P{}", part.index));
        let stem = truncate_to_bytes(&stem, MAX_NAME_BYTES - TEMP_SUFFIX_BYTES);

        let video_path = output.with_file_name(format!("{}_video.m4s", stem));
        let audio_path = output.with_file_name(format!("{}_audio.m4s", stem));

        Self { part, output, video_path, audio_path }
    }
}
