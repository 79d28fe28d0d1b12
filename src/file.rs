use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{error, info};

use crate::download::pipeline::{Pipeline, RunSummary};
use crate::download::naming::OutputTarget;
use crate::error::Result;
use crate::options::Options;

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct DownloadEntity {
    url: String,
    output: Option<PathBuf>,
}

fn read_entities(file: &Path) -> Result<Vec<DownloadEntity>> {
    let file = std::fs::File::open(file)?;
    let reader = std::io::BufReader::new(file);
    let downloads = serde_json::from_reader(reader)?;

    Ok(downloads)
}

/// Runs every entry of a JSON download list. A failing entry is logged and the rest still run.
pub async fn download_file(file: &Path, pipeline: &Pipeline<'_>, options: &Options) -> Result<RunSummary> {
    let downloads = match read_entities(file) {
        Ok(downloads) => downloads,
        Err(err) => {
            error!("Error reading download list ({}): {}", file.display(), err);
            return Err(err);
        }
    };

    let mut total = RunSummary::default();

    for download in downloads {
        let entry_options = match download.output.as_deref() {
            Some(output) => options.with_output(OutputTarget::resolve(Some(output))),
            None => options.clone(),
        };

        info!("Downloading {}", download.url);

        match pipeline.with_options(&entry_options).run(&download.url).await {
            Ok(summary) => {
                info!("Finished downloading {}", download.url);
                total.downloaded += summary.downloaded;
                total.skipped += summary.skipped;
                total.failed += summary.failed;
            }
            Err(err) => {
                error!("Error downloading {}: {}", download.url, err);
                total.failed += 1;
            }
        }
    }

    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_entries_with_optional_output() {
        let dir = tempfile::tempdir().unwrap();
        let list = dir.path().join("download.json");
        std::fs::write(
            &list,
            r#"[{"url": "https://www.bilibili.com/video/BV1a"}, {"url": "https://www.bilibili.com/video/BV1b", "output": "b.mp4"}]"#,
        )
        .unwrap();

        let entities = read_entities(&list).unwrap();
        assert_eq!(entities.len(), 2);
        assert_eq!(entities[0].output, None);
        assert_eq!(entities[1].output, Some(PathBuf::from("b.mp4")));
    }

    #[test]
    fn malformed_list_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let list = dir.path().join("download.json");
        std::fs::write(&list, "{not json").unwrap();

        assert!(read_entities(&list).is_err());
        assert!(read_entities(&dir.path().join("absent.json")).is_err());
    }
}
