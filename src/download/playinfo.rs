use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::error::{DownloadError, Result, StreamKind};

/// Wrapper the site puts around every manifest, embedded or from the API.
#[derive(Debug, Deserialize)]
pub struct Envelope<T> {
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub message: String,
    pub data: Option<T>,
}

impl<T> Envelope<T> {
    pub fn into_data(self) -> Result<T> {
        if self.code != 0 {
            return Err(DownloadError::Manifest { code: self.code, message: self.message });
        }

        self.data.ok_or(DownloadError::MissingManifest)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlayInfo {
    pub dash: Option<Dash>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Dash {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub video: Vec<Rendition>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub audio: Vec<Rendition>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rendition {
    #[serde(default)]
    pub id: u64,
    #[serde(alias = "base_url")]
    pub base_url: String,
    pub bandwidth: u64,
    #[serde(default)]
    pub codecs: String,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
}

fn null_as_empty<'de, D>(deserializer: D) -> std::result::Result<Vec<Rendition>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<Rendition>>::deserialize(deserializer)?.unwrap_or_default())
}

impl PlayInfo {
    /// Parses the page-embedded manifest, envelope included.
    pub fn from_embedded(value: Value) -> Result<Self> {
        let envelope: Envelope<PlayInfo> = serde_json::from_value(value)?;
        envelope.into_data()
    }

    /// Highest-bandwidth video and audio renditions. Both must exist.
    pub fn best_streams(&self) -> Result<(&Rendition, &Rendition)> {
        let dash = self.dash.as_ref().ok_or(DownloadError::MissingManifest)?;

        let video = select_best(&dash.video).ok_or(DownloadError::NoStream(StreamKind::Video))?;
        let audio = select_best(&dash.audio).ok_or(DownloadError::NoStream(StreamKind::Audio))?;

        Ok((video, audio))
    }
}

/// Maximum bandwidth; ties go to the earliest rendition.
pub fn select_best(renditions: &[Rendition]) -> Option<&Rendition> {
    renditions
        .iter()
        .reduce(|best, candidate| if candidate.bandwidth > best.bandwidth { candidate } else { best })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rendition(url: &str, bandwidth: u64) -> Rendition {
        Rendition {
            id: 0,
            base_url: url.to_string(),
            bandwidth,
            codecs: String::new(),
            width: None,
            height: None,
        }
    }

    #[test]
    fn picks_highest_bandwidth() {
        let renditions = vec![rendition("a", 10), rendition("b", 30), rendition("c", 20)];
        assert_eq!(select_best(&renditions).unwrap().base_url, "b");
    }

    #[test]
    fn ties_go_to_first_occurrence() {
        let renditions = vec![rendition("a", 10), rendition("b", 30), rendition("c", 30)];
        assert_eq!(select_best(&renditions).unwrap().base_url, "b");
    }

    #[test]
    fn empty_sequence_selects_nothing() {
        assert!(select_best(&[]).is_none());
    }

    #[test]
    fn parses_embedded_manifest() {
        let value = json!({
            "code": 0,
            "message": "0",
            "data": {
                "dash": {
                    "video": [
                        {"id": 80, "baseUrl": "https://cdn/v80.m4s", "bandwidth": 2000000, "width": 1920, "height": 1080, "codecs": "avc1"},
                        {"id": 64, "base_url": "https://cdn/v64.m4s", "bandwidth": 900000, "width": 1280, "height": 720}
                    ],
                    "audio": [{"id": 30280, "baseUrl": "https://cdn/a.m4s", "bandwidth": 128000}]
                }
            }
        });

        let info = PlayInfo::from_embedded(value).unwrap();
        let (video, audio) = info.best_streams().unwrap();
        assert_eq!(video.base_url, "https://cdn/v80.m4s");
        assert_eq!((video.width, video.height), (Some(1920), Some(1080)));
        assert_eq!(audio.bandwidth, 128000);
    }

    #[test]
    fn null_audio_is_a_selection_failure() {
        let value = json!({
            "code": 0,
            "data": {"dash": {"video": [{"baseUrl": "v", "bandwidth": 1}], "audio": null}}
        });

        let info = PlayInfo::from_embedded(value).unwrap();
        assert!(matches!(info.best_streams(), Err(DownloadError::NoStream(StreamKind::Audio))));
    }

    #[test]
    fn non_zero_code_is_a_manifest_failure() {
        let value = json!({"code": -404, "message": "啥都木有"});
        match PlayInfo::from_embedded(value) {
            Err(DownloadError::Manifest { code, message }) => {
                assert_eq!(code, -404);
                assert_eq!(message, "啥都木有");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn missing_dash_is_reported() {
        let info = PlayInfo::from_embedded(json!({"code": 0, "data": {"durl": []}})).unwrap();
        assert!(matches!(info.best_streams(), Err(DownloadError::MissingManifest)));
    }
}
