pub mod collection;
pub mod extract;
pub mod media;
pub mod naming;
pub mod pipeline;
pub mod playinfo;
pub mod remux;

use std::path::Path;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderValue, COOKIE, REFERER};
use tracing::debug;
use url::Url;

use crate::error::Result;
use playinfo::{Envelope, PlayInfo};

const SITE_REFERER: &str = "https://www.bilibili.com/";
const ANONYMOUS_COOKIE: &str = "SESSDATA=; buvid3=;";
const PLAY_URL_API: &str = "https://api.bilibili.com/x/player/playurl";
// 80 = 1080p; the manifest still lists every rendition the account may see
const QUALITY_HINT: &str = "80";
const FNVAL_DASH: &str = "16";

/// Network side of the pipeline.
#[async_trait]
pub trait MediaSource: Send + Sync {
    async fn fetch_page(&self, url: &Url) -> Result<Bytes>;

    async fn fetch_play_info(&self, bvid: &str, cid: u64) -> Result<PlayInfo>;

    async fn download(&self, url: &str, dest: &Path, label: &str, referer: &Url) -> Result<u64>;
}

pub struct DownloadClient {
    client: reqwest::Client,
}

impl DownloadClient {
    pub fn new(user_agent: &str) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(REFERER, HeaderValue::from_static(SITE_REFERER));
        headers.insert(COOKIE, HeaderValue::from_static(ANONYMOUS_COOKIE));

        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .default_headers(headers)
            .build()?;

        Ok(Self { client })
    }

    pub fn play_info_url(bvid: &str, cid: u64) -> Result<Url> {
        let cid = cid.to_string();
        let url = Url::parse_with_params(
            PLAY_URL_API,
            &[("bvid", bvid), ("cid", cid.as_str()), ("qn", QUALITY_HINT), ("fnval", FNVAL_DASH)],
        )?;

        Ok(url)
    }
}

#[async_trait]
impl MediaSource for DownloadClient {
    async fn fetch_page(&self, url: &Url) -> Result<Bytes> {
        debug!("GET {}", url);

        let response = self.client.get(url.as_str()).send().await?.error_for_status()?;
        let bytes = response.bytes().await?;

        Ok(bytes)
    }

    async fn fetch_play_info(&self, bvid: &str, cid: u64) -> Result<PlayInfo> {
        let url = Self::play_info_url(bvid, cid)?;
        debug!("GET {}", url);

        let envelope: Envelope<PlayInfo> = self
            .client
            .get(url.as_str())
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        envelope.into_data()
    }

    async fn download(&self, url: &str, dest: &Path, label: &str, referer: &Url) -> Result<u64> {
        media::download_to_file(&self.client, url, dest, label, referer).await
    }
}
