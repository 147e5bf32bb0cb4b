use std::path::{Path, PathBuf};

use anyhow::Context;
use async_trait::async_trait;
use image::{Rgb, RgbImage};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{PipelineError, Result};

const PEXELS_SEARCH_URL: &str = "https://api.pexels.com/v1/search";

pub const FRAME_WIDTH: u32 = 1080;
pub const FRAME_HEIGHT: u32 = 1920;

const PLACEHOLDER_PALETTE: [[u8; 3]; 5] = [
    [0x1f, 0x3a, 0x5f],
    [0x5f, 0x1f, 0x3a],
    [0x1f, 0x5f, 0x3a],
    [0x4a, 0x3a, 0x1f],
    [0x3a, 0x1f, 0x5f],
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AssetOrigin {
    Remote,
    Placeholder,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssetRef {
    pub path: PathBuf,
    pub origin: AssetOrigin,
}

/// Outcome of an asset fetch: either what the provider delivered, or the
/// locally generated substitutes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetBatch {
    Remote(Vec<AssetRef>),
    Fallback(Vec<AssetRef>),
}

impl AssetBatch {
    pub fn is_fallback(&self) -> bool {
        matches!(self, AssetBatch::Fallback(_))
    }

    pub fn into_refs(self) -> Vec<AssetRef> {
        match self {
            AssetBatch::Remote(refs) | AssetBatch::Fallback(refs) => refs,
        }
    }
}

#[async_trait]
pub trait AssetProvider: Send + Sync {
    /// Candidate image URLs for a search term, best first.
    async fn search(&self, term: &str) -> anyhow::Result<Vec<String>>;

    async fn download(&self, url: &str, dest: &Path) -> anyhow::Result<()>;
}

/// Fetches one image per topic for the first `max_count` topics. Provider
/// failures are logged and skipped; if nothing at all comes back, `max_count`
/// placeholders are generated instead.
pub async fn fetch_assets(
    provider: &dyn AssetProvider,
    topics: &[String],
    max_count: usize,
    dest_dir: &Path,
) -> Result<AssetBatch> {
    if max_count == 0 {
        return Ok(AssetBatch::Remote(Vec::new()));
    }

    let mut refs = Vec::new();
    for (i, topic) in topics.iter().take(max_count).enumerate() {
        match fetch_one(provider, topic, i, dest_dir).await {
            Ok(path) => {
                info!("Fetched asset {} for '{}': {}", i, topic, path.display());
                refs.push(AssetRef {
                    path,
                    origin: AssetOrigin::Remote,
                });
            }
            Err(e) => warn!("Skipping asset for '{}': {}", topic, e),
        }
    }

    if !refs.is_empty() {
        return Ok(AssetBatch::Remote(refs));
    }

    warn!(
        "No remote assets available; generating {} placeholder images",
        max_count
    );
    let placeholders = (0..max_count)
        .map(|i| generate_placeholder(i, dest_dir))
        .collect::<Result<Vec<_>>>()?;
    Ok(AssetBatch::Fallback(placeholders))
}

async fn fetch_one(
    provider: &dyn AssetProvider,
    topic: &str,
    index: usize,
    dest_dir: &Path,
) -> Result<PathBuf> {
    let urls = provider
        .search(topic)
        .await
        .map_err(|e| PipelineError::ProviderUnavailable(format!("{:#}", e)))?;
    let url = urls
        .into_iter()
        .next()
        .ok_or_else(|| PipelineError::ProviderUnavailable(format!("no results for '{}'", topic)))?;
    debug!("Downloading {}", url);

    let dest = dest_dir.join(format!("asset_{}.{}", index, image_extension(&url)));
    provider
        .download(&url, &dest)
        .await
        .map_err(|e| PipelineError::ProviderUnavailable(format!("{:#}", e)))?;
    Ok(dest)
}

fn image_extension(url: &str) -> &'static str {
    let path = url.split(['?', '#']).next().unwrap_or(url).to_ascii_lowercase();
    if path.ends_with(".png") {
        "png"
    } else if path.ends_with(".webp") {
        "webp"
    } else {
        "jpg"
    }
}

/// Flat-colour frame at the output resolution.
fn generate_placeholder(index: usize, dest_dir: &Path) -> Result<AssetRef> {
    let color = PLACEHOLDER_PALETTE[index % PLACEHOLDER_PALETTE.len()];
    let img = RgbImage::from_pixel(FRAME_WIDTH, FRAME_HEIGHT, Rgb(color));
    let path = dest_dir.join(format!("placeholder_{}.png", index));
    img.save(&path)
        .map_err(|e| PipelineError::Io(std::io::Error::other(e)))?;
    Ok(AssetRef {
        path,
        origin: AssetOrigin::Placeholder,
    })
}

#[derive(Debug, Deserialize)]
struct PexelsSearch {
    #[serde(default)]
    photos: Vec<PexelsPhoto>,
}

#[derive(Debug, Deserialize)]
struct PexelsPhoto {
    src: PexelsSrc,
}

#[derive(Debug, Deserialize)]
struct PexelsSrc {
    portrait: Option<String>,
    large2x: Option<String>,
    original: Option<String>,
}

pub struct PexelsProvider {
    client: reqwest::Client,
    api_key: String,
    per_page: usize,
}

impl PexelsProvider {
    pub fn new(api_key: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            per_page: 3,
        }
    }
}

#[async_trait]
impl AssetProvider for PexelsProvider {
    async fn search(&self, term: &str) -> anyhow::Result<Vec<String>> {
        let per_page = self.per_page.to_string();
        let res: PexelsSearch = self
            .client
            .get(PEXELS_SEARCH_URL)
            .header(reqwest::header::AUTHORIZATION, &self.api_key)
            .query(&[
                ("query", term),
                ("per_page", per_page.as_str()),
                ("orientation", "portrait"),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(res
            .photos
            .into_iter()
            .filter_map(|p| p.src.portrait.or(p.src.large2x).or(p.src.original))
            .collect())
    }

    async fn download(&self, url: &str, dest: &Path) -> anyhow::Result<()> {
        let bytes = self
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;
        if bytes.is_empty() {
            anyhow::bail!("empty image body from {}", url);
        }
        tokio::fs::write(dest, &bytes)
            .await
            .with_context(|| format!("writing {}", dest.display()))?;
        Ok(())
    }
}
