use std::path::{Path, PathBuf};

use anyhow::Context;
use async_trait::async_trait;
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE, LOCATION};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};

const YOUTUBE_UPLOAD_URL: &str =
    "https://www.googleapis.com/upload/youtube/v3/videos?uploadType=resumable&part=snippet,status";
const YOUTUBE_THUMBNAIL_URL: &str = "https://www.googleapis.com/upload/youtube/v3/thumbnails/set";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Privacy {
    Public,
    Unlisted,
    #[default]
    Private,
}

#[derive(Debug, Clone, Serialize)]
pub struct PublishMetadata {
    pub title: String,
    pub description: String,
    pub tags: Vec<String>,
    pub category: String,
    pub privacy: Privacy,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Publication {
    pub id: String,
    pub url: String,
}

#[async_trait]
pub trait Publisher: Send + Sync {
    async fn upload(
        &self,
        video: &Path,
        thumbnail: &Path,
        metadata: &PublishMetadata,
    ) -> anyhow::Result<Publication>;
}

#[derive(Debug, Deserialize)]
struct VideoResource {
    id: String,
}

pub struct YouTubePublisher {
    client: reqwest::Client,
    access_token: String,
}

impl YouTubePublisher {
    pub fn new(access_token: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            access_token,
        }
    }

    async fn set_thumbnail(&self, video_id: &str, thumbnail: &Path) -> anyhow::Result<()> {
        let bytes = tokio::fs::read(thumbnail)
            .await
            .with_context(|| format!("reading {}", thumbnail.display()))?;
        self.client
            .post(YOUTUBE_THUMBNAIL_URL)
            .bearer_auth(&self.access_token)
            .query(&[("videoId", video_id)])
            .header(CONTENT_TYPE, "image/jpeg")
            .body(bytes)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

#[async_trait]
impl Publisher for YouTubePublisher {
    async fn upload(
        &self,
        video: &Path,
        thumbnail: &Path,
        metadata: &PublishMetadata,
    ) -> anyhow::Result<Publication> {
        let bytes = tokio::fs::read(video)
            .await
            .with_context(|| format!("reading {}", video.display()))?;
        info!("Starting YouTube upload of {} ({} bytes)", video.display(), bytes.len());

        let session = self
            .client
            .post(YOUTUBE_UPLOAD_URL)
            .bearer_auth(&self.access_token)
            .header("X-Upload-Content-Type", "video/mp4")
            .header("X-Upload-Content-Length", bytes.len().to_string())
            .json(&json!({
                "snippet": {
                    "title": metadata.title,
                    "description": metadata.description,
                    "tags": metadata.tags,
                    "categoryId": metadata.category,
                },
                "status": {
                    "privacyStatus": metadata.privacy,
                    "selfDeclaredMadeForKids": false,
                },
            }))
            .send()
            .await?
            .error_for_status()?;
        let location = session
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .context("upload session has no Location header")?
            .to_string();

        let resource: VideoResource = self
            .client
            .put(location)
            .bearer_auth(&self.access_token)
            .header(CONTENT_TYPE, "video/mp4")
            .header(CONTENT_LENGTH, bytes.len().to_string())
            .body(bytes)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        info!("Uploaded video {}", resource.id);

        // Video is already published; thumbnail errors are only logged.
        if let Err(e) = self.set_thumbnail(&resource.id, thumbnail).await {
            warn!("Failed to set thumbnail for {}: {:#}", resource.id, e);
        }

        Ok(Publication {
            url: format!("https://youtube.com/shorts/{}", resource.id),
            id: resource.id,
        })
    }
}

/// Dry-run publisher: records what would have been uploaded in
/// `publish.json` beside the video.
pub struct LocalPublisher;

#[async_trait]
impl Publisher for LocalPublisher {
    async fn upload(
        &self,
        video: &Path,
        thumbnail: &Path,
        metadata: &PublishMetadata,
    ) -> anyhow::Result<Publication> {
        let dir = video.parent().map(Path::to_path_buf).unwrap_or_else(|| PathBuf::from("."));
        let record_path = dir.join("publish.json");
        let record = json!({
            "video": video.display().to_string(),
            "thumbnail": thumbnail.display().to_string(),
            "metadata": metadata,
        });
        tokio::fs::write(&record_path, serde_json::to_string_pretty(&record)?)
            .await
            .with_context(|| format!("writing {}", record_path.display()))?;
        info!("Dry run: publish record written to {}", record_path.display());
        Ok(Publication {
            id: "dry-run".to_string(),
            url: format!("file://{}", video.display()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn local_publisher_writes_record() {
        let dir = tempfile::tempdir().unwrap();
        let video = dir.path().join("video.mp4");
        let metadata = PublishMetadata {
            title: "Title".into(),
            description: "Desc".into(),
            tags: vec!["a".into()],
            category: "22".into(),
            privacy: Privacy::Unlisted,
        };
        let publication = LocalPublisher
            .upload(&video, &dir.path().join("thumbnail.jpg"), &metadata)
            .await
            .unwrap();
        assert_eq!(publication.id, "dry-run");

        let record: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(dir.path().join("publish.json")).unwrap())
                .unwrap();
        assert_eq!(record["metadata"]["privacy"], "unlisted");
        assert_eq!(record["metadata"]["title"], "Title");
    }
}
