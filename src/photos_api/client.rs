use async_trait::async_trait;
use std::path::Path;
use tokio_util::io::ReaderStream;
use tracing::debug;

use super::auth::Credential;
use super::error::ApiError;
use crate::types::{
    Album, BatchCreateRequest, BatchCreateResponse, CreateAlbumRequest, NewAlbum, NewMediaItem,
    NewMediaItemResult, UploadToken,
};

pub const DEFAULT_BASE_URL: &str = "https://photoslibrary.googleapis.com";

/// Remote operations of the Photos Library API.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PhotosLibrary: Send + Sync {
    async fn create_album(&self, title: &str) -> Result<Album, ApiError>;

    async fn upload(&self, path: &Path) -> Result<UploadToken, ApiError>;

    /// Creates media items from upload tokens, in the album when one is given.
    /// Per-item failures are part of the returned results.
    async fn batch_create(
        &self,
        album_id: Option<String>,
        items: Vec<NewMediaItem>,
    ) -> Result<Vec<NewMediaItemResult>, ApiError>;
}

pub struct PhotosClient {
    client: reqwest::Client,
    credential: Credential,
    base_url: String,
}

impl PhotosClient {
    pub fn new(client: reqwest::Client, credential: Credential) -> Self {
        Self {
            client,
            credential,
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub async fn add_to_library(
        &self,
        items: Vec<NewMediaItem>,
    ) -> Result<Vec<NewMediaItemResult>, ApiError> {
        self.batch_create(None, items).await
    }

    pub async fn add_to_album(
        &self,
        album_id: &str,
        items: Vec<NewMediaItem>,
    ) -> Result<Vec<NewMediaItemResult>, ApiError> {
        self.batch_create(Some(album_id.to_string()), items).await
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

async fn check_status(
    operation: &'static str,
    response: reqwest::Response,
) -> Result<reqwest::Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        Err(ApiError::Status {
            operation,
            status,
            body,
        })
    }
}

#[async_trait]
impl PhotosLibrary for PhotosClient {
    async fn create_album(&self, title: &str) -> Result<Album, ApiError> {
        const OPERATION: &str = "create album";
        let token = self.credential.access_token().await?;
        let request_body = CreateAlbumRequest {
            album: NewAlbum { title },
        };

        let response = self
            .client
            .post(self.url("/v1/albums"))
            .bearer_auth(&token)
            .json(&request_body)
            .send()
            .await
            .map_err(|source| ApiError::Http {
                operation: OPERATION,
                source,
            })?;

        let album: Album = check_status(OPERATION, response)
            .await?
            .json()
            .await
            .map_err(|source| ApiError::Http {
                operation: OPERATION,
                source,
            })?;
        debug!("created album {}", album.id);
        Ok(album)
    }

    async fn upload(&self, path: &Path) -> Result<UploadToken, ApiError> {
        const OPERATION: &str = "upload file";
        let read_error = |source| ApiError::ReadFile {
            path: path.to_path_buf(),
            source,
        };
        let file = tokio::fs::File::open(path).await.map_err(read_error)?;
        let len = file.metadata().await.map_err(read_error)?.len();
        let file_name = file_name_of(path);
        let token = self.credential.access_token().await?;

        debug!("uploading {} ({} bytes)", path.display(), len);
        let response = self
            .client
            .post(self.url("/v1/uploads"))
            .bearer_auth(&token)
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .header(reqwest::header::CONTENT_LENGTH, len)
            .header("X-Goog-Upload-Protocol", "raw")
            .header("X-Goog-Upload-File-Name", file_name)
            .body(reqwest::Body::wrap_stream(ReaderStream::new(file)))
            .send()
            .await
            .map_err(|source| ApiError::Http {
                operation: OPERATION,
                source,
            })?;

        let upload_token = check_status(OPERATION, response)
            .await?
            .text()
            .await
            .map_err(|source| ApiError::Http {
                operation: OPERATION,
                source,
            })?;
        let upload_token = upload_token.trim();
        if upload_token.is_empty() {
            return Err(ApiError::InvalidResponse {
                operation: OPERATION,
                message: format!("empty upload token for {}", path.display()),
            });
        }
        Ok(UploadToken(upload_token.to_string()))
    }

    async fn batch_create(
        &self,
        album_id: Option<String>,
        items: Vec<NewMediaItem>,
    ) -> Result<Vec<NewMediaItemResult>, ApiError> {
        const OPERATION: &str = "create media items";
        let token = self.credential.access_token().await?;
        let request_body = BatchCreateRequest {
            album_id,
            new_media_items: items,
        };

        let response = self
            .client
            .post(self.url("/v1/mediaItems:batchCreate"))
            .bearer_auth(&token)
            .json(&request_body)
            .send()
            .await
            .map_err(|source| ApiError::Http {
                operation: OPERATION,
                source,
            })?;

        let body: BatchCreateResponse = check_status(OPERATION, response)
            .await?
            .json()
            .await
            .map_err(|source| ApiError::Http {
                operation: OPERATION,
                source,
            })?;
        Ok(body.new_media_item_results)
    }
}

/// Base name sent to the API as the media item's file name.
pub fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
