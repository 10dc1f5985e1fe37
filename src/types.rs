use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Album {
    pub id: String,
    pub title: Option<String>,
    pub product_url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CreateAlbumRequest<'a> {
    pub album: NewAlbum<'a>,
}

#[derive(Debug, Serialize)]
pub struct NewAlbum<'a> {
    pub title: &'a str,
}

/// Reference to uploaded bytes, consumed when the media item is created.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UploadToken(pub String);

impl UploadToken {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Serialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NewMediaItem {
    pub simple_media_item: SimpleMediaItem,
}

#[derive(Debug, Serialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SimpleMediaItem {
    pub upload_token: String,
    pub file_name: String,
}

impl NewMediaItem {
    pub fn new(token: &UploadToken, file_name: impl Into<String>) -> Self {
        Self {
            simple_media_item: SimpleMediaItem {
                upload_token: token.0.clone(),
                file_name: file_name.into(),
            },
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchCreateRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub album_id: Option<String>,
    pub new_media_items: Vec<NewMediaItem>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct BatchCreateResponse {
    #[serde(default)]
    pub new_media_item_results: Vec<NewMediaItemResult>,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NewMediaItemResult {
    pub upload_token: Option<String>,
    pub status: Option<Status>,
    pub media_item: Option<MediaItem>,
}

impl NewMediaItemResult {
    /// A result counts as created when the status code is absent or OK and a
    /// media item came back.
    pub fn is_success(&self) -> bool {
        let code = self.status.as_ref().and_then(|s| s.code).unwrap_or(0);
        code == 0 && self.media_item.is_some()
    }

    pub fn failure_message(&self) -> String {
        match &self.status {
            Some(status) => match (&status.message, status.code) {
                (Some(message), _) if !message.is_empty() => message.clone(),
                (_, Some(code)) => format!("status code {}", code),
                _ => "no media item returned".to_string(),
            },
            None => "no media item returned".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct Status {
    pub code: Option<i32>,
    pub message: Option<String>,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MediaItem {
    pub id: String,
    pub product_url: Option<String>,
    pub filename: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ItemOutcome {
    Created {
        media_item_id: String,
        product_url: Option<String>,
    },
    Failed {
        message: String,
    },
}

/// Outcome of committing one file.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemResult {
    pub path: PathBuf,
    pub outcome: ItemOutcome,
}

impl ItemResult {
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, ItemOutcome::Created { .. })
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct UploadReport {
    pub album: Option<Album>,
    pub items: Vec<ItemResult>,
}

impl UploadReport {
    pub fn succeeded(&self) -> impl Iterator<Item = &ItemResult> {
        self.items.iter().filter(|item| item.is_success())
    }

    pub fn failed(&self) -> impl Iterator<Item = &ItemResult> {
        self.items.iter().filter(|item| !item.is_success())
    }

    pub fn is_complete(&self) -> bool {
        self.failed().next().is_none()
    }
}
