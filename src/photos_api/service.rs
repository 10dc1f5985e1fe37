use futures_util::stream::{self, StreamExt, TryStreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use super::client::{file_name_of, PhotosLibrary};
use super::error::ApiError;
use crate::types::{
    ItemOutcome, ItemResult, NewMediaItem, NewMediaItemResult, UploadReport, UploadToken,
};

/// Most items the API accepts in one batchCreate call.
pub const MAX_BATCH_SIZE: usize = 50;
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Uploads files and turns them into media items.
pub struct PhotosService<L> {
    library: L,
    concurrency: usize,
    show_progress: bool,
}

impl<L: PhotosLibrary> PhotosService<L> {
    pub fn new(library: L) -> Self {
        Self {
            library,
            concurrency: DEFAULT_CONCURRENCY,
            show_progress: true,
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    /// Creates an album titled `title` and adds the files to it.
    pub async fn create_album(
        &self,
        title: &str,
        files: &[PathBuf],
    ) -> Result<UploadReport, ApiError> {
        let album = self.library.create_album(title).await?;
        info!("created album {:?} ({})", title, album.id);

        let tokens = self.upload_all(files).await?;
        let items = self.commit(Some(&album.id), files, tokens).await?;
        Ok(UploadReport {
            album: Some(album),
            items,
        })
    }

    /// Adds the files to the library without an album.
    pub async fn add_to_library(&self, files: &[PathBuf]) -> Result<UploadReport, ApiError> {
        let tokens = self.upload_all(files).await?;
        let items = self.commit(None, files, tokens).await?;
        Ok(UploadReport { album: None, items })
    }

    /// Uploads every file, at most `concurrency` at a time. Tokens come back in
    /// the order of `files`; the first failure aborts the whole upload.
    async fn upload_all(&self, files: &[PathBuf]) -> Result<Vec<UploadToken>, ApiError> {
        let progress = self.progress_bar(files.len());
        let library = &self.library;
        let result = stream::iter(files)
            .map(|path| {
                let progress = progress.clone();
                async move {
                    let token = library.upload(path).await;
                    progress.inc(1);
                    token
                }
            })
            .buffered(self.concurrency)
            .try_collect::<Vec<_>>()
            .await;
        progress.finish_and_clear();

        let tokens = result?;
        info!("uploaded {} files", tokens.len());
        Ok(tokens)
    }

    async fn commit(
        &self,
        album_id: Option<&str>,
        files: &[PathBuf],
        tokens: Vec<UploadToken>,
    ) -> Result<Vec<ItemResult>, ApiError> {
        let mut results = Vec::with_capacity(files.len());
        let pending: Vec<(&PathBuf, UploadToken)> = files.iter().zip(tokens).collect();

        for chunk in pending.chunks(MAX_BATCH_SIZE) {
            let items = chunk
                .iter()
                .map(|(path, token)| NewMediaItem::new(token, file_name_of(path)))
                .collect();
            let created = self
                .library
                .batch_create(album_id.map(|id| id.to_string()), items)
                .await?;

            for (index, (path, token)) in chunk.iter().enumerate() {
                let result = created
                    .iter()
                    .find(|r| r.upload_token.as_deref() == Some(token.as_str()))
                    .or_else(|| created.get(index).filter(|r| r.upload_token.is_none()));
                results.push(item_result(path, result));
            }
        }

        let failed = results.iter().filter(|r| !r.is_success()).count();
        if failed > 0 {
            warn!("{} of {} media items were not created", failed, results.len());
        }
        Ok(results)
    }

    fn progress_bar(&self, len: usize) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }
        let progress = ProgressBar::new(len as u64);
        if let Ok(style) = ProgressStyle::with_template("{spinner} uploading [{bar:30}] {pos}/{len}")
        {
            progress.set_style(style.progress_chars("=> "));
        }
        progress
    }
}

fn item_result(path: &Path, result: Option<&NewMediaItemResult>) -> ItemResult {
    let outcome = match result {
        Some(r) if r.is_success() => {
            let media_item = r.media_item.as_ref();
            ItemOutcome::Created {
                media_item_id: media_item.map(|m| m.id.clone()).unwrap_or_default(),
                product_url: media_item.and_then(|m| m.product_url.clone()),
            }
        }
        Some(r) => ItemOutcome::Failed {
            message: r.failure_message(),
        },
        None => ItemOutcome::Failed {
            message: "no result returned for this item".to_string(),
        },
    };
    ItemResult {
        path: path.to_path_buf(),
        outcome,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::photos_api::client::MockPhotosLibrary;
    use crate::types::{Album, MediaItem, Status};
    use mockall::predicate::*;
    use mockall::Sequence;

    fn created(token: &str, id: &str) -> NewMediaItemResult {
        NewMediaItemResult {
            upload_token: Some(token.to_string()),
            status: Some(Status {
                code: None,
                message: Some("Success".to_string()),
            }),
            media_item: Some(MediaItem {
                id: id.to_string(),
                product_url: None,
                filename: None,
            }),
        }
    }

    fn echo_tokens(items: &[NewMediaItem]) -> Vec<NewMediaItemResult> {
        items
            .iter()
            .map(|item| {
                let token = &item.simple_media_item.upload_token;
                created(token, &format!("item-{}", token))
            })
            .collect()
    }

    fn paths(names: &[&str]) -> Vec<PathBuf> {
        names.iter().map(PathBuf::from).collect()
    }

    fn expect_uploads(library: &mut MockPhotosLibrary) {
        library
            .expect_upload()
            .returning(|path| Ok(UploadToken(file_name_of(path))));
    }

    #[tokio::test]
    async fn test_add_to_library_commits_without_album() {
        let mut library = MockPhotosLibrary::new();
        expect_uploads(&mut library);
        library.expect_create_album().never();
        library
            .expect_batch_create()
            .with(eq(None::<String>), always())
            .times(1)
            .returning(|_, items| Ok(echo_tokens(&items)));

        let service = PhotosService::new(library).with_progress(false);
        let report = service
            .add_to_library(&paths(&["a.jpg", "b.jpg"]))
            .await
            .unwrap();

        assert!(report.album.is_none());
        assert_eq!(report.items.len(), 2);
        assert!(report.is_complete());
        assert_eq!(report.items[1].path, PathBuf::from("b.jpg"));
        assert_eq!(
            report.items[1].outcome,
            ItemOutcome::Created {
                media_item_id: "item-b.jpg".to_string(),
                product_url: None,
            }
        );
    }

    #[tokio::test]
    async fn test_create_album_reports_one_failed_item() {
        let mut library = MockPhotosLibrary::new();
        let mut seq = Sequence::new();
        library
            .expect_create_album()
            .with(eq("Trip"))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|title| {
                Ok(Album {
                    id: "album-1".to_string(),
                    title: Some(title.to_string()),
                    product_url: Some("https://photos.google.com/lr/album/album-1".to_string()),
                })
            });
        library
            .expect_upload()
            .times(3)
            .in_sequence(&mut seq)
            .returning(|path| Ok(UploadToken(file_name_of(path))));
        library
            .expect_batch_create()
            .with(eq(Some("album-1".to_string())), always())
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, items| {
                let mut results = echo_tokens(&items);
                results[1] = NewMediaItemResult {
                    upload_token: Some("b.jpg".to_string()),
                    status: Some(Status {
                        code: Some(3),
                        message: Some("Failed: media item could not be created".to_string()),
                    }),
                    media_item: None,
                };
                Ok(results)
            });

        let service = PhotosService::new(library).with_progress(false);
        let report = service
            .create_album("Trip", &paths(&["a.jpg", "b.jpg", "c.jpg"]))
            .await
            .unwrap();

        assert_eq!(report.album.as_ref().unwrap().id, "album-1");
        assert_eq!(report.succeeded().count(), 2);
        let failed: Vec<_> = report.failed().collect();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].path, PathBuf::from("b.jpg"));
        assert_eq!(
            failed[0].outcome,
            ItemOutcome::Failed {
                message: "Failed: media item could not be created".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_upload_failure_prevents_commit() {
        let mut library = MockPhotosLibrary::new();
        library.expect_upload().returning(|path| {
            if path.ends_with("bad.jpg") {
                Err(ApiError::InvalidResponse {
                    operation: "upload file",
                    message: "empty upload token".to_string(),
                })
            } else {
                Ok(UploadToken(file_name_of(path)))
            }
        });
        library.expect_batch_create().never();

        let service = PhotosService::new(library)
            .with_progress(false)
            .with_concurrency(2);
        let err = service
            .add_to_library(&paths(&["a.jpg", "bad.jpg", "c.jpg"]))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::InvalidResponse { .. }));
    }

    #[tokio::test]
    async fn test_commit_is_split_into_batches() {
        let names: Vec<String> = (0..(MAX_BATCH_SIZE * 2 + 3))
            .map(|i| format!("{:03}.jpg", i))
            .collect();
        let files: Vec<PathBuf> = names.iter().map(PathBuf::from).collect();

        let mut library = MockPhotosLibrary::new();
        expect_uploads(&mut library);
        let mut seq = Sequence::new();
        for expected in [MAX_BATCH_SIZE, MAX_BATCH_SIZE, 3] {
            library
                .expect_batch_create()
                .withf(move |_, items| items.len() == expected)
                .times(1)
                .in_sequence(&mut seq)
                .returning(|_, items| Ok(echo_tokens(&items)));
        }

        let service = PhotosService::new(library).with_progress(false);
        let report = service.add_to_library(&files).await.unwrap();

        assert_eq!(report.items.len(), files.len());
        assert!(report.is_complete());
        let reported: Vec<_> = report.items.iter().map(|i| i.path.clone()).collect();
        assert_eq!(reported, files);
    }

    #[tokio::test]
    async fn test_missing_result_is_reported_as_failure() {
        let mut library = MockPhotosLibrary::new();
        expect_uploads(&mut library);
        library
            .expect_batch_create()
            .returning(|_, items| Ok(echo_tokens(&items[..1])));

        let service = PhotosService::new(library).with_progress(false);
        let report = service
            .add_to_library(&paths(&["a.jpg", "b.jpg"]))
            .await
            .unwrap();

        assert!(report.items[0].is_success());
        assert!(!report.items[1].is_success());
    }

    #[tokio::test]
    async fn test_batch_call_failure_is_surfaced() {
        let mut library = MockPhotosLibrary::new();
        expect_uploads(&mut library);
        library.expect_batch_create().times(1).returning(|_, _| {
            Err(ApiError::Status {
                operation: "create media items",
                status: reqwest::StatusCode::INTERNAL_SERVER_ERROR,
                body: "backend error".to_string(),
            })
        });

        let service = PhotosService::new(library).with_progress(false);
        let err = service
            .add_to_library(&paths(&["a.jpg"]))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("backend error"));
    }

    #[test]
    fn test_concurrency_is_at_least_one() {
        let service = PhotosService::new(MockPhotosLibrary::new()).with_concurrency(0);
        assert_eq!(service.concurrency, 1);
    }
}
