use crate::files::{find_files, FindError};
use crate::photos_api::{
    try_authenticate, ApiError, AuthError, Credential, OAuthFlow, PhotosLibrary, PhotosService,
};
use crate::types::{ItemOutcome, UploadReport};
use std::future::Future;
use std::path::PathBuf;
use std::pin::pin;
use thiserror::Error;
use tracing::{error, info};

#[derive(Debug, Error)]
pub enum AppError {
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error(transparent)]
    Find(#[from] FindError),
    #[error("no files found in {0}")]
    NoFiles(String),
    #[error("authentication failed: {0}")]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error("interrupted")]
    Interrupted,
}

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub paths: Vec<PathBuf>,
    pub new_album: Option<String>,
    pub client_id: String,
    pub client_secret: String,
    pub concurrency: usize,
}

/// Runs one upload: collect, authenticate, optionally create the album, then
/// upload and commit. `connect` builds the API client once a credential exists.
///
/// When `interrupt` completes while waiting for authorization the run fails
/// with [`AuthError::Cancelled`]; later it fails with [`AppError::Interrupted`].
pub async fn run<O, L, F, I>(
    options: &RunOptions,
    oauth_flow: &O,
    connect: F,
    interrupt: I,
) -> Result<UploadReport, AppError>
where
    O: OAuthFlow,
    L: PhotosLibrary,
    F: FnOnce(Credential) -> L,
    I: Future<Output = ()>,
{
    let mut interrupt = pin!(interrupt);

    let files = find_files(options.paths.as_slice())?;
    if files.is_empty() {
        let roots: Vec<String> = options
            .paths
            .iter()
            .map(|p| p.display().to_string())
            .collect();
        return Err(AppError::NoFiles(roots.join(", ")));
    }

    info!("The following {} files will be uploaded:", files.len());
    for (i, file) in files.iter().enumerate() {
        println!("{:3}: {}", i + 1, file.display());
    }

    let credential = tokio::select! {
        result = try_authenticate(oauth_flow, &options.client_id, &options.client_secret) => result?,
        _ = &mut interrupt => return Err(AuthError::Cancelled.into()),
    };

    let service = PhotosService::new(connect(credential)).with_concurrency(options.concurrency);
    let upload = async {
        match &options.new_album {
            Some(title) => service.create_album(title, &files).await,
            None => service.add_to_library(&files).await,
        }
    };
    let report = tokio::select! {
        result = upload => result?,
        _ = &mut interrupt => return Err(AppError::Interrupted),
    };
    Ok(report)
}

/// Prints the outcome of a run. Returns false when any item failed.
pub fn print_report(report: &UploadReport) -> bool {
    for item in report.failed() {
        if let ItemOutcome::Failed { message } = &item.outcome {
            error!("{}: {}", item.path.display(), message);
        }
    }

    let succeeded = report.succeeded().count();
    let total = report.items.len();
    match &report.album {
        Some(album) => {
            let title = album.title.as_deref().unwrap_or("untitled");
            println!("{} of {} files added to album {:?}", succeeded, total, title);
            if let Some(url) = &album.product_url {
                println!("{}", url);
            }
        }
        None => println!("{} of {} files added to the library", succeeded, total),
    }
    report.is_complete()
}
