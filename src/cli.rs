use crate::app::{AppError, RunOptions};
use crate::photos_api::service::DEFAULT_CONCURRENCY;
use crate::photos_api::OAuthMethod;
use clap::Parser;
use std::path::PathBuf;

const SETUP: &str = "Setup:
  1. Open https://console.cloud.google.com/apis/library/photoslibrary.googleapis.com/
  2. Enable Photos Library API.
  3. Open https://console.cloud.google.com/apis/credentials
  4. Create an OAuth client ID where the application type is other.
  5. Export GOOGLE_CLIENT_ID and GOOGLE_CLIENT_SECRET variables or set the options.";

/// Upload files to Google Photos.
#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None, after_long_help = SETUP, arg_required_else_help = true)]
pub struct Cli {
    /// Create an album and add files into it.
    #[clap(short = 'n', long, value_name = "TITLE")]
    pub new_album: Option<String>,

    /// OAuth authorization method.
    #[clap(long, value_enum, default_value_t = OAuthMethod::Browser)]
    pub oauth_method: OAuthMethod,

    /// Google API client ID.
    #[clap(long, env = "GOOGLE_CLIENT_ID", hide_env_values = true)]
    pub google_client_id: String,

    /// Google API client secret.
    #[clap(long, env = "GOOGLE_CLIENT_SECRET", hide_env_values = true)]
    pub google_client_secret: String,

    /// Number of files uploaded at the same time.
    #[clap(long, env = "GPUP_CONCURRENCY", default_value_t = DEFAULT_CONCURRENCY)]
    pub concurrency: usize,

    /// Log debug output.
    #[clap(short, long)]
    pub verbose: bool,

    /// Files or directories to upload.
    #[clap(value_name = "FILE_OR_DIRECTORY", required = true)]
    pub paths: Vec<PathBuf>,
}

impl Cli {
    /// Validates the parsed arguments into the options of a run.
    pub fn into_options(self) -> Result<RunOptions, AppError> {
        let client_id = self.google_client_id.trim().to_string();
        let client_secret = self.google_client_secret.trim().to_string();
        if client_id.is_empty() {
            return Err(AppError::Config(
                "--google-client-id or GOOGLE_CLIENT_ID must not be empty".to_string(),
            ));
        }
        if client_secret.is_empty() {
            return Err(AppError::Config(
                "--google-client-secret or GOOGLE_CLIENT_SECRET must not be empty".to_string(),
            ));
        }
        if self.concurrency == 0 {
            return Err(AppError::Config(
                "--concurrency must be at least 1".to_string(),
            ));
        }
        let new_album = self
            .new_album
            .map(|title| title.trim().to_string())
            .filter(|title| !title.is_empty());

        Ok(RunOptions {
            paths: self.paths,
            new_album,
            client_id,
            client_secret,
            concurrency: self.concurrency,
        })
    }
}
