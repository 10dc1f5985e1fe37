use reqwest::StatusCode;
use std::path::PathBuf;
use thiserror::Error;

use super::auth::AuthError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("failed to {operation}: {source}")]
    Http {
        operation: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("failed to {operation}: {status}: {body}")]
    Status {
        operation: &'static str,
        status: StatusCode,
        body: String,
    },
    #[error("failed to read {}: {source}", .path.display())]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to {operation}: {message}")]
    InvalidResponse {
        operation: &'static str,
        message: String,
    },
    #[error("could not get an access token: {0}")]
    Token(#[from] AuthError),
}
