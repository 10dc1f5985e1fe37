//! Google Photos Library API module split into logical submodules
//!
//! - auth: OAuth flows and the credential used for API calls
//! - client: HTTP calls against the Photos Library API
//! - service: upload pool and batched media item creation
//! - error: errors raised by API calls

pub mod auth;
pub mod client;
pub mod error;
pub mod service;

pub use auth::{try_authenticate, AuthError, Credential, OAuthFlow, OAuthMethod, RealOAuthFlow};
pub use client::{PhotosClient, PhotosLibrary};
pub use error::ApiError;
pub use service::PhotosService;
