pub mod app;
pub mod cli;
pub mod files;
pub mod photos_api;
pub mod types;
