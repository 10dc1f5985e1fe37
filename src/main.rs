use clap::Parser;
use gpup::app::{print_report, run, AppError};
use gpup::cli::Cli;
use gpup::photos_api::{AuthError, PhotosClient, RealOAuthFlow};
use std::process::ExitCode;
use tracing::error;
use tracing_subscriber::EnvFilter;

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("gpup={}", default_level)));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let oauth_flow = RealOAuthFlow::new(cli.oauth_method);
    let options = match cli.into_options() {
        Ok(options) => options,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    let client = reqwest::Client::new();
    let interrupt = async {
        if tokio::signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
    };
    let result = run(
        &options,
        &oauth_flow,
        |credential| PhotosClient::new(client, credential),
        interrupt,
    )
    .await;

    match result {
        Ok(report) => {
            if print_report(&report) {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }
        Err(e @ (AppError::Interrupted | AppError::Auth(AuthError::Cancelled))) => {
            error!("{}", e);
            // A pending stdin read would keep the runtime from shutting down.
            let code = if matches!(e, AppError::Interrupted) { 130 } else { 1 };
            std::process::exit(code);
        }
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
