use async_trait::async_trait;
use clap::ValueEnum;
use std::future::Future;
use std::net::Ipv4Addr;
use std::pin::Pin;
use std::sync::Arc;
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use yup_oauth2::authenticator::DefaultAuthenticator;
use yup_oauth2::authenticator_delegate::InstalledFlowDelegate;
use yup_oauth2::{ApplicationSecret, InstalledFlowAuthenticator, InstalledFlowReturnMethod};

pub const PHOTOS_LIBRARY_SCOPE: &str = "https://www.googleapis.com/auth/photoslibrary";
pub const AUTH_URI: &str = "https://accounts.google.com/o/oauth2/auth";
pub const TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

// Redirect target for the code-entry flow. Nothing listens there; the user
// copies the code (or the whole URL) from the browser's address bar.
const CODE_ENTRY_REDIRECT_URI: &str = "http://localhost";
const CANCELLED: &str = "authorization cancelled by user";

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("authorization cancelled")]
    Cancelled,
    #[error("token exchange failed: {0}")]
    Exchange(#[source] yup_oauth2::Error),
    #[error("could not start the OAuth flow: {0}")]
    Io(#[from] std::io::Error),
    #[error("authorization server returned no access token")]
    NoAccessToken,
}

impl From<yup_oauth2::Error> for AuthError {
    fn from(err: yup_oauth2::Error) -> Self {
        match err {
            yup_oauth2::Error::UserError(ref message) if message == CANCELLED => {
                AuthError::Cancelled
            }
            other => AuthError::Exchange(other),
        }
    }
}

/// How the authorization code gets back to us.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OAuthMethod {
    /// Open the browser and receive the code on a local redirect listener.
    #[default]
    Browser,
    /// Print the consent URL and read the code from the terminal.
    Cli,
}

/// Source of bearer tokens for API calls.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn access_token(&self) -> Result<String, AuthError>;
}

/// Photos Library credential, valid for the rest of the process.
#[derive(Clone)]
pub struct Credential {
    source: Arc<dyn TokenSource>,
}

impl Credential {
    pub fn new(source: impl TokenSource + 'static) -> Self {
        Self {
            source: Arc::new(source),
        }
    }

    /// A credential that always hands out the same access token.
    pub fn from_access_token(token: impl Into<String>) -> Self {
        Self::new(StaticToken(token.into()))
    }

    pub async fn access_token(&self) -> Result<String, AuthError> {
        self.source.access_token().await
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential").finish_non_exhaustive()
    }
}

struct StaticToken(String);

#[async_trait]
impl TokenSource for StaticToken {
    async fn access_token(&self) -> Result<String, AuthError> {
        Ok(self.0.clone())
    }
}

/// Access tokens from the installed-app authenticator. The refresh token stays
/// in memory, so an expired access token is renewed without asking the user.
pub struct InstalledAppTokenSource {
    authenticator: DefaultAuthenticator,
    scopes: Vec<String>,
}

#[async_trait]
impl TokenSource for InstalledAppTokenSource {
    async fn access_token(&self) -> Result<String, AuthError> {
        let scopes: Vec<&str> = self.scopes.iter().map(|s| s.as_str()).collect();
        let token = self.authenticator.token(&scopes).await?;
        token
            .token()
            .map(|t| t.to_string())
            .ok_or(AuthError::NoAccessToken)
    }
}

// Define a trait for OAuth flow operations to allow mocking
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait OAuthFlow: Send + Sync {
    async fn perform_flow(
        &self,
        secret: ApplicationSecret,
        scopes: Vec<String>,
    ) -> Result<Credential, AuthError>;
}

pub struct RealOAuthFlow {
    method: OAuthMethod,
}

impl RealOAuthFlow {
    pub fn new(method: OAuthMethod) -> Self {
        Self { method }
    }
}

#[async_trait]
impl OAuthFlow for RealOAuthFlow {
    async fn perform_flow(
        &self,
        secret: ApplicationSecret,
        scopes: Vec<String>,
    ) -> Result<Credential, AuthError> {
        let delegate: Box<dyn InstalledFlowDelegate> = match self.method {
            OAuthMethod::Browser => Box::new(BrowserDelegate::bind(open_browser).await?),
            OAuthMethod::Cli => Box::new(CodeEntryDelegate::new(BufReader::new(
                tokio::io::stdin(),
            ))),
        };
        authorize(secret, scopes, delegate).await
    }
}

// Both methods run the interactive flow: the delegate supplies the redirect
// URI and hands back the authorization code, or an error if the user gave up.
async fn authorize(
    secret: ApplicationSecret,
    scopes: Vec<String>,
    delegate: Box<dyn InstalledFlowDelegate>,
) -> Result<Credential, AuthError> {
    let authenticator =
        InstalledFlowAuthenticator::builder(secret, InstalledFlowReturnMethod::Interactive)
            .flow_delegate(delegate)
            .build()
            .await?;

    let source = InstalledAppTokenSource {
        authenticator,
        scopes,
    };
    // The first request runs the interactive part of the flow.
    source.access_token().await?;
    Ok(Credential::new(source))
}

type Opener = fn(&str) -> std::io::Result<()>;

/// Opens the consent page and waits for the provider's redirect on a
/// loopback listener it owns.
struct BrowserDelegate {
    listener: TcpListener,
    redirect_uri: String,
    opener: Opener,
}

impl BrowserDelegate {
    async fn bind(opener: Opener) -> std::io::Result<Self> {
        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).await?;
        let redirect_uri = format!("http://{}", listener.local_addr()?);
        debug!("listening for the OAuth redirect on {}", redirect_uri);
        Ok(Self {
            listener,
            redirect_uri,
            opener,
        })
    }

    /// Serves redirect requests until one carries `code` or `error`.
    async fn wait_for_code(&self) -> Result<String, String> {
        loop {
            let (stream, peer) = self
                .listener
                .accept()
                .await
                .map_err(|e| format!("could not accept the OAuth redirect: {}", e))?;
            debug!("redirect connection from {}", peer);
            match handle_redirect(stream).await {
                Ok(Some(outcome)) => return outcome,
                Ok(None) => continue,
                Err(e) => warn!("bad redirect request: {}", e),
            }
        }
    }
}

impl InstalledFlowDelegate for BrowserDelegate {
    fn redirect_uri(&self) -> Option<&str> {
        Some(&self.redirect_uri)
    }

    fn present_user_url<'a>(
        &'a self,
        url: &'a str,
        _need_code: bool,
    ) -> Pin<Box<dyn Future<Output = Result<String, String>> + Send + 'a>> {
        Box::pin(async move {
            eprintln!("Open the following URL to authorize access to Google Photos:");
            eprintln!("{}", url);
            if let Err(e) = (self.opener)(url) {
                warn!("could not open the browser: {}", e);
            }
            info!("waiting for the authorization response");
            self.wait_for_code().await
        })
    }
}

// Reads one HTTP request from the browser and answers it. Returns the flow
// outcome once the redirect carries a code or an error, None for anything
// else (favicon requests and the like).
async fn handle_redirect(stream: TcpStream) -> std::io::Result<Option<Result<String, String>>> {
    let mut stream = BufReader::new(stream);
    let mut request_line = String::new();
    stream.read_line(&mut request_line).await?;
    loop {
        let mut header = String::new();
        if stream.read_line(&mut header).await? == 0 || header.trim().is_empty() {
            break;
        }
    }

    let target = request_line.split_whitespace().nth(1).unwrap_or("/");
    let outcome = reqwest::Url::parse(&format!("http://localhost{}", target))
        .ok()
        .and_then(|url| redirect_outcome(&url));

    let (status, page) = match &outcome {
        Some(Ok(_)) => ("200 OK", "Authorization complete. You can close this window."),
        Some(Err(_)) => ("200 OK", "Authorization was not granted. You can close this window."),
        None => ("404 Not Found", "Not found."),
    };
    let response = format!(
        "HTTP/1.1 {}\r\nContent-Type: text/plain; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        page.len(),
        page
    );
    let stream = stream.get_mut();
    stream.write_all(response.as_bytes()).await?;
    stream.shutdown().await.ok();
    Ok(outcome)
}

fn redirect_outcome(url: &reqwest::Url) -> Option<Result<String, String>> {
    let mut code = None;
    let mut error = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "code" if !value.is_empty() => code = Some(value.into_owned()),
            "error" => error = Some(value.into_owned()),
            _ => {}
        }
    }
    match (code, error) {
        (_, Some(error)) if error == "access_denied" => Some(Err(CANCELLED.to_string())),
        (_, Some(error)) => Some(Err(format!("authorization failed: {}", error))),
        (Some(code), None) => Some(Ok(code)),
        (None, None) => None,
    }
}

type CodeInput = Box<dyn AsyncBufRead + Send + Unpin>;

struct CodeEntryDelegate {
    input: Mutex<CodeInput>,
}

impl CodeEntryDelegate {
    fn new(input: impl AsyncBufRead + Send + Unpin + 'static) -> Self {
        Self {
            input: Mutex::new(Box::new(input)),
        }
    }
}

impl InstalledFlowDelegate for CodeEntryDelegate {
    fn redirect_uri(&self) -> Option<&str> {
        Some(CODE_ENTRY_REDIRECT_URI)
    }

    fn present_user_url<'a>(
        &'a self,
        url: &'a str,
        _need_code: bool,
    ) -> Pin<Box<dyn Future<Output = Result<String, String>> + Send + 'a>> {
        Box::pin(async move {
            eprintln!("Open the following URL and authorize access to Google Photos:");
            eprintln!("{}", url);
            eprintln!();
            eprintln!("Your browser is then redirected to {}.", CODE_ENTRY_REDIRECT_URI);
            eprint!("Paste the redirected URL or its code parameter here: ");

            let mut line = String::new();
            self.input
                .lock()
                .await
                .read_line(&mut line)
                .await
                .map_err(|e| format!("could not read authorization code: {}", e))?;
            extract_auth_code(&line).ok_or_else(|| CANCELLED.to_string())
        })
    }
}

/// Accepts either a bare code or the full redirect URL and returns the code.
/// Blank input means the user gave up.
pub fn extract_auth_code(input: &str) -> Option<String> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }
    match reqwest::Url::parse(input) {
        Ok(url) => url
            .query_pairs()
            .find(|(key, _)| key == "code")
            .map(|(_, value)| value.into_owned())
            .filter(|code| !code.is_empty()),
        Err(_) => Some(input.to_string()),
    }
}

fn open_browser(url: &str) -> std::io::Result<()> {
    let mut command = if cfg!(target_os = "macos") {
        std::process::Command::new("open")
    } else if cfg!(target_os = "windows") {
        let mut command = std::process::Command::new("rundll32");
        command.arg("url.dll,FileProtocolHandler");
        command
    } else {
        std::process::Command::new("xdg-open")
    };
    command
        .arg(url)
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .spawn()
        .map(|_| ())
}

pub fn application_secret(client_id: &str, client_secret: &str) -> ApplicationSecret {
    ApplicationSecret {
        client_id: client_id.to_string(),
        client_secret: client_secret.to_string(),
        auth_uri: AUTH_URI.to_string(),
        token_uri: TOKEN_URI.to_string(),
        ..Default::default()
    }
}

// Main authentication function
pub async fn try_authenticate<O: OAuthFlow>(
    oauth_flow_impl: &O,
    client_id: &str,
    client_secret: &str,
) -> Result<Credential, AuthError> {
    let secret = application_secret(client_id, client_secret);
    let scopes = vec![PHOTOS_LIBRARY_SCOPE.to_string()];
    debug!("starting OAuth flow for client {}", client_id);
    let credential = oauth_flow_impl.perform_flow(secret, scopes).await?;
    info!("authorized access to Google Photos");
    Ok(credential)
}
