//! Error types for the bjtu-cas library.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the bjtu-cas library.
#[derive(Error, Debug)]
pub enum CasError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Http(#[from] rquest::Error),

    /// Transport failure reported by a non-rquest transport
    #[error("Transport error: {0}")]
    Transport(String),

    /// URL could not be parsed or joined
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// Regex error
    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),

    /// JSON parsing error
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A required token was missing from the login page
    #[error("Missing {0} on login page")]
    MissingToken(&'static str),

    /// Captcha recognition failed
    #[error(transparent)]
    Captcha(#[from] CaptchaError),

    /// No captcha text supplied and no recognizer available
    #[error("Captcha must be entered manually")]
    ManualCaptchaRequired,

    /// The server rejected the submitted credentials
    #[error("Credential rejected: {0:?}")]
    Credential(CredentialFailure),

    /// A page looked authenticated but no session cookie backs it
    #[error("Session cookie missing after apparent login")]
    SessionNotEstablished,

    /// Redirect chain exceeded the hop limit
    #[error("Too many redirects at {0}")]
    RedirectLoop(String),
}

/// Why the server refused a login form submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialFailure {
    CaptchaWrong,
    PasswordWrong,
    Unknown,
}

/// Errors raised by the captcha pipeline.
#[derive(Error, Debug)]
pub enum CaptchaError {
    /// Model file is absent
    #[error("Captcha model not found at {0}")]
    ModelNotFound(PathBuf),

    /// Model failed to run or produced unusable output
    #[error("Captcha inference failed: {0}")]
    InferenceFailed(String),

    /// Image could not be decoded or converted
    #[error("Captcha image processing failed: {0}")]
    ImageProcessing(String),
}

/// Result type alias for bjtu-cas operations.
pub type Result<T> = std::result::Result<T, CasError>;
