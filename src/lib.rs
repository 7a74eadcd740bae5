//! # bjtu-cas
//!
//! Browser-less login to Beijing Jiaotong University's CAS single sign-on
//! portal and its MIS (management information system).
//!
//! ## Features
//!
//! - **Explicit state machine**: challenge → captcha → submit → verify, with
//!   every transition in one table.
//! - **On-device captcha solving**: the arithmetic captcha is recognized by a
//!   small ONNX classifier (requires the `onnx` feature) and evaluated.
//! - **Careful verification**: success needs a positive page signal *and* a
//!   session cookie; a truncated SSO redirect chain is completed before
//!   giving up.
//! - **Proxy Support**: HTTP and SOCKS5 proxies, optional local bind address.
//!
//! ## Quick Start
//!
//! ```ignore
//! use bjtu_cas::{CaptchaDisplay, CasSession};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let mut session = CasSession::builder().build()?;
//!
//!     // Show the captcha to the user, or let the model solve it.
//!     if let CaptchaDisplay::Ready { image, .. } = session.fetch_captcha_for_display().await {
//!         std::fs::write("captcha.png", &image)?;
//!     }
//!
//!     let outcome = session.login("21301234", "password", Some("7")).await;
//!     println!("{}: {}", outcome.success, outcome.message);
//!
//!     if let Some(identity) = session.current_identity() {
//!         println!("{} ({})", identity.name, identity.student_id);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Outcomes
//!
//! Every public operation reports through [`LoginOutcome`], a success flag
//! plus a user-facing (Chinese) message. Errors never poison the session; a
//! failed attempt can simply be retried.

// Allow missing docs for internal types for now
#![allow(missing_docs)]

pub mod auth;
pub mod captcha;
pub mod config;
pub mod error;
pub mod extract;
pub mod identity;
pub mod models;
pub mod transport;

// Re-exports for convenience
pub use auth::{AuthEvent, AuthState, CasSession, CasSessionBuilder};
pub use captcha::{CaptchaDecoder, CaptchaModel, CaptchaRecognizer, ScoreMatrix};
pub use config::{default_model_path, CasConfig, Endpoints};
pub use error::{CaptchaError, CasError, CredentialFailure, Result};
pub use models::{
    CaptchaDisplay, Challenge, ChallengeResult, Identity, LoginAttempt, LoginOutcome,
    SessionState,
};
pub use transport::{HttpRequest, HttpResponse, RquestTransport, Transport};

#[cfg(feature = "onnx")]
pub use captcha::OnnxCaptchaModel;
