//! Data models shared by the session, the extractor and the UI layer.

use crate::error::{CaptchaError, CasError, CredentialFailure};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

/// User-facing messages. The portal is Chinese-only, so are these.
pub mod messages {
    pub const LOGIN_SUCCESS: &str = "登录成功";
    pub const ALREADY_LOGGED_IN: &str = "已登录";
    pub const LOGGED_OUT: &str = "已退出登录";
    pub const NOT_LOGGED_IN: &str = "未登录";
    pub const CAPTCHA_WRONG: &str = "验证码错误，请重新输入验证码";
    pub const PASSWORD_WRONG: &str = "用户名或密码不正确";
    pub const LOGIN_FAILED: &str = "登录失败，请检查用户名、密码和验证码";
    pub const MANUAL_CAPTCHA: &str = "需要手动输入验证码";
    pub const SESSION_NOT_ESTABLISHED: &str = "登录状态未建立，请重试";
    pub const IDENTITY_REFRESHED: &str = "用户信息已更新";
    pub const IDENTITY_UNAVAILABLE: &str = "无法获取用户信息";
}

/// Logged-in user as shown by the portal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub name: String,
    pub student_id: String,
    pub major: Option<String>,
    pub college: Option<String>,
}

/// Tokens scraped from one rendering of the CAS login page.
///
/// Valid for a single form submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Challenge {
    pub captcha_id: String,
    pub csrf_token: String,
    pub next_path: String,
    pub login_url: Url,
    pub captcha_image_url: Url,
}

/// Result of every public session operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginOutcome {
    pub success: bool,
    pub message: String,
}

impl LoginOutcome {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }

    /// Map an internal error to the message the UI shows.
    pub fn from_error(error: &CasError) -> Self {
        let message = match error {
            CasError::MissingToken(what) => format!("登录页面解析失败：缺少{}", what),
            CasError::Captcha(CaptchaError::ModelNotFound(_)) | CasError::ManualCaptchaRequired => {
                messages::MANUAL_CAPTCHA.to_string()
            }
            CasError::Captcha(e) => format!("验证码识别失败：{}", e),
            CasError::Credential(CredentialFailure::CaptchaWrong) => {
                messages::CAPTCHA_WRONG.to_string()
            }
            CasError::Credential(CredentialFailure::PasswordWrong) => {
                messages::PASSWORD_WRONG.to_string()
            }
            CasError::Credential(CredentialFailure::Unknown) => messages::LOGIN_FAILED.to_string(),
            CasError::SessionNotEstablished => messages::SESSION_NOT_ESTABLISHED.to_string(),
            other => format!("网络错误：{}", other),
        };
        Self::failure(message)
    }
}

/// Outcome of fetching the login page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChallengeResult {
    Ready(Challenge),
    AlreadyLoggedIn(LoginOutcome),
    Failed(LoginOutcome),
}

/// Outcome of fetching the login page plus its captcha bitmap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptchaDisplay {
    Ready { challenge: Challenge, image: Vec<u8> },
    AlreadyLoggedIn(LoginOutcome),
    Failed(LoginOutcome),
}

/// Result of a login attempt that refreshes the captcha on failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginAttempt {
    pub outcome: LoginOutcome,
    /// Fresh captcha to show after a failure, if one could be fetched.
    pub next_captcha: Option<Vec<u8>>,
}

/// Authentication state owned by one session.
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    pub is_authenticated: bool,
    pub identity: Option<Identity>,
    pub cached_challenge: Option<Challenge>,
    pub authenticated_at: Option<DateTime<Utc>>,
}

impl SessionState {
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}
