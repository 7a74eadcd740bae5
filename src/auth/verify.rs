//! Deciding whether a response proves an authenticated session.

use crate::error::CredentialFailure;
use crate::transport::HttpResponse;
use url::Url;

/// Phrases only rendered for a logged-in user.
pub const LOGGED_IN_PHRASES: &[&str] = &["退出登录", "注销", "安全退出", "个人中心", "欢迎您", "logout"];

pub const CAPTCHA_FAILURE_PHRASES: &[&str] = &["验证码错误", "验证码不正确", "验证码输入错误"];

pub const PASSWORD_FAILURE_PHRASES: &[&str] = &["用户名或密码不正确", "密码错误", "用户名或密码错误"];

/// Whether `url` is the MIS landing page itself.
///
/// Host must be the MIS host, path `/home` or below, and the query must not
/// carry `next`, which marks an intermediate hop that merely points home.
pub fn is_home_url(url: &Url, mis_host: &str) -> bool {
    url.host_str() == Some(mis_host)
        && url.path().starts_with("/home")
        && !url.query_pairs().any(|(key, _)| key == "next")
}

/// Whether the page still shows the CAS login form.
pub fn has_login_form(html: &str) -> bool {
    let password = html.contains(r#"name="password""#) || html.contains(r#"type="password""#);
    password && html.contains(r#"name="loginname""#)
}

pub fn has_logged_in_marker(html: &str) -> bool {
    let lower = html.to_lowercase();
    LOGGED_IN_PHRASES
        .iter()
        .any(|p| lower.contains(&p.to_lowercase()))
}

/// Positive authentication signal from URL, `Location` or body.
pub fn is_authenticated_response(response: &HttpResponse, entry_url: &Url, mis_host: &str) -> bool {
    if is_home_url(&response.final_url, mis_host) {
        return true;
    }
    if let Some(location) = response.location.as_deref() {
        if let Ok(target) = entry_url.join(location) {
            if is_home_url(&target, mis_host) {
                return true;
            }
        }
    }
    let html = response.text();
    !has_login_form(&html) && has_logged_in_marker(&html)
}

/// Known rejection phrases in a login response.
pub fn classify_failure(html: &str) -> Option<CredentialFailure> {
    if CAPTCHA_FAILURE_PHRASES.iter().any(|p| html.contains(p)) {
        Some(CredentialFailure::CaptchaWrong)
    } else if PASSWORD_FAILURE_PHRASES.iter().any(|p| html.contains(p)) {
        Some(CredentialFailure::PasswordWrong)
    } else {
        None
    }
}
