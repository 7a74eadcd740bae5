//! Endpoints and tunables for a CAS session.

use crate::error::Result;
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

/// Fixed user agent sent with every request.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X) \
     AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.0 Mobile/15E148 Safari/604.1";

/// Host pair for the SSO provider (CAS) and the downstream system (MIS).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub cas_host: String,
    pub mis_host: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            cas_host: "cas.bjtu.edu.cn".into(),
            mis_host: "mis.bjtu.edu.cn".into(),
        }
    }
}

impl Endpoints {
    fn https(host: &str, path: &str) -> Result<Url> {
        Ok(Url::parse(&format!("https://{}{}", host, path))?)
    }

    /// `https://<mis>/auth/sso/?next=/`
    pub fn entry_url(&self) -> Result<Url> {
        Self::https(&self.mis_host, "/auth/sso/?next=/")
    }

    /// `https://<mis>/home/`
    pub fn home_url(&self) -> Result<Url> {
        Self::https(&self.mis_host, "/home/")
    }

    /// Secondary page that also renders the user card.
    pub fn module_url(&self) -> Result<Url> {
        Self::https(&self.mis_host, "/module/module/10/")
    }

    pub fn mis_base(&self) -> Result<Url> {
        Self::https(&self.mis_host, "/")
    }

    pub fn cas_base(&self) -> Result<Url> {
        Self::https(&self.cas_host, "/")
    }

    /// `https://<cas>` with no trailing slash, used as the `Origin` header.
    pub fn cas_origin(&self) -> String {
        format!("https://{}", self.cas_host)
    }

    /// `https://<cas>/auth/login/?next=<next_path>`
    pub fn login_url(&self, next_path: &str) -> Result<Url> {
        let mut url = Self::https(&self.cas_host, "/auth/login/")?;
        url.query_pairs_mut().append_pair("next", next_path);
        Ok(url)
    }

    /// `https://<cas>/image/<captcha_id>/`
    pub fn captcha_image_url(&self, captcha_id: &str) -> Result<Url> {
        Self::https(&self.cas_host, &format!("/image/{}/", captcha_id))
    }
}

/// Tunables for one session. Defaults target the BJTU deployment.
#[derive(Debug, Clone)]
pub struct CasConfig {
    pub endpoints: Endpoints,
    pub user_agent: String,
    pub accept_language: String,
    /// Cookie seeded on the CAS host before the first request.
    pub language_cookie: (String, String),
    pub max_redirects: usize,
    /// Redirect targets that are never followed (localization loop).
    pub blocked_redirect_paths: Vec<String>,
    pub cookie_poll_attempts: u32,
    pub cookie_poll_delay: Duration,
    pub fallback_attempts: u32,
    pub fallback_delay: Duration,
    pub beam_width: usize,
    pub beam_top_k: usize,
}

impl Default for CasConfig {
    fn default() -> Self {
        Self {
            endpoints: Endpoints::default(),
            user_agent: DEFAULT_USER_AGENT.into(),
            accept_language: "zh-CN,zh;q=0.9".into(),
            language_cookie: ("django_language".into(), "zh-hans".into()),
            max_redirects: 10,
            blocked_redirect_paths: vec!["/i18n/setlang/".into()],
            cookie_poll_attempts: 3,
            cookie_poll_delay: Duration::from_millis(500),
            fallback_attempts: 4,
            fallback_delay: Duration::from_millis(800),
            beam_width: 30,
            beam_top_k: 4,
        }
    }
}

impl CasConfig {
    /// Config with every wait set to zero.
    pub fn without_delays() -> Self {
        Self {
            cookie_poll_delay: Duration::ZERO,
            fallback_delay: Duration::ZERO,
            ..Self::default()
        }
    }

    /// Whether a redirect target must not be followed.
    pub fn is_blocked_redirect(&self, url: &Url) -> bool {
        self.blocked_redirect_paths
            .iter()
            .any(|p| url.path().starts_with(p.as_str()))
    }
}

/// Default location of the captcha model file.
pub fn default_model_path() -> PathBuf {
    directories::ProjectDirs::from("cn.edu", "bjtu", "bjtu-cas")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from(".data"))
        .join("captcha.onnx")
}
