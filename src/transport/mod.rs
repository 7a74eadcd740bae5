//! HTTP transport seam.
//!
//! The session drives every request through [`Transport`], which owns the
//! cookie jar and redirect handling. [`RquestTransport`] is the production
//! implementation; tests script responses instead.

mod cookie;
mod http;

#[cfg(test)]
pub(crate) mod mock;

pub use cookie::{is_session_like, CookieJar};
pub use http::RquestTransport;

use crate::error::Result;
use url::Url;

/// HTTP method subset used against CAS and MIS.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
        }
    }
}

/// Outgoing request. Cookies are attached by the transport.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: Url,
    pub headers: Vec<(String, String)>,
    pub body: Option<Vec<u8>>,
    pub follow_redirects: bool,
}

impl HttpRequest {
    pub fn get(url: Url) -> Self {
        Self {
            method: Method::Get,
            url,
            headers: Vec::new(),
            body: None,
            follow_redirects: true,
        }
    }

    /// Form POST with an already-encoded body.
    pub fn post_form(url: Url, body: String) -> Self {
        Self {
            method: Method::Post,
            url,
            headers: vec![(
                "Content-Type".into(),
                "application/x-www-form-urlencoded".into(),
            )],
            body: Some(body.into_bytes()),
            follow_redirects: true,
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Return the first response without following `Location`.
    pub fn no_redirect(mut self) -> Self {
        self.follow_redirects = false;
        self
    }
}

/// Response after the redirect chain (if followed) has settled.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    /// URL of the last hop actually fetched.
    pub final_url: Url,
    /// `Location` of the last hop when it was not followed.
    pub location: Option<String>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn is_redirect(&self) -> bool {
        (300..400).contains(&self.status) && self.location.is_some()
    }

    /// `Location` resolved against the URL that produced it.
    pub fn resolved_location(&self) -> Option<Url> {
        self.location
            .as_deref()
            .and_then(|loc| self.final_url.join(loc).ok())
    }
}

/// HTTP client with cookie persistence.
#[allow(async_fn_in_trait)]
pub trait Transport {
    /// Execute a request, storing every `Set-Cookie` seen along the way.
    async fn execute(&mut self, request: HttpRequest) -> Result<HttpResponse>;

    fn cookie_jar(&self) -> &CookieJar;

    fn cookie_jar_mut(&mut self) -> &mut CookieJar;
}

/// Encode pairs as `application/x-www-form-urlencoded`.
///
/// Unreserved characters pass through, spaces become `+`.
pub fn encode_form(pairs: &[(&str, &str)]) -> String {
    pairs
        .iter()
        .map(|(k, v)| format!("{}={}", form_component(k), form_component(v)))
        .collect::<Vec<_>>()
        .join("&")
}

fn form_component(value: &str) -> String {
    urlencoding::encode(value).replace("%20", "+")
}
