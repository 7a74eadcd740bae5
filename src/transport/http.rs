//! rquest-backed transport with manual redirect and cookie handling.

use super::{CookieJar, HttpRequest, HttpResponse, Method, Transport};
use crate::config::CasConfig;
use crate::error::{CasError, Result};
use rquest::header::{LOCATION, SET_COOKIE};
use rquest::{Client, Proxy};
use std::net::IpAddr;
use url::Url;

/// One exchange on the wire; `Location` is reported, never followed.
#[derive(Debug, Clone, Default)]
pub(crate) struct Hop {
    pub status: u16,
    pub location: Option<String>,
    pub set_cookies: Vec<String>,
    pub body: Vec<u8>,
}

/// Sends exactly one request.
#[allow(async_fn_in_trait)]
pub(crate) trait SendOnce {
    async fn send_once(
        &mut self,
        method: Method,
        url: &Url,
        headers: &[(String, String)],
        body: Option<&[u8]>,
    ) -> Result<Hop>;
}

struct Wire {
    client: Client,
    user_agent: String,
    accept_language: String,
}

impl SendOnce for Wire {
    async fn send_once(
        &mut self,
        method: Method,
        url: &Url,
        headers: &[(String, String)],
        body: Option<&[u8]>,
    ) -> Result<Hop> {
        let mut request = match method {
            Method::Get => self.client.get(url.as_str()),
            Method::Post => self.client.post(url.as_str()),
        }
        .redirect(rquest::redirect::Policy::none())
        .header("User-Agent", self.user_agent.as_str())
        .header("Accept-Language", self.accept_language.as_str());

        for (name, value) in headers {
            request = request.header(name.as_str(), value.as_str());
        }
        if let Some(body) = body {
            request = request.body(body.to_vec());
        }

        let response = request.send().await?;
        let status = response.status().as_u16();
        let set_cookies = response
            .headers()
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .map(String::from)
            .collect();
        let location = response
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(String::from);

        let bytes = response.bytes().await?;
        Ok(Hop {
            status,
            location,
            set_cookies,
            body: bytes.to_vec(),
        })
    }
}

/// Production transport.
///
/// Automatic redirects are disabled per request so that every hop's
/// `Set-Cookie` lands in our jar and blocked targets can be detected.
pub struct RquestTransport {
    wire: Wire,
    jar: CookieJar,
    config: CasConfig,
}

impl RquestTransport {
    pub fn new(config: &CasConfig) -> Result<Self> {
        Self::with_options(config, None, None)
    }

    /// Build with an optional HTTP/SOCKS5 proxy and local bind address.
    pub fn with_options(
        config: &CasConfig,
        proxy: Option<&str>,
        local_address: Option<IpAddr>,
    ) -> Result<Self> {
        let mut builder = Client::builder();

        if let Some(addr) = local_address {
            builder = builder.local_address(addr);
        }

        if let Some(proxy_url) = proxy {
            builder = builder.proxy(Proxy::all(proxy_url)?);
        }

        Ok(Self {
            wire: Wire {
                client: builder.build()?,
                user_agent: config.user_agent.clone(),
                accept_language: config.accept_language.clone(),
            },
            jar: CookieJar::new(),
            config: config.clone(),
        })
    }
}

impl Transport for RquestTransport {
    async fn execute(&mut self, request: HttpRequest) -> Result<HttpResponse> {
        follow(&mut self.wire, &mut self.jar, &self.config, request).await
    }

    fn cookie_jar(&self) -> &CookieJar {
        &self.jar
    }

    fn cookie_jar_mut(&mut self) -> &mut CookieJar {
        &mut self.jar
    }
}

/// Drive `request` through its redirect chain one hop at a time.
///
/// Cookies from the jar go out on every hop and every `Set-Cookie` is
/// stored against the URL that sent it.
pub(crate) async fn follow<S: SendOnce>(
    wire: &mut S,
    jar: &mut CookieJar,
    config: &CasConfig,
    request: HttpRequest,
) -> Result<HttpResponse> {
    let HttpRequest {
        mut method,
        mut url,
        mut headers,
        mut body,
        follow_redirects,
    } = request;

    for hop in 0..=config.max_redirects {
        tracing::debug!("{} {} (hop {})", method.as_str(), url, hop);
        let mut sent = headers.clone();
        if let Some(cookie) = jar.header_for(&url) {
            sent.push(("Cookie".into(), cookie));
        }
        let Hop {
            status,
            location,
            set_cookies,
            body: bytes,
        } = wire.send_once(method, &url, &sent, body.as_deref()).await?;

        for raw in &set_cookies {
            jar.store(&url, raw);
        }

        let redirect = (300..400).contains(&status) && follow_redirects;
        let next = match &location {
            Some(loc) if redirect => Some(url.join(loc)?),
            _ => None,
        };
        let Some(next) = next.filter(|n| !config.is_blocked_redirect(n)) else {
            if redirect && location.is_some() {
                tracing::warn!("Stopped at blocked redirect from {}", url);
            }
            return Ok(HttpResponse {
                status,
                final_url: url,
                location,
                body: bytes,
            });
        };

        // 301/302/303 turn a POST into a bodiless GET, as browsers do.
        if method == Method::Post && status != 307 && status != 308 {
            method = Method::Get;
            body = None;
            headers.retain(|(name, _)| !name.eq_ignore_ascii_case("Content-Type"));
        }
        // A pinned Host only belongs to the host it was set for.
        if next.host_str() != url.host_str() {
            headers.retain(|(name, _)| !name.eq_ignore_ascii_case("Host"));
        }
        url = next;
    }

    Err(CasError::RedirectLoop(url.to_string()))
}
