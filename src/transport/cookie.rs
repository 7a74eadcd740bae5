//! Cookie jar over `cookie_store`.
//!
//! Parsing, expiry and domain/path matching follow RFC 6265 as implemented
//! by `cookie_store`. The jar adds a public-suffix check on `Domain` and the
//! session-cookie fingerprint the login flow relies on.

use cookie_store::{CookieStore, RawCookie};
use url::Url;

/// Names that look like a login session or ticket cookie.
pub fn is_session_like(name: &str) -> bool {
    let name = name.to_ascii_lowercase();
    ["session", "ticket", "cas"].iter().any(|k| name.contains(k))
}

/// Cookies received from CAS and MIS.
#[derive(Default)]
pub struct CookieJar {
    store: CookieStore,
}

impl CookieJar {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of unexpired cookies.
    pub fn len(&self) -> usize {
        self.store.iter_unexpired().count()
    }

    /// `(name, value)` of every unexpired cookie.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.store.iter_unexpired().map(|c| (c.name(), c.value()))
    }

    pub fn clear(&mut self) {
        self.store.clear();
    }

    /// Insert or replace a host-only cookie with path `/`.
    pub fn set(&mut self, domain: &str, name: &str, value: &str) {
        match Url::parse(&format!("https://{}/", domain.trim_start_matches('.'))) {
            Ok(origin) => self.store(&origin, &format!("{}={}; Path=/", name, value)),
            Err(e) => tracing::debug!("Cannot seed cookie {} for {}: {}", name, domain, e),
        }
    }

    /// Store one `Set-Cookie` header value received from `origin`.
    pub fn store(&mut self, origin: &Url, header: &str) {
        let mut cookie = match RawCookie::parse(header.to_owned()) {
            Ok(cookie) => cookie,
            Err(e) => {
                tracing::debug!("Ignoring malformed Set-Cookie: {}", e);
                return;
            }
        };

        if let Some(domain) = cookie.domain().map(str::to_ascii_lowercase) {
            if psl::suffix_str(&domain) == Some(domain.as_str()) {
                if origin.host_str() == Some(domain.as_str()) {
                    cookie.unset_domain();
                } else {
                    tracing::debug!(
                        "Ignoring cookie {} scoped to public suffix {}",
                        cookie.name(),
                        domain
                    );
                    return;
                }
            }
        }

        if let Err(e) = self.store.insert_raw(&cookie, origin) {
            tracing::debug!("Cookie {} not stored: {}", cookie.name(), e);
        }
    }

    /// `Cookie` header value for `url`, if any cookie applies.
    pub fn header_for(&self, url: &Url) -> Option<String> {
        let pairs: Vec<String> = self
            .store
            .get_request_values(url)
            .map(|(name, value)| format!("{}={}", name, value))
            .collect();
        if pairs.is_empty() {
            None
        } else {
            Some(pairs.join("; "))
        }
    }

    /// Whether a session-like cookie is visible to any of `hosts`.
    pub fn has_session_cookie(&self, hosts: &[&str]) -> bool {
        let origins: Vec<Url> = hosts
            .iter()
            .filter_map(|h| Url::parse(&format!("https://{}/", h)).ok())
            .collect();
        self.store.iter_unexpired().any(|c| {
            is_session_like(c.name()) && origins.iter().any(|origin| c.domain.matches(origin))
        })
    }
}
