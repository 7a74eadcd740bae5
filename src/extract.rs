//! Regex-based token extraction from CAS login pages.
//!
//! Every multi-pattern field is an ordered rule list; the first pattern
//! whose first capture group matches wins.

use crate::config::Endpoints;
use crate::error::{CasError, Result};
use crate::models::Challenge;
use regex::Regex;
use url::Url;

/// Hidden captcha field, then the `<img src>`, then any bare `image/<id>/`.
pub const CAPTCHA_ID_RULES: &[&str] = &[
    r#"(?:id|name)="(?:id_)?captcha_0"[^>]*value="([^"]+)""#,
    r#"value="([^"]+)"[^>]*(?:id|name)="(?:id_)?captcha_0""#,
    r#"<img[^>]*src="[^"]*/image/([A-Za-z0-9]+)/?""#,
    r#"image/([A-Za-z0-9]+)/"#,
];

pub const CSRF_RULES: &[&str] = &[
    r#"name="csrfmiddlewaretoken"[^>]*value="([^"]+)""#,
    r#"value="([^"]+)"[^>]*name="csrfmiddlewaretoken""#,
];

pub const NEXT_RULES: &[&str] = &[
    r#"name="next"[^>]*value="([^"]*)""#,
    r#"value="([^"]*)"[^>]*name="next""#,
];

pub const FORM_ACTION_RULES: &[&str] = &[r#"<form[^>]*action="([^"]*)""#];

/// Path used when the login page carries no `next` field.
pub const DEFAULT_NEXT_PATH: &str = "/home/";

/// First capture group of `pattern` in `html`.
pub fn first_capture(html: &str, pattern: &str) -> Result<Option<String>> {
    let re = Regex::new(pattern)?;
    Ok(re
        .captures(html)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string()))
}

/// Try `rules` in order and return the first non-empty capture.
pub fn first_match(html: &str, rules: &[&str]) -> Result<Option<String>> {
    for pattern in rules {
        if let Some(value) = first_capture(html, pattern)?.filter(|v| !v.trim().is_empty()) {
            return Ok(Some(value));
        }
    }
    Ok(None)
}

/// Decode the handful of entities Django emits in attribute values.
pub fn decode_html_entities(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        rest = &rest[amp..];
        let Some(semi) = rest.find(';').filter(|&i| i <= 10) else {
            out.push('&');
            rest = &rest[1..];
            continue;
        };
        let entity = &rest[1..semi];
        let decoded = match entity {
            "amp" => Some('&'),
            "lt" => Some('<'),
            "gt" => Some('>'),
            "quot" => Some('"'),
            "apos" => Some('\''),
            _ => entity
                .strip_prefix("#x")
                .or_else(|| entity.strip_prefix("#X"))
                .and_then(|hex| u32::from_str_radix(hex, 16).ok())
                .or_else(|| entity.strip_prefix('#').and_then(|d| d.parse().ok()))
                .and_then(char::from_u32),
        };
        match decoded {
            Some(c) => {
                out.push(c);
                rest = &rest[semi + 1..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

pub fn extract_captcha_id(html: &str) -> Result<Option<String>> {
    first_match(html, CAPTCHA_ID_RULES)
}

pub fn extract_csrf_token(html: &str) -> Result<Option<String>> {
    first_match(html, CSRF_RULES)
}

pub fn extract_next_path(html: &str) -> Result<String> {
    Ok(first_match(html, NEXT_RULES)?
        .map(|v| decode_html_entities(&v))
        .unwrap_or_else(|| DEFAULT_NEXT_PATH.to_string()))
}

/// Pick the URL the login form must be posted to.
///
/// The settled URL of the redirect chain already carries the query the
/// server expects, so it is preferred when it is on the CAS host. The form
/// `action` (relative to CAS) comes next, the entry URL last.
pub fn resolve_login_url(
    html: &str,
    final_url: &Url,
    entry_url: &Url,
    endpoints: &Endpoints,
) -> Result<Url> {
    if final_url.host_str() == Some(endpoints.cas_host.as_str()) {
        return Ok(final_url.clone());
    }
    if let Some(action) = first_match(html, FORM_ACTION_RULES)? {
        let action = decode_html_entities(&action);
        if let Ok(url) = endpoints.cas_base()?.join(&action) {
            return Ok(url);
        }
    }
    Ok(entry_url.clone())
}

/// Parse one rendering of the login page into a [`Challenge`].
pub fn parse_challenge(
    html: &str,
    final_url: &Url,
    entry_url: &Url,
    endpoints: &Endpoints,
) -> Result<Challenge> {
    let captcha_id = extract_captcha_id(html)?.ok_or(CasError::MissingToken("captcha id"))?;
    let csrf_token = extract_csrf_token(html)?.ok_or(CasError::MissingToken("CSRF token"))?;
    let next_path = extract_next_path(html)?;
    let login_url = resolve_login_url(html, final_url, entry_url, endpoints)?;
    let captcha_image_url = endpoints.captcha_image_url(&captcha_id)?;

    tracing::debug!(
        captcha_id = %captcha_id,
        next_path = %next_path,
        login_url = %login_url,
        "Parsed login challenge"
    );

    Ok(Challenge {
        captcha_id,
        csrf_token,
        next_path,
        login_url,
        captcha_image_url,
    })
}
