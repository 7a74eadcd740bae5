//! Scripted transport for exercising the session without a network.

use super::{CookieJar, HttpRequest, HttpResponse, Method, Transport};
use crate::error::{CasError, Result};
use std::collections::VecDeque;
use url::Url;

/// One canned response.
#[derive(Debug, Clone, Default)]
pub(crate) struct Reply {
    pub status: u16,
    pub final_url: Option<String>,
    pub location: Option<String>,
    pub body: Vec<u8>,
    pub set_cookies: Vec<String>,
    pub fail: Option<String>,
}

impl Reply {
    pub fn html(body: &str) -> Self {
        Self {
            status: 200,
            body: body.as_bytes().to_vec(),
            ..Self::default()
        }
    }

    pub fn bytes(body: Vec<u8>) -> Self {
        Self {
            status: 200,
            body,
            ..Self::default()
        }
    }

    pub fn redirect(location: &str) -> Self {
        Self {
            status: 302,
            location: Some(location.to_string()),
            ..Self::default()
        }
    }

    pub fn status(status: u16) -> Self {
        Self {
            status,
            ..Self::default()
        }
    }

    pub fn error(message: &str) -> Self {
        Self {
            fail: Some(message.to_string()),
            ..Self::default()
        }
    }

    /// Pretend the redirect chain settled on `url`.
    pub fn at(mut self, url: &str) -> Self {
        self.final_url = Some(url.to_string());
        self
    }

    pub fn cookie(mut self, set_cookie: &str) -> Self {
        self.set_cookies.push(set_cookie.to_string());
        self
    }
}

struct Route {
    method: Method,
    prefix: String,
    replies: VecDeque<Reply>,
}

/// Matches requests by method and URL prefix; the last reply of a route
/// repeats once the queue drains. Unrouted requests get a 404.
#[derive(Default)]
pub(crate) struct MockTransport {
    jar: CookieJar,
    routes: Vec<Route>,
    pub requests: Vec<HttpRequest>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(mut self, method: Method, prefix: &str, reply: Reply) -> Self {
        if let Some(route) = self
            .routes
            .iter_mut()
            .find(|r| r.method == method && r.prefix == prefix)
        {
            route.replies.push_back(reply);
        } else {
            self.routes.push(Route {
                method,
                prefix: prefix.to_string(),
                replies: VecDeque::from([reply]),
            });
        }
        self
    }

    pub fn get(self, prefix: &str, reply: Reply) -> Self {
        self.on(Method::Get, prefix, reply)
    }

    pub fn post(self, prefix: &str, reply: Reply) -> Self {
        self.on(Method::Post, prefix, reply)
    }

    pub fn requests_to(&self, method: Method, prefix: &str) -> Vec<&HttpRequest> {
        self.requests
            .iter()
            .filter(|r| r.method == method && r.url.as_str().starts_with(prefix))
            .collect()
    }

    fn next_reply(&mut self, request: &HttpRequest) -> Option<Reply> {
        // Longest prefix wins so specific routes can shadow broad ones.
        let route = self
            .routes
            .iter_mut()
            .filter(|r| r.method == request.method && request.url.as_str().starts_with(&r.prefix))
            .max_by_key(|r| r.prefix.len())?;
        if route.replies.len() > 1 {
            route.replies.pop_front()
        } else {
            route.replies.front().cloned()
        }
    }
}

impl Transport for MockTransport {
    async fn execute(&mut self, request: HttpRequest) -> Result<HttpResponse> {
        self.requests.push(request.clone());
        let Some(reply) = self.next_reply(&request) else {
            return Ok(HttpResponse {
                status: 404,
                final_url: request.url,
                location: None,
                body: Vec::new(),
            });
        };
        if let Some(message) = reply.fail {
            return Err(CasError::Transport(message));
        }

        let final_url = match &reply.final_url {
            Some(url) => Url::parse(url)?,
            None => request.url.clone(),
        };
        for cookie in &reply.set_cookies {
            self.jar.store(&final_url, cookie);
        }
        Ok(HttpResponse {
            status: reply.status,
            final_url,
            location: reply.location,
            body: reply.body,
        })
    }

    fn cookie_jar(&self) -> &CookieJar {
        &self.jar
    }

    fn cookie_jar_mut(&mut self) -> &mut CookieJar {
        &mut self.jar
    }
}
