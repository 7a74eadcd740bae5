//! Best-effort completion of a truncated SSO handshake.
//!
//! CAS sometimes sets its session cookie but stops the redirect chain short
//! of MIS. The chain below re-drives the callback and probes pages and
//! endpoints that may carry the user's identity. Every fetch is read-only and
//! strictly sequential; failures of individual probes are logged and skipped.

use super::verify::is_authenticated_response;
use crate::config::CasConfig;
use crate::error::Result;
use crate::identity::{
    discover_api_endpoints, discover_profile_links, parse_identity_body, ParsedIdentity,
};
use crate::transport::{HttpRequest, HttpResponse, Transport};
use url::Url;

/// What the chain found.
#[derive(Debug, Clone, Default)]
pub struct ChainReport {
    pub identity: Option<ParsedIdentity>,
    /// Some fetched page passed the authenticated-response check.
    pub confirmed: bool,
    /// Body of the last page fetched successfully.
    pub last_html: Option<String>,
}

pub(crate) struct CompletionChain<'a, T> {
    transport: &'a mut T,
    config: &'a CasConfig,
    entry_url: Url,
    home_url: Url,
    module_url: Url,
    mis_base: Url,
    report: ChainReport,
}

impl<'a, T: Transport> CompletionChain<'a, T> {
    pub(crate) fn new(transport: &'a mut T, config: &'a CasConfig) -> Result<Self> {
        let endpoints = &config.endpoints;
        Ok(Self {
            entry_url: endpoints.entry_url()?,
            home_url: endpoints.home_url()?,
            module_url: endpoints.module_url()?,
            mis_base: endpoints.mis_base()?,
            transport,
            config,
            report: ChainReport::default(),
        })
    }

    /// Run up to `fallback_attempts` rounds, stopping at the first identity.
    ///
    /// `next_url` is the SSO authorize URL from the login page, if any.
    pub(crate) async fn run(mut self, next_url: Option<&Url>) -> ChainReport {
        let attempts = self.config.fallback_attempts.max(1);
        for attempt in 1..=attempts {
            if attempt > 1 {
                tokio::time::sleep(self.config.fallback_delay).await;
            }
            tracing::debug!(attempt, "SSO completion attempt");
            if let Some(identity) = self.attempt(next_url).await {
                tracing::info!(attempt, "Identity recovered by SSO completion");
                self.report.identity = Some(identity);
                return self.report;
            }
        }
        tracing::warn!(
            confirmed = self.report.confirmed,
            "SSO completion found no identity"
        );
        self.report
    }

    async fn attempt(&mut self, next_url: Option<&Url>) -> Option<ParsedIdentity> {
        if let Some(url) = next_url {
            if let Some(identity) = self.authorize_step(url).await {
                return Some(identity);
            }
        }
        if let Some(identity) = self.probe(HttpRequest::get(self.home_url.clone())).await {
            return Some(identity);
        }
        if let Some(identity) = self.module_step().await {
            return Some(identity);
        }
        self.api_step().await
    }

    /// Authorize URL, then its hop back through MIS's SSO endpoint, then MIS.
    async fn authorize_step(&mut self, next_url: &Url) -> Option<ParsedIdentity> {
        let first = self
            .fetch(HttpRequest::get(next_url.clone()).no_redirect())
            .await?;
        let Some(target) = first.resolved_location() else {
            return self.inspect(&first);
        };
        if !self.is_sso_endpoint(&target) {
            tracing::debug!(location = %target, "Authorize did not return to SSO");
            return None;
        }

        let second = self.fetch(HttpRequest::get(target).no_redirect()).await?;
        let Some(target) = second.resolved_location() else {
            return self.inspect(&second);
        };
        if target.host_str() != Some(self.config.endpoints.mis_host.as_str()) {
            return None;
        }

        let third = self.fetch(HttpRequest::get(target)).await?;
        self.inspect(&third)
    }

    async fn module_step(&mut self) -> Option<ParsedIdentity> {
        let module = self.fetch(HttpRequest::get(self.module_url.clone())).await?;
        if let Some(identity) = self.inspect(&module) {
            return Some(identity);
        }

        let links = discover_profile_links(&module.text(), &self.mis_base).unwrap_or_else(|e| {
            tracing::debug!("Profile link discovery failed: {}", e);
            Vec::new()
        });
        for link in links {
            if let Some(identity) = self.probe(HttpRequest::get(link)).await {
                return Some(identity);
            }
        }
        None
    }

    async fn api_step(&mut self) -> Option<ParsedIdentity> {
        let html = self.report.last_html.clone().unwrap_or_default();
        let endpoints = discover_api_endpoints(&html, &self.mis_base).unwrap_or_else(|e| {
            tracing::debug!("API endpoint discovery failed: {}", e);
            Vec::new()
        });
        for url in endpoints {
            let request = HttpRequest::get(url)
                .header("Accept", "application/json, text/html;q=0.9")
                .header("X-Requested-With", "XMLHttpRequest");
            if let Some(identity) = self.probe(request).await {
                return Some(identity);
            }
        }
        None
    }

    fn is_sso_endpoint(&self, url: &Url) -> bool {
        url.host_str() == Some(self.config.endpoints.mis_host.as_str())
            && url.path().starts_with("/auth/")
    }

    async fn probe(&mut self, request: HttpRequest) -> Option<ParsedIdentity> {
        let response = self.fetch(request).await?;
        self.inspect(&response)
    }

    async fn fetch(&mut self, request: HttpRequest) -> Option<HttpResponse> {
        let url = request.url.clone();
        match self.transport.execute(request).await {
            Ok(response) => {
                tracing::debug!(%url, status = response.status, "Fallback fetch");
                if is_authenticated_response(
                    &response,
                    &self.entry_url,
                    &self.config.endpoints.mis_host,
                ) {
                    self.report.confirmed = true;
                }
                Some(response)
            }
            Err(e) => {
                tracing::debug!(%url, "Fallback fetch failed: {}", e);
                None
            }
        }
    }

    fn inspect(&mut self, response: &HttpResponse) -> Option<ParsedIdentity> {
        if !(200..300).contains(&response.status) {
            return None;
        }
        let body = response.text();
        let parsed = parse_identity_body(&body).unwrap_or_else(|e| {
            tracing::debug!("Identity parse failed: {}", e);
            None
        });
        self.report.last_html = Some(body);
        parsed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::mock::{MockTransport, Reply};
    use crate::transport::Method;

    const HOME: &str = "https://mis.bjtu.edu.cn/home/";
    const MODULE: &str = "https://mis.bjtu.edu.cn/module/module/10/";

    fn config() -> CasConfig {
        CasConfig::without_delays()
    }

    #[tokio::test]
    async fn test_identity_from_home_page() {
        let card = r#"<div class="name_right"><h3><a href="/home/">张三</a></h3>
            <p>身份：本科生</p><p>部门：计算机学院</p></div>"#;
        let mut transport = MockTransport::new().get(HOME, Reply::html(card));
        let config = config();

        let report = CompletionChain::new(&mut transport, &config)
            .unwrap()
            .run(None)
            .await;

        let identity = report.identity.unwrap();
        assert_eq!(identity.name, "张三");
        assert_eq!(identity.college.as_deref(), Some("计算机学院"));
        assert!(report.confirmed);
        assert_eq!(transport.requests.len(), 1);
    }

    #[tokio::test]
    async fn test_authorize_hop_back_through_sso() {
        let authorize = "https://cas.bjtu.edu.cn/o/authorize/?client_id=mis";
        let mut transport = MockTransport::new()
            .get(
                authorize,
                Reply::redirect("https://mis.bjtu.edu.cn/auth/callback/?code=xyz"),
            )
            .get(
                "https://mis.bjtu.edu.cn/auth/callback/",
                Reply::redirect("/home/"),
            )
            .get(
                HOME,
                Reply::html(r#"<p>欢迎您，李四</p><p>学号：21301234</p>"#),
            );
        let config = config();
        let next = Url::parse(authorize).unwrap();

        let report = CompletionChain::new(&mut transport, &config)
            .unwrap()
            .run(Some(&next))
            .await;

        let identity = report.identity.unwrap();
        assert_eq!(identity.name, "李四");
        assert_eq!(identity.student_id.as_deref(), Some("21301234"));
        assert!(!transport.requests[0].follow_redirects);
        assert!(!transport.requests[1].follow_redirects);
        assert!(transport.requests[2].follow_redirects);
    }

    #[tokio::test]
    async fn test_identity_from_script_endpoint() {
        let module = r#"<html><script>
            fetch("/api/me/").then(r => r.json());
        </script></html>"#;
        let mut transport = MockTransport::new()
            .get(HOME, Reply::html("<p>加载中</p>"))
            .get("https://mis.bjtu.edu.cn/home/profile/", Reply::status(404))
            .get(MODULE, Reply::html(module))
            .get(
                "https://mis.bjtu.edu.cn/api/me/",
                Reply::html(r#"{"data":{"realName":"王五","studentNo":"20251234"}}"#),
            );
        let config = config();

        let report = CompletionChain::new(&mut transport, &config)
            .unwrap()
            .run(None)
            .await;

        let identity = report.identity.unwrap();
        assert_eq!(identity.name, "王五");
        assert_eq!(identity.student_id.as_deref(), Some("20251234"));
        let api = transport.requests_to(Method::Get, "https://mis.bjtu.edu.cn/api/me/");
        assert_eq!(api.len(), 1);
    }

    #[tokio::test]
    async fn test_chain_may_legitimately_find_nothing() {
        let mut transport = MockTransport::new().get(HOME, Reply::html("<p>加载中</p>"));
        let mut config = config();
        config.fallback_attempts = 2;

        let report = CompletionChain::new(&mut transport, &config)
            .unwrap()
            .run(None)
            .await;

        // Home is reachable, so the session is confirmed without a name.
        assert!(report.identity.is_none());
        assert!(report.confirmed);
        let home_probes = transport
            .requests
            .iter()
            .filter(|r| r.url.as_str() == HOME)
            .count();
        assert_eq!(home_probes, 2);
    }

    #[tokio::test]
    async fn test_network_errors_are_skipped() {
        let mut transport = MockTransport::new()
            .get(HOME, Reply::error("connection reset"))
            .get(MODULE, Reply::html(r#"<table><tr><th>姓名</th><td>赵六</td></tr></table>"#));
        let config = config();

        let report = CompletionChain::new(&mut transport, &config)
            .unwrap()
            .run(None)
            .await;

        assert_eq!(report.identity.unwrap().name, "赵六");
    }
}
