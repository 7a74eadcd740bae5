//! Identity recovery from MIS pages and JSON endpoints.
//!
//! Names are found by an ordered cascade of [`NameRule`]s. Each rule can be
//! scoped to a region of the page and every candidate is checked against a
//! blacklist of navigation labels and site titles before it is accepted.

use crate::error::Result;
use crate::extract::{decode_html_entities, first_capture};
use crate::models::Identity;
use regex::Regex;
use serde_json::Value;
use url::Url;

/// Strings that show up where a name would, but are not names.
pub const NAME_BLACKLIST: &[&str] = &[
    "首页",
    "退出",
    "注销",
    "登录",
    "帮助",
    "设置",
    "个人中心",
    "北京交通大学",
    "管理信息系统",
    "信息门户",
    "统一身份认证",
    "消息",
    "通知",
    "返回",
    "更多",
    "我的",
    "服务大厅",
    "MIS",
    "BJTU",
];

/// One step of the name cascade.
#[derive(Debug, Clone, Copy)]
pub struct NameRule {
    pub name: &'static str,
    /// Narrow the search to the first capture of this pattern.
    pub scope: Option<&'static str>,
    pub pattern: &'static str,
    /// Accept only CJK candidates.
    pub cjk_only: bool,
}

const CARD_SCOPE: &str = r#"(?s)(class="[^"]*name_right.{0,800})"#;

pub const NAME_RULES: &[NameRule] = &[
    NameRule {
        name: "name_right card",
        scope: Some(CARD_SCOPE),
        pattern: r"(?s)<h3[^>]*>\s*<a[^>]*>\s*([^<]+?)\s*</a>",
        cjk_only: false,
    },
    NameRule {
        name: "h3 anchor",
        scope: None,
        pattern: r"(?s)<h3[^>]*>\s*<a[^>]*>\s*([^<]+?)\s*</a>",
        cjk_only: false,
    },
    NameRule {
        name: "greeting",
        scope: None,
        pattern: r"欢迎(?:您)?[，,:：\s]*([\p{Han}A-Za-z·]{2,20})",
        cjk_only: false,
    },
    NameRule {
        name: "name label",
        scope: None,
        pattern: r"姓名\s*[：:]\s*(?:<[^>]+>\s*)*([^<\s]{2,20})",
        cjk_only: false,
    },
    NameRule {
        name: "table row",
        scope: None,
        pattern: r"(?s)<t[hd][^>]*>\s*姓名\s*</t[hd]>\s*<td[^>]*>\s*([^<]+?)\s*</td>",
        cjk_only: false,
    },
    NameRule {
        name: "meta author",
        scope: None,
        pattern: r#"<meta\s+name="author"\s+content="([^"]+)""#,
        cjk_only: false,
    },
    NameRule {
        name: "script json",
        scope: None,
        pattern: r#"["'](?:realname|realName|name|xm)["']\s*:\s*["']([^"']+)["']"#,
        cjk_only: false,
    },
    NameRule {
        name: "header anchor",
        scope: Some(r"(?s)<header[^>]*>(.*?)</header>"),
        pattern: r"<a[^>]*>\s*([^<]+?)\s*</a>",
        cjk_only: true,
    },
    NameRule {
        name: "any anchor",
        scope: None,
        pattern: r"<a[^>]*>\s*([^<]+?)\s*</a>",
        cjk_only: true,
    },
];

const ROLE_LABEL: &str = r"身份\s*[：:]\s*(?:<[^>]+>\s*)*([^<\s]+)";
const DEPARTMENT_LABEL: &str = r"部门\s*[：:]\s*(?:<[^>]+>\s*)*([^<\s]+)";
const STUDENT_ID_LABEL: &str = r"学号\s*[：:]\s*(?:<[^>]+>\s*)*(\d{6,12})";
const DIGIT_RUN: &str = r"(?:^|\D)(\d{6,12})(?:\D|$)";

/// Fields recovered from one page, before reconciliation with the login name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedIdentity {
    pub name: String,
    /// Whatever sat in the id slot; may be a role label rather than digits.
    pub student_id: Option<String>,
    pub major: Option<String>,
    pub college: Option<String>,
}

fn is_cjk_name(candidate: &str) -> bool {
    let count = candidate.chars().count();
    (2..=6).contains(&count)
        && candidate
            .chars()
            .all(|c| ('\u{4e00}'..='\u{9fff}').contains(&c) || c == '·')
}

/// Whether `candidate` can be a person's display name.
pub fn is_plausible_name(candidate: &str) -> bool {
    let count = candidate.chars().count();
    (2..=20).contains(&count)
        && !candidate.chars().all(|c| c.is_ascii_digit())
        && !candidate.contains(['<', '>', '{', '}', '/', '='])
        && !NAME_BLACKLIST.iter().any(|b| candidate.contains(b))
}

fn clean(raw: &str) -> String {
    decode_html_entities(raw.trim()).trim().to_string()
}

/// Run the name cascade over an HTML page.
pub fn parse_identity_html(html: &str) -> Result<Option<ParsedIdentity>> {
    for rule in NAME_RULES {
        let scope = match rule.scope {
            Some(pattern) => match first_capture(html, pattern)? {
                Some(region) => region,
                None => continue,
            },
            None => html.to_string(),
        };

        let re = Regex::new(rule.pattern)?;
        let found = re
            .captures_iter(&scope)
            .filter_map(|c| c.get(1).map(|m| clean(m.as_str())))
            .find(|name| is_plausible_name(name) && (!rule.cjk_only || is_cjk_name(name)));

        if let Some(name) = found {
            tracing::debug!(rule = rule.name, "Identity name matched");
            let (major, college) = if rule.scope == Some(CARD_SCOPE) {
                (
                    first_capture(&scope, ROLE_LABEL)?,
                    first_capture(&scope, DEPARTMENT_LABEL)?,
                )
            } else {
                (None, None)
            };
            return Ok(Some(ParsedIdentity {
                name,
                student_id: extract_student_id(html)?,
                major,
                college,
            }));
        }
    }
    Ok(None)
}

/// Explicit `学号` label, else the first 6-12 digit run.
pub fn extract_student_id(html: &str) -> Result<Option<String>> {
    if let Some(id) = first_capture(html, STUDENT_ID_LABEL)? {
        return Ok(Some(id));
    }
    first_capture(html, DIGIT_RUN)
}

const JSON_NAME_KEYS: &[&str] = &["realname", "realName", "real_name", "name", "xm", "displayName"];
const JSON_ID_KEYS: &[&str] = &[
    "studentId",
    "student_id",
    "studentNo",
    "xh",
    "loginname",
    "username",
    "userId",
    "user_id",
];

fn find_key(value: &Value, keys: &[&str], accept: &dyn Fn(&str) -> bool) -> Option<String> {
    match value {
        Value::Object(map) => {
            for key in keys {
                let hit = match map.get(*key) {
                    Some(Value::String(s)) => Some(s.trim().to_string()),
                    Some(Value::Number(n)) => Some(n.to_string()),
                    _ => None,
                };
                if let Some(hit) = hit.filter(|h| accept(h.as_str())) {
                    return Some(hit);
                }
            }
            map.values().find_map(|v| find_key(v, keys, accept))
        }
        Value::Array(items) => items.iter().find_map(|v| find_key(v, keys, accept)),
        _ => None,
    }
}

/// Search a JSON document for name-like and id-like keys at any depth.
pub fn parse_identity_json(value: &Value) -> Option<ParsedIdentity> {
    let name = find_key(value, JSON_NAME_KEYS, &is_plausible_name)?;
    let student_id = find_key(value, JSON_ID_KEYS, &|s: &str| !s.is_empty());
    Some(ParsedIdentity {
        name,
        student_id,
        major: find_key(value, &["major", "zymc", "role"], &|s: &str| !s.is_empty()),
        college: find_key(value, &["college", "department", "dept", "yxmc"], &|s: &str| !s.is_empty()),
    })
}

/// Parse a response body that may be JSON or HTML.
pub fn parse_identity_body(body: &str) -> Result<Option<ParsedIdentity>> {
    let trimmed = body.trim_start();
    if trimmed.starts_with('{') || trimmed.starts_with('[') {
        if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
            return Ok(parse_identity_json(&value));
        }
    }
    parse_identity_html(body)
}

/// Profile pages guessed when the page links to none.
pub const PROFILE_GUESSES: &[&str] = &[
    "/home/profile/",
    "/accounts/profile/",
    "/user/info/",
    "/student/info/",
];

/// API endpoints guessed in addition to those found in scripts.
pub const API_GUESSES: &[&str] = &[
    "/api/user/info/",
    "/api/userinfo/",
    "/api/student/info/",
    "/accounts/userinfo/",
];

const PROFILE_HREF: &str =
    r#"(?i)href="([^"]*(?:profile|userinfo|user_info|personal|account|myinfo)[^"]*)""#;
const SCRIPT_BODY: &str = r"(?is)<script[^>]*>(.*?)</script>";
const SCRIPT_ENDPOINTS: &[&str] = &[
    r#"fetch\(\s*["'`]([^"'`]+)["'`]"#,
    r#"axios\.(?:get|post)\(\s*["'`]([^"'`]+)["'`]"#,
    r#"["'](/(?:api|user|accounts|student|profile)[^"'\s]*)["']"#,
    r#""url"\s*:\s*"([^"]+)""#,
];

const MAX_PROFILE_LINKS: usize = 8;
const MAX_API_ENDPOINTS: usize = 12;

fn push_same_host(out: &mut Vec<Url>, base: &Url, candidate: &str, limit: usize) {
    if out.len() >= limit {
        return;
    }
    let Ok(url) = base.join(&decode_html_entities(candidate)) else {
        return;
    };
    if url.host_str() == base.host_str() && !out.contains(&url) {
        out.push(url);
    }
}

/// Candidate profile pages: matching anchors first, then fixed guesses.
pub fn discover_profile_links(html: &str, base: &Url) -> Result<Vec<Url>> {
    let mut out = Vec::new();
    let re = Regex::new(PROFILE_HREF)?;
    for caps in re.captures_iter(html) {
        if let Some(href) = caps.get(1) {
            push_same_host(&mut out, base, href.as_str(), MAX_PROFILE_LINKS);
        }
    }
    for guess in PROFILE_GUESSES {
        push_same_host(&mut out, base, guess, MAX_PROFILE_LINKS);
    }
    Ok(out)
}

/// Endpoint literals referenced by inline scripts, then fixed guesses.
pub fn discover_api_endpoints(html: &str, base: &Url) -> Result<Vec<Url>> {
    let mut out = Vec::new();
    let scripts = Regex::new(SCRIPT_BODY)?;
    let patterns = SCRIPT_ENDPOINTS
        .iter()
        .map(|p| Regex::new(p))
        .collect::<std::result::Result<Vec<_>, _>>()?;

    for script in scripts.captures_iter(html).filter_map(|c| c.get(1)) {
        for re in &patterns {
            for caps in re.captures_iter(script.as_str()) {
                if let Some(m) = caps.get(1) {
                    push_same_host(&mut out, base, m.as_str(), MAX_API_ENDPOINTS);
                }
            }
        }
    }
    for guess in API_GUESSES {
        push_same_host(&mut out, base, guess, MAX_API_ENDPOINTS);
    }
    Ok(out)
}

/// Whether a login name is a student/staff number.
pub fn looks_like_student_id(input: &str) -> bool {
    !input.is_empty() && input.chars().all(|c| c.is_ascii_digit())
}

/// Merge the login name with whatever the page revealed.
///
/// A numeric login name is authoritative for `student_id`; the page only
/// contributes the display name and labels. Otherwise a numeric page id is
/// used, and a non-numeric one (a role such as "本科生") becomes `major`.
pub fn reconcile_identity(login_input: &str, parsed: Option<&ParsedIdentity>) -> Identity {
    let login_input = login_input.trim();
    let parsed = parsed.cloned().unwrap_or_default();
    let name = if parsed.name.is_empty() {
        login_input.to_string()
    } else {
        parsed.name
    };

    let (page_id, page_label) = match parsed.student_id {
        Some(id) if looks_like_student_id(&id) => (Some(id), None),
        Some(label) => (None, Some(label)),
        None => (None, None),
    };
    let major = parsed.major.or(page_label);

    let student_id = if looks_like_student_id(login_input) {
        login_input.to_string()
    } else {
        page_id.unwrap_or_else(|| login_input.to_string())
    };

    Identity {
        name,
        student_id,
        major,
        college: parsed.college,
    }
}
