//! Header rewriting and hop-by-hop stripping.
//!
//! [`RewriteRules::apply`] clones the inbound headers, strips hop-by-hop
//! headers (including any named in `Connection`), then renders each
//! configured rewrite in order. A rule that renders empty removes its
//! header, so `Upgrade: $http_upgrade` only reaches the upstream when the
//! client sent one.

use std::sync::LazyLock;

use http::{header, HeaderMap, HeaderName, HeaderValue};

use crate::config::model::HeaderRewrite;
use crate::config::template::{RenderContext, Template};
use crate::error::{ForwarderError, ValidationError};

static HOP_BY_HOP: LazyLock<Vec<HeaderName>> = LazyLock::new(|| {
    [
        "connection",
        "keep-alive",
        "transfer-encoding",
        "te",
        "trailer",
        "upgrade",
        "proxy-authorization",
        "proxy-authenticate",
        "proxy-connection",
    ]
    .iter()
    .filter_map(|name| name.parse::<HeaderName>().ok())
    .collect()
});

/// Comma-separated tokens of every `Connection` header, lowercased.
fn connection_tokens(headers: &HeaderMap) -> Vec<String> {
    headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .map(|t| t.trim().to_ascii_lowercase())
        .filter(|t| !t.is_empty())
        .collect()
}

/// True when the request asks to switch protocols: an `Upgrade` header
/// plus the `upgrade` token in `Connection`.
#[must_use]
pub fn is_upgrade_request(headers: &HeaderMap) -> bool {
    headers.contains_key(header::UPGRADE)
        && connection_tokens(headers).iter().any(|t| t == "upgrade")
}

/// Remove hop-by-hop headers, plus any extra header the `Connection`
/// header declares as connection-specific.
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    for token in connection_tokens(headers) {
        if let Ok(name) = token.parse::<HeaderName>() {
            headers.remove(name);
        }
    }
    for name in HOP_BY_HOP.iter() {
        headers.remove(name);
    }
}

/// Strip hop-by-hop headers from an upstream response.
///
/// A `101 Switching Protocols` response keeps `Upgrade` and `Connection`,
/// which the client needs to complete the handshake.
pub fn strip_response_hop_by_hop(headers: &mut HeaderMap, switching_protocols: bool) {
    if switching_protocols {
        let upgrade = headers.remove(header::UPGRADE);
        let connection = headers.remove(header::CONNECTION);
        strip_hop_by_hop(headers);
        if let Some(upgrade) = upgrade {
            headers.insert(header::UPGRADE, upgrade);
        }
        if let Some(connection) = connection {
            headers.insert(header::CONNECTION, connection);
        }
    } else {
        strip_hop_by_hop(headers);
    }
}

#[derive(Debug, Clone)]
struct CompiledRewrite {
    name: HeaderName,
    template: Template,
}

#[derive(Debug, Clone, Default)]
pub struct RewriteRules {
    rules: Vec<CompiledRewrite>,
}

impl RewriteRules {
    pub fn compile(rewrites: &[HeaderRewrite]) -> Result<Self, ForwarderError> {
        let mut rules = Vec::with_capacity(rewrites.len());
        let mut errors = Vec::new();

        for (i, rewrite) in rewrites.iter().enumerate() {
            let field = format!("route.header_rewrites[{i}]");
            let name = match rewrite.name.parse::<HeaderName>() {
                Ok(name) => name,
                Err(_) => {
                    errors.push(ValidationError {
                        field,
                        message: format!("'{}' is not a valid header name", rewrite.name),
                        suggestion: None,
                    });
                    continue;
                }
            };
            match Template::parse(&rewrite.value) {
                Ok(template) => rules.push(CompiledRewrite { name, template }),
                Err(message) => errors.push(ValidationError {
                    field,
                    message,
                    suggestion: None,
                }),
            }
        }

        if errors.is_empty() {
            Ok(Self { rules })
        } else {
            Err(ForwarderError::ConfigValidation { errors })
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Build the header map sent upstream.
    #[must_use]
    pub fn apply(&self, ctx: &RenderContext<'_>) -> HeaderMap {
        let mut headers = ctx.headers.clone();
        strip_hop_by_hop(&mut headers);

        for rule in &self.rules {
            let rendered = rule.template.render(ctx);
            if rendered.is_empty() {
                headers.remove(&rule.name);
                continue;
            }
            match HeaderValue::from_str(&rendered) {
                Ok(value) => {
                    headers.insert(rule.name.clone(), value);
                }
                Err(_) => {
                    tracing::warn!(
                        header = %rule.name,
                        "rendered header value is not valid, dropping header"
                    );
                    headers.remove(&rule.name);
                }
            }
        }

        headers
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::model::Route;
    use http::Uri;

    fn default_rules() -> RewriteRules {
        RewriteRules::compile(&Route::default().header_rewrites).unwrap()
    }

    fn render(headers: &HeaderMap) -> HeaderMap {
        let uri: Uri = "/ws".parse().unwrap();
        let ctx = RenderContext {
            headers,
            uri: &uri,
            remote_addr: "192.0.2.10".parse().unwrap(),
            server_name: "edge.example",
        };
        default_rules().apply(&ctx)
    }

    #[test]
    fn sets_proxy_headers() {
        let mut original = HeaderMap::new();
        original.insert(header::HOST, "app.example:8080".parse().unwrap());
        original.insert("x-forwarded-for", "203.0.113.5".parse().unwrap());

        let result = render(&original);
        assert_eq!(result.get(header::HOST).unwrap(), "app.example:8080");
        assert_eq!(result.get("x-real-ip").unwrap(), "192.0.2.10");
        assert_eq!(
            result.get("x-forwarded-for").unwrap(),
            "203.0.113.5, 192.0.2.10"
        );
        assert_eq!(result.get("x-forwarded-host").unwrap(), "edge.example");
    }

    #[test]
    fn keeps_end_to_end_headers() {
        let mut original = HeaderMap::new();
        original.insert(header::CONTENT_TYPE, "application/json".parse().unwrap());
        original.insert(header::AUTHORIZATION, "Bearer t".parse().unwrap());

        let result = render(&original);
        assert_eq!(result.get(header::CONTENT_TYPE).unwrap(), "application/json");
        assert_eq!(result.get(header::AUTHORIZATION).unwrap(), "Bearer t");
    }

    #[test]
    fn strips_hop_by_hop_without_upgrade() {
        let mut original = HeaderMap::new();
        original.insert("keep-alive", "timeout=5".parse().unwrap());
        original.insert(header::TE, "trailers".parse().unwrap());
        original.insert(header::TRANSFER_ENCODING, "chunked".parse().unwrap());

        let result = render(&original);
        assert!(result.get("keep-alive").is_none());
        assert!(result.get(header::TE).is_none());
        assert!(result.get(header::TRANSFER_ENCODING).is_none());
        assert!(result.get(header::UPGRADE).is_none());
    }

    #[test]
    fn passes_upgrade_and_connection_through() {
        let mut original = HeaderMap::new();
        original.insert(header::UPGRADE, "websocket".parse().unwrap());
        original.insert(header::CONNECTION, "Upgrade".parse().unwrap());

        let result = render(&original);
        assert_eq!(result.get(header::UPGRADE).unwrap(), "websocket");
        assert_eq!(result.get(header::CONNECTION).unwrap(), "Upgrade");
    }

    #[test]
    fn strips_headers_named_by_connection() {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONNECTION, "close, X-Session-Hop".parse().unwrap());
        headers.insert("x-session-hop", "1".parse().unwrap());
        headers.insert(header::ACCEPT, "*/*".parse().unwrap());

        strip_hop_by_hop(&mut headers);
        assert!(headers.get("x-session-hop").is_none());
        assert!(headers.get(header::CONNECTION).is_none());
        assert!(headers.get(header::ACCEPT).is_some());
    }

    #[test]
    fn detects_upgrade_requests() {
        let mut headers = HeaderMap::new();
        headers.insert(header::UPGRADE, "websocket".parse().unwrap());
        assert!(!is_upgrade_request(&headers));

        headers.insert(header::CONNECTION, "keep-alive, Upgrade".parse().unwrap());
        assert!(is_upgrade_request(&headers));

        headers.remove(header::UPGRADE);
        assert!(!is_upgrade_request(&headers));
    }

    #[test]
    fn response_keeps_upgrade_on_101_only() {
        let mut headers = HeaderMap::new();
        headers.insert(header::UPGRADE, "websocket".parse().unwrap());
        headers.insert(header::CONNECTION, "upgrade".parse().unwrap());
        headers.insert("sec-websocket-accept", "abc".parse().unwrap());

        let mut switching = headers.clone();
        strip_response_hop_by_hop(&mut switching, true);
        assert_eq!(switching.get(header::UPGRADE).unwrap(), "websocket");
        assert_eq!(switching.get(header::CONNECTION).unwrap(), "upgrade");
        assert!(switching.get("sec-websocket-accept").is_some());

        strip_response_hop_by_hop(&mut headers, false);
        assert!(headers.get(header::UPGRADE).is_none());
        assert!(headers.get(header::CONNECTION).is_none());
    }

    #[test]
    fn empty_render_removes_header() {
        let rules = RewriteRules::compile(&[HeaderRewrite {
            name: "x-tenant".into(),
            value: "$http_x_missing".into(),
        }])
        .unwrap();
        let mut original = HeaderMap::new();
        original.insert("x-tenant", "spoofed".parse().unwrap());
        let uri: Uri = "/".parse().unwrap();
        let ctx = RenderContext {
            headers: &original,
            uri: &uri,
            remote_addr: "127.0.0.1".parse().unwrap(),
            server_name: "s",
        };
        assert!(rules.apply(&ctx).get("x-tenant").is_none());
    }

    #[test]
    fn compile_reports_every_bad_rule() {
        let result = RewriteRules::compile(&[
            HeaderRewrite {
                name: "bad name".into(),
                value: "x".into(),
            },
            HeaderRewrite {
                name: "x-ok".into(),
                value: "$bogus".into(),
            },
        ]);
        match result {
            Err(ForwarderError::ConfigValidation { errors }) => assert_eq!(errors.len(), 2),
            other => panic!("expected validation error, got {other:?}"),
        }
    }
}
