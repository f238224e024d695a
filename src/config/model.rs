//! Serde data structures for the forwarder configuration file.
//!
//! Contains [`Config`] (the root), [`Route`] (the single upstream route)
//! and [`HeaderRewrite`]. Every field has a default, so an empty file or
//! no file at all yields a working proxy: port 80 forwarding to
//! `web:5000` with a 100 MiB body ceiling.

use serde::{Deserialize, Serialize};

use super::size::ByteSize;

pub const DEFAULT_UPSTREAM: &str = "web:5000";

fn default_server_name() -> String {
    "localhost".to_string()
}

fn default_listen_host() -> String {
    "0.0.0.0".to_string()
}

const fn default_listen_port() -> u16 {
    80
}

fn default_upstream() -> String {
    DEFAULT_UPSTREAM.to_string()
}

const fn default_max_body() -> ByteSize {
    ByteSize::mib(100)
}

const fn default_connect_timeout() -> u64 {
    60_000
}

fn default_header_rewrites() -> Vec<HeaderRewrite> {
    [
        ("Host", "$host"),
        ("X-Real-IP", "$remote_addr"),
        ("X-Forwarded-For", "$proxy_add_x_forwarded_for"),
        ("X-Forwarded-Host", "$server_name"),
        ("Upgrade", "$http_upgrade"),
        ("Connection", "$http_connection"),
    ]
    .into_iter()
    .map(|(name, value)| HeaderRewrite {
        name: name.into(),
        value: value.into(),
    })
    .collect()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// The proxy's own name, exposed to templates as `$server_name`.
    #[serde(default = "default_server_name")]
    pub server_name: String,

    /// Path answered locally with a JSON health report. Unset means every
    /// path is forwarded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub health_path: Option<String>,

    #[serde(default)]
    pub route: Route,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_name: default_server_name(),
            health_path: None,
            route: Route::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Route {
    #[serde(default = "default_listen_host")]
    pub listen_host: String,

    #[serde(default = "default_listen_port")]
    pub listen_port: u16,

    /// `host:port`, optionally prefixed with `http://` or `https://`.
    #[serde(default = "default_upstream")]
    pub upstream: String,

    #[serde(default = "default_max_body")]
    pub max_body_bytes: ByteSize,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_ms: u64,

    /// Applied in order after hop-by-hop headers are stripped.
    #[serde(default = "default_header_rewrites")]
    pub header_rewrites: Vec<HeaderRewrite>,
}

impl Default for Route {
    fn default() -> Self {
        Self {
            listen_host: default_listen_host(),
            listen_port: default_listen_port(),
            upstream: default_upstream(),
            max_body_bytes: default_max_body(),
            connect_timeout_ms: default_connect_timeout(),
            header_rewrites: default_header_rewrites(),
        }
    }
}

impl Route {
    /// The upstream as an absolute URL; a bare `host:port` means `http`.
    pub fn upstream_url(&self) -> Result<url::Url, url::ParseError> {
        if self.upstream.contains("://") {
            url::Url::parse(&self.upstream)
        } else {
            url::Url::parse(&format!("http://{}", self.upstream))
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct HeaderRewrite {
    pub name: String,
    pub value: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_deployment() {
        let config = Config::default();
        assert_eq!(config.server_name, "localhost");
        assert_eq!(config.route.listen_port, 80);
        assert_eq!(config.route.upstream, "web:5000");
        assert_eq!(config.route.max_body_bytes.as_u64(), 104_857_600);
        assert!(config.health_path.is_none());
    }

    #[test]
    fn default_rewrites_are_ordered() {
        let names: Vec<_> = Route::default()
            .header_rewrites
            .into_iter()
            .map(|r| r.name)
            .collect();
        assert_eq!(
            names,
            [
                "Host",
                "X-Real-IP",
                "X-Forwarded-For",
                "X-Forwarded-Host",
                "Upgrade",
                "Connection"
            ]
        );
    }

    #[test]
    fn empty_document_yields_defaults() {
        let config: Config = serde_json::from_str("{}").unwrap();
        assert_eq!(config.route.upstream, DEFAULT_UPSTREAM);
        assert_eq!(config.route.header_rewrites.len(), 6);
    }

    #[test]
    fn bare_upstream_is_http() {
        let url = Route::default().upstream_url().unwrap();
        assert_eq!(url.scheme(), "http");
        assert_eq!(url.host_str(), Some("web"));
        assert_eq!(url.port(), Some(5000));
    }

    #[test]
    fn explicit_scheme_is_kept() {
        let route = Route {
            upstream: "https://api.internal:8443".into(),
            ..Route::default()
        };
        assert_eq!(route.upstream_url().unwrap().scheme(), "https");
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let result: Result<Config, _> = serde_json::from_str(r#"{"route": {"upstreams": []}}"#);
        assert!(result.is_err());
    }
}
