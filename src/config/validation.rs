//! Configuration validation with detailed error reporting.
//!
//! The [`validate`] function checks a parsed [`Config`] for structural
//! errors: empty names, unusable listen addresses, malformed upstreams,
//! zero limits, and header rewrites with bad names or templates. Returns
//! every [`ValidationError`] found, with suggestions where a fix is
//! obvious.

use std::collections::HashSet;
use std::net::IpAddr;

use http::{HeaderName, HeaderValue};

use super::model::{Config, HeaderRewrite, Route};
use super::template::Template;
use crate::error::ValidationError;

/// Headers that control message framing and must never be rewritten.
const FRAMING_HEADERS: &[&str] = &["content-length", "transfer-encoding", "te", "trailer"];

fn error(field: impl Into<String>, message: impl Into<String>) -> ValidationError {
    ValidationError {
        field: field.into(),
        message: message.into(),
        suggestion: None,
    }
}

/// Validate an upstream `host:port` or URL. Returns `Ok(())` or a
/// human-readable error.
pub fn validate_upstream(route: &Route) -> Result<(), String> {
    let raw = route.upstream.trim();
    if raw.is_empty() {
        return Err("upstream cannot be empty".into());
    }
    let parsed = route
        .upstream_url()
        .map_err(|e| format!("'{raw}' is not a valid upstream ({e})"))?;

    let scheme = parsed.scheme();
    if scheme != "http" && scheme != "https" {
        return Err(format!(
            "unsupported scheme '{scheme}' (expected http or https)"
        ));
    }
    if !parsed.host_str().is_some_and(|h| !h.is_empty()) {
        return Err(format!("'{raw}' has no host"));
    }
    if parsed.path() != "/" || parsed.query().is_some() {
        return Err(format!(
            "'{raw}' must not carry a path or query; the request path is forwarded as is"
        ));
    }
    Ok(())
}

/// Validate one header rewrite rule.
pub fn validate_rewrite(rewrite: &HeaderRewrite) -> Result<(), String> {
    let name = rewrite
        .name
        .parse::<HeaderName>()
        .map_err(|_| format!("'{}' is not a valid header name", rewrite.name))?;
    if FRAMING_HEADERS.contains(&name.as_str()) {
        return Err(format!(
            "'{}' controls message framing and cannot be rewritten",
            rewrite.name
        ));
    }
    Template::parse(&rewrite.value)?;
    Ok(())
}

pub fn validate(config: &Config) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    let route = &config.route;

    if config.server_name.trim().is_empty() {
        errors.push(error("server_name", "server name cannot be empty"));
    } else if HeaderValue::from_str(&config.server_name).is_err() {
        errors.push(error(
            "server_name",
            "server name must be usable as a header value",
        ));
    }

    if let Some(ref path) = config.health_path {
        if !path.starts_with('/') {
            errors.push(ValidationError {
                field: "health_path".into(),
                message: "path must start with '/'".into(),
                suggestion: Some(format!("did you mean '/{path}'?")),
            });
        } else if let Some(cut) = path.find(['?', '#']) {
            // Matched against the request path only, so these never match
            errors.push(ValidationError {
                field: "health_path".into(),
                message: "path must not carry a query or fragment".into(),
                suggestion: Some(format!("did you mean '{}'?", &path[..cut])),
            });
        } else if path.chars().any(char::is_whitespace) {
            errors.push(error("health_path", "path must not contain whitespace"));
        }
    }

    if route.listen_host.parse::<IpAddr>().is_err() {
        errors.push(ValidationError {
            field: "route.listen_host".into(),
            message: format!("'{}' is not an IP address", route.listen_host),
            suggestion: Some("use '0.0.0.0' to listen on all interfaces".into()),
        });
    }

    if route.listen_port == 0 {
        errors.push(error("route.listen_port", "listen port cannot be 0"));
    }

    if let Err(msg) = validate_upstream(route) {
        let suggestion = route
            .upstream_url()
            .ok()
            .filter(|u| u.path() != "/" || u.query().is_some())
            .and_then(|u| {
                u.host_str().map(|h| {
                    u.port()
                        .map_or_else(|| h.to_string(), |p| format!("{h}:{p}"))
                })
            })
            .map(|authority| format!("did you mean '{authority}'?"));
        errors.push(ValidationError {
            field: "route.upstream".into(),
            message: msg,
            suggestion,
        });
    }

    if route.max_body_bytes.as_u64() == 0 {
        errors.push(error(
            "route.max_body_bytes",
            "body ceiling must be greater than 0",
        ));
    }

    if route.connect_timeout_ms == 0 {
        errors.push(error(
            "route.connect_timeout_ms",
            "connect timeout must be greater than 0",
        ));
    }

    let mut seen = HashSet::new();
    for (i, rewrite) in route.header_rewrites.iter().enumerate() {
        let field = format!("route.header_rewrites[{i}]");
        if let Err(msg) = validate_rewrite(rewrite) {
            errors.push(error(field.clone(), msg));
        }
        if !seen.insert(rewrite.name.to_ascii_lowercase()) {
            errors.push(ValidationError {
                field,
                message: format!("header '{}' is rewritten more than once", rewrite.name),
                suggestion: Some("keep only the last rule for this header".into()),
            });
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[must_use]
pub fn format_validation_report(path: &str, config: &Config) -> String {
    let route = &config.route;
    let mut lines = vec![
        format!(
            "  listen {}:{} -> {}",
            route.listen_host, route.listen_port, route.upstream
        ),
        format!("    server name:     {}", config.server_name),
        format!("    max body:        {}", route.max_body_bytes),
        format!("    connect timeout: {}ms", route.connect_timeout_ms),
    ];
    if let Some(ref health) = config.health_path {
        lines.push(format!("    health path:     {health}"));
    }
    lines.push(format!("    header rewrites: {}", route.header_rewrites.len()));
    for rewrite in &route.header_rewrites {
        lines.push(format!("      {}: {}", rewrite.name, rewrite.value));
    }

    format!("{path} is valid\n{}", lines.join("\n"))
}
