//! Header value templates with `$variable` substitution.
//!
//! A template is literal text interleaved with variable references such
//! as `$remote_addr` or `${host}`. Templates are parsed once at startup
//! into a list of [`Segment`]s and rendered per request against a
//! [`RenderContext`].

use std::fmt;
use std::net::IpAddr;

use http::{header, HeaderMap, HeaderName, Uri};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Variable {
    /// Inbound `Host`, falling back to the URI authority, then the server name.
    Host,
    /// Address of the directly connected client.
    RemoteAddr,
    /// Inbound `X-Forwarded-For` chain with the client address appended.
    ProxyAddXForwardedFor,
    ServerName,
    Scheme,
    /// `upgrade` when the request asks for a protocol upgrade, else empty.
    ConnectionUpgrade,
    /// Any inbound request header, by lowercase name.
    Header(HeaderName),
}

impl Variable {
    fn from_name(name: &str) -> Result<Self, String> {
        match name {
            "host" => Ok(Self::Host),
            "remote_addr" => Ok(Self::RemoteAddr),
            "proxy_add_x_forwarded_for" => Ok(Self::ProxyAddXForwardedFor),
            "server_name" => Ok(Self::ServerName),
            "scheme" => Ok(Self::Scheme),
            "connection_upgrade" => Ok(Self::ConnectionUpgrade),
            other => {
                let Some(header) = other.strip_prefix("http_").filter(|h| !h.is_empty()) else {
                    return Err(format!("unknown variable '${other}'"));
                };
                let header = header.to_ascii_lowercase().replace('_', "-");
                HeaderName::from_bytes(header.as_bytes())
                    .map(Self::Header)
                    .map_err(|_| format!("'${other}' does not name a valid header"))
            }
        }
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Host => f.write_str("$host"),
            Self::RemoteAddr => f.write_str("$remote_addr"),
            Self::ProxyAddXForwardedFor => f.write_str("$proxy_add_x_forwarded_for"),
            Self::ServerName => f.write_str("$server_name"),
            Self::Scheme => f.write_str("$scheme"),
            Self::ConnectionUpgrade => f.write_str("$connection_upgrade"),
            Self::Header(name) => write!(f, "$http_{}", name.as_str().replace('-', "_")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Literal(String),
    Var(Variable),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    segments: Vec<Segment>,
}

/// Per-request values a template can reference.
pub struct RenderContext<'a> {
    pub headers: &'a HeaderMap,
    pub uri: &'a Uri,
    pub remote_addr: IpAddr,
    pub server_name: &'a str,
}

impl RenderContext<'_> {
    /// All values of a header joined with `, `, or empty when absent.
    fn header_joined(&self, name: &HeaderName) -> String {
        let mut out = String::new();
        for value in self.headers.get_all(name) {
            if !out.is_empty() {
                out.push_str(", ");
            }
            out.push_str(&String::from_utf8_lossy(value.as_bytes()));
        }
        out
    }

    #[must_use]
    pub fn wants_upgrade(&self) -> bool {
        self.headers.contains_key(header::UPGRADE)
    }

    fn resolve(&self, var: &Variable, out: &mut String) {
        match var {
            Variable::Host => {
                let host = self
                    .headers
                    .get(header::HOST)
                    .and_then(|v| v.to_str().ok())
                    .filter(|v| !v.is_empty())
                    .or_else(|| self.uri.authority().map(|a| a.as_str()))
                    .unwrap_or(self.server_name);
                out.push_str(host);
            }
            Variable::RemoteAddr => out.push_str(&self.remote_addr.to_string()),
            Variable::ProxyAddXForwardedFor => {
                let existing = self.header_joined(&HeaderName::from_static("x-forwarded-for"));
                if !existing.is_empty() {
                    out.push_str(&existing);
                    out.push_str(", ");
                }
                out.push_str(&self.remote_addr.to_string());
            }
            Variable::ServerName => out.push_str(self.server_name),
            Variable::Scheme => out.push_str("http"),
            Variable::ConnectionUpgrade => {
                if self.wants_upgrade() {
                    out.push_str("upgrade");
                }
            }
            Variable::Header(name) => out.push_str(&self.header_joined(name)),
        }
    }
}

impl Template {
    /// Parse a template string.
    ///
    /// `$name` reads `[A-Za-z0-9_]+`, `${name}` delimits a name inside
    /// text, and `$$` is a literal dollar sign.
    pub fn parse(input: &str) -> Result<Self, String> {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut chars = input.chars().peekable();

        while let Some(ch) = chars.next() {
            if ch != '$' {
                literal.push(ch);
                continue;
            }

            let name = match chars.peek() {
                Some('$') => {
                    chars.next();
                    literal.push('$');
                    continue;
                }
                Some('{') => {
                    chars.next();
                    let mut name = String::new();
                    loop {
                        match chars.next() {
                            Some('}') => break,
                            Some(c) => name.push(c),
                            None => return Err(format!("unterminated '${{' in '{input}'")),
                        }
                    }
                    name
                }
                _ => {
                    let mut name = String::new();
                    while let Some(&c) = chars.peek() {
                        if c.is_ascii_alphanumeric() || c == '_' {
                            name.push(c);
                            chars.next();
                        } else {
                            break;
                        }
                    }
                    name
                }
            };

            if name.is_empty() {
                return Err(format!("empty variable name in '{input}'"));
            }

            if !literal.is_empty() {
                segments.push(Segment::Literal(std::mem::take(&mut literal)));
            }
            segments.push(Segment::Var(Variable::from_name(&name)?));
        }

        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Ok(Self { segments })
    }

    #[must_use]
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    #[must_use]
    pub fn render(&self, ctx: &RenderContext<'_>) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Var(var) => ctx.resolve(var, &mut out),
            }
        }
        out
    }
}
