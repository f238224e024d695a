//! The fixed upstream a route forwards to.

use std::fmt;

use http::uri::{Authority, PathAndQuery, Scheme};
use http::Uri;

use crate::config::model::Route;
use crate::error::ForwarderError;

#[derive(Debug, Clone)]
pub struct Upstream {
    scheme: Scheme,
    authority: Authority,
}

impl Upstream {
    pub fn from_route(route: &Route) -> Result<Self, ForwarderError> {
        let invalid = |source: Box<dyn std::error::Error + Send + Sync>| {
            ForwarderError::UriParse { source }
        };

        let url = route.upstream_url().map_err(|e| invalid(Box::new(e)))?;
        let host = url
            .host_str()
            .ok_or_else(|| invalid(format!("upstream '{}' has no host", route.upstream).into()))?;
        let port = url
            .port_or_known_default()
            .ok_or_else(|| invalid(format!("upstream '{}' has no port", route.upstream).into()))?;

        let scheme = if url.scheme() == "https" {
            Scheme::HTTPS
        } else {
            Scheme::HTTP
        };
        let authority = format!("{host}:{port}")
            .parse::<Authority>()
            .map_err(|e| invalid(Box::new(e)))?;

        Ok(Self { scheme, authority })
    }

    /// Absolute URI on the upstream for the inbound request's path and query.
    pub fn uri_for(&self, inbound: &Uri) -> Result<Uri, http::Error> {
        let path_and_query = inbound
            .path_and_query()
            .cloned()
            .unwrap_or_else(|| PathAndQuery::from_static("/"));
        Uri::builder()
            .scheme(self.scheme.clone())
            .authority(self.authority.clone())
            .path_and_query(path_and_query)
            .build()
    }
}

impl fmt::Display for Upstream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}", self.scheme, self.authority)
    }
}
