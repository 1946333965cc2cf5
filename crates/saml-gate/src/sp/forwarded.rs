use crate::error::Error;
use axum::http::HeaderMap;
use axum::http::header::HOST;

pub const X_FORWARDED_HOST: &str = "x-forwarded-host";
pub const X_FORWARDED_PROTO: &str = "x-forwarded-proto";
pub const X_FORWARDED_PREFIX: &str = "x-forwarded-prefix";
pub const X_SAML_ENTITY_ID: &str = "x-saml-entity-id";
pub const X_SAML_ACS: &str = "x-saml-acs";

/// Routing facts the reverse proxy forwards with every request.
#[derive(Clone, Debug, Default)]
pub struct Forwarded {
    pub host: Option<String>,
    pub proto: Option<String>,
    pub prefix: String,
    pub entity_id: Option<String>,
    pub acs: Option<String>,
}

impl Forwarded {
    pub fn from_headers(headers: &HeaderMap, default_proto: Option<&str>) -> Self {
        let host = first_value(headers, X_FORWARDED_HOST)
            .or_else(|| first_value(headers, HOST.as_str()));
        let proto = first_value(headers, X_FORWARDED_PROTO)
            .or_else(|| default_proto.map(str::to_string));
        let prefix = first_value(headers, X_FORWARDED_PREFIX).unwrap_or_default();

        Self {
            host,
            proto,
            prefix,
            entity_id: header_value(headers, X_SAML_ENTITY_ID),
            acs: header_value(headers, X_SAML_ACS),
        }
    }

    /// `{proto}://{host}`, without any prefix.
    pub fn origin(&self) -> Result<String, Error> {
        let host = self
            .host
            .as_deref()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| Error::Configuration("cannot determine forwarded host".into()))?;
        let proto = self
            .proto
            .as_deref()
            .filter(|p| matches!(*p, "http" | "https"))
            .ok_or_else(|| Error::Configuration("cannot determine forwarded protocol".into()))?;
        Ok(format!("{proto}://{host}"))
    }

    /// The prefix with a leading slash and no trailing one; empty at the root.
    pub fn normalized_prefix(&self) -> String {
        match self.prefix.trim_end_matches('/') {
            "" => String::new(),
            p if p.starts_with('/') => p.to_string(),
            p => format!("/{p}"),
        }
    }

    /// `{proto}://{host}{prefix}/`, the root every relative route hangs off.
    pub fn url_root(&self) -> Result<String, Error> {
        Ok(format!("{}{}/", self.origin()?, self.normalized_prefix()))
    }
}

pub(crate) fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Proxies append to forwarded headers; the first entry is the client-facing one.
fn first_value(headers: &HeaderMap, name: &str) -> Option<String> {
    header_value(headers, name).and_then(|v| {
        v.split(',')
            .next()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    })
}
