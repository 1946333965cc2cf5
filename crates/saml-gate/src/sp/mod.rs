//! Service-provider identity: which entity ID and ACS URL this gateway
//! presents to the IdP for a given proxied request.

pub mod forwarded;

use crate::error::Error;
pub use forwarded::Forwarded;
use url::Url;

/// Route the IdP posts its Response back to, relative to the request root.
pub const POSTBACK_ROUTE: &str = "login";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SpIdentity {
    pub entity_id: String,
    pub acs_url: String,
}

impl SpIdentity {
    /// Resolves the SP identity from forwarded routing headers. Explicit
    /// entity-id and ACS headers win over inference; the ACS override may be
    /// absolute or relative to the request root.
    pub fn resolve(forwarded: &Forwarded) -> Result<Self, Error> {
        let root = forwarded.url_root()?;

        let entity_id = match &forwarded.entity_id {
            Some(explicit) => explicit.clone(),
            None => root.trim_end_matches('/').to_string(),
        };

        let base = Url::parse(&root)
            .map_err(|e| Error::Configuration(format!("invalid request root {root}: {e}")))?;
        let acs = forwarded.acs.as_deref().unwrap_or(POSTBACK_ROUTE);
        let acs_url = base
            .join(acs)
            .map_err(|e| Error::Configuration(format!("invalid ACS override {acs}: {e}")))?;

        Ok(Self {
            entity_id,
            acs_url: acs_url.to_string(),
        })
    }
}
