use crate::saml::AuthnContextLevels;
use anyhow::{Context, Result};
use std::str::FromStr;

pub const DEFAULT_GROUPS_ATTRIBUTE: &str = "urn:oid:1.3.6.1.4.1.5923.1.5.1.1";
pub const DEFAULT_AUTHN_CONTEXT_LEVELS: &str = "https://refeds.org/profile/mfa=2fa";

/// Default IdP as given in the environment. Validated into an
/// [`IdpConfig`](crate::idp::IdpConfig) when the application state is built.
#[derive(Clone, Debug)]
pub struct DefaultIdp {
    pub entity_id: String,
    pub sso_url: String,
    pub certificate: String,
    pub id_attribute: Option<String>,
}

pub struct Config {
    pub host: String,
    pub port: u16,
    pub secret_key: Option<String>,
    pub cookie_name: String,
    pub cookie_secure: bool,
    pub session_lifetime_secs: i64,
    pub relay_state_ttl_secs: i64,
    pub clock_skew_secs: i64,
    pub default_proto: Option<String>,
    pub groups_attribute: String,
    pub authn_context_levels: AuthnContextLevels,
    pub default_idp: Option<DefaultIdp>,
    pub idp_registry_path: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let port = parse_var("PORT", 5000u16).context("PORT must be a valid u16")?;

        let secret_key = std::env::var("SECRET_KEY").ok().filter(|k| !k.is_empty());
        let cookie_name =
            std::env::var("SESSION_COOKIE_NAME").unwrap_or_else(|_| "_saml_session".into());
        let cookie_secure = parse_var("SESSION_COOKIE_SECURE", true)
            .context("SESSION_COOKIE_SECURE must be true or false")?;
        let session_lifetime_secs = parse_var("SESSION_LIFETIME_SECS", 12 * 60 * 60)
            .context("SESSION_LIFETIME_SECS must be a number of seconds")?;
        let relay_state_ttl_secs = parse_var("RELAY_STATE_TTL_SECS", 10 * 60)
            .context("RELAY_STATE_TTL_SECS must be a number of seconds")?;
        let clock_skew_secs = parse_var("SAML_CLOCK_SKEW_SECS", 180)
            .context("SAML_CLOCK_SKEW_SECS must be a number of seconds")?;

        let default_proto = std::env::var("DEFAULT_FORWARDED_PROTO").ok();
        let groups_attribute = std::env::var("SAML_GROUPS_ATTRIBUTE")
            .unwrap_or_else(|_| DEFAULT_GROUPS_ATTRIBUTE.into());
        let authn_context_levels = std::env::var("SAML_AUTHN_CONTEXT_LEVELS")
            .unwrap_or_else(|_| DEFAULT_AUTHN_CONTEXT_LEVELS.into())
            .parse()
            .context("SAML_AUTHN_CONTEXT_LEVELS must be a list of context=level pairs")?;

        let default_idp = match std::env::var("SAML_IDP_ENTITY_ID") {
            Ok(entity_id) => Some(DefaultIdp {
                entity_id,
                sso_url: std::env::var("SAML_IDP_SSO_URL")
                    .context("SAML_IDP_SSO_URL must be set with SAML_IDP_ENTITY_ID")?,
                certificate: std::env::var("SAML_IDP_CERT")
                    .context("SAML_IDP_CERT must be set with SAML_IDP_ENTITY_ID")?,
                id_attribute: std::env::var("SAML_IDP_ID_ATTRIBUTE").ok(),
            }),
            Err(_) => None,
        };
        let idp_registry_path = std::env::var("SAML_IDP_REGISTRY").ok();

        Ok(Self {
            host,
            port,
            secret_key,
            cookie_name,
            cookie_secure,
            session_lifetime_secs,
            relay_state_ttl_secs,
            clock_skew_secs,
            default_proto,
            groups_attribute,
            authn_context_levels,
            default_idp,
            idp_registry_path,
        })
    }
}

fn parse_var<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(name) {
        Ok(raw) => Ok(raw.trim().parse::<T>()?),
        Err(_) => Ok(default),
    }
}
