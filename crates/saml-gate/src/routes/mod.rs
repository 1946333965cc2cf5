//! HTTP front: the router and the per-request plumbing shared by handlers.

pub mod acs;
pub mod index;
pub mod login;
pub mod status;

use crate::config::Config;
use crate::error::Error;
use crate::idp::{IdpConfig, IdpOverrides};
use crate::sp::{Forwarded, SpIdentity};
use crate::state::AppState;
use axum::Router;
use axum::http::HeaderMap;
use axum::http::header::ACCEPT;
use axum::routing::get;
use std::sync::Arc;
use tower_cookies::cookie::SameSite;
use tower_cookies::cookie::time::Duration as CookieDuration;
use tower_cookies::{Cookie, Cookies};

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(index::index))
        .route("/logout", get(index::logout))
        .route("/status", get(status::status))
        .route("/status/2fa", get(status::status_2fa))
        .route("/status/group/{group}", get(status::status_group))
        .route("/status/group/{group}/2fa", get(status::status_group_2fa))
        .route("/status/2fa/group/{group}", get(status::status_group_2fa))
        .route("/login", get(login::login).post(acs::acs))
        .route("/login/", get(login::login))
        .route("/login/{*return_to}", get(login::login_to))
        .route("/2fa", get(login::step_up))
        .route("/2fa/", get(login::step_up))
        .route("/2fa/{*return_to}", get(login::step_up_to))
}

/// Whether the client prefers JSON bodies.
pub fn wants_json(headers: &HeaderMap) -> bool {
    headers
        .get_all(ACCEPT)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .any(|v| v.contains("application/json"))
}

/// The SP identity and IdP that apply to this proxied request.
pub(crate) struct RequestContext {
    pub forwarded: Forwarded,
    pub sp: SpIdentity,
    pub idp: IdpConfig,
}

impl RequestContext {
    pub fn resolve(state: &AppState, headers: &HeaderMap) -> Result<Self, Error> {
        let forwarded = Forwarded::from_headers(headers, state.config.default_proto.as_deref());
        let sp = SpIdentity::resolve(&forwarded)?;
        let idp = state
            .registry
            .resolve(&sp, &IdpOverrides::from_headers(headers))?;
        Ok(Self { forwarded, sp, idp })
    }
}

pub(crate) fn session_cookie(config: &Config, value: String) -> Cookie<'static> {
    Cookie::build((config.cookie_name.clone(), value))
        .path("/")
        .http_only(true)
        .secure(config.cookie_secure)
        .same_site(SameSite::Lax)
        .max_age(CookieDuration::seconds(config.session_lifetime_secs))
        .build()
}

/// Expires the session cookie, whether or not the request carried one.
/// Attributes match [`session_cookie`] so browsers drop the right cookie.
pub(crate) fn clear_session(cookies: &Cookies, config: &Config) {
    let removal = Cookie::build((config.cookie_name.clone(), ""))
        .path("/")
        .http_only(true)
        .secure(config.cookie_secure)
        .same_site(SameSite::Lax)
        .max_age(CookieDuration::ZERO)
        .build();
    cookies.add(removal);
}
