use super::{session_cookie, wants_json};
use crate::session::SessionToken;
use crate::state::AppState;
use crate::status::{self, Decision, Requirement};
use axum::Json;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use tower_cookies::Cookies;

pub const X_SAML_USER: &str = "x-saml-user";
pub const X_SAML_GROUPS: &str = "x-saml-groups";
pub const X_SAML_2FA: &str = "x-saml-2fa";
pub const X_SAML_AUTH_LEVEL: &str = "x-saml-auth-level";

const SECOND_FACTOR: &str = "2fa";

#[derive(Serialize)]
struct StatusBody<'a> {
    user: &'a str,
    groups: &'a [String],
    two_factor: bool,
    auth_level: Vec<&'a str>,
}

pub async fn status(
    State(state): State<Arc<AppState>>,
    cookies: Cookies,
    headers: HeaderMap,
) -> Response {
    respond(&state, &cookies, &headers, Requirement::default())
}

pub async fn status_2fa(
    State(state): State<Arc<AppState>>,
    cookies: Cookies,
    headers: HeaderMap,
) -> Response {
    let requirement = Requirement::default().with_level(SECOND_FACTOR);
    respond(&state, &cookies, &headers, requirement)
}

pub async fn status_group(
    State(state): State<Arc<AppState>>,
    Path(group): Path<String>,
    cookies: Cookies,
    headers: HeaderMap,
) -> Response {
    let requirement = Requirement::default().with_group(group);
    respond(&state, &cookies, &headers, requirement)
}

pub async fn status_group_2fa(
    State(state): State<Arc<AppState>>,
    Path(group): Path<String>,
    cookies: Cookies,
    headers: HeaderMap,
) -> Response {
    let requirement = Requirement::default()
        .with_group(group)
        .with_level(SECOND_FACTOR);
    respond(&state, &cookies, &headers, requirement)
}

fn respond(
    state: &AppState,
    cookies: &Cookies,
    headers: &HeaderMap,
    requirement: Requirement,
) -> Response {
    let cookie = cookies.get(&state.config.cookie_name);
    match status::check(&state.codec, cookie.as_ref().map(|c| c.value()), &requirement) {
        Decision::Authorized(token) => {
            let refreshed = state.codec.refresh(&token, Utc::now());
            match state.codec.encode(&refreshed) {
                Ok(value) => cookies.add(session_cookie(&state.config, value)),
                Err(e) => tracing::warn!(error = %e, "failed to refresh session cookie"),
            }
            authenticated(&refreshed, wants_json(headers))
        }
        Decision::Unauthorized => StatusCode::UNAUTHORIZED.into_response(),
        Decision::Forbidden(token) => {
            tracing::debug!(
                subject = token.subject,
                group = ?requirement.group,
                "session lacks required group"
            );
            StatusCode::FORBIDDEN.into_response()
        }
    }
}

/// 200 response describing the session, with identity headers for the proxy
/// to forward upstream.
pub(crate) fn authenticated(token: &SessionToken, json: bool) -> Response {
    let two_factor = token.auth_level.contains(SECOND_FACTOR);
    let auth_level: Vec<&str> = token.auth_level.iter().map(String::as_str).collect();

    let mut response = if json {
        Json(StatusBody {
            user: &token.subject,
            groups: &token.groups,
            two_factor,
            auth_level: auth_level.clone(),
        })
        .into_response()
    } else {
        format!(
            "Logged in as: {}\nGroups: {:?}\n2FA: {two_factor}",
            token.subject, token.groups
        )
        .into_response()
    };

    let headers = response.headers_mut();
    set_header(headers, X_SAML_USER, &token.subject);
    set_header(headers, X_SAML_GROUPS, &token.groups.join(":"));
    set_header(headers, X_SAML_2FA, if two_factor { "true" } else { "false" });
    set_header(headers, X_SAML_AUTH_LEVEL, &auth_level.join(" "));
    response
}

fn set_header(headers: &mut HeaderMap, name: &'static str, value: &str) {
    match HeaderValue::from_str(value) {
        Ok(value) => {
            headers.insert(HeaderName::from_static(name), value);
        }
        Err(_) => tracing::warn!(header = name, "value not representable as a header"),
    }
}
