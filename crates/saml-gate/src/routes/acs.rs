use super::status::authenticated;
use super::{RequestContext, clear_session, session_cookie, wants_json};
use crate::error::Error;
use crate::saml::RejectReason;
use crate::state::AppState;
use axum::Form;
use axum::extract::State;
use axum::extract::rejection::FormRejection;
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Redirect, Response};
use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;
use tower_cookies::Cookies;

#[derive(Deserialize)]
pub struct AcsForm {
    #[serde(rename = "SAMLResponse")]
    pub saml_response: String,
    #[serde(rename = "RelayState")]
    pub relay_state: Option<String>,
}

/// Consumes the IdP's HTTP-POST Response. Any failure clears the session
/// cookie so a half-finished login never leaves a stale session behind.
pub async fn acs(
    State(state): State<Arc<AppState>>,
    cookies: Cookies,
    headers: HeaderMap,
    form: Result<Form<AcsForm>, FormRejection>,
) -> Response {
    let json = wants_json(&headers);
    match complete(&state, &cookies, &headers, form).await {
        Ok(response) => response,
        Err(e) => {
            clear_session(&cookies, &state.config);
            e.respond(json)
        }
    }
}

async fn complete(
    state: &AppState,
    cookies: &Cookies,
    headers: &HeaderMap,
    form: Result<Form<AcsForm>, FormRejection>,
) -> Result<Response, Error> {
    let Form(form) =
        form.map_err(|e| RejectReason::Malformed(format!("unreadable ACS form: {e}")))?;
    let ctx = RequestContext::resolve(state, headers)?;

    let (token, relay) = state
        .engine
        .complete_login(
            &state.codec,
            &ctx.sp,
            &ctx.idp,
            &form.saml_response,
            form.relay_state.as_deref(),
            Utc::now(),
        )
        .await?;

    let value = state
        .codec
        .encode(&token)
        .map_err(|e| Error::Internal(anyhow::anyhow!("failed to encode session: {e}")))?;
    cookies.add(session_cookie(&state.config, value));

    if is_local_path(&relay.return_to) {
        let location = format!("{}{}", ctx.forwarded.origin()?, relay.return_to);
        return Ok(Redirect::to(&location).into_response());
    }
    Ok(authenticated(&token, wants_json(headers)))
}

/// Only same-origin absolute paths are followed after login.
fn is_local_path(target: &str) -> bool {
    target.starts_with('/') && !target.starts_with("//") && !target.starts_with("/\\")
}
