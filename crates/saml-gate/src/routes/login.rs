use super::{RequestContext, wants_json};
use crate::state::AppState;
use axum::extract::{Path, RawQuery, State};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Redirect, Response};
use chrono::Utc;
use std::sync::Arc;

/// Query parameter ingress-nginx uses to carry the original URL.
const RD_PARAM: &str = "rd";

/// Base for resolving `rd`; only its path and query survive.
const RD_BASE: &str = "http://rd.invalid/";

pub async fn login(
    State(state): State<Arc<AppState>>,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
) -> Response {
    start(&state, &headers, "", query.as_deref(), None)
}

pub async fn login_to(
    State(state): State<Arc<AppState>>,
    Path(return_to): Path<String>,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
) -> Response {
    start(&state, &headers, &return_to, query.as_deref(), None)
}

pub async fn step_up(
    State(state): State<Arc<AppState>>,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
) -> Response {
    start(&state, &headers, "", query.as_deref(), Some("2fa"))
}

pub async fn step_up_to(
    State(state): State<Arc<AppState>>,
    Path(return_to): Path<String>,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
) -> Response {
    start(&state, &headers, &return_to, query.as_deref(), Some("2fa"))
}

fn start(
    state: &AppState,
    headers: &HeaderMap,
    path: &str,
    query: Option<&str>,
    step_up: Option<&str>,
) -> Response {
    let return_to = return_target(path, query);
    let result = RequestContext::resolve(state, headers).and_then(|ctx| {
        state.engine.begin_login(
            &state.codec,
            &ctx.sp,
            &ctx.idp,
            return_to,
            step_up,
            Utc::now(),
        )
    });
    match result {
        Ok(redirect) => Redirect::to(&redirect.url).into_response(),
        Err(e) => e.respond(wants_json(headers)),
    }
}

/// Where to send the browser after login. An `rd` parameter wins over the
/// path and is reduced to its path and query, so scheme and host never come
/// from the client. Other query parameters stay attached to the path form.
pub fn return_target(path: &str, query: Option<&str>) -> String {
    let query = query.unwrap_or_default();
    let mut rd = None;
    let mut rest = url::form_urlencoded::Serializer::new(String::new());
    let mut has_rest = false;
    for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
        if key == RD_PARAM {
            rd = Some(value.into_owned());
        } else {
            rest.append_pair(&key, &value);
            has_rest = true;
        }
    }

    let path = path.trim_start_matches('/');
    if let Some(rd) = rd.as_deref().filter(|rd| !rd.is_empty()) {
        if !path.is_empty() {
            tracing::warn!(path, rd, "both a path and rd given, using rd");
        }
        match url::Url::parse(RD_BASE).and_then(|base| base.join(rd)) {
            Ok(url) => return path_and_query(&url),
            Err(e) => tracing::warn!(rd, error = %e, "ignoring unparseable rd"),
        }
    }

    let mut target = format!("/{path}");
    if has_rest {
        target.push('?');
        target.push_str(&rest.finish());
    }
    target
}

fn path_and_query(url: &url::Url) -> String {
    match url.query() {
        Some(query) if !query.is_empty() => format!("{}?{query}", url.path()),
        _ => url.path().to_string(),
    }
}
