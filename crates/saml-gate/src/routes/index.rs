use super::clear_session;
use crate::sp::Forwarded;
use crate::state::AppState;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::Html;
use std::sync::Arc;
use tower_cookies::Cookies;

pub async fn index(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Html<String> {
    let prefix = Forwarded::from_headers(&headers, state.config.default_proto.as_deref())
        .normalized_prefix();
    Html(format!(
        r#"<!doctype html>
<html>
<head><title>SAML gateway</title></head>
<body>
<h1>SAML gateway</h1>
<ul>
<li><a href="{prefix}/login">Log in</a></li>
<li><a href="{prefix}/2fa">Log in with a second factor</a></li>
<li><a href="{prefix}/status">Session status</a></li>
<li><a href="{prefix}/logout">Log out</a></li>
</ul>
</body>
</html>"#,
        prefix = html_escape(&prefix),
    ))
}

pub async fn logout(State(state): State<Arc<AppState>>, cookies: Cookies) -> &'static str {
    clear_session(&cookies, &state.config);
    tracing::info!("session cookie cleared");
    "Logged out."
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
