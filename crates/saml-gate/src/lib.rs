pub mod config;
pub mod error;
pub mod idp;
pub mod replay;
pub mod routes;
pub mod saml;
pub mod session;
pub mod sp;
pub mod state;
pub mod status;

use axum::Router;
use state::AppState;
use std::sync::Arc;
use tower_cookies::CookieManagerLayer;
use tower_http::trace::TraceLayer;

pub fn app(state: Arc<AppState>) -> Router {
    routes::router()
        .with_state(state)
        .layer(CookieManagerLayer::new())
        .layer(TraceLayer::new_for_http())
}
