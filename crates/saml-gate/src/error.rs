use crate::saml::RejectReason;
use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

const LOGIN_FAILED: &str = "Login failed. Please start a new login.";

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("IdP misconfigured: {0}")]
    IdpConfiguration(String),
    #[error("authentication failed: {0}")]
    Authentication(#[from] RejectReason),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl Error {
    pub fn status(&self) -> StatusCode {
        match self {
            Error::Configuration(_) => StatusCode::BAD_REQUEST,
            Error::IdpConfiguration(_) => StatusCode::BAD_GATEWAY,
            Error::Authentication(_) => StatusCode::UNAUTHORIZED,
            Error::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message shown to the client. Authentication failures share one body
    /// so the response does not reveal which check rejected the login.
    pub fn public_message(&self) -> String {
        match self {
            Error::Authentication(_) => LOGIN_FAILED.to_string(),
            Error::Internal(_) => "internal error".to_string(),
            other => other.to_string(),
        }
    }

    /// Logs the specific cause and renders the public message, as JSON when
    /// the client asked for it.
    pub fn respond(self, json: bool) -> Response {
        match &self {
            Error::Authentication(reason) => {
                tracing::warn!(reason = %reason, "login rejected");
            }
            _ => tracing::error!(error = %self, "request failed"),
        }
        let status = self.status();
        let message = self.public_message();
        if json {
            (status, Json(serde_json::json!({ "error": message }))).into_response()
        } else {
            (status, message).into_response()
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        self.respond(false)
    }
}
