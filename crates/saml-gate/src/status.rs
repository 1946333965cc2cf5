//! Access decisions for `auth_request` status checks.

use crate::session::{AuthLevel, SessionCodec, SessionToken};
use chrono::{DateTime, Utc};

/// What a status path demands of the session.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Requirement {
    pub levels: AuthLevel,
    pub group: Option<String>,
}

impl Requirement {
    pub fn with_level(mut self, level: &str) -> Self {
        self.levels.insert(level.to_string());
        self
    }

    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Decision {
    Authorized(SessionToken),
    Unauthorized,
    Forbidden(SessionToken),
}

pub fn check(codec: &SessionCodec, cookie: Option<&str>, requirement: &Requirement) -> Decision {
    check_at(codec, cookie, requirement, Utc::now())
}

pub fn check_at(
    codec: &SessionCodec,
    cookie: Option<&str>,
    requirement: &Requirement,
    now: DateTime<Utc>,
) -> Decision {
    let Some(cookie) = cookie else {
        return Decision::Unauthorized;
    };
    let token = match codec.decode_at(cookie, now) {
        Ok(token) => token,
        Err(e) => {
            tracing::debug!(reason = %e, "ignoring session cookie");
            return Decision::Unauthorized;
        }
    };

    if !requirement.levels.is_subset(&token.auth_level) {
        return Decision::Unauthorized;
    }
    match &requirement.group {
        Some(group) if !token.groups.iter().any(|g| g == group) => Decision::Forbidden(token),
        _ => Decision::Authorized(token),
    }
}
