use crate::error::Error;
use crate::idp::IdpConfig;
use crate::idp::metadata::entity_descriptor;
use crate::session::SessionCodec;
use crate::sp::SpIdentity;
use chrono::{DateTime, Utc};
use samael::schema::{AuthnContextClassRef, AuthnContextComparison, RequestedAuthnContext};
use samael::service_provider::ServiceProviderBuilder;

/// An AuthnRequest on its way to the IdP.
#[derive(Debug)]
pub struct LoginRedirect {
    pub url: String,
    pub request_id: String,
}

/// Builds an HTTP-Redirect AuthnRequest naming `sp` as issuer and ACS target,
/// with a signed relay state bound to the request ID. When `contexts` is
/// non-empty the IdP is asked for one of those authentication contexts.
pub fn build_login_redirect(
    codec: &SessionCodec,
    sp: &SpIdentity,
    idp: &IdpConfig,
    return_to: String,
    contexts: &[String],
    now: DateTime<Utc>,
) -> Result<LoginRedirect, Error> {
    let service_provider = ServiceProviderBuilder::default()
        .entity_id(sp.entity_id.clone())
        .acs_url(sp.acs_url.clone())
        .idp_metadata(entity_descriptor(idp)?)
        .build()
        .map_err(|e| Error::Internal(anyhow::anyhow!("failed to build ServiceProvider: {e}")))?;

    let mut authn_request = service_provider
        .make_authentication_request(&idp.sso_url)
        .map_err(|e| Error::Internal(anyhow::anyhow!("{e}")))?;

    if !contexts.is_empty() {
        authn_request.requested_authn_context = Some(RequestedAuthnContext {
            authn_context_class_refs: Some(
                contexts
                    .iter()
                    .map(|c| AuthnContextClassRef {
                        value: Some(c.clone()),
                    })
                    .collect(),
            ),
            authn_context_decl_refs: None,
            comparison: Some(AuthnContextComparison::Exact),
        });
    }

    let request_id = authn_request.id.clone();
    let relay = codec.relay_state(return_to, request_id.clone(), idp.label.clone(), now);
    let relay_value = codec
        .encode_relay(&relay)
        .map_err(|e| Error::Internal(anyhow::anyhow!("failed to encode relay state: {e}")))?;

    let url = authn_request
        .redirect(&relay_value)
        .map_err(|e| Error::Internal(anyhow::anyhow!("{e}")))?
        .ok_or_else(|| Error::Internal(anyhow::anyhow!("AuthnRequest has no destination")))?;

    tracing::info!(
        request_id,
        sp_entity_id = sp.entity_id,
        idp = idp.label,
        step_up = !contexts.is_empty(),
        "redirecting to IdP"
    );

    Ok(LoginRedirect {
        url: url.to_string(),
        request_id,
    })
}
