use crate::idp::IdpConfig;
use crate::idp::metadata::entity_descriptor;
use crate::sp::SpIdentity;
use samael::schema::Assertion;
use samael::service_provider::ServiceProviderBuilder;

/// What a Response is expected to be addressed to and signed by.
pub struct VerifyContext<'a> {
    pub sp: &'a SpIdentity,
    pub idp: &'a IdpConfig,
    pub request_id: &'a str,
}

/// XML signature verification, consumed as a capability. Implementations
/// return the assertion covered by a signature that chains to `ctx.idp`'s
/// certificate, read from the signed subtree only. Identity claims are taken
/// from that assertion and never from a re-parse of the posted document.
pub trait SignatureVerifier: Send + Sync {
    fn verify(
        &self,
        encoded_response: &str,
        ctx: &VerifyContext<'_>,
    ) -> Result<Assertion, String>;
}

/// Verifies through samael's service-provider validation against IdP
/// metadata synthesised from the IdP config.
pub struct SamaelVerifier {
    _xmlsec: (),
}

impl SamaelVerifier {
    /// Without the `xmlsec` feature samael passes documents through
    /// unverified, so construction fails rather than accept unsigned logins.
    pub fn new() -> anyhow::Result<Self> {
        if !cfg!(feature = "xmlsec") {
            anyhow::bail!(
                "built without the `xmlsec` feature; SAML signatures cannot be verified"
            );
        }
        Ok(Self { _xmlsec: () })
    }
}

impl SignatureVerifier for SamaelVerifier {
    fn verify(
        &self,
        encoded_response: &str,
        ctx: &VerifyContext<'_>,
    ) -> Result<Assertion, String> {
        let idp_metadata = entity_descriptor(ctx.idp).map_err(|e| e.to_string())?;

        let sp = ServiceProviderBuilder::default()
            .entity_id(ctx.sp.entity_id.clone())
            .acs_url(ctx.sp.acs_url.clone())
            .idp_metadata(idp_metadata)
            .build()
            .map_err(|e| format!("failed to build ServiceProvider: {e}"))?;

        sp.parse_base64_response(encoded_response, Some(&[ctx.request_id]))
            .map_err(|e| e.to_string())
    }
}
