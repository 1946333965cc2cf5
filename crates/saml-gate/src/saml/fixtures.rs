//! Handcrafted Responses for exercising validation without an IdP.

use crate::session::RelayState;
use crate::sp::SpIdentity;
use chrono::{DateTime, Duration, SecondsFormat, Utc};

pub const SP_ENTITY_ID: &str = "https://app.example.edu";
pub const SP_ACS_URL: &str = "https://app.example.edu/login";
pub const IDP_ENTITY_ID: &str = "https://idp.example.edu/idp";

#[cfg(feature = "xmlsec")]
pub const IDP_KEY_PEM: &str = include_str!("../../tests/fixtures/idp-key.pem");
#[cfg(feature = "xmlsec")]
pub const OTHER_KEY_PEM: &str = include_str!("../../tests/fixtures/other-key.pem");
#[cfg(feature = "xmlsec")]
pub const OTHER_CERT_PEM: &str = include_str!("../../tests/fixtures/other-cert.pem");

pub fn test_sp() -> SpIdentity {
    SpIdentity {
        entity_id: SP_ENTITY_ID.into(),
        acs_url: SP_ACS_URL.into(),
    }
}

pub fn test_relay(request_id: &str) -> RelayState {
    let issued_at = Utc::now() - Duration::minutes(1);
    RelayState {
        return_to: "/".into(),
        request_id: request_id.into(),
        idp: IDP_ENTITY_ID.into(),
        issued_at,
        expires_at: issued_at + Duration::minutes(10),
    }
}

fn ts(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Secs, true)
}

pub struct ResponseFixture {
    pub in_response_to: String,
    pub destination: String,
    pub issuer: String,
    pub audience: String,
    pub status: String,
    pub name_id: String,
    pub authn_context: String,
    pub issue_instant: DateTime<Utc>,
    pub not_before: DateTime<Utc>,
    pub not_on_or_after: DateTime<Utc>,
}

impl ResponseFixture {
    pub fn new(in_response_to: &str) -> Self {
        let now = Utc::now();
        Self {
            in_response_to: in_response_to.into(),
            destination: SP_ACS_URL.into(),
            issuer: IDP_ENTITY_ID.into(),
            audience: SP_ENTITY_ID.into(),
            status: "urn:oasis:names:tc:SAML:2.0:status:Success".into(),
            name_id: "alice@example.edu".into(),
            authn_context: "urn:oasis:names:tc:SAML:2.0:ac:classes:PasswordProtectedTransport"
                .into(),
            issue_instant: now,
            not_before: now - Duration::minutes(1),
            not_on_or_after: now + Duration::minutes(5),
        }
    }

    pub fn xml(&self) -> String {
        format!(
            r#"<samlp:Response xmlns:samlp="urn:oasis:names:tc:SAML:2.0:protocol" xmlns:saml="urn:oasis:names:tc:SAML:2.0:assertion" ID="_resp1" Version="2.0" IssueInstant="{instant}" Destination="{destination}" InResponseTo="{irt}">
  <saml:Issuer>{issuer}</saml:Issuer>
  <samlp:Status>
    <samlp:StatusCode Value="{status}"/>
  </samlp:Status>
  <saml:Assertion ID="_assert1" Version="2.0" IssueInstant="{instant}">
    <saml:Issuer>{issuer}</saml:Issuer>
    <saml:Subject>
      <saml:NameID Format="urn:oasis:names:tc:SAML:1.1:nameid-format:unspecified">{name_id}</saml:NameID>
      <saml:SubjectConfirmation Method="urn:oasis:names:tc:SAML:2.0:cm:bearer">
        <saml:SubjectConfirmationData InResponseTo="{irt}" NotOnOrAfter="{not_on_or_after}" Recipient="{destination}"/>
      </saml:SubjectConfirmation>
    </saml:Subject>
    <saml:Conditions NotBefore="{not_before}" NotOnOrAfter="{not_on_or_after}">
      <saml:AudienceRestriction>
        <saml:Audience>{audience}</saml:Audience>
      </saml:AudienceRestriction>
    </saml:Conditions>
    <saml:AuthnStatement AuthnInstant="{instant}" SessionIndex="_session1">
      <saml:AuthnContext>
        <saml:AuthnContextClassRef>{authn_context}</saml:AuthnContextClassRef>
      </saml:AuthnContext>
    </saml:AuthnStatement>
    <saml:AttributeStatement>
      <saml:Attribute Name="urn:oid:0.9.2342.19200300.100.1.1" FriendlyName="uid" NameFormat="urn:oasis:names:tc:SAML:2.0:attrname-format:uri">
        <saml:AttributeValue>alice</saml:AttributeValue>
      </saml:Attribute>
      <saml:Attribute Name="urn:oid:1.3.6.1.4.1.5923.1.5.1.1" FriendlyName="isMemberOf" NameFormat="urn:oasis:names:tc:SAML:2.0:attrname-format:uri">
        <saml:AttributeValue>u_staff</saml:AttributeValue>
        <saml:AttributeValue>u_admins</saml:AttributeValue>
      </saml:Attribute>
    </saml:AttributeStatement>
  </saml:Assertion>
</samlp:Response>"#,
            instant = ts(self.issue_instant),
            destination = self.destination,
            irt = self.in_response_to,
            issuer = self.issuer,
            status = self.status,
            name_id = self.name_id,
            not_before = ts(self.not_before),
            not_on_or_after = ts(self.not_on_or_after),
            audience = self.audience,
            authn_context = self.authn_context,
        )
    }
}

/// A Response signed by samael's IdP implementation with the given key pair.
#[cfg(feature = "xmlsec")]
pub fn sign_response(
    key_pem: &str,
    cert_pem: &str,
    name_id: &str,
    in_response_to: &str,
) -> String {
    use samael::crypto::CertificateDer;
    use samael::idp::IdentityProvider;
    use samael::traits::ToXml;

    let key_der = openssl::pkey::PKey::private_key_from_pem(key_pem.as_bytes())
        .unwrap()
        .rsa()
        .unwrap()
        .private_key_to_der()
        .unwrap();
    let cert_der = openssl::x509::X509::from_pem(cert_pem.as_bytes())
        .unwrap()
        .to_der()
        .unwrap();

    let idp = IdentityProvider::from_rsa_private_key_der(&key_der).unwrap();
    let response = idp
        .sign_authn_response(
            &CertificateDer::from(cert_der),
            name_id,
            SP_ENTITY_ID,
            SP_ACS_URL,
            IDP_ENTITY_ID,
            in_response_to,
            &[],
        )
        .unwrap();
    response.to_string().unwrap()
}

/// Places an unsigned assertion for `subject` ahead of the first assertion in
/// `signed`, leaving the original signed subtree intact.
#[cfg(feature = "xmlsec")]
pub fn inject_assertion(signed: &str, subject: &str) -> String {
    let now = Utc::now();
    let forged = format!(
        r#"<saml:Assertion xmlns:saml="urn:oasis:names:tc:SAML:2.0:assertion" ID="_forged" Version="2.0" IssueInstant="{now}"><saml:Issuer>{IDP_ENTITY_ID}</saml:Issuer><saml:Subject><saml:NameID>{subject}</saml:NameID></saml:Subject><saml:Conditions NotBefore="{nbf}" NotOnOrAfter="{exp}"><saml:AudienceRestriction><saml:Audience>{SP_ENTITY_ID}</saml:Audience></saml:AudienceRestriction></saml:Conditions></saml:Assertion>"#,
        now = ts(now),
        nbf = ts(now - Duration::minutes(1)),
        exp = ts(now + Duration::minutes(5)),
    );
    let at = ["<saml2:Assertion", "<saml:Assertion", "<Assertion"]
        .iter()
        .find_map(|tag| signed.find(tag))
        .expect("signed Response carries no assertion");
    format!("{}{forged}{}", &signed[..at], &signed[at..])
}
