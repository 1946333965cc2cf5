use super::attributes::{attribute_values, authn_contexts, subject};
use super::{AuthnContextLevels, RejectReason};
use crate::session::{AuthLevel, RelayState};
use crate::sp::SpIdentity;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Duration, Utc};
use samael::schema::{Assertion, Response};

const STATUS_SUCCESS: &str = "urn:oasis:names:tc:SAML:2.0:status:Success";

/// What the Response must match, fixed before it is parsed.
pub struct Expectations<'a> {
    pub sp: &'a SpIdentity,
    pub idp_label: &'a str,
    pub relay: &'a RelayState,
    pub subject_attribute: Option<&'a str>,
    pub groups_attribute: &'a str,
    pub levels: &'a AuthnContextLevels,
    pub clock_skew: Duration,
}

/// A Response that passed every check except the replay guard.
#[derive(Debug, PartialEq, Eq)]
pub struct ValidatedAssertion {
    pub request_id: String,
    pub subject: String,
    pub auth_level: AuthLevel,
    pub groups: Vec<String>,
}

pub fn decode_base64(encoded: &str) -> Result<String, RejectReason> {
    let compact: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = STANDARD
        .decode(compact)
        .map_err(|e| RejectReason::Malformed(format!("base64 decode failed: {e}")))?;
    String::from_utf8(bytes).map_err(|e| RejectReason::Malformed(format!("invalid UTF-8: {e}")))
}

pub fn parse(xml: &str) -> Result<Response, RejectReason> {
    xml.parse()
        .map_err(|e| RejectReason::Malformed(format!("failed to parse Response: {e}")))
}

/// Checks the Response against what this login expects, then takes every
/// identity claim from `verified`, the assertion the signature verifier
/// returned. The envelope is only compared with expected values; nothing in
/// it is trusted.
pub fn validate(
    response: &Response,
    verified: &Assertion,
    expect: &Expectations<'_>,
    now: DateTime<Utc>,
) -> Result<ValidatedAssertion, RejectReason> {
    check_envelope(response, expect, now)?;
    check_assertion(verified, expect, now)
}

fn check_envelope(
    response: &Response,
    expect: &Expectations<'_>,
    now: DateTime<Utc>,
) -> Result<(), RejectReason> {
    let status = response
        .status
        .as_ref()
        .and_then(|s| s.status_code.value.as_deref())
        .unwrap_or("missing");
    if status != STATUS_SUCCESS {
        return Err(RejectReason::Status(status.to_string()));
    }

    if response.destination.as_deref() != Some(expect.sp.acs_url.as_str()) {
        return Err(RejectReason::Destination {
            expected: expect.sp.acs_url.clone(),
            found: response.destination.clone(),
        });
    }

    if let Some(issuer) = response.issuer.as_ref().and_then(|i| i.value.as_deref())
        && issuer != expect.idp_label
    {
        return Err(RejectReason::Issuer {
            expected: expect.idp_label.to_string(),
            found: Some(issuer.to_string()),
        });
    }

    match response.in_response_to.as_deref() {
        Some(id) if id == expect.relay.request_id => {}
        found => {
            return Err(RejectReason::InResponseTo {
                expected: expect.relay.request_id.clone(),
                found: found.map(str::to_string),
            });
        }
    }

    let skew = expect.clock_skew;
    let instant = response.issue_instant;
    if instant < expect.relay.issued_at - skew || instant > now + skew {
        return Err(RejectReason::IssueInstant);
    }
    Ok(())
}

fn check_assertion(
    assertion: &Assertion,
    expect: &Expectations<'_>,
    now: DateTime<Utc>,
) -> Result<ValidatedAssertion, RejectReason> {
    let skew = expect.clock_skew;
    let assertion_issuer = assertion.issuer.value.as_deref();
    if assertion_issuer != Some(expect.idp_label) {
        return Err(RejectReason::Issuer {
            expected: expect.idp_label.to_string(),
            found: assertion_issuer.map(str::to_string),
        });
    }

    let conditions = assertion
        .conditions
        .as_ref()
        .ok_or(RejectReason::MissingConditions)?;

    let restrictions = conditions.audience_restrictions.as_deref().unwrap_or_default();
    let audience_ok = !restrictions.is_empty()
        && restrictions
            .iter()
            .all(|r| r.audience.iter().any(|a| *a == expect.sp.entity_id));
    if !audience_ok {
        return Err(RejectReason::Audience);
    }

    if let Some(not_before) = conditions.not_before
        && now + skew < not_before
    {
        return Err(RejectReason::NotYetValid);
    }
    match conditions.not_on_or_after {
        Some(not_on_or_after) if now - skew < not_on_or_after => {}
        _ => return Err(RejectReason::Expired),
    }

    let subject =
        subject(assertion, expect.subject_attribute).ok_or(RejectReason::MissingSubject)?;
    let auth_level = expect.levels.levels_for(&authn_contexts(assertion));
    let groups = attribute_values(assertion, expect.groups_attribute)
        .into_iter()
        .map(str::to_string)
        .collect();

    Ok(ValidatedAssertion {
        request_id: expect.relay.request_id.clone(),
        subject,
        auth_level,
        groups,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::saml::fixtures::{ResponseFixture, test_relay, test_sp};

    const IDP: &str = "https://idp.example.edu/idp";
    const IS_MEMBER_OF: &str = "urn:oid:1.3.6.1.4.1.5923.1.5.1.1";

    fn levels() -> AuthnContextLevels {
        "https://refeds.org/profile/mfa=2fa".parse().unwrap()
    }

    fn check(
        fixture: &ResponseFixture,
        attribute: Option<&str>,
    ) -> Result<ValidatedAssertion, RejectReason> {
        let sp = test_sp();
        let relay = test_relay(&fixture.in_response_to);
        let levels = levels();
        let expect = Expectations {
            sp: &sp,
            idp_label: IDP,
            relay: &relay,
            subject_attribute: attribute,
            groups_attribute: IS_MEMBER_OF,
            levels: &levels,
            clock_skew: Duration::seconds(180),
        };
        let response = parse(&fixture.xml()).unwrap();
        let assertion = response.assertion.clone().unwrap();
        validate(&response, &assertion, &expect, Utc::now())
    }

    #[test]
    fn accepts_a_well_formed_response() {
        let validated = check(&ResponseFixture::new("_req1"), None).unwrap();
        assert_eq!(validated.subject, "alice@example.edu");
        assert_eq!(validated.request_id, "_req1");
        assert!(validated.auth_level.is_empty());
        assert_eq!(validated.groups, vec!["u_staff", "u_admins"]);
    }

    #[test]
    fn subject_comes_from_configured_attribute() {
        let validated = check(&ResponseFixture::new("_req1"), Some("uid")).unwrap();
        assert_eq!(validated.subject, "alice");
    }

    #[test]
    fn mfa_context_maps_to_2fa() {
        let fixture = ResponseFixture {
            authn_context: "https://refeds.org/profile/mfa".into(),
            ..ResponseFixture::new("_req1")
        };
        let validated = check(&fixture, None).unwrap();
        assert!(validated.auth_level.contains("2fa"));
    }

    #[test]
    fn rejects_audience_mismatch() {
        let fixture = ResponseFixture {
            audience: "https://someone-else.example.edu".into(),
            ..ResponseFixture::new("_req1")
        };
        assert_eq!(check(&fixture, None), Err(RejectReason::Audience));
    }

    #[test]
    fn rejects_destination_mismatch() {
        let fixture = ResponseFixture {
            destination: "https://app.example.edu/saml/other".into(),
            ..ResponseFixture::new("_req1")
        };
        assert!(matches!(
            check(&fixture, None),
            Err(RejectReason::Destination { .. })
        ));
    }

    #[test]
    fn rejects_foreign_issuer() {
        let fixture = ResponseFixture {
            issuer: "https://evil.example.com/idp".into(),
            ..ResponseFixture::new("_req1")
        };
        assert!(matches!(
            check(&fixture, None),
            Err(RejectReason::Issuer { .. })
        ));
    }

    #[test]
    fn rejects_expired_and_future_assertions() {
        let now = Utc::now();
        let expired = ResponseFixture {
            not_before: now - Duration::hours(2),
            not_on_or_after: now - Duration::hours(1),
            ..ResponseFixture::new("_req1")
        };
        assert_eq!(check(&expired, None), Err(RejectReason::Expired));

        let future = ResponseFixture {
            not_before: now + Duration::hours(1),
            not_on_or_after: now + Duration::hours(2),
            ..ResponseFixture::new("_req1")
        };
        assert_eq!(check(&future, None), Err(RejectReason::NotYetValid));
    }

    #[test]
    fn tolerates_skew_within_window() {
        let now = Utc::now();
        let fixture = ResponseFixture {
            not_before: now + Duration::seconds(60),
            ..ResponseFixture::new("_req1")
        };
        assert!(check(&fixture, None).is_ok());
    }

    #[test]
    fn rejects_failed_status() {
        let fixture = ResponseFixture {
            status: "urn:oasis:names:tc:SAML:2.0:status:Responder".into(),
            ..ResponseFixture::new("_req1")
        };
        assert!(matches!(check(&fixture, None), Err(RejectReason::Status(_))));
    }

    #[test]
    fn rejects_response_to_another_request() {
        let sp = test_sp();
        let relay = test_relay("_expected");
        let levels = levels();
        let expect = Expectations {
            sp: &sp,
            idp_label: IDP,
            relay: &relay,
            subject_attribute: None,
            groups_attribute: IS_MEMBER_OF,
            levels: &levels,
            clock_skew: Duration::seconds(180),
        };
        let response = parse(&ResponseFixture::new("_substituted").xml()).unwrap();
        let assertion = response.assertion.clone().unwrap();
        assert!(matches!(
            validate(&response, &assertion, &expect, Utc::now()),
            Err(RejectReason::InResponseTo { .. })
        ));
    }

    #[test]
    fn missing_subject_attribute_is_rejected() {
        assert_eq!(
            check(&ResponseFixture::new("_req1"), Some("employeeNumber")),
            Err(RejectReason::MissingSubject)
        );
    }

    #[test]
    fn malformed_input_is_rejected() {
        assert!(matches!(
            decode_base64("%%%"),
            Err(RejectReason::Malformed(_))
        ));
        assert!(matches!(parse("<notsaml/>"), Err(RejectReason::Malformed(_))));
    }
}
