use super::IdpConfig;
use crate::error::Error;
use samael::metadata::EntityDescriptor;

/// Builds the IdP EntityDescriptor samael needs (signing key and SSO
/// endpoint) from connection parameters, for IdPs that are configured by
/// value rather than by published metadata.
pub fn entity_descriptor(idp: &IdpConfig) -> Result<EntityDescriptor, Error> {
    let xml = format!(
        r#"<md:EntityDescriptor xmlns:md="urn:oasis:names:tc:SAML:2.0:metadata" entityID="{entity_id}">
    <md:IDPSSODescriptor protocolSupportEnumeration="urn:oasis:names:tc:SAML:2.0:protocol">
        <md:KeyDescriptor use="signing">
            <ds:KeyInfo xmlns:ds="http://www.w3.org/2000/09/xmldsig#">
                <ds:X509Data>
                    <ds:X509Certificate>{certificate}</ds:X509Certificate>
                </ds:X509Data>
            </ds:KeyInfo>
        </md:KeyDescriptor>
        <md:SingleSignOnService Binding="urn:oasis:names:tc:SAML:2.0:bindings:HTTP-Redirect" Location="{sso_url}"/>
    </md:IDPSSODescriptor>
</md:EntityDescriptor>"#,
        entity_id = xml_attr(&idp.label),
        certificate = idp.certificate,
        sso_url = xml_attr(&idp.sso_url),
    );

    samael::metadata::de::from_str(&xml).map_err(|e| {
        Error::IdpConfiguration(format!("cannot build metadata for {}: {e}", idp.label))
    })
}

fn xml_attr(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('"', "&quot;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::idp::tests::test_idp;
    use samael::metadata::HTTP_REDIRECT_BINDING;

    #[test]
    fn descriptor_carries_entity_id_and_sso_endpoint() {
        let idp = test_idp();
        let descriptor = entity_descriptor(&idp).unwrap();
        assert_eq!(descriptor.entity_id.as_deref(), Some(idp.label.as_str()));

        let sso = descriptor
            .idp_sso_descriptors
            .as_ref()
            .and_then(|d| d.first())
            .and_then(|d| d.single_sign_on_services.first())
            .unwrap();
        assert_eq!(sso.binding, HTTP_REDIRECT_BINDING);
        assert_eq!(sso.location, idp.sso_url);
    }

    #[test]
    fn escapes_attribute_values() {
        assert_eq!(xml_attr(r#"a&b"c"#), "a&amp;b&quot;c");
    }
}
