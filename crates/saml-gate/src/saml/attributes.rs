use samael::schema::Assertion;

/// Values of the attribute whose `Name` or `FriendlyName` is `name`, across
/// all attribute statements. Empty values are skipped.
pub fn attribute_values<'a>(assertion: &'a Assertion, name: &str) -> Vec<&'a str> {
    let Some(stmts) = &assertion.attribute_statements else {
        return Vec::new();
    };
    stmts
        .iter()
        .flat_map(|stmt| &stmt.attributes)
        .filter(|attr| {
            attr.name.as_deref() == Some(name) || attr.friendly_name.as_deref() == Some(name)
        })
        .flat_map(|attr| &attr.values)
        .filter_map(|v| v.value.as_deref())
        .filter(|v| !v.is_empty())
        .collect()
}

/// The subject: first value of `attribute` when one is configured, the
/// NameID otherwise.
pub fn subject(assertion: &Assertion, attribute: Option<&str>) -> Option<String> {
    match attribute {
        Some(name) => attribute_values(assertion, name)
            .first()
            .map(|v| v.to_string()),
        None => assertion
            .subject
            .as_ref()
            .and_then(|s| s.name_id.as_ref())
            .map(|n| n.value.trim().to_string())
            .filter(|v| !v.is_empty()),
    }
}

/// AuthnContextClassRef values from the assertion's authn statements.
pub fn authn_contexts(assertion: &Assertion) -> Vec<&str> {
    let Some(stmts) = &assertion.authn_statements else {
        return Vec::new();
    };
    stmts
        .iter()
        .filter_map(|stmt| stmt.authn_context.as_ref())
        .filter_map(|ctx| ctx.value.as_ref())
        .filter_map(|class_ref| class_ref.value.as_deref())
        .map(str::trim)
        .collect()
}
