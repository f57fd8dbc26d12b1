//! Scope narrowing: step 3 of the authorization sequence (spec §4.4) — once
//! a grant has been resolved and confirmed to cover the incoming
//! interface/method (spec §4.4 step 2, `auth::grant`), each per-interface
//! authorizer narrows further against the grant's `ProtocolPermissionScope`.
//!
//! No teacher precedent (the teacher's `dwn/permission.rs` models key
//! derivation capability tokens, not protocol-scoped grants); grounded
//! directly in the scope-matching rules spec §4.4 step 3 spells out per
//! interface.
use crate::permission::PermissionGrant;

use super::Error;

/// `ProtocolsConfigure` requires an exact match between the grant's scoped
/// protocol and the definition being configured.
pub fn check_protocols_configure_scope(grant: &PermissionGrant, protocol: &str) -> Result<(), Error> {
    let scope = grant
        .scope
        .protocol
        .as_ref()
        .ok_or_else(|| crate::permission::Error::GrantProtocolScopeMismatch(grant.id.clone()))?;
    if scope.protocol != protocol {
        return Err(crate::permission::Error::GrantProtocolScopeMismatch(grant.id.clone()).into());
    }
    Ok(())
}

/// `ProtocolsQuery` only narrows when the query itself names a protocol;
/// an unscoped query under a protocol-scoped grant is allowed to proceed
/// (the grant just doesn't widen what the query can see beyond its own
/// filter).
pub fn check_protocols_query_scope(grant: &PermissionGrant, filter_protocol: Option<&str>) -> Result<(), Error> {
    let Some(requested) = filter_protocol else { return Ok(()) };
    let scope = grant
        .scope
        .protocol
        .as_ref()
        .ok_or_else(|| crate::permission::Error::GrantProtocolScopeMismatch(grant.id.clone()))?;
    if scope.protocol != requested {
        return Err(crate::permission::Error::GrantProtocolScopeMismatch(grant.id.clone()).into());
    }
    Ok(())
}

/// `EventsQuery` requires every filter in the query to target the grant's
/// protocol — a grant scoped to one protocol cannot be used to watch an
/// unscoped or differently-scoped event feed.
pub fn check_events_query_scope(grant: &PermissionGrant, filter_protocols: &[Option<String>]) -> Result<(), Error> {
    let scope = grant
        .scope
        .protocol
        .as_ref()
        .ok_or_else(|| crate::permission::Error::GrantProtocolScopeMismatch(grant.id.clone()))?;
    for protocol in filter_protocols {
        match protocol {
            Some(p) if p == &scope.protocol => {}
            _ => return Err(crate::permission::Error::GrantProtocolScopeMismatch(grant.id.clone()).into()),
        }
    }
    Ok(())
}

/// The record-identifying fields a `Records/{Write,Query,Read,Delete}`
/// authorizer narrows a protocol-scoped grant against. Only the fields the
/// grant itself constrains (`Some` on `ProtocolPermissionScope`) need to
/// match; a grant scoped to just a protocol covers every record under it.
#[derive(Clone, Debug, Default)]
pub struct RecordScopeRequest {
    pub protocol: String,
    pub protocol_path: Option<String>,
    pub context_id: Option<String>,
    pub record_id: Option<String>,
    pub schema: Option<String>,
}

pub fn check_records_scope(grant: &PermissionGrant, request: &RecordScopeRequest) -> Result<(), Error> {
    let scope = grant
        .scope
        .protocol
        .as_ref()
        .ok_or_else(|| crate::permission::Error::GrantProtocolScopeMismatch(grant.id.clone()))?;

    let mismatch = || crate::permission::Error::GrantProtocolScopeMismatch(grant.id.clone());

    if scope.protocol != request.protocol {
        return Err(mismatch().into());
    }
    if let Some(path) = &scope.protocol_path {
        if request.protocol_path.as_deref() != Some(path.as_str()) {
            return Err(mismatch().into());
        }
    }
    if let Some(context_id) = &scope.context_id {
        if request.context_id.as_deref() != Some(context_id.as_str()) {
            return Err(mismatch().into());
        }
    }
    if let Some(record_id) = &scope.record_id {
        if request.record_id.as_deref() != Some(record_id.as_str()) {
            return Err(mismatch().into());
        }
    }
    if let Some(schema) = &scope.schema {
        if request.schema.as_deref() != Some(schema.as_str()) {
            return Err(mismatch().into());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{Interface, Method};
    use crate::permission::{Conditions, ProtocolPermissionScope, Scope};

    fn grant_scoped(protocol: &str, protocol_path: Option<&str>) -> PermissionGrant {
        PermissionGrant {
            id: "grant-1".to_string(),
            grantor: "did:example:alice".to_string(),
            grantee: "did:example:bob".to_string(),
            date_granted: "2024-01-01T00:00:00.000000Z".to_string(),
            date_expires: "2999-01-01T00:00:00.000000Z".to_string(),
            scope: Scope {
                interface: Interface::Records,
                method: Method::Write,
                protocol: Some(ProtocolPermissionScope {
                    protocol: protocol.to_string(),
                    protocol_path: protocol_path.map(|s| s.to_string()),
                    context_id: None,
                    record_id: None,
                    schema: None,
                }),
            },
            conditions: Conditions::default(),
        }
    }

    #[test]
    fn protocols_configure_scope_requires_exact_protocol_match() {
        let grant = grant_scoped("https://p", None);
        assert!(check_protocols_configure_scope(&grant, "https://p").is_ok());
        assert!(check_protocols_configure_scope(&grant, "https://q").is_err());
    }

    #[test]
    fn protocols_query_scope_is_unconstrained_without_a_filter() {
        let grant = grant_scoped("https://p", None);
        assert!(check_protocols_query_scope(&grant, None).is_ok());
        assert!(check_protocols_query_scope(&grant, Some("https://q")).is_err());
    }

    #[test]
    fn events_query_scope_requires_every_filter_to_match() {
        let grant = grant_scoped("https://p", None);
        let all_match = vec![Some("https://p".to_string()), Some("https://p".to_string())];
        assert!(check_events_query_scope(&grant, &all_match).is_ok());
        let one_mismatched = vec![Some("https://p".to_string()), Some("https://q".to_string())];
        assert!(check_events_query_scope(&grant, &one_mismatched).is_err());
        let unscoped = vec![None];
        assert!(check_events_query_scope(&grant, &unscoped).is_err());
    }

    #[test]
    fn records_scope_checks_protocol_path_when_grant_sets_it() {
        let grant = grant_scoped("https://p", Some("thread"));
        let matching = RecordScopeRequest {
            protocol: "https://p".to_string(),
            protocol_path: Some("thread".to_string()),
            ..Default::default()
        };
        assert!(check_records_scope(&grant, &matching).is_ok());

        let mismatched =
            RecordScopeRequest { protocol: "https://p".to_string(), protocol_path: Some("other".to_string()), ..Default::default() };
        assert!(check_records_scope(&grant, &mismatched).is_err());
    }

    #[test]
    fn records_scope_without_grant_protocol_path_accepts_any_path() {
        let grant = grant_scoped("https://p", None);
        let request =
            RecordScopeRequest { protocol: "https://p".to_string(), protocol_path: Some("anything".to_string()), ..Default::default() };
        assert!(check_records_scope(&grant, &request).is_ok());
    }
}
