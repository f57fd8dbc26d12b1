//! Component C4: the authorization sequence spec §4.4 calls "the most
//! intricate algorithmic part" — tenant shortcut, grant resolution, scope
//! narrowing, and (Records only) protocol rule evaluation, each in its own
//! submodule since each step has a materially different shape.
pub mod error;
pub mod grant;
pub mod rules;
pub mod scope;

pub use error::Error;

/// Step 1 of spec §4.4: a message's own tenant always admits it, with no
/// further checks. Every handler calls this before reaching for a grant.
pub fn is_tenant_shortcut(tenant: &str, author: &str) -> bool {
    tenant == author
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tenant_shortcut_matches_only_the_tenant_itself() {
        assert!(is_tenant_shortcut("did:example:alice", "did:example:alice"));
        assert!(!is_tenant_shortcut("did:example:alice", "did:example:bob"));
    }
}
