//! Protocol rule evaluation: step 4 of the authorization sequence (spec
//! §4.4), Records-only. Resolves the rule set governing a record's
//! `protocolPath` and decides whether the acting DID satisfies at least
//! one of its `who`/`of`/`can` clauses, climbing the `parentId` chain to
//! evaluate `author of`/`recipient of` clauses against named ancestors.
//!
//! No direct teacher precedent — the teacher's `Protocol`/`SystemProtocols`
//! model a flat channel-permission capability, not a nested ruleset walked
//! by ancestry — so this is grounded in spec §4.4 step 4 and §3's
//! "Indexes" list (the `parentId`/`protocolPath`/`author` fields every
//! stored record carries) directly.
use std::collections::BTreeMap;

use crate::protocol::{Actor, ProtocolDefinition, RuleSet};
use crate::store::{IndexValue, MessageStore};

use super::Error;

/// The subset of an ancestor record's index map a `who: author of`/
/// `recipient of` clause can be evaluated against.
#[derive(Clone, Debug)]
pub struct Ancestor {
    pub protocol_path: String,
    pub author: String,
    pub recipient: Option<String>,
}

fn index_text(indexes: &BTreeMap<String, IndexValue>, key: &str) -> Option<String> {
    match indexes.get(key) {
        Some(IndexValue::Text(s)) => Some(s.clone()),
        _ => None,
    }
}

/// Climbs the `parentId` chain starting at `parent_id`, returning the
/// closest ancestor first. Stops at the first record with no further
/// `parentId` (the thread root).
pub async fn resolve_ancestors(
    message_store: &dyn MessageStore,
    tenant: &str,
    mut parent_id: Option<String>,
) -> Result<Vec<Ancestor>, Error> {
    let mut ancestors = Vec::new();
    while let Some(id) = parent_id {
        let record = message_store
            .get(tenant, &id)
            .await?
            .ok_or_else(|| Error::ProtocolRuleDenied(format!("ancestor record {id} not found")))?;
        let protocol_path = index_text(&record.indexes, "protocolPath")
            .ok_or_else(|| Error::ProtocolRuleDenied(format!("ancestor record {id} has no protocolPath")))?;
        let author = index_text(&record.indexes, "author")
            .ok_or_else(|| Error::ProtocolRuleDenied(format!("ancestor record {id} has no author")))?;
        let recipient = index_text(&record.indexes, "recipient");
        parent_id = index_text(&record.indexes, "parentId");
        ancestors.push(Ancestor { protocol_path, author, recipient });
    }
    Ok(ancestors)
}

/// Does any action clause for `action` admit `actor`, given the record's
/// own author/recipient and its resolved ancestor chain?
fn action_permitted(
    rule_set: &RuleSet,
    action: &str,
    actor: &str,
    record_author: &str,
    record_recipient: Option<&str>,
    ancestors: &[Ancestor],
) -> bool {
    rule_set
        .actions
        .iter()
        .filter(|rule| rule.can.iter().any(|c| c == action))
        .any(|rule| match rule.who {
            Actor::Anyone => true,
            Actor::Author => match &rule.of {
                None => actor == record_author,
                Some(path) => ancestors.iter().any(|a| &a.protocol_path == path && a.author == actor),
            },
            Actor::Recipient => match &rule.of {
                None => record_recipient == Some(actor),
                Some(path) => {
                    ancestors.iter().any(|a| &a.protocol_path == path && a.recipient.as_deref() == Some(actor))
                }
            },
        })
}

/// Resolves `protocol_definition`'s rule set at `protocol_path` and climbs
/// the record's ancestry, admitting `actor` for `action` iff at least one
/// applicable clause matches (spec §4.4 step 4: "Admission requires at
/// least one clause in the applicable ruleset to be satisfied").
#[allow(clippy::too_many_arguments)]
pub async fn authorize_action(
    message_store: &dyn MessageStore,
    tenant: &str,
    protocol_definition: &ProtocolDefinition,
    protocol_path: &str,
    action: &str,
    actor: &str,
    record_author: &str,
    record_recipient: Option<&str>,
    parent_id: Option<String>,
) -> Result<(), Error> {
    let rule_set = protocol_definition.rule_set_at(protocol_path)?;
    let ancestors = resolve_ancestors(message_store, tenant, parent_id).await?;
    if action_permitted(rule_set, action, actor, record_author, record_recipient, &ancestors) {
        Ok(())
    } else {
        Err(Error::ProtocolRuleDenied(format!("{action} denied for {actor} at {protocol_path}")))
    }
}
