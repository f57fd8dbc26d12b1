//! Permission grants: the record a tenant writes to authorize another DID
//! to act on their behalf, and the scope/condition checks `auth::grant`
//! runs against it (spec §4.4 step 2).
//!
//! The teacher's `dwn/permission.rs` models a different thing entirely (key
//! derivation capability tokens); this module borrows only its
//! builder-with-validate idiom, not its shape.
use serde::{Deserialize, Serialize};

use crate::message::{now_timestamp, validate_timestamp};

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("permission grant not found: {0}")]
    GrantNotFound(String),
    #[error("permission grant {0} was not granted to the requesting author")]
    GrantNotGrantedToAuthor(String),
    #[error("permission grant {0} is not granted for this operation")]
    GrantNotGranted(String),
    #[error("permission grant {0} has expired")]
    GrantExpired(String),
    #[error("permission grant {0} has been revoked")]
    GrantRevoked(String),
    #[error("permission grant {0} does not cover interface {1:?}")]
    GrantInterfaceMismatch(String, crate::message::Interface),
    #[error("permission grant {0} does not cover method {1:?}")]
    GrantMethodMismatch(String, crate::message::Method),
    #[error("permission grant {0} scope does not cover the requested protocol")]
    GrantProtocolScopeMismatch(String),
    #[error("permission grant {0} requires published = {1}")]
    GrantConditionViolated(String, bool),
    #[error(transparent)]
    Message(#[from] crate::message::Error),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProtocolPermissionScope {
    pub protocol: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protocol_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scope {
    pub interface: crate::message::Interface,
    pub method: crate::message::Method,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protocol: Option<ProtocolPermissionScope>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conditions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publication: Option<bool>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionGrant {
    pub id: String,
    pub grantor: String,
    pub grantee: String,
    pub date_granted: String,
    pub date_expires: String,
    pub scope: Scope,
    #[serde(default)]
    pub conditions: Conditions,
}

impl PermissionGrant {
    pub fn is_expired(&self) -> bool {
        matches!(crate::message::cmp_timestamps(&self.date_expires, &now_timestamp()), std::cmp::Ordering::Less | std::cmp::Ordering::Equal)
    }

    pub fn validate_timestamps(&self) -> Result<(), Error> {
        validate_timestamp(&self.date_granted)?;
        validate_timestamp(&self.date_expires)?;
        Ok(())
    }

    /// Checks `author` is actually this grant's grantee and that it
    /// hasn't expired. Split out from [`Self::authorizes`] so callers
    /// that also need to check revocation (against the message store,
    /// which this type has no access to) can run that check between
    /// this and [`Self::authorizes_operation`], matching the spec's
    /// grantee/expiry-before-revocation-before-scope ordering.
    pub fn authorizes_author(&self, author: &str) -> Result<(), Error> {
        if self.grantee != author {
            return Err(Error::GrantNotGrantedToAuthor(self.id.clone()));
        }
        if self.is_expired() {
            return Err(Error::GrantExpired(self.id.clone()));
        }
        Ok(())
    }

    /// Checks a grant-authorized `RecordsWrite` satisfies `conditions`.
    /// `conditions.publication` pins whether the grantee may only write
    /// published records (`Some(true)`) or only unpublished ones
    /// (`Some(false)`); unset imposes no constraint.
    pub fn check_conditions(&self, published: bool) -> Result<(), Error> {
        if let Some(required) = self.conditions.publication {
            if required != published {
                return Err(Error::GrantConditionViolated(self.id.clone(), required));
            }
        }
        Ok(())
    }

    /// Checks this grant's scope covers the requested interface/method.
    pub fn authorizes_operation(&self, interface: crate::message::Interface, method: crate::message::Method) -> Result<(), Error> {
        if self.scope.interface != interface {
            return Err(Error::GrantInterfaceMismatch(self.id.clone(), interface));
        }
        if self.scope.method != method {
            return Err(Error::GrantMethodMismatch(self.id.clone(), method));
        }
        Ok(())
    }

    /// Checks the grant actually authorizes `author` for the requested
    /// interface/method, independent of revocation (callers check
    /// revocation against the message store, which this type has no
    /// access to).
    pub fn authorizes(
        &self,
        author: &str,
        interface: crate::message::Interface,
        method: crate::message::Method,
    ) -> Result<(), Error> {
        self.authorizes_author(author)?;
        self.authorizes_operation(interface, method)
    }
}
