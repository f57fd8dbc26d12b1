//! The message envelope and its authorization block (spec §4.1).
//!
//! Grounded in the teacher's orphaned `RecordsWrite`/`SignaturePayload`/
//! `AuthorizationModel` types (`dwn/records_write.rs`): a signature payload
//! naming the descriptor's CID plus whatever scoping claims the signer is
//! making, wrapped in a `GeneralJws`, with an optional delegated grant
//! carried alongside for the one level of author delegation the spec
//! allows.
use serde::{Deserialize, Serialize};

use crate::crypto::Signer;
use crate::did::DidResolver;

use super::jws::GeneralJws;
use super::Error;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SignaturePayload {
    #[serde(rename = "descriptorCid")]
    pub descriptor_cid: String,
    #[serde(rename = "permissionGrantId", skip_serializing_if = "Option::is_none")]
    pub permission_grant_id: Option<String>,
    #[serde(rename = "protocolRole", skip_serializing_if = "Option::is_none")]
    pub protocol_role: Option<String>,
    #[serde(rename = "delegatedGrantId", skip_serializing_if = "Option::is_none")]
    pub delegated_grant_id: Option<String>,
}

impl SignaturePayload {
    pub fn new(descriptor_cid: String) -> Self {
        SignaturePayload {
            descriptor_cid,
            permission_grant_id: None,
            protocol_role: None,
            delegated_grant_id: None,
        }
    }

    pub fn with_permission_grant_id(mut self, id: impl Into<String>) -> Self {
        self.permission_grant_id = Some(id.into());
        self
    }

    pub fn with_protocol_role(mut self, role: impl Into<String>) -> Self {
        self.protocol_role = Some(role.into());
        self
    }

    pub fn with_delegated_grant_id(mut self, id: impl Into<String>) -> Self {
        self.delegated_grant_id = Some(id.into());
        self
    }
}

/// A permission grant message carried alongside a delegated authorization,
/// minimal enough only to recover its own signer. Its descriptor is opaque
/// here; `auth::grant` re-parses it into a full `PermissionGrant` once the
/// grant's own record is needed rather than duplicating that shape here.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DelegatedGrant {
    pub descriptor: serde_json::Value,
    pub authorization: MessageAuthorization,
    #[serde(rename = "recordId")]
    pub record_id: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MessageAuthorization {
    pub signature: GeneralJws,
    #[serde(rename = "authorDelegatedGrant", skip_serializing_if = "Option::is_none")]
    pub author_delegated_grant: Option<Box<DelegatedGrant>>,
}

impl MessageAuthorization {
    /// The DID that produced `signature`.
    pub fn signer(&self) -> Result<String, Error> {
        self.signature.signer()
    }

    /// The DID this message is attributed to: the signer, unless a
    /// delegated grant names a different author. A delegated grant whose
    /// own authorization delegates further is rejected rather than
    /// recursed into — the spec allows exactly one hop.
    pub fn author(&self) -> Result<String, Error> {
        match &self.author_delegated_grant {
            None => self.signer(),
            Some(grant) => {
                if grant.authorization.author_delegated_grant.is_some() {
                    return Err(Error::CyclicDelegation);
                }
                grant.authorization.signer()
            }
        }
    }

    pub fn signature_payload(&self) -> Result<SignaturePayload, Error> {
        let bytes = self.signature.payload_bytes()?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Message<D> {
    pub descriptor: D,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authorization: Option<MessageAuthorization>,
}

impl<D: Serialize> Message<D> {
    pub fn new(descriptor: D) -> Self {
        Message { descriptor, authorization: None }
    }

    pub fn descriptor_cid(&self) -> Result<String, Error> {
        super::codec::cid(&self.descriptor)
    }

    /// The message's own identity (spec §3): the CID of the canonical
    /// encoding of `{descriptor, authorization}`, not just the descriptor.
    /// This is what every handler must use as its store key, event-log
    /// entry, and "newest wins" CID tiebreak — two descriptors that are
    /// otherwise identical but signed by different authors (or carrying
    /// different `authorDelegatedGrant`s) are different messages.
    pub fn full_cid(&self) -> Result<String, Error> {
        super::codec::cid(self)
    }

    /// Signs over this message's descriptor CID, producing the
    /// authorization block. `payload` must already carry this message's
    /// `descriptorCid` (via [`SignaturePayload::new`]).
    pub fn authorize(
        &mut self,
        signer: &dyn Signer,
        payload: SignaturePayload,
        author_delegated_grant: Option<Box<DelegatedGrant>>,
    ) -> Result<(), Error> {
        let payload_bytes = serde_json::to_vec(&payload)?;
        let signature = GeneralJws::build(&payload_bytes, &[signer])?;
        self.authorization = Some(MessageAuthorization { signature, author_delegated_grant });
        Ok(())
    }

    /// Verifies every signature in the authorization block (including a
    /// delegated grant's own, if present) and that the signed payload
    /// actually names this message's descriptor.
    pub async fn verify_authorization(&self, resolver: &dyn DidResolver) -> Result<(), Error> {
        let auth = self.authorization.as_ref().ok_or(Error::NoSignatures)?;
        auth.signature.verify(resolver).await?;

        let payload = auth.signature_payload()?;
        let expected = self.descriptor_cid()?;
        if payload.descriptor_cid != expected {
            return Err(Error::CidInvalid(format!(
                "signed descriptorCid {} does not match computed {}",
                payload.descriptor_cid, expected
            )));
        }

        if let Some(grant) = &auth.author_delegated_grant {
            if grant.authorization.author_delegated_grant.is_some() {
                return Err(Error::CyclicDelegation);
            }
            grant.authorization.signature.verify(resolver).await?;
        }
        Ok(())
    }
}
