//! The status list credential module: revocation/suspension status
//! lists stored as opaque credential bytes under a 32-byte id, guarded
//! by a policy naming the identities allowed to update or remove them.
//!
//! The policy travels in the action arguments, so an unauthorized
//! signer is rejected locally — before any ledger call.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::action::{self, ActionPayload, Payload};
use crate::codec;
use crate::did::{Did, Identity};
use crate::error::Result;
use crate::ledger::{LedgerConnection, Receipt, WaitFor};
use crate::policy::SignerPolicy;
use crate::signer::SignerSet;
use crate::tx::Call;

/// Storage module name on the ledger.
pub const MODULE: &str = "status_list_credential";

/// Unique identifier of a status list credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StatusListId(pub [u8; 32]);

impl StatusListId {
    pub fn random() -> Self {
        Self(rand::random())
    }
}

impl std::fmt::Display for StatusListId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

/// Who may update or remove a status list credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatusListPolicy {
    /// Any single identity from the set.
    OneOf(BTreeSet<Identity>),
}

/// The stored credential plus its policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusListCredential {
    pub credential: Vec<u8>,
    pub policy: StatusListPolicy,
}

/// Primitive actions of the status list credential module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatusListAction {
    /// Create a credential, establishing its policy; issuer-signed.
    Create {
        id: StatusListId,
        issuer: Did,
        credential: Vec<u8>,
        policy: StatusListPolicy,
    },
    /// Replace the credential bytes; signed by a policy member.
    Update {
        id: StatusListId,
        credential: Vec<u8>,
        policy: StatusListPolicy,
    },
    /// Remove the credential; signed by a policy member.
    Remove {
        id: StatusListId,
        policy: StatusListPolicy,
    },
}

impl StatusListAction {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Create { .. } => "status_list_credential.create",
            Self::Update { .. } => "status_list_credential.update",
            Self::Remove { .. } => "status_list_credential.remove",
        }
    }

    pub fn policy(&self) -> SignerPolicy {
        match self {
            Self::Create { issuer, .. } => SignerPolicy::Single {
                target: Identity::Did(*issuer),
            },
            Self::Update { policy, .. } | Self::Remove { policy, .. } => {
                let StatusListPolicy::OneOf(authorized) = policy;
                SignerPolicy::OneOf(authorized.clone())
            }
        }
    }
}

/// Client for the status list credential module.
pub struct StatusListCredentialModule<'a, L: LedgerConnection + ?Sized> {
    ledger: &'a L,
}

impl<'a, L: LedgerConnection + ?Sized> StatusListCredentialModule<'a, L> {
    pub fn new(ledger: &'a L) -> Self {
        Self { ledger }
    }

    pub fn payload(&self, action: StatusListAction, nonce: u64) -> Payload {
        action::payload(ActionPayload::StatusListCredential(action), nonce)
    }

    pub async fn tx(&self, action: StatusListAction, signers: &SignerSet<'_>) -> Result<Call> {
        action::tx(
            self.ledger,
            ActionPayload::StatusListCredential(action),
            signers,
        )
        .await
    }

    pub async fn send(
        &self,
        action: StatusListAction,
        signers: &SignerSet<'_>,
        wait: WaitFor,
    ) -> Result<Receipt> {
        action::send(
            self.ledger,
            ActionPayload::StatusListCredential(action),
            signers,
            wait,
        )
        .await
    }

    /// Read a stored credential and its policy, `None` when absent.
    pub async fn get_credential(
        &self,
        id: &StatusListId,
    ) -> Result<Option<StatusListCredential>> {
        let key = codec::encode(id)?;
        match self.ledger.query(MODULE, &key).await? {
            Some(bytes) => Ok(Some(codec::decode(&bytes)?)),
            None => Ok(None),
        }
    }
}
