//! The blob module: small immutable byte blobs (schemas, documents)
//! keyed by a 32-byte id and bound to their author.

use serde::{Deserialize, Serialize};

use crate::action::{self, ActionPayload, Payload};
use crate::codec;
use crate::did::{Did, Identity};
use crate::error::{ClientError, Result};
use crate::ledger::{LedgerConnection, Receipt, WaitFor};
use crate::policy::SignerPolicy;
use crate::signer::SignerSet;
use crate::tx::Call;

/// Storage module name on the ledger.
pub const MODULE: &str = "blob";

/// The ledger rejects blobs larger than this; checked client-side so
/// oversized input fails before any signing or network access.
pub const MAX_BLOB_SIZE: usize = 8192;

/// Unique identifier of a blob.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BlobId(pub [u8; 32]);

impl BlobId {
    pub fn random() -> Self {
        Self(rand::random())
    }
}

impl std::fmt::Display for BlobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

/// Primitive actions of the blob module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlobAction {
    New {
        id: BlobId,
        blob: Vec<u8>,
        author: Did,
    },
}

impl BlobAction {
    pub fn name(&self) -> &'static str {
        match self {
            Self::New { .. } => "blob.new",
        }
    }

    pub fn policy(&self) -> SignerPolicy {
        match self {
            Self::New { author, .. } => SignerPolicy::Single {
                target: Identity::Did(*author),
            },
        }
    }
}

/// Client for the blob module.
pub struct BlobModule<'a, L: LedgerConnection + ?Sized> {
    ledger: &'a L,
}

impl<'a, L: LedgerConnection + ?Sized> BlobModule<'a, L> {
    pub fn new(ledger: &'a L) -> Self {
        Self { ledger }
    }

    pub fn payload(&self, action: BlobAction, nonce: u64) -> Payload {
        action::payload(ActionPayload::Blob(action), nonce)
    }

    pub async fn tx(&self, action: BlobAction, signers: &SignerSet<'_>) -> Result<Call> {
        Self::check_size(&action)?;
        action::tx(self.ledger, ActionPayload::Blob(action), signers).await
    }

    pub async fn send(
        &self,
        action: BlobAction,
        signers: &SignerSet<'_>,
        wait: WaitFor,
    ) -> Result<Receipt> {
        Self::check_size(&action)?;
        action::send(self.ledger, ActionPayload::Blob(action), signers, wait).await
    }

    /// Read a stored blob and its author, `None` when absent.
    pub async fn get_blob(&self, id: &BlobId) -> Result<Option<(Did, Vec<u8>)>> {
        let key = codec::encode(id)?;
        match self.ledger.query(MODULE, &key).await? {
            Some(bytes) => Ok(Some(codec::decode(&bytes)?)),
            None => Ok(None),
        }
    }

    fn check_size(action: &BlobAction) -> Result<()> {
        let BlobAction::New { blob, .. } = action;
        if blob.len() > MAX_BLOB_SIZE {
            return Err(ClientError::Validation {
                path: "blob".to_string(),
                expected: format!("at most {MAX_BLOB_SIZE} bytes"),
                found: format!("{} bytes", blob.len()),
            });
        }
        Ok(())
    }
}
