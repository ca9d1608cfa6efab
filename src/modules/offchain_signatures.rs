//! The off-chain signatures module: signature parameters and the
//! public keys of off-chain signature schemes (BBS+ style), stored
//! separately from the core DID key space. Document keys whose scheme
//! belongs here are routed through these primitive actions by the
//! document diff compiler.

use serde::{Deserialize, Serialize};

use crate::action::{self, ActionPayload, Payload};
use crate::codec;
use crate::did::{Did, DidKey, Identity};
use crate::error::Result;
use crate::ledger::{LedgerConnection, Receipt, WaitFor};
use crate::policy::SignerPolicy;
use crate::signer::SignerSet;
use crate::tx::Call;

/// Storage module name on the ledger.
pub const MODULE: &str = "offchain_signatures";

/// Curve an off-chain signature scheme operates over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CurveType {
    Bls12381,
}

/// Reference to a stored parameter set: (author, counter).
pub type ParamsRef = (Did, u32);

/// Signature parameters published by an author.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OffchainParams {
    pub label: Option<Vec<u8>>,
    pub curve_type: CurveType,
    pub bytes: Vec<u8>,
}

/// Primitive actions of the off-chain signatures module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OffchainAction {
    AddParams {
        author: Did,
        params: OffchainParams,
    },
    RemoveParams {
        author: Did,
        counter: u32,
    },
    /// Attach an off-chain public key to a DID's document at `key_id`.
    AddKey {
        did: Did,
        key_id: u32,
        key: DidKey,
        params_ref: Option<ParamsRef>,
    },
    RemoveKey {
        did: Did,
        key_id: u32,
    },
}

impl OffchainAction {
    pub fn name(&self) -> &'static str {
        match self {
            Self::AddParams { .. } => "offchain_signatures.add_params",
            Self::RemoveParams { .. } => "offchain_signatures.remove_params",
            Self::AddKey { .. } => "offchain_signatures.add_key",
            Self::RemoveKey { .. } => "offchain_signatures.remove_key",
        }
    }

    pub fn policy(&self) -> SignerPolicy {
        let target = match self {
            Self::AddParams { author, .. } | Self::RemoveParams { author, .. } => *author,
            Self::AddKey { did, .. } | Self::RemoveKey { did, .. } => *did,
        };
        SignerPolicy::Single {
            target: Identity::Did(target),
        }
    }
}

/// Client for the off-chain signatures module.
pub struct OffchainSignaturesModule<'a, L: LedgerConnection + ?Sized> {
    ledger: &'a L,
}

impl<'a, L: LedgerConnection + ?Sized> OffchainSignaturesModule<'a, L> {
    pub fn new(ledger: &'a L) -> Self {
        Self { ledger }
    }

    pub fn payload(&self, action: OffchainAction, nonce: u64) -> Payload {
        action::payload(ActionPayload::OffchainSignatures(action), nonce)
    }

    pub async fn tx(&self, action: OffchainAction, signers: &SignerSet<'_>) -> Result<Call> {
        action::tx(self.ledger, ActionPayload::OffchainSignatures(action), signers).await
    }

    pub async fn send(
        &self,
        action: OffchainAction,
        signers: &SignerSet<'_>,
        wait: WaitFor,
    ) -> Result<Receipt> {
        action::send(
            self.ledger,
            ActionPayload::OffchainSignatures(action),
            signers,
            wait,
        )
        .await
    }

    /// Read one parameter set by (author, counter), `None` when absent.
    pub async fn get_params(&self, params_ref: &ParamsRef) -> Result<Option<OffchainParams>> {
        let key = codec::encode(params_ref)?;
        match self.ledger.query(MODULE, &key).await? {
            Some(bytes) => Ok(Some(codec::decode(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Read every parameter set an author has published, in counter order.
    pub async fn get_params_by_author(&self, author: &Did) -> Result<Vec<OffchainParams>> {
        let key = codec::encode(&(author, "params"))?;
        match self.ledger.query(MODULE, &key).await? {
            Some(bytes) => codec::decode(&bytes),
            None => Ok(Vec::new()),
        }
    }

    /// Read one off-chain public key from a DID's document, `None` when absent.
    pub async fn get_key(&self, did: &Did, key_id: u32) -> Result<Option<DidKey>> {
        let key = codec::encode(&(did, key_id))?;
        match self.ledger.query(MODULE, &key).await? {
            Some(bytes) => Ok(Some(codec::decode(&bytes)?)),
            None => Ok(None),
        }
    }
}
