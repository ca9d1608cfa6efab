//! The DID module: identity registration, keys, controllers, services.
//!
//! Primitive actions mutate one category of an identity document each.
//! The composite [`DidModule::update_document`] reconciles a whole
//! desired document against the stored one: it reads the current
//! document once, compiles the difference into an ordered plan of
//! primitive actions sharing one nonce timeline, and submits the plan
//! as a single atomic batch.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::action::{self, ActionPayload, Payload};
use crate::codec;
use crate::did::{Did, DidDocument, DidKey, Identity, ServiceEndpoint};
use crate::diff;
use crate::error::{ClientError, Result};
use crate::ledger::{LedgerConnection, Receipt, WaitFor};
use crate::nonce::NonceSequencer;
use crate::policy::SignerPolicy;
use crate::signer::{Signer, SignerSet};
use crate::tx::{Call, Transaction};

/// Storage module name on the ledger.
pub const MODULE: &str = "did";

// ── Actions ───────────────────────────────────────────────────────────────────

/// Primitive actions of the DID module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DidAction {
    /// Register a new self-controlled DID with an initial key.
    New {
        did: Did,
        key: DidKey,
        controllers: BTreeSet<Identity>,
    },
    AddKeys {
        did: Did,
        keys: Vec<(u32, DidKey)>,
    },
    RemoveKeys {
        did: Did,
        keys: Vec<u32>,
    },
    AddControllers {
        did: Did,
        controllers: BTreeSet<Identity>,
    },
    RemoveControllers {
        did: Did,
        controllers: BTreeSet<Identity>,
    },
    AddServiceEndpoint {
        did: Did,
        id: String,
        endpoint: ServiceEndpoint,
    },
    RemoveServiceEndpoint {
        did: Did,
        id: String,
    },
    RemoveDid {
        did: Did,
    },
}

impl DidAction {
    /// The registered action name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::New { .. } => "did.new",
            Self::AddKeys { .. } => "did.add_keys",
            Self::RemoveKeys { .. } => "did.remove_keys",
            Self::AddControllers { .. } => "did.add_controllers",
            Self::RemoveControllers { .. } => "did.remove_controllers",
            Self::AddServiceEndpoint { .. } => "did.add_service_endpoint",
            Self::RemoveServiceEndpoint { .. } => "did.remove_service_endpoint",
            Self::RemoveDid { .. } => "did.remove",
        }
    }

    /// The DID whose document this action touches.
    pub fn did(&self) -> Did {
        match self {
            Self::New { did, .. }
            | Self::AddKeys { did, .. }
            | Self::RemoveKeys { did, .. }
            | Self::AddControllers { did, .. }
            | Self::RemoveControllers { did, .. }
            | Self::AddServiceEndpoint { did, .. }
            | Self::RemoveServiceEndpoint { did, .. }
            | Self::RemoveDid { did } => *did,
        }
    }

    pub fn policy(&self) -> SignerPolicy {
        SignerPolicy::Single {
            target: Identity::Did(self.did()),
        }
    }
}

// ── Client ────────────────────────────────────────────────────────────────────

/// Client for the DID module.
pub struct DidModule<'a, L: LedgerConnection + ?Sized> {
    ledger: &'a L,
}

impl<'a, L: LedgerConnection + ?Sized> DidModule<'a, L> {
    pub fn new(ledger: &'a L) -> Self {
        Self { ledger }
    }

    /// Pure payload construction.
    pub fn payload(&self, action: DidAction, nonce: u64) -> Payload {
        action::payload(ActionPayload::Did(action), nonce)
    }

    /// Fully signed, unsubmitted call.
    pub async fn tx(&self, action: DidAction, signers: &SignerSet<'_>) -> Result<Call> {
        action::tx(self.ledger, ActionPayload::Did(action), signers).await
    }

    /// Sign, submit, and await the receipt.
    pub async fn send(
        &self,
        action: DidAction,
        signers: &SignerSet<'_>,
        wait: WaitFor,
    ) -> Result<Receipt> {
        action::send(self.ledger, ActionPayload::Did(action), signers, wait).await
    }

    /// Read the stored identity document, `None` when unregistered.
    pub async fn get_document(&self, did: &Did) -> Result<Option<DidDocument>> {
        let key = codec::encode(did)?;
        match self.ledger.query(MODULE, &key).await? {
            Some(bytes) => Ok(Some(codec::decode(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Reconcile the stored document with `desired` in one atomic batch.
    ///
    /// Reads the current document and the signer's nonce once each
    /// (the read is skipped when `starting_nonce` is supplied), compiles
    /// the difference into primitive actions — removals before
    /// additions — and signs each sub-action at the next nonce in the
    /// sequencer's timeline. An identical document fails with
    /// [`ClientError::NoChanges`] before any signing happens.
    pub async fn update_document(
        &self,
        desired: &DidDocument,
        signer: &dyn Signer,
        starting_nonce: Option<u64>,
        wait: WaitFor,
    ) -> Result<Receipt> {
        let subject = Identity::Did(desired.id);
        if signer.identity() != subject {
            return Err(ClientError::SignerMismatch {
                signer: signer.identity().to_string(),
                target: subject.to_string(),
            });
        }

        let current = self
            .get_document(&desired.id)
            .await?
            .ok_or_else(|| ClientError::NotFound(desired.id.to_string()))?;
        let plan = diff::document::plan(&current, desired)?;
        log::debug!(
            "document update for {} compiles to {} sub-action(s)",
            desired.id,
            plan.actions.len()
        );

        let mut sequencer =
            NonceSequencer::start(self.ledger, signer.identity(), starting_nonce).await?;
        let mut calls = Vec::with_capacity(plan.actions.len());
        for action in plan.actions {
            let nonce = sequencer.next();
            let envelope = action::envelope(&action, signer, nonce).await?;
            calls.push(Call {
                action,
                envelopes: vec![envelope],
            });
        }

        crate::tx::submit(self.ledger, Transaction::Batch(calls), wait).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::did::{DocumentKey, PublicKey, VerRels};
    use crate::ledger::MockLedger;
    use crate::signer::DidKeypair;

    fn seed_document(ledger: &MockLedger, doc: &DidDocument) {
        ledger.seed(
            MODULE,
            codec::encode(&doc.id).unwrap(),
            codec::encode(doc).unwrap(),
        );
    }

    fn key(seed: u8) -> DidKey {
        DidKey::new(PublicKey::Ed25519([seed; 32]), VerRels::all())
    }

    #[tokio::test]
    async fn test_get_document_roundtrip() {
        let ledger = MockLedger::new();
        let did = Did::random();
        let mut doc = DidDocument::new(did);
        doc.keys.insert(1, DocumentKey::own(did, key(1)));
        seed_document(&ledger, &doc);

        let module = DidModule::new(&ledger);
        assert_eq!(module.get_document(&did).await.unwrap(), Some(doc));
        assert_eq!(module.get_document(&Did::random()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_update_document_emits_sequenced_batch() {
        let ledger = MockLedger::new();
        let did = Did::random();
        let kp = DidKeypair::generate(did, 1);
        ledger.set_nonce(Identity::Did(did), 5);

        let mut current = DidDocument::new(did);
        current.keys.insert(1, DocumentKey::own(did, key(1)));
        seed_document(&ledger, &current);

        // Add a key and a controller in one update.
        let mut desired = current.clone();
        desired.keys.insert(2, DocumentKey::own(did, key(2)));
        desired.controllers.insert(Identity::Did(Did::random()));

        let module = DidModule::new(&ledger);
        let receipt = module
            .update_document(&desired, &kp, None, WaitFor::Inclusion)
            .await
            .unwrap();
        assert_eq!(receipt.applied, 2);
        assert_eq!(ledger.nonce_of(&Identity::Did(did)), 7);

        let submitted = ledger.submitted();
        let calls = submitted[0].calls();
        let nonces: Vec<u64> = calls.iter().map(|c| c.envelopes[0].nonce).collect();
        assert_eq!(nonces, vec![6, 7]);
    }

    #[tokio::test]
    async fn test_update_document_no_changes() {
        let ledger = MockLedger::new();
        let did = Did::random();
        let kp = DidKeypair::generate(did, 1);
        let doc = DidDocument::new(did);
        seed_document(&ledger, &doc);

        let module = DidModule::new(&ledger);
        let err = module
            .update_document(&doc, &kp, None, WaitFor::Inclusion)
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::NoChanges));
        assert!(ledger.submitted().is_empty());
    }

    #[tokio::test]
    async fn test_update_document_wrong_signer_fails_before_io() {
        let ledger = MockLedger::new();
        let doc = DidDocument::new(Did::random());
        let outsider = DidKeypair::generate(Did::random(), 1);

        let module = DidModule::new(&ledger);
        let err = module
            .update_document(&doc, &outsider, None, WaitFor::Inclusion)
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::SignerMismatch { .. }));
        assert_eq!(ledger.read_count(), 0);
    }
}
