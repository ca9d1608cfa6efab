//! The attestation module: a single claim slot per identity, holding a
//! priority and an optional IRI. Setting a claim replaces the previous
//! one; the ledger enforces that the priority only ever increases.

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
pub const MODULE: &str = "attest";

/// The stored attestation claim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attestation {
    pub priority: u64,
    pub iri: Option<String>,
}

/// Primitive actions of the attestation module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttestAction {
    SetClaim {
        attester: Did,
        priority: u64,
        iri: Option<String>,
    },
}

impl AttestAction {
    pub fn name(&self) -> &'static str {
        match self {
            Self::SetClaim { .. } => "attest.set_claim",
        }
    }

    pub fn policy(&self) -> SignerPolicy {
        match self {
            Self::SetClaim { attester, .. } => SignerPolicy::Single {
                target: Identity::Did(*attester),
            },
        }
    }
}

/// Client for the attestation module.
pub struct AttestModule<'a, L: LedgerConnection + ?Sized> {
    ledger: &'a L,
}

impl<'a, L: LedgerConnection + ?Sized> AttestModule<'a, L> {
    pub fn new(ledger: &'a L) -> Self {
        Self { ledger }
    }

    pub fn payload(&self, action: AttestAction, nonce: u64) -> Payload {
        action::payload(ActionPayload::Attest(action), nonce)
    }

    pub async fn tx(&self, action: AttestAction, signers: &SignerSet<'_>) -> Result<Call> {
        action::tx(self.ledger, ActionPayload::Attest(action), signers).await
    }

    pub async fn send(
        &self,
        action: AttestAction,
        signers: &SignerSet<'_>,
        wait: WaitFor,
    ) -> Result<Receipt> {
        action::send(self.ledger, ActionPayload::Attest(action), signers, wait).await
    }

    /// Read an identity's current claim, `None` when never set.
    pub async fn get_claim(&self, attester: &Did) -> Result<Option<Attestation>> {
        let key = codec::encode(attester)?;
        match self.ledger.query(MODULE, &key).await? {
            Some(bytes) => Ok(Some(codec::decode(&bytes)?)),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::MockLedger;
    use crate::signer::DidKeypair;

    #[tokio::test]
    async fn test_set_claim_and_read() {
        let ledger = MockLedger::new();
        let attester = Did::random();
        let kp = DidKeypair::generate(attester, 1);

        let module = AttestModule::new(&ledger);
        module
            .send(
                AttestAction::SetClaim {
                    attester,
                    priority: 2,
                    iri: Some("ipfs://claims/2".to_string()),
                },
                &SignerSet::single(&kp),
                WaitFor::Inclusion,
            )
            .await
            .unwrap();
        assert_eq!(ledger.nonce_of(&Identity::Did(attester)), 1);

        let stored = Attestation {
            priority: 2,
            iri: Some("ipfs://claims/2".to_string()),
        };
        ledger.seed(
            MODULE,
            codec::encode(&attester).unwrap(),
            codec::encode(&stored).unwrap(),
        );
        assert_eq!(module.get_claim(&attester).await.unwrap(), Some(stored));
    }
}
