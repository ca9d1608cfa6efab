//! Transaction assembly and submission.
//!
//! A call bundles one action payload with the signature envelopes that
//! authorize it; a transaction is a single call or an atomic batch.
//! Batch members execute in the order given, and either all of them
//! apply or none do — a receipt reporting partial application is an
//! inconsistency, never a success.

use serde::{Deserialize, Serialize};

use crate::action::ActionPayload;
use crate::did::Identity;
use crate::error::{ClientError, Result};
use crate::ledger::{LedgerConnection, Receipt, WaitFor};

/// One signer's proof over one payload at one nonce.
///
/// Co-signed actions carry one envelope per required signer; each
/// envelope binds the nonce its signature was produced under, because
/// co-signers never share a nonce timeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureEnvelope {
    pub signer: Identity,
    pub key_id: u32,
    pub signature: Vec<u8>,
    pub nonce: u64,
}

/// An action payload plus the envelopes authorizing it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Call {
    pub action: ActionPayload,
    pub envelopes: Vec<SignatureEnvelope>,
}

/// The final submission unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Transaction {
    Single(Call),
    /// Members execute in order; all-or-nothing.
    Batch(Vec<Call>),
}

impl Transaction {
    /// The calls in submission order.
    pub fn calls(&self) -> &[Call] {
        match self {
            Self::Single(call) => std::slice::from_ref(call),
            Self::Batch(calls) => calls,
        }
    }
}

/// Submit a transaction and await the requested confirmation level.
///
/// Returns only after the ledger reports inclusion or finalization.
/// A receipt whose applied count falls short of the call count is
/// surfaced as [`ClientError::PartialBatchApplication`].
pub async fn submit<L: LedgerConnection + ?Sized>(
    ledger: &L,
    tx: Transaction,
    wait: WaitFor,
) -> Result<Receipt> {
    let total = tx.calls().len();
    log::debug!("submitting transaction with {total} call(s), wait={wait:?}");

    let receipt = ledger.submit(&tx, wait).await?;
    if receipt.applied != total {
        log::warn!(
            "ledger applied {} of {total} batch members",
            receipt.applied
        );
        return Err(ClientError::PartialBatchApplication {
            applied: receipt.applied,
            total,
        });
    }

    log::info!(
        "transaction included in block {} (finalized: {})",
        receipt.block_number,
        receipt.finalized
    );
    Ok(receipt)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::DidAction;
    use crate::did::Did;
    use crate::ledger::MockLedger;

    fn some_call(did: Did, nonce: u64) -> Call {
        // Envelope built by hand; assembly-level tests do not need a
        // ledger-valid signature.
        Call {
            action: ActionPayload::Did(DidAction::RemoveDid { did }),
            envelopes: vec![SignatureEnvelope {
                signer: Identity::Did(did),
                key_id: 1,
                signature: vec![0; 64],
                nonce,
            }],
        }
    }

    #[tokio::test]
    async fn test_partial_application_is_an_error() {
        let did = Did::random();
        let ledger = MockLedger::new();
        ledger.set_nonce(Identity::Did(did), 0);
        ledger.fail_batch_after(1);

        let tx = Transaction::Batch(vec![some_call(did, 1), some_call(did, 2)]);
        let err = submit(&ledger, tx, WaitFor::Inclusion).await.unwrap_err();
        assert!(matches!(
            err,
            ClientError::PartialBatchApplication {
                applied: 1,
                total: 2
            }
        ));
    }

    #[tokio::test]
    async fn test_batch_preserves_order_and_succeeds() {
        let did = Did::random();
        let ledger = MockLedger::new();
        ledger.set_nonce(Identity::Did(did), 4);

        let tx = Transaction::Batch(vec![some_call(did, 5), some_call(did, 6)]);
        let receipt = submit(&ledger, tx, WaitFor::Finalization).await.unwrap();
        assert_eq!(receipt.applied, 2);
        assert!(receipt.finalized);
        assert_eq!(ledger.nonce_of(&Identity::Did(did)), 6);
    }
}
