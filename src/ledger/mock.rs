//! In-memory ledger for tests.
//!
//! Mirrors the contract of a real connection closely enough for the
//! authoring pipeline to be exercised end to end: strict `current + 1`
//! nonce checking per identity, atomic batches, a seedable key/value
//! store for reads, and a read counter so fail-fast properties can
//! assert that no network call happened.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::did::Identity;
use crate::error::{ClientError, Result};
use crate::ledger::{LedgerConnection, Receipt, WaitFor};
use crate::tx::Transaction;

/// An in-memory [`LedgerConnection`].
#[derive(Default)]
pub struct MockLedger {
    nonces: Mutex<HashMap<Identity, u64>>,
    store: Mutex<HashMap<(String, Vec<u8>), Vec<u8>>>,
    submitted: Mutex<Vec<Transaction>>,
    reads: AtomicUsize,
    blocks: AtomicU64,
    fail_batch_after: Mutex<Option<usize>>,
}

impl MockLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set an identity's current nonce.
    pub fn set_nonce(&self, identity: Identity, nonce: u64) {
        self.nonces.lock().unwrap().insert(identity, nonce);
    }

    /// Read an identity's current nonce without counting as a network read.
    pub fn nonce_of(&self, identity: &Identity) -> u64 {
        *self.nonces.lock().unwrap().get(identity).unwrap_or(&0)
    }

    /// Seed a storage value for `query`.
    pub fn seed(&self, module: &str, key: Vec<u8>, value: Vec<u8>) {
        self.store
            .lock()
            .unwrap()
            .insert((module.to_string(), key), value);
    }

    /// Number of read calls (`query` + `current_nonce`) so far.
    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    /// Make the next batch stop after `n` applied members, simulating a
    /// ledger that reports partial application.
    pub fn fail_batch_after(&self, n: usize) {
        *self.fail_batch_after.lock().unwrap() = Some(n);
    }

    /// Every transaction submitted so far, in order.
    pub fn submitted(&self) -> Vec<Transaction> {
        self.submitted.lock().unwrap().clone()
    }
}

#[async_trait]
impl LedgerConnection for MockLedger {
    async fn query(&self, module: &str, key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .store
            .lock()
            .unwrap()
            .get(&(module.to_string(), key.to_vec()))
            .cloned())
    }

    async fn current_nonce(&self, identity: &Identity) -> Result<u64> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        Ok(self.nonce_of(identity))
    }

    async fn submit(&self, tx: &Transaction, wait: WaitFor) -> Result<Receipt> {
        let calls = tx.calls();
        let mut nonces = self.nonces.lock().unwrap();

        // Validate the whole transaction before touching state: a batch
        // either applies completely or not at all.
        let mut staged: HashMap<Identity, u64> = HashMap::new();
        for call in calls {
            for env in &call.envelopes {
                let current = staged
                    .get(&env.signer)
                    .copied()
                    .unwrap_or_else(|| *nonces.get(&env.signer).unwrap_or(&0));
                if env.nonce != current + 1 {
                    return Err(ClientError::StaleNonce {
                        identity: env.signer.to_string(),
                        submitted: env.nonce,
                        expected: current + 1,
                    });
                }
                staged.insert(env.signer, env.nonce);
            }
        }

        let applied = match self.fail_batch_after.lock().unwrap().take() {
            Some(n) => n.min(calls.len()),
            None => calls.len(),
        };

        if applied == calls.len() {
            for (identity, nonce) in staged {
                nonces.insert(identity, nonce);
            }
        } else {
            // Partial application: advance nonces only for the calls the
            // ledger claims to have applied.
            for call in &calls[..applied] {
                for env in &call.envelopes {
                    nonces.insert(env.signer, env.nonce);
                }
            }
        }
        drop(nonces);

        self.submitted.lock().unwrap().push(tx.clone());
        Ok(Receipt {
            block_number: self.blocks.fetch_add(1, Ordering::SeqCst) + 1,
            finalized: wait == WaitFor::Finalization,
            applied,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::did::Did;
    use crate::tx::{Call, SignatureEnvelope};

    fn call(identity: Identity, nonce: u64) -> Call {
        Call {
            action: crate::action::ActionPayload::Did(crate::action::DidAction::RemoveDid {
                did: match identity {
                    Identity::Did(did) => did,
                    Identity::Key(_) => Did::random(),
                },
            }),
            envelopes: vec![SignatureEnvelope {
                signer: identity,
                key_id: 1,
                signature: vec![0; 64],
                nonce,
            }],
        }
    }

    #[tokio::test]
    async fn test_stale_nonce_rejects_whole_batch() {
        let ledger = MockLedger::new();
        let id = Identity::Did(Did::random());
        ledger.set_nonce(id, 5);

        // Second member reuses nonce 6 instead of advancing to 7.
        let tx = Transaction::Batch(vec![call(id, 6), call(id, 6)]);
        let err = ledger.submit(&tx, WaitFor::Inclusion).await.unwrap_err();
        assert!(matches!(err, ClientError::StaleNonce { .. }));
        assert_eq!(ledger.nonce_of(&id), 5, "rejected batch must not advance");
    }

    #[tokio::test]
    async fn test_cosigners_advance_independent_nonces() {
        let ledger = MockLedger::new();
        let a = Identity::Did(Did::random());
        let b = Identity::Did(Did::random());
        ledger.set_nonce(a, 3);
        ledger.set_nonce(b, 10);

        let mut co_signed = call(a, 4);
        co_signed.envelopes.push(SignatureEnvelope {
            signer: b,
            key_id: 1,
            signature: vec![0; 64],
            nonce: 11,
        });
        ledger
            .submit(&Transaction::Single(co_signed), WaitFor::Inclusion)
            .await
            .unwrap();
        assert_eq!(ledger.nonce_of(&a), 4);
        assert_eq!(ledger.nonce_of(&b), 11);
    }
}
