//! The ledger query/submit surface.
//!
//! The ledger itself is an external collaborator; the client reaches it
//! only through [`LedgerConnection`]. All methods are asynchronous
//! network calls — these, signature production, and submission are the
//! only suspension points in the library.

use async_trait::async_trait;

use crate::did::Identity;
use crate::error::Result;
use crate::tx::Transaction;

pub mod mock;

pub use mock::MockLedger;

/// How long submission waits before returning a receipt.
///
/// Submission never returns before the ledger has acknowledged receipt;
/// callers wanting fire-and-forget semantics simply drop the future.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitFor {
    /// Return once the transaction is included in a block.
    Inclusion,
    /// Return once the including block is finalized.
    Finalization,
}

/// The ledger's acknowledgment of a submitted transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    /// Block the transaction landed in.
    pub block_number: u64,
    /// Whether the block was finalized at return time.
    pub finalized: bool,
    /// Number of calls the ledger reports as applied. For an atomic
    /// batch this must equal the batch length; anything less is an
    /// inconsistency the assembler refuses to accept as success.
    pub applied: usize,
}

/// Read and write primitives against the ledger.
#[async_trait]
pub trait LedgerConnection: Send + Sync {
    /// Read a raw value from a module's storage. `None` when absent.
    async fn query(&self, module: &str, key: &[u8]) -> Result<Option<Vec<u8>>>;

    /// Read an identity's current write counter. A write is accepted
    /// only at exactly `current + 1`.
    async fn current_nonce(&self, identity: &Identity) -> Result<u64>;

    /// Submit a transaction and await the requested confirmation level.
    async fn submit(&self, tx: &Transaction, wait: WaitFor) -> Result<Receipt>;
}
