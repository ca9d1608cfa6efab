//! Nonce sequencing for composite operations.
//!
//! The ledger accepts a write for an identity only at exactly
//! `current + 1`, so the sub-actions of one composite operation must
//! share a single, strictly increasing nonce timeline. The sequencer
//! reads the current nonce at most once, then hands out successors in
//! memory. It is explicit state scoped to one composite operation —
//! never shared or memoized across independent top-level calls.

use crate::did::Identity;
use crate::error::Result;
use crate::ledger::LedgerConnection;

/// A strictly increasing nonce stream for one identity.
///
/// For `k` calls to [`next`](Self::next) starting at `current`, the
/// emitted values are exactly `current + 1 ..= current + k`, in order.
#[derive(Debug)]
pub struct NonceSequencer {
    identity: Identity,
    current: u64,
}

impl NonceSequencer {
    /// Seed a sequencer for `identity`.
    ///
    /// With `explicit` the supplied value is trusted and no read is
    /// performed; otherwise this costs exactly one `current_nonce` read.
    pub async fn start<L: LedgerConnection + ?Sized>(
        ledger: &L,
        identity: Identity,
        explicit: Option<u64>,
    ) -> Result<Self> {
        let current = match explicit {
            Some(n) => n,
            None => ledger.current_nonce(&identity).await?,
        };
        log::debug!("nonce sequencer for {identity} seeded at {current}");
        Ok(Self { identity, current })
    }

    /// Seed from a known value without touching the ledger.
    pub fn seeded(identity: Identity, current: u64) -> Self {
        Self { identity, current }
    }

    /// The identity whose timeline this sequencer owns.
    pub fn identity(&self) -> Identity {
        self.identity
    }

    /// Hand out the next nonce in the timeline.
    pub fn next(&mut self) -> u64 {
        self.current += 1;
        self.current
    }

    /// The most recently emitted nonce (or the seed if none emitted).
    pub fn last(&self) -> u64 {
        self.current
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::did::Did;

    #[test]
    fn test_emits_exact_successor_range() {
        let mut seq = NonceSequencer::seeded(Identity::Did(Did::random()), 5);
        let emitted: Vec<u64> = (0..4).map(|_| seq.next()).collect();
        assert_eq!(emitted, vec![6, 7, 8, 9]);
        assert_eq!(seq.last(), 9);
    }

    #[test]
    fn test_independent_sequencers_do_not_share_state() {
        let id = Identity::Did(Did::random());
        let mut a = NonceSequencer::seeded(id, 10);
        let mut b = NonceSequencer::seeded(id, 10);
        assert_eq!(a.next(), 11);
        assert_eq!(b.next(), 11);
    }
}
