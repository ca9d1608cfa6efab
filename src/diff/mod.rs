//! Diff compilers: turn a desired aggregate state into the minimal
//! ordered sequence of primitive actions reproducing it on the ledger.
//!
//! Both compilers are pure. They read nothing and sign nothing; the
//! composite operations in [`crate::modules`] feed them the current
//! state and hand the resulting plan to the transaction assembler.

pub mod document;
pub mod schema;

use crate::action::ActionPayload;

/// An ordered list of primitive actions sharing one nonce timeline.
///
/// Ordering is part of the contract: removals always precede
/// additions, so an index or id freed earlier in the plan can be
/// reused later in the same batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plan {
    pub actions: Vec<ActionPayload>,
}

impl Plan {
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}
