//! LedgerIdentity — transaction authoring for a permissioned identity ledger.
//!
//! Provides typed action construction in three shapes (pure payload,
//! signed call, submit-and-await), signer and nonce resolution with
//! fail-fast policy checks, diff-to-plan compilation for identity
//! documents and trust-registry schema maps, and atomic batch
//! submission over an abstract ledger connection.

pub mod action;
pub mod codec;
pub mod did;
pub mod diff;
pub mod error;
pub mod ledger;
pub mod modules;
pub mod nonce;
pub mod policy;
pub mod signer;
pub mod tx;
pub mod validate;

// Re-export primary types
pub use error::{ClientError, Result};

pub use did::{Did, DidDocument, DidKey, DocumentKey, Identity, PublicKey, ServiceEndpoint, VerRels};

pub use signer::{DidKeypair, Signer, SignerEntry, SignerSet};

pub use ledger::{LedgerConnection, MockLedger, Receipt, WaitFor};

pub use action::{ActionDef, ActionPayload, Payload, PolicyKind, SignerArity, REGISTRY};

pub use nonce::NonceSequencer;
pub use policy::{ParticipantChange, SignerPolicy};

pub use diff::Plan;
pub use tx::{Call, SignatureEnvelope, Transaction};

// Re-export module clients
pub use modules::accumulator::AccumulatorModule;
pub use modules::attest::AttestModule;
pub use modules::blob::BlobModule;
pub use modules::did::DidModule;
pub use modules::offchain_signatures::OffchainSignaturesModule;
pub use modules::status_list_credential::StatusListCredentialModule;
pub use modules::trust_registry::TrustRegistryModule;
