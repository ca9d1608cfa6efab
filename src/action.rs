//! The action definition registry and the three call shapes.
//!
//! Every state change the client can author is a named action declared
//! in a per-module table. The registry drives three call shapes from a
//! single pipeline:
//!
//! - [`payload`] — pure payload construction, no I/O;
//! - [`tx`] — a fully signed, unsubmitted call (resolves missing nonces,
//!   signs with the supplied signer(s));
//! - [`send`] — builds the call, submits it, and awaits the receipt.
//!
//! The policy check runs before anything else, so a signer that does
//! not satisfy the action's policy fails with zero network access.

use serde::{Deserialize, Serialize};

use crate::codec;
use crate::error::{ClientError, Result};
use crate::ledger::{LedgerConnection, Receipt, WaitFor};
use crate::policy::{self, SignerPolicy};
use crate::signer::{Signer, SignerSet};
use crate::tx::{Call, SignatureEnvelope, Transaction};

pub use crate::modules::accumulator::AccumulatorAction;
pub use crate::modules::attest::AttestAction;
pub use crate::modules::blob::BlobAction;
pub use crate::modules::did::DidAction;
pub use crate::modules::offchain_signatures::OffchainAction;
pub use crate::modules::status_list_credential::StatusListAction;
pub use crate::modules::trust_registry::TrustRegistryAction;

// ── Registry ──────────────────────────────────────────────────────────────────

/// How the trailing signer arguments of a public call are shaped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignerArity {
    /// One trailing `(signer, nonce)` pair.
    Single,
    /// The trailing pair repeats once per required signer.
    PerSigner,
}

/// Which policy family governs an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyKind {
    Single,
    CoSignedAllOf,
    OneOf,
}

impl PolicyKind {
    /// The family of a concrete policy instance.
    pub fn of(policy: &SignerPolicy) -> Self {
        match policy {
            SignerPolicy::Single { .. } => Self::Single,
            SignerPolicy::CoSignedAllOf(_) => Self::CoSignedAllOf,
            SignerPolicy::OneOf(_) => Self::OneOf,
        }
    }
}

/// One registered action: immutable after registration.
#[derive(Debug, Clone, Copy)]
pub struct ActionDef {
    pub name: &'static str,
    pub module: &'static str,
    pub arity: SignerArity,
    pub policy: PolicyKind,
}

const fn def(
    name: &'static str,
    module: &'static str,
    arity: SignerArity,
    policy: PolicyKind,
) -> ActionDef {
    ActionDef {
        name,
        module,
        arity,
        policy,
    }
}

/// The full action table, one entry per named action.
pub static REGISTRY: &[ActionDef] = &[
    def("did.new", "did", SignerArity::Single, PolicyKind::Single),
    def("did.add_keys", "did", SignerArity::Single, PolicyKind::Single),
    def("did.remove_keys", "did", SignerArity::Single, PolicyKind::Single),
    def("did.add_controllers", "did", SignerArity::Single, PolicyKind::Single),
    def("did.remove_controllers", "did", SignerArity::Single, PolicyKind::Single),
    def("did.add_service_endpoint", "did", SignerArity::Single, PolicyKind::Single),
    def("did.remove_service_endpoint", "did", SignerArity::Single, PolicyKind::Single),
    def("did.remove", "did", SignerArity::Single, PolicyKind::Single),
    def("accumulator.add", "accumulator", SignerArity::Single, PolicyKind::Single),
    def("accumulator.update", "accumulator", SignerArity::Single, PolicyKind::Single),
    def("accumulator.remove", "accumulator", SignerArity::Single, PolicyKind::Single),
    def("blob.new", "blob", SignerArity::Single, PolicyKind::Single),
    def("attest.set_claim", "attest", SignerArity::Single, PolicyKind::Single),
    def("offchain_signatures.add_params", "offchain_signatures", SignerArity::Single, PolicyKind::Single),
    def("offchain_signatures.remove_params", "offchain_signatures", SignerArity::Single, PolicyKind::Single),
    def("offchain_signatures.add_key", "offchain_signatures", SignerArity::Single, PolicyKind::Single),
    def("offchain_signatures.remove_key", "offchain_signatures", SignerArity::Single, PolicyKind::Single),
    def("trust_registry.init_or_update", "trust_registry", SignerArity::Single, PolicyKind::Single),
    def("trust_registry.set_schemas", "trust_registry", SignerArity::Single, PolicyKind::Single),
    def("trust_registry.change_participants", "trust_registry", SignerArity::PerSigner, PolicyKind::CoSignedAllOf),
    def("status_list_credential.create", "status_list_credential", SignerArity::Single, PolicyKind::Single),
    def("status_list_credential.update", "status_list_credential", SignerArity::Single, PolicyKind::OneOf),
    def("status_list_credential.remove", "status_list_credential", SignerArity::Single, PolicyKind::OneOf),
];

/// Look up a registered action by name.
pub fn lookup(name: &str) -> Option<&'static ActionDef> {
    REGISTRY.iter().find(|d| d.name == name)
}

// ── Payloads ──────────────────────────────────────────────────────────────────

/// Every primitive action the client can author, as one tagged union.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionPayload {
    Did(DidAction),
    Accumulator(AccumulatorAction),
    Blob(BlobAction),
    Attest(AttestAction),
    OffchainSignatures(OffchainAction),
    TrustRegistry(TrustRegistryAction),
    StatusListCredential(StatusListAction),
}

impl ActionPayload {
    /// The registered action name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Did(a) => a.name(),
            Self::Accumulator(a) => a.name(),
            Self::Blob(a) => a.name(),
            Self::Attest(a) => a.name(),
            Self::OffchainSignatures(a) => a.name(),
            Self::TrustRegistry(a) => a.name(),
            Self::StatusListCredential(a) => a.name(),
        }
    }

    /// The signing context label for the owning module.
    pub fn context_label(&self) -> &'static [u8] {
        match self {
            Self::Did(_) => b"lid:did:v1",
            Self::Accumulator(_) => b"lid:accumulator:v1",
            Self::Blob(_) => b"lid:blob:v1",
            Self::Attest(_) => b"lid:attest:v1",
            Self::OffchainSignatures(_) => b"lid:offchain-signatures:v1",
            Self::TrustRegistry(_) => b"lid:trust-registry:v1",
            Self::StatusListCredential(_) => b"lid:status-list-credential:v1",
        }
    }

    /// The signer policy, computed from the action's own arguments.
    pub fn policy(&self) -> SignerPolicy {
        match self {
            Self::Did(a) => a.policy(),
            Self::Accumulator(a) => a.policy(),
            Self::Blob(a) => a.policy(),
            Self::Attest(a) => a.policy(),
            Self::OffchainSignatures(a) => a.policy(),
            Self::TrustRegistry(a) => a.policy(),
            Self::StatusListCredential(a) => a.policy(),
        }
    }
}

/// The canonical value one signer signs: an action instance plus the
/// nonce assigned to it. Content-deterministic — identical inputs
/// always encode to identical bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payload {
    pub action: ActionPayload,
    pub nonce: u64,
}

// ── The three call shapes ─────────────────────────────────────────────────────

/// Shape 1: build the canonical payload. Pure, no I/O.
pub fn payload(action: ActionPayload, nonce: u64) -> Payload {
    Payload { action, nonce }
}

/// Sign one payload at one nonce, producing the signer's envelope.
pub async fn envelope(
    action: &ActionPayload,
    signer: &dyn Signer,
    nonce: u64,
) -> Result<SignatureEnvelope> {
    let bytes = codec::encode(&Payload {
        action: action.clone(),
        nonce,
    })?;
    let signature = signer.sign(action.context_label(), &bytes).await?;
    Ok(SignatureEnvelope {
        signer: signer.identity(),
        key_id: signer.key_id(),
        signature,
        nonce,
    })
}

/// Shape 2: build a fully signed, unsubmitted call.
///
/// The action's registry entry drives the signer arity, and the policy
/// check runs next; neither touches the network. Each signer then
/// signs the same action under its own nonce: an explicit nonce on a
/// signer entry is used as-is, a missing one costs exactly one
/// `current_nonce` read for that signer.
pub async fn tx<L: LedgerConnection + ?Sized>(
    ledger: &L,
    action: ActionPayload,
    signers: &SignerSet<'_>,
) -> Result<Call> {
    let def = lookup(action.name()).ok_or_else(|| {
        ClientError::NotFound(format!("action `{}` is not registered", action.name()))
    })?;
    if def.arity == SignerArity::Single && signers.entries().len() != 1 {
        return Err(ClientError::SignerCount {
            provided: signers.entries().len(),
        });
    }
    policy::check(&action.policy(), &signers.identities())?;

    let mut envelopes = Vec::with_capacity(signers.entries().len());
    for entry in signers.entries() {
        let nonce = match entry.nonce {
            Some(n) => n,
            None => ledger.current_nonce(&entry.signer.identity()).await? + 1,
        };
        envelopes.push(envelope(&action, entry.signer, nonce).await?);
    }

    log::debug!(
        "built `{}` with {} envelope(s)",
        action.name(),
        envelopes.len()
    );
    Ok(Call { action, envelopes })
}

/// Shape 3: build, submit, and await inclusion or finalization.
pub async fn send<L: LedgerConnection + ?Sized>(
    ledger: &L,
    action: ActionPayload,
    signers: &SignerSet<'_>,
    wait: WaitFor,
) -> Result<Receipt> {
    let call = tx(ledger, action, signers).await?;
    crate::tx::submit(ledger, Transaction::Single(call), wait).await
}
