//! Ledger identities, keys, and identity documents.
//!
//! An identity is a DID (32 opaque bytes registered on the ledger) or a
//! public key treated directly as an identity. Every identity owns a
//! monotonically increasing nonce on the ledger; the client never mutates
//! that nonce, it only mirrors it through reads.

use std::collections::{BTreeMap, BTreeSet};

use ed25519_dalek::VerifyingKey;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{ClientError, Result};

/// A ledger-registered DID: 32 opaque bytes.
///
/// Display format: `did:lid:` + base58 of the raw bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Did(pub [u8; 32]);

impl Did {
    /// Generate a fresh random DID.
    pub fn random() -> Self {
        Self(rand::random())
    }

    /// Derive a DID deterministically from a verifying (public) key.
    pub fn from_verifying_key(key: &VerifyingKey) -> Self {
        let hash = Sha256::digest(key.as_bytes());
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&hash);
        Self(bytes)
    }

    /// Parse the `did:lid:<base58>` display form.
    pub fn parse(s: &str) -> Result<Self> {
        let encoded = s
            .strip_prefix("did:lid:")
            .ok_or_else(|| ClientError::InvalidKey(format!("not a did:lid identifier: {s}")))?;
        let raw = bs58::decode(encoded)
            .into_vec()
            .map_err(|e| ClientError::InvalidKey(format!("invalid base58 in DID: {e}")))?;
        let bytes: [u8; 32] = raw
            .try_into()
            .map_err(|_| ClientError::InvalidKey("DID must decode to 32 bytes".into()))?;
        Ok(Self(bytes))
    }
}

impl std::fmt::Display for Did {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "did:lid:{}", bs58::encode(&self.0).into_string())
    }
}

/// An actor the ledger can authenticate: a registered DID, or a public
/// key used directly as an identity without a document of its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Identity {
    Did(Did),
    Key([u8; 32]),
}

impl Identity {
    /// The DID form, if this identity is a DID.
    pub fn as_did(&self) -> Option<Did> {
        match self {
            Self::Did(did) => Some(*did),
            Self::Key(_) => None,
        }
    }

    /// Parse either display form (`did:lid:…` or `did:lid:key:…`).
    pub fn parse(s: &str) -> Result<Self> {
        if let Some(encoded) = s.strip_prefix("did:lid:key:") {
            let raw = bs58::decode(encoded)
                .into_vec()
                .map_err(|e| ClientError::InvalidKey(format!("invalid base58 in key identity: {e}")))?;
            let bytes: [u8; 32] = raw
                .try_into()
                .map_err(|_| ClientError::InvalidKey("key identity must decode to 32 bytes".into()))?;
            return Ok(Self::Key(bytes));
        }
        Did::parse(s).map(Self::Did)
    }
}

impl From<Did> for Identity {
    fn from(did: Did) -> Self {
        Self::Did(did)
    }
}

impl std::fmt::Display for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Did(did) => write!(f, "{did}"),
            Self::Key(bytes) => write!(f, "did:lid:key:{}", bs58::encode(bytes).into_string()),
        }
    }
}

// ── Keys ──────────────────────────────────────────────────────────────────────

/// A public key attached to an identity document.
///
/// Ed25519 keys live in the core DID module on the ledger; BLS12-381 G2
/// keys belong to the off-chain signature subsystem and are routed
/// through its primitive actions instead.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PublicKey {
    Ed25519([u8; 32]),
    Bls12381G2(Vec<u8>),
}

impl PublicKey {
    /// Whether this key is stored by the core DID module (as opposed to
    /// the off-chain signature key subsystem).
    pub fn is_on_ledger(&self) -> bool {
        matches!(self, Self::Ed25519(_))
    }
}

/// Verification relationships a key participates in, as a bitmask.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct VerRels(u16);

impl VerRels {
    pub const AUTHENTICATION: Self = Self(0b0001);
    pub const ASSERTION: Self = Self(0b0010);
    pub const CAPABILITY_INVOCATION: Self = Self(0b0100);
    pub const KEY_AGREEMENT: Self = Self(0b1000);

    /// All relationships set.
    pub fn all() -> Self {
        Self(0b1111)
    }

    /// Union of two relationship sets.
    pub fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// Whether every relationship in `other` is present in `self`.
    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

/// A key plus the relationships it may exercise.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DidKey {
    pub public_key: PublicKey,
    pub ver_rels: VerRels,
}

impl DidKey {
    pub fn new(public_key: PublicKey, ver_rels: VerRels) -> Self {
        Self {
            public_key,
            ver_rels,
        }
    }
}

/// A document entry binding a key to the identity whose key space it
/// lives in. `controller` is the document subject for its own keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentKey {
    pub controller: Identity,
    pub key: DidKey,
}

impl DocumentKey {
    /// A key in the document subject's own key space.
    pub fn own(subject: Did, key: DidKey) -> Self {
        Self {
            controller: Identity::Did(subject),
            key,
        }
    }
}

// ── Services ──────────────────────────────────────────────────────────────────

/// A service endpoint attached to an identity document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceEndpoint {
    pub service_type: String,
    pub origins: Vec<String>,
}

// ── Document ──────────────────────────────────────────────────────────────────

/// The aggregate identity document as mirrored from the ledger.
///
/// Keys are addressed by index (the ledger's key id), controllers by
/// identity, services by id string. All maps are ordered so that plans
/// derived from a document are deterministic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DidDocument {
    pub id: Did,
    pub keys: BTreeMap<u32, DocumentKey>,
    pub controllers: BTreeSet<Identity>,
    pub services: BTreeMap<String, ServiceEndpoint>,
}

impl DidDocument {
    /// An empty document for `id`, controlled by itself.
    pub fn new(id: Did) -> Self {
        Self {
            id,
            keys: BTreeMap::new(),
            controllers: BTreeSet::from([Identity::Did(id)]),
            services: BTreeMap::new(),
        }
    }

    /// Highest key index currently in use, or 0 for an empty key map.
    pub fn last_key_index(&self) -> u32 {
        self.keys.keys().next_back().copied().unwrap_or(0)
    }
}
