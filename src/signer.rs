//! Signers and signer resolution.
//!
//! A signer is a key bound to an (identity, key-index) pair. Signature
//! production is asynchronous because a signer may be remote (hardware
//! module, signing service); the local Ed25519 implementation resolves
//! immediately. The resolver normalizes "one or many signers" into a
//! validated, duplicate-free list before any payload is built.

use async_trait::async_trait;
use ed25519_dalek::{Signer as _, SigningKey, VerifyingKey};
use zeroize::Zeroize;

use crate::codec;
use crate::did::{Did, Identity};
use crate::error::{ClientError, Result};

/// A signing key bound to an identity and a key index within it.
#[async_trait]
pub trait Signer: Send + Sync {
    /// The identity this signer claims to control.
    fn identity(&self) -> Identity;

    /// Index of the key within the identity's key space.
    fn key_id(&self) -> u32;

    /// Sign `message` under the module's `context_label`.
    async fn sign(&self, context_label: &[u8], message: &[u8]) -> Result<Vec<u8>>;
}

// ── Local Ed25519 signer ──────────────────────────────────────────────────────

/// A local Ed25519 keypair acting for a DID.
///
/// The signing key is zeroized on drop to prevent private key leakage.
pub struct DidKeypair {
    did: Did,
    key_id: u32,
    signing_key: SigningKey,
}

impl DidKeypair {
    /// Generate a fresh keypair for `did` at `key_id`.
    pub fn generate(did: Did, key_id: u32) -> Self {
        Self {
            did,
            key_id,
            signing_key: SigningKey::generate(&mut rand::thread_rng()),
        }
    }

    /// Reconstruct from raw signing key bytes.
    pub fn from_signing_key_bytes(did: Did, key_id: u32, bytes: &[u8; 32]) -> Self {
        Self {
            did,
            key_id,
            signing_key: SigningKey::from_bytes(bytes),
        }
    }

    pub fn did(&self) -> Did {
        self.did
    }

    /// The verifying (public) key.
    pub fn verifying_key(&self) -> VerifyingKey {
        self.signing_key.verifying_key()
    }

    /// The public key as base64, for display and document entries.
    pub fn public_key_base64(&self) -> String {
        base64::Engine::encode(
            &base64::engine::general_purpose::STANDARD,
            self.verifying_key().to_bytes(),
        )
    }
}

impl Drop for DidKeypair {
    fn drop(&mut self) {
        let mut bytes = self.signing_key.to_bytes();
        bytes.zeroize();
    }
}

#[async_trait]
impl Signer for DidKeypair {
    fn identity(&self) -> Identity {
        Identity::Did(self.did)
    }

    fn key_id(&self) -> u32 {
        self.key_id
    }

    async fn sign(&self, context_label: &[u8], message: &[u8]) -> Result<Vec<u8>> {
        let input = codec::signing_input(context_label, message);
        Ok(self.signing_key.sign(&input).to_bytes().to_vec())
    }
}

// ── Resolution ────────────────────────────────────────────────────────────────

/// One signer plus an optional explicit nonce.
///
/// When `nonce` is `Some`, the sequencing step skips the nonce read for
/// this signer and uses the supplied value directly.
pub struct SignerEntry<'a> {
    pub signer: &'a dyn Signer,
    pub nonce: Option<u64>,
}

impl<'a> SignerEntry<'a> {
    pub fn new(signer: &'a dyn Signer) -> Self {
        Self {
            signer,
            nonce: None,
        }
    }

    pub fn with_nonce(signer: &'a dyn Signer, nonce: u64) -> Self {
        Self {
            signer,
            nonce: Some(nonce),
        }
    }
}

/// A validated, duplicate-free list of signers for one action.
pub struct SignerSet<'a> {
    entries: Vec<SignerEntry<'a>>,
}

impl std::fmt::Debug for SignerSet<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignerSet")
            .field("entries", &self.entries.len())
            .finish()
    }
}

impl<'a> SignerSet<'a> {
    /// Normalize one or many signer entries into a validated set.
    ///
    /// Rejects an empty list and any two entries claiming the same
    /// identity (each co-signer advances its own nonce exactly once per
    /// action, so duplicates would collide).
    pub fn resolve(entries: Vec<SignerEntry<'a>>) -> Result<Self> {
        if entries.is_empty() {
            return Err(ClientError::SignerCount { provided: 0 });
        }
        for (i, entry) in entries.iter().enumerate() {
            let id = entry.signer.identity();
            if entries[..i].iter().any(|e| e.signer.identity() == id) {
                return Err(ClientError::InvalidKey(format!(
                    "duplicate signer for {id}"
                )));
            }
        }
        Ok(Self { entries })
    }

    /// A set with a single signer and no explicit nonce.
    pub fn single(signer: &'a dyn Signer) -> Self {
        Self {
            entries: vec![SignerEntry::new(signer)],
        }
    }

    /// A set with a single signer and an explicit nonce.
    pub fn single_with_nonce(signer: &'a dyn Signer, nonce: u64) -> Self {
        Self {
            entries: vec![SignerEntry::with_nonce(signer, nonce)],
        }
    }

    pub fn entries(&self) -> &[SignerEntry<'a>] {
        &self.entries
    }

    /// Identities of all signers, in entry order.
    pub fn identities(&self) -> Vec<Identity> {
        self.entries.iter().map(|e| e.signer.identity()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_keypair_signs_deterministically() {
        let kp = DidKeypair::generate(Did::random(), 1);
        let a = kp.sign(b"ctx", b"message").await.unwrap();
        let b = kp.sign(b"ctx", b"message").await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[tokio::test]
    async fn test_context_label_changes_signature() {
        let kp = DidKeypair::generate(Did::random(), 1);
        let a = kp.sign(b"ctx-a", b"message").await.unwrap();
        let b = kp.sign(b"ctx-b", b"message").await.unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_resolve_rejects_empty() {
        assert!(matches!(
            SignerSet::resolve(vec![]).unwrap_err(),
            ClientError::SignerCount { provided: 0 }
        ));
    }

    #[test]
    fn test_resolve_rejects_duplicate_identity() {
        let did = Did::random();
        let kp1 = DidKeypair::generate(did, 1);
        let kp2 = DidKeypair::generate(did, 2);
        let result = SignerSet::resolve(vec![SignerEntry::new(&kp1), SignerEntry::new(&kp2)]);
        assert!(result.is_err());
    }

    #[test]
    fn test_resolve_accepts_distinct_identities() {
        let kp1 = DidKeypair::generate(Did::random(), 1);
        let kp2 = DidKeypair::generate(Did::random(), 1);
        let set =
            SignerSet::resolve(vec![SignerEntry::new(&kp1), SignerEntry::new(&kp2)]).unwrap();
        assert_eq!(set.entries().len(), 2);
    }
}
