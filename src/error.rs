//! Error types for the transaction-authoring client.
//!
//! All errors are strongly typed and propagated without panicking.
//! Errors raised before submission (signer, policy, shape, diff) are
//! local and produce no side effects; submission-time errors are
//! surfaced verbatim and never retried by the library.

/// Client error types covering all authoring operations.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("Signer {signer} does not control {target}")]
    SignerMismatch { signer: String, target: String },

    #[error("Co-signed action is missing a required signature from {missing}")]
    InsufficientCoSigners { missing: String },

    #[error("Signer {signer} is not in the authorized signer set")]
    UnauthorizedSigner { signer: String },

    #[error("Action takes exactly one signer, got {provided}")]
    SignerCount { provided: usize },

    #[error("Ledger rejected nonce {submitted} for {identity}: expected {expected}")]
    StaleNonce {
        identity: String,
        submitted: u64,
        expected: u64,
    },

    #[error("Key {key_id} was modified in place; express the change as remove + add")]
    UnsupportedKeyModification { key_id: u32 },

    #[error("Key {key_id} lives in the key space of {controller}; controller keys cannot be edited here")]
    ForbiddenControllerKeyChange { controller: String, key_id: u32 },

    #[error("Current and desired state are identical; nothing to submit")]
    NoChanges,

    #[error("Validation failed at `{path}`: expected {expected}, found {found}")]
    Validation {
        path: String,
        expected: String,
        found: String,
    },

    #[error("Batch applied partially: {applied} of {total} calls; ledger state is inconsistent")]
    PartialBatchApplication { applied: usize, total: usize },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("Signature verification failed")]
    SignatureInvalid,

    #[error("Codec error: {0}")]
    Codec(String),

    #[error("Ledger error: {0}")]
    Ledger(String),
}

/// Convenience Result alias.
pub type Result<T> = std::result::Result<T, ClientError>;
