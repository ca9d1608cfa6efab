//! Signer policies for single and co-signed actions.
//!
//! A policy is computed from an action's own arguments alone — no chain
//! lookups — and evaluated against the identities the caller actually
//! supplied. Evaluation fails closed: a missing required co-signature is
//! an error, never a silent downgrade.

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::did::{Did, Identity};
use crate::error::{ClientError, Result};

/// Who must sign one instance of an action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignerPolicy {
    /// Exactly one signer, which must control `target`.
    Single { target: Identity },
    /// Every identity in the set must supply a signature over the same
    /// payload; each under its own nonce.
    CoSignedAllOf(BTreeSet<Identity>),
    /// Exactly one signer, drawn from the authorized set.
    OneOf(BTreeSet<Identity>),
}

/// Direction of a participant change in a trust registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParticipantChange {
    Add,
    Remove,
}

/// Compute the required signer set for a participant change-set.
///
/// Additions require both the convener and the incoming participant;
/// removals require only the removed participant, who may always leave
/// on their own authority. Pure over the arguments.
pub fn participant_change_signers(
    convener: Did,
    changes: &BTreeMap<Identity, ParticipantChange>,
) -> BTreeSet<Identity> {
    let mut required = BTreeSet::new();
    for (participant, change) in changes {
        required.insert(*participant);
        if *change == ParticipantChange::Add {
            required.insert(Identity::Did(convener));
        }
    }
    required
}

/// Check the supplied signer identities against a policy.
pub fn check(policy: &SignerPolicy, provided: &[Identity]) -> Result<()> {
    match policy {
        SignerPolicy::Single { target } => match provided {
            [signer] if signer == target => Ok(()),
            [signer] => Err(ClientError::SignerMismatch {
                signer: signer.to_string(),
                target: target.to_string(),
            }),
            _ => Err(ClientError::SignerCount {
                provided: provided.len(),
            }),
        },
        SignerPolicy::CoSignedAllOf(required) => {
            if let Some(missing) = required.iter().find(|id| !provided.contains(id)) {
                return Err(ClientError::InsufficientCoSigners {
                    missing: missing.to_string(),
                });
            }
            if let Some(extra) = provided.iter().find(|id| !required.contains(id)) {
                return Err(ClientError::SignerMismatch {
                    signer: extra.to_string(),
                    target: "the required co-signer set".to_string(),
                });
            }
            Ok(())
        }
        SignerPolicy::OneOf(authorized) => match provided {
            [signer] if authorized.contains(signer) => Ok(()),
            [signer] => Err(ClientError::UnauthorizedSigner {
                signer: signer.to_string(),
            }),
            _ => Err(ClientError::SignerCount {
                provided: provided.len(),
            }),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(n: usize) -> Vec<Identity> {
        (0..n).map(|_| Identity::Did(Did::random())).collect()
    }

    #[test]
    fn test_single_policy_matches_target() {
        let target = Identity::Did(Did::random());
        assert!(check(&SignerPolicy::Single { target }, &[target]).is_ok());
    }

    #[test]
    fn test_single_policy_mismatch() {
        let target = Identity::Did(Did::random());
        let other = Identity::Did(Did::random());
        let err = check(&SignerPolicy::Single { target }, &[other]).unwrap_err();
        assert!(matches!(err, ClientError::SignerMismatch { .. }));
    }

    #[test]
    fn test_single_signer_policies_reject_wrong_count() {
        let target = Identity::Did(Did::random());
        let two = ids(2);
        let err = check(&SignerPolicy::Single { target }, &two).unwrap_err();
        assert!(matches!(err, ClientError::SignerCount { provided: 2 }));

        let authorized: BTreeSet<_> = two.iter().copied().collect();
        let err = check(&SignerPolicy::OneOf(authorized), &two).unwrap_err();
        assert!(matches!(err, ClientError::SignerCount { provided: 2 }));
    }

    #[test]
    fn test_additions_require_convener() {
        let convener = Did::random();
        let incoming = Identity::Did(Did::random());
        let changes = BTreeMap::from([(incoming, ParticipantChange::Add)]);

        let required = participant_change_signers(convener, &changes);
        assert!(required.contains(&Identity::Did(convener)));
        assert!(required.contains(&incoming));
        assert_eq!(required.len(), 2);
    }

    #[test]
    fn test_removals_do_not_require_convener() {
        let convener = Did::random();
        let leaving = Identity::Did(Did::random());
        let changes = BTreeMap::from([(leaving, ParticipantChange::Remove)]);

        let required = participant_change_signers(convener, &changes);
        assert!(!required.contains(&Identity::Did(convener)));
        assert_eq!(required, BTreeSet::from([leaving]));
    }

    #[test]
    fn test_mixed_changeset_missing_added_participant() {
        let convener = Did::random();
        let p1 = Identity::Did(Did::random());
        let p2 = Identity::Did(Did::random());
        let changes = BTreeMap::from([
            (p1, ParticipantChange::Add),
            (p2, ParticipantChange::Remove),
        ]);

        let required = participant_change_signers(convener, &changes);
        // P2 and the convener sign, but P1's signature is still missing.
        let provided = vec![p2, Identity::Did(convener)];
        let err = check(&SignerPolicy::CoSignedAllOf(required), &provided).unwrap_err();
        assert!(matches!(err, ClientError::InsufficientCoSigners { .. }));
    }

    #[test]
    fn test_cosigned_rejects_unrelated_extra_signer() {
        let members = ids(2);
        let required: BTreeSet<_> = members.iter().copied().collect();
        let mut provided = members.clone();
        provided.push(Identity::Did(Did::random()));
        let err = check(&SignerPolicy::CoSignedAllOf(required), &provided).unwrap_err();
        assert!(matches!(err, ClientError::SignerMismatch { .. }));
    }

    #[test]
    fn test_one_of_policy() {
        let authorized: BTreeSet<_> = ids(2).into_iter().collect();
        let member = *authorized.iter().next().unwrap();
        assert!(check(&SignerPolicy::OneOf(authorized.clone()), &[member]).is_ok());

        let outsider = Identity::Did(Did::random());
        let err = check(&SignerPolicy::OneOf(authorized), &[outsider]).unwrap_err();
        assert!(matches!(err, ClientError::UnauthorizedSigner { .. }));
    }
}
