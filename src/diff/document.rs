//! Identity-document diff compiler.
//!
//! [`plan`] compares the stored document with a desired one and emits
//! the primitive actions reproducing the desired state, removals
//! before additions. Keys are routed by scheme: Ed25519 keys go
//! through the core DID actions, off-chain signature keys (BLS) go
//! through the off-chain signatures module. A key changed in place is
//! rejected; the caller must express it as remove + add across two
//! updates so the ledger never holds an ambiguous intermediate state.

use crate::action::ActionPayload;
use crate::did::{Did, DidDocument, DocumentKey, Identity};
use crate::error::{ClientError, Result};
use crate::modules::did::DidAction;
use crate::modules::offchain_signatures::OffchainAction;

use super::Plan;

/// Compile the difference between two documents into an ordered plan.
///
/// The category order is a fixed contract: off-chain key removals,
/// on-ledger key removals, controller removals, service removals; then
/// on-ledger key additions, off-chain key additions, controller
/// additions, service additions. Entries within a category follow
/// their map order, so a given pair of documents always compiles to
/// the same plan.
///
/// Fails with [`ClientError::NoChanges`] when the documents are equal,
/// [`ClientError::UnsupportedKeyModification`] when a key id maps to
/// different key material on the two sides, and
/// [`ClientError::ForbiddenControllerKeyChange`] when the difference
/// touches a key living in another controller's key space.
pub fn plan(current: &DidDocument, desired: &DidDocument) -> Result<Plan> {
    if current.id != desired.id {
        return Err(ClientError::Validation {
            path: "id".to_string(),
            expected: current.id.to_string(),
            found: desired.id.to_string(),
        });
    }
    let subject = desired.id;

    let mut removals = Vec::new();
    let mut additions = Vec::new();

    // Keys. Walk the union of key ids in order so the plan is
    // deterministic for a given pair of documents.
    let mut removed_onledger: Vec<u32> = Vec::new();
    let mut added_onledger: Vec<(u32, crate::did::DidKey)> = Vec::new();
    let mut added_offchain: Vec<ActionPayload> = Vec::new();
    let key_ids: std::collections::BTreeSet<u32> = current
        .keys
        .keys()
        .chain(desired.keys.keys())
        .copied()
        .collect();
    for key_id in key_ids {
        match (current.keys.get(&key_id), desired.keys.get(&key_id)) {
            (Some(cur), Some(des)) if cur == des => {}
            (Some(cur), Some(des)) => {
                require_own_key(subject, key_id, cur)?;
                require_own_key(subject, key_id, des)?;
                return Err(ClientError::UnsupportedKeyModification { key_id });
            }
            (Some(cur), None) => {
                require_own_key(subject, key_id, cur)?;
                if cur.key.public_key.is_on_ledger() {
                    removed_onledger.push(key_id);
                } else {
                    removals.push(ActionPayload::OffchainSignatures(
                        OffchainAction::RemoveKey {
                            did: subject,
                            key_id,
                        },
                    ));
                }
            }
            (None, Some(des)) => {
                require_own_key(subject, key_id, des)?;
                if des.key.public_key.is_on_ledger() {
                    added_onledger.push((key_id, des.key.clone()));
                } else {
                    added_offchain.push(ActionPayload::OffchainSignatures(
                        OffchainAction::AddKey {
                            did: subject,
                            key_id,
                            key: des.key.clone(),
                            params_ref: None,
                        },
                    ));
                }
            }
            (None, None) => unreachable!("key id drawn from the union of both documents"),
        }
    }
    if !removed_onledger.is_empty() {
        removals.push(ActionPayload::Did(DidAction::RemoveKeys {
            did: subject,
            keys: removed_onledger,
        }));
    }
    if !added_onledger.is_empty() {
        additions.push(ActionPayload::Did(DidAction::AddKeys {
            did: subject,
            keys: added_onledger,
        }));
    }
    additions.append(&mut added_offchain);

    // Controllers.
    let removed: std::collections::BTreeSet<Identity> = current
        .controllers
        .difference(&desired.controllers)
        .copied()
        .collect();
    let added: std::collections::BTreeSet<Identity> = desired
        .controllers
        .difference(&current.controllers)
        .copied()
        .collect();
    if !removed.is_empty() {
        removals.push(ActionPayload::Did(DidAction::RemoveControllers {
            did: subject,
            controllers: removed,
        }));
    }
    if !added.is_empty() {
        additions.push(ActionPayload::Did(DidAction::AddControllers {
            did: subject,
            controllers: added,
        }));
    }

    // Services. An endpoint changed under the same id becomes a
    // remove in the removal phase and an add in the addition phase.
    for (id, endpoint) in &current.services {
        if desired.services.get(id) != Some(endpoint) {
            removals.push(ActionPayload::Did(DidAction::RemoveServiceEndpoint {
                did: subject,
                id: id.clone(),
            }));
        }
    }
    for (id, endpoint) in &desired.services {
        if current.services.get(id) != Some(endpoint) {
            additions.push(ActionPayload::Did(DidAction::AddServiceEndpoint {
                did: subject,
                id: id.clone(),
                endpoint: endpoint.clone(),
            }));
        }
    }

    let mut actions = removals;
    actions.append(&mut additions);
    if actions.is_empty() {
        return Err(ClientError::NoChanges);
    }
    Ok(Plan { actions })
}

fn require_own_key(subject: Did, key_id: u32, entry: &DocumentKey) -> Result<()> {
    if entry.controller != Identity::Did(subject) {
        return Err(ClientError::ForbiddenControllerKeyChange {
            controller: entry.controller.to_string(),
            key_id,
        });
    }
    Ok(())
}

/// Replay a plan over a document, mirroring the ledger's semantics.
pub fn apply(document: &DidDocument, plan: &Plan) -> DidDocument {
    let mut doc = document.clone();
    for action in &plan.actions {
        match action {
            ActionPayload::Did(DidAction::AddKeys { keys, .. }) => {
                for (key_id, key) in keys {
                    doc.keys.insert(*key_id, DocumentKey::own(doc.id, key.clone()));
                }
            }
            ActionPayload::Did(DidAction::RemoveKeys { keys, .. }) => {
                for key_id in keys {
                    doc.keys.remove(key_id);
                }
            }
            ActionPayload::Did(DidAction::AddControllers { controllers, .. }) => {
                doc.controllers.extend(controllers.iter().copied());
            }
            ActionPayload::Did(DidAction::RemoveControllers { controllers, .. }) => {
                for controller in controllers {
                    doc.controllers.remove(controller);
                }
            }
            ActionPayload::Did(DidAction::AddServiceEndpoint { id, endpoint, .. }) => {
                doc.services.insert(id.clone(), endpoint.clone());
            }
            ActionPayload::Did(DidAction::RemoveServiceEndpoint { id, .. }) => {
                doc.services.remove(id);
            }
            ActionPayload::OffchainSignatures(OffchainAction::AddKey { key_id, key, .. }) => {
                doc.keys.insert(*key_id, DocumentKey::own(doc.id, key.clone()));
            }
            ActionPayload::OffchainSignatures(OffchainAction::RemoveKey { key_id, .. }) => {
                doc.keys.remove(key_id);
            }
            _ => {}
        }
    }
    doc
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::did::{DidKey, PublicKey, ServiceEndpoint, VerRels};

    fn ed_key(seed: u8) -> DidKey {
        DidKey::new(PublicKey::Ed25519([seed; 32]), VerRels::all())
    }

    fn bls_key(seed: u8) -> DidKey {
        DidKey::new(PublicKey::Bls12381G2(vec![seed; 96]), VerRels::ASSERTION)
    }

    fn service(origin: &str) -> ServiceEndpoint {
        ServiceEndpoint {
            service_type: "LinkedDomains".to_string(),
            origins: vec![origin.to_string()],
        }
    }

    #[test]
    fn test_plan_orders_removals_before_additions() {
        let did = Did::random();
        let mut current = DidDocument::new(did);
        current.keys.insert(1, DocumentKey::own(did, ed_key(1)));
        current
            .services
            .insert("agent".to_string(), service("https://old.example"));

        let mut desired = DidDocument::new(did);
        desired.keys.insert(2, DocumentKey::own(did, ed_key(2)));
        desired
            .services
            .insert("agent".to_string(), service("https://new.example"));

        let plan = plan(&current, &desired).unwrap();
        assert_eq!(
            plan.actions,
            vec![
                ActionPayload::Did(DidAction::RemoveKeys {
                    did,
                    keys: vec![1],
                }),
                ActionPayload::Did(DidAction::RemoveServiceEndpoint {
                    did,
                    id: "agent".to_string(),
                }),
                ActionPayload::Did(DidAction::AddKeys {
                    did,
                    keys: vec![(2, ed_key(2))],
                }),
                ActionPayload::Did(DidAction::AddServiceEndpoint {
                    did,
                    id: "agent".to_string(),
                    endpoint: service("https://new.example"),
                }),
            ]
        );
        assert_eq!(apply(&current, &plan), desired);
    }

    #[test]
    fn test_plan_routes_offchain_keys_separately() {
        let did = Did::random();
        let mut current = DidDocument::new(did);
        current.keys.insert(1, DocumentKey::own(did, bls_key(1)));

        let mut desired = DidDocument::new(did);
        desired.keys.insert(2, DocumentKey::own(did, ed_key(2)));
        desired.keys.insert(3, DocumentKey::own(did, bls_key(3)));

        let plan = plan(&current, &desired).unwrap();
        assert!(matches!(
            plan.actions[0],
            ActionPayload::OffchainSignatures(OffchainAction::RemoveKey { key_id: 1, .. })
        ));
        assert!(matches!(
            plan.actions[1],
            ActionPayload::Did(DidAction::AddKeys { .. })
        ));
        assert!(matches!(
            plan.actions[2],
            ActionPayload::OffchainSignatures(OffchainAction::AddKey { key_id: 3, .. })
        ));
        assert_eq!(apply(&current, &plan), desired);
    }

    #[test]
    fn test_plan_rejects_in_place_key_change() {
        let did = Did::random();
        let mut current = DidDocument::new(did);
        current.keys.insert(1, DocumentKey::own(did, ed_key(1)));
        let mut desired = current.clone();
        desired.keys.insert(1, DocumentKey::own(did, ed_key(9)));

        let err = plan(&current, &desired).unwrap_err();
        assert!(matches!(
            err,
            ClientError::UnsupportedKeyModification { key_id: 1 }
        ));
    }

    #[test]
    fn test_plan_rejects_foreign_key_space_edit() {
        let did = Did::random();
        let controller = Identity::Did(Did::random());
        let mut current = DidDocument::new(did);
        current.keys.insert(
            7,
            DocumentKey {
                controller,
                key: ed_key(7),
            },
        );
        let mut desired = current.clone();
        desired.keys.remove(&7);

        let err = plan(&current, &desired).unwrap_err();
        assert!(matches!(
            err,
            ClientError::ForbiddenControllerKeyChange { key_id: 7, .. }
        ));
    }

    #[test]
    fn test_plan_tolerates_unchanged_foreign_key() {
        let did = Did::random();
        let controller = Identity::Did(Did::random());
        let mut current = DidDocument::new(did);
        current.keys.insert(
            7,
            DocumentKey {
                controller,
                key: ed_key(7),
            },
        );
        let mut desired = current.clone();
        desired.controllers.insert(controller);

        let plan = plan(&current, &desired).unwrap();
        assert_eq!(plan.len(), 1);
        assert_eq!(apply(&current, &plan), desired);
    }

    #[test]
    fn test_plan_no_changes() {
        let did = Did::random();
        let doc = DidDocument::new(did);
        assert!(matches!(
            plan(&doc, &doc.clone()).unwrap_err(),
            ClientError::NoChanges
        ));
    }

    #[test]
    fn test_plan_rejects_subject_mismatch() {
        let current = DidDocument::new(Did::random());
        let desired = DidDocument::new(Did::random());
        match plan(&current, &desired).unwrap_err() {
            ClientError::Validation { path, .. } => assert_eq!(path, "id"),
            other => panic!("expected validation error, got {other}"),
        }
    }
}
