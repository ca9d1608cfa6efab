//! The trust registry module: a convener-governed registry of
//! credential schemas, each mapping to its authorized issuers (with
//! per-currency prices) and verifiers, plus the registry's participant
//! set.
//!
//! Schema updates arrive as untyped JSON in one of two modes —
//! wholesale `Set` (discards every unspecified schema) or recursive
//! `Modify` — and are shape-checked before the diff compiler turns
//! them into a minimal validated delta. Participant changes are
//! co-signed under the asymmetric policy in [`crate::policy`].

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::action::{self, ActionPayload, Payload};
use crate::codec;
use crate::did::{Did, Identity};
use crate::diff;
use crate::error::{ClientError, Result};
use crate::ledger::{LedgerConnection, Receipt, WaitFor};
use crate::nonce::NonceSequencer;
use crate::policy::{participant_change_signers, ParticipantChange, SignerPolicy};
use crate::signer::{Signer, SignerSet};
use crate::tx::{Call, Transaction};
use crate::validate::{is_u64, Field, Shape};

/// Storage module name on the ledger.
pub const MODULE: &str = "trust_registry";

// ── Identifiers ───────────────────────────────────────────────────────────────

/// Unique identifier of a trust registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RegistryId(pub [u8; 32]);

impl std::fmt::Display for RegistryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

/// Unique identifier of a credential schema within a registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SchemaId(pub [u8; 32]);

impl SchemaId {
    pub fn from_hex(s: &str) -> Result<Self> {
        let raw = hex::decode(s)
            .map_err(|e| ClientError::InvalidKey(format!("invalid hex schema id: {e}")))?;
        let bytes: [u8; 32] = raw
            .try_into()
            .map_err(|_| ClientError::InvalidKey("schema id must be 32 bytes".into()))?;
        Ok(Self(bytes))
    }
}

impl std::fmt::Display for SchemaId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

// ── Stored state ──────────────────────────────────────────────────────────────

/// Registry metadata as mirrored from the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrustRegistryInfo {
    pub convener: Did,
    pub name: String,
    pub gov_framework: String,
}

/// An issuer's entry under one schema: price per currency.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct IssuerInfo {
    pub prices: BTreeMap<String, u64>,
}

/// One schema's issuer and verifier sets.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RegistrySchema {
    pub issuers: BTreeMap<Identity, IssuerInfo>,
    pub verifiers: BTreeSet<Identity>,
}

/// The registry's full schema map.
pub type SchemaMap = BTreeMap<SchemaId, RegistrySchema>;

// ── Updates ───────────────────────────────────────────────────────────────────

/// Add or set a price, or drop the currency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PriceUpdate {
    /// Insert; the currency must not already be priced.
    Add(u64),
    /// Upsert.
    Set(u64),
    /// Drop; the currency must currently be priced.
    Remove,
}

/// Update one issuer's entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum IssuerUpdate {
    Set(IssuerInfo),
    ModifyPrices(BTreeMap<String, PriceUpdate>),
    Remove,
}

/// Update a schema's issuer map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum IssuersUpdate {
    Set(BTreeMap<Identity, IssuerInfo>),
    Modify(BTreeMap<Identity, IssuerUpdate>),
}

/// Add or remove one verifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VerifierUpdate {
    Add,
    Remove,
}

/// Update a schema's verifier set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum VerifiersUpdate {
    Set(BTreeSet<Identity>),
    Modify(BTreeMap<Identity, VerifierUpdate>),
}

/// Update one schema entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SchemaUpdate {
    /// Insert; the schema must not already exist.
    Add(RegistrySchema),
    /// Drop; the schema must currently exist.
    Remove,
    /// Patch the existing entry.
    Modify {
        issuers: Option<IssuersUpdate>,
        verifiers: Option<VerifiersUpdate>,
    },
}

/// The two update modes for a registry's schema map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SchemasUpdate {
    /// Wholesale replacement: schemas absent from the map are removed.
    Set(SchemaMap),
    /// Incremental patch of individual schemas.
    Modify(BTreeMap<SchemaId, SchemaUpdate>),
}

// ── Shape description of the JSON update input ────────────────────────────────

fn is_did_string(v: &Value) -> bool {
    v.as_str().is_some_and(|s| Identity::parse(s).is_ok())
}

fn did_key(k: &str) -> bool {
    Identity::parse(k).is_ok()
}

fn schema_id_key(k: &str) -> bool {
    k.len() == 64 && k.chars().all(|c| c.is_ascii_hexdigit())
}

fn currency_key(k: &str) -> bool {
    (1..=8).contains(&k.len()) && k.chars().all(|c| c.is_ascii_uppercase())
}

fn u64_shape() -> Shape {
    Shape::Custom {
        name: "an unsigned integer",
        check: is_u64,
    }
}

fn issuer_info_shape() -> Shape {
    Shape::Object(vec![Field::required(
        "prices",
        Shape::MapOf {
            key_name: "a currency code",
            key: currency_key,
            value: Box::new(u64_shape()),
        },
    )])
}

fn issuers_map_shape() -> Shape {
    Shape::MapOf {
        key_name: "a DID",
        key: did_key,
        value: Box::new(issuer_info_shape()),
    }
}

fn verifiers_list_shape() -> Shape {
    Shape::IterableOf(Box::new(Shape::Custom {
        name: "a DID",
        check: is_did_string,
    }))
}

fn schema_shape() -> Shape {
    Shape::Object(vec![
        Field::optional("issuers", issuers_map_shape()),
        Field::optional("verifiers", verifiers_list_shape()),
    ])
}

fn schema_modify_shape() -> Shape {
    Shape::Object(vec![
        Field::optional(
            "issuers",
            Shape::OneOfKeys(vec![
                ("Set", issuers_map_shape()),
                (
                    "Modify",
                    Shape::MapOf {
                        key_name: "a DID",
                        key: did_key,
                        value: Box::new(Shape::AnyOf(vec![
                            Shape::Value(Value::String("Remove".into())),
                            Shape::OneOfKeys(vec![
                                ("Set", issuer_info_shape()),
                                (
                                    "ModifyPrices",
                                    Shape::MapOf {
                                        key_name: "a currency code",
                                        key: currency_key,
                                        value: Box::new(Shape::AnyOf(vec![
                                            Shape::Value(Value::String("Remove".into())),
                                            Shape::OneOfKeys(vec![
                                                ("Add", u64_shape()),
                                                ("Set", u64_shape()),
                                            ]),
                                        ])),
                                    },
                                ),
                            ]),
                        ])),
                    },
                ),
            ]),
        ),
        Field::optional(
            "verifiers",
            Shape::OneOfKeys(vec![
                ("Set", verifiers_list_shape()),
                (
                    "Modify",
                    Shape::MapOf {
                        key_name: "a DID",
                        key: did_key,
                        value: Box::new(Shape::AnyOf(vec![
                            Shape::Value(Value::String("Add".into())),
                            Shape::Value(Value::String("Remove".into())),
                        ])),
                    },
                ),
            ]),
        ),
    ])
}

/// The declarative shape the JSON form of [`SchemasUpdate`] must match.
pub fn schemas_update_shape() -> Shape {
    Shape::OneOfKeys(vec![
        (
            "Set",
            Shape::MapOf {
                key_name: "a 32-byte hex schema id",
                key: schema_id_key,
                value: Box::new(schema_shape()),
            },
        ),
        (
            "Modify",
            Shape::MapOf {
                key_name: "a 32-byte hex schema id",
                key: schema_id_key,
                value: Box::new(Shape::AnyOf(vec![
                    Shape::Value(Value::String("Remove".into())),
                    Shape::OneOfKeys(vec![
                        ("Add", schema_shape()),
                        ("Modify", schema_modify_shape()),
                    ]),
                ])),
            },
        ),
    ])
}

// ── JSON → typed conversion ───────────────────────────────────────────────────

impl SchemasUpdate {
    /// Shape-check untyped update input, then decode it.
    ///
    /// Runs [`schemas_update_shape`] first, so a malformed value fails
    /// with the dotted path of the offending element before any
    /// decoding or network access happens.
    pub fn from_json(value: &Value) -> Result<Self> {
        schemas_update_shape().check(value)?;

        // Shape-checked above; the conversions below only re-parse
        // string keys into their typed forms.
        let (mode, body) = object_single(value)?;
        match mode.as_str() {
            "Set" => {
                let mut schemas = SchemaMap::new();
                for (k, v) in object(body)? {
                    schemas.insert(SchemaId::from_hex(k)?, schema_from_json(v)?);
                }
                Ok(Self::Set(schemas))
            }
            _ => {
                let mut updates = BTreeMap::new();
                for (k, v) in object(body)? {
                    updates.insert(SchemaId::from_hex(k)?, schema_update_from_json(v)?);
                }
                Ok(Self::Modify(updates))
            }
        }
    }
}

fn object(value: &Value) -> Result<&serde_json::Map<String, Value>> {
    value
        .as_object()
        .ok_or_else(|| ClientError::Codec("expected a JSON object".into()))
}

fn object_single(value: &Value) -> Result<(&String, &Value)> {
    object(value)?
        .iter()
        .next()
        .ok_or_else(|| ClientError::Codec("expected a single-variant object".into()))
}

fn schema_from_json(value: &Value) -> Result<RegistrySchema> {
    let map = object(value)?;
    let mut schema = RegistrySchema::default();
    if let Some(issuers) = map.get("issuers") {
        schema.issuers = issuers_from_json(issuers)?;
    }
    if let Some(verifiers) = map.get("verifiers") {
        schema.verifiers = verifiers_from_json(verifiers)?;
    }
    Ok(schema)
}

fn issuers_from_json(value: &Value) -> Result<BTreeMap<Identity, IssuerInfo>> {
    let mut issuers = BTreeMap::new();
    for (did, info) in object(value)? {
        issuers.insert(Identity::parse(did)?, issuer_info_from_json(info)?);
    }
    Ok(issuers)
}

fn issuer_info_from_json(value: &Value) -> Result<IssuerInfo> {
    let mut prices = BTreeMap::new();
    if let Some(map) = object(value)?.get("prices").and_then(Value::as_object) {
        for (currency, price) in map {
            prices.insert(currency.clone(), price.as_u64().unwrap_or(0));
        }
    }
    Ok(IssuerInfo { prices })
}

fn verifiers_from_json(value: &Value) -> Result<BTreeSet<Identity>> {
    let mut verifiers = BTreeSet::new();
    for item in value.as_array().into_iter().flatten() {
        verifiers.insert(Identity::parse(item.as_str().unwrap_or_default())?);
    }
    Ok(verifiers)
}

fn schema_update_from_json(value: &Value) -> Result<SchemaUpdate> {
    if value == &Value::String("Remove".into()) {
        return Ok(SchemaUpdate::Remove);
    }
    let (variant, body) = object_single(value)?;
    match variant.as_str() {
        "Add" => Ok(SchemaUpdate::Add(schema_from_json(body)?)),
        _ => {
            let map = object(body)?;
            let issuers = map
                .get("issuers")
                .map(issuers_update_from_json)
                .transpose()?;
            let verifiers = map
                .get("verifiers")
                .map(verifiers_update_from_json)
                .transpose()?;
            Ok(SchemaUpdate::Modify { issuers, verifiers })
        }
    }
}

fn issuers_update_from_json(value: &Value) -> Result<IssuersUpdate> {
    let (variant, body) = object_single(value)?;
    if variant == "Set" {
        return Ok(IssuersUpdate::Set(issuers_from_json(body)?));
    }
    let mut updates = BTreeMap::new();
    for (did, update) in object(body)? {
        let update = if update == &Value::String("Remove".into()) {
            IssuerUpdate::Remove
        } else {
            let (inner, inner_body) = object_single(update)?;
            match inner.as_str() {
                "Set" => IssuerUpdate::Set(issuer_info_from_json(inner_body)?),
                _ => {
                    let mut prices = BTreeMap::new();
                    for (currency, price) in object(inner_body)? {
                        let update = if price == &Value::String("Remove".into()) {
                            PriceUpdate::Remove
                        } else {
                            let (op, amount) = object_single(price)?;
                            let amount = amount.as_u64().unwrap_or(0);
                            match op.as_str() {
                                "Add" => PriceUpdate::Add(amount),
                                _ => PriceUpdate::Set(amount),
                            }
                        };
                        prices.insert(currency.clone(), update);
                    }
                    IssuerUpdate::ModifyPrices(prices)
                }
            }
        };
        updates.insert(Identity::parse(did)?, update);
    }
    Ok(IssuersUpdate::Modify(updates))
}

fn verifiers_update_from_json(value: &Value) -> Result<VerifiersUpdate> {
    let (variant, body) = object_single(value)?;
    if variant == "Set" {
        return Ok(VerifiersUpdate::Set(verifiers_from_json(body)?));
    }
    let mut updates = BTreeMap::new();
    for (did, op) in object(body)? {
        let update = match op.as_str() {
            Some("Add") => VerifierUpdate::Add,
            _ => VerifierUpdate::Remove,
        };
        updates.insert(Identity::parse(did)?, update);
    }
    Ok(VerifiersUpdate::Modify(updates))
}

// ── Actions ───────────────────────────────────────────────────────────────────

/// Primitive actions of the trust registry module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrustRegistryAction {
    /// Create a registry or update its metadata; convener-signed.
    InitOrUpdate {
        convener: Did,
        registry_id: RegistryId,
        name: String,
        gov_framework: String,
    },
    /// Apply a compiled schema-map delta; convener-signed.
    SetSchemas {
        convener: Did,
        registry_id: RegistryId,
        update: SchemasUpdate,
    },
    /// Change the participant set; co-signed per the asymmetric policy.
    ChangeParticipants {
        convener: Did,
        registry_id: RegistryId,
        changes: BTreeMap<Identity, ParticipantChange>,
    },
}

impl TrustRegistryAction {
    pub fn name(&self) -> &'static str {
        match self {
            Self::InitOrUpdate { .. } => "trust_registry.init_or_update",
            Self::SetSchemas { .. } => "trust_registry.set_schemas",
            Self::ChangeParticipants { .. } => "trust_registry.change_participants",
        }
    }

    pub fn policy(&self) -> SignerPolicy {
        match self {
            Self::InitOrUpdate { convener, .. } | Self::SetSchemas { convener, .. } => {
                SignerPolicy::Single {
                    target: Identity::Did(*convener),
                }
            }
            Self::ChangeParticipants {
                convener, changes, ..
            } => SignerPolicy::CoSignedAllOf(participant_change_signers(*convener, changes)),
        }
    }
}

// ── Client ────────────────────────────────────────────────────────────────────

/// Client for the trust registry module.
pub struct TrustRegistryModule<'a, L: LedgerConnection + ?Sized> {
    ledger: &'a L,
}

impl<'a, L: LedgerConnection + ?Sized> TrustRegistryModule<'a, L> {
    pub fn new(ledger: &'a L) -> Self {
        Self { ledger }
    }

    pub fn payload(&self, action: TrustRegistryAction, nonce: u64) -> Payload {
        action::payload(ActionPayload::TrustRegistry(action), nonce)
    }

    pub async fn tx(&self, action: TrustRegistryAction, signers: &SignerSet<'_>) -> Result<Call> {
        action::tx(self.ledger, ActionPayload::TrustRegistry(action), signers).await
    }

    pub async fn send(
        &self,
        action: TrustRegistryAction,
        signers: &SignerSet<'_>,
        wait: WaitFor,
    ) -> Result<Receipt> {
        action::send(self.ledger, ActionPayload::TrustRegistry(action), signers, wait).await
    }

    /// Read registry metadata, `None` when unregistered.
    pub async fn get_registry_info(&self, id: &RegistryId) -> Result<Option<TrustRegistryInfo>> {
        let key = codec::encode(&("info", id))?;
        match self.ledger.query(MODULE, &key).await? {
            Some(bytes) => Ok(Some(codec::decode(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Read the registry's full schema map (empty when unset).
    pub async fn get_schemas(&self, id: &RegistryId) -> Result<SchemaMap> {
        let key = codec::encode(&("schemas", id))?;
        match self.ledger.query(MODULE, &key).await? {
            Some(bytes) => codec::decode(&bytes),
            None => Ok(SchemaMap::new()),
        }
    }

    /// Read one schema entry, `None` when absent.
    pub async fn get_schema(
        &self,
        id: &RegistryId,
        schema_id: &SchemaId,
    ) -> Result<Option<RegistrySchema>> {
        Ok(self.get_schemas(id).await?.remove(schema_id))
    }

    /// Registries an identity participates in, as issuer or verifier.
    pub async fn registries_by_participant(
        &self,
        participant: &Identity,
    ) -> Result<BTreeSet<RegistryId>> {
        let key = codec::encode(&("participants", participant))?;
        match self.ledger.query(MODULE, &key).await? {
            Some(bytes) => codec::decode(&bytes),
            None => Ok(BTreeSet::new()),
        }
    }

    /// Composite: shape-check an untyped schema update, compile it into
    /// a minimal delta against the stored schema map, and submit it
    /// convener-signed. An update that changes nothing fails with
    /// [`ClientError::NoChanges`] before any signing happens.
    pub async fn set_schemas(
        &self,
        registry_id: RegistryId,
        update_json: &Value,
        convener: &dyn Signer,
        starting_nonce: Option<u64>,
        wait: WaitFor,
    ) -> Result<Receipt> {
        let convener_did = match convener.identity() {
            Identity::Did(did) => did,
            other => {
                return Err(ClientError::SignerMismatch {
                    signer: other.to_string(),
                    target: "a convener DID".to_string(),
                })
            }
        };

        let update = SchemasUpdate::from_json(update_json)?;
        let current = self.get_schemas(&registry_id).await?;
        let delta = diff::schema::compile(&current, update)?;
        log::debug!("schema update for registry {registry_id} compiled to a minimal delta");

        let mut sequencer =
            NonceSequencer::start(self.ledger, convener.identity(), starting_nonce).await?;
        let action = ActionPayload::TrustRegistry(TrustRegistryAction::SetSchemas {
            convener: convener_did,
            registry_id,
            update: delta,
        });
        let envelope = action::envelope(&action, convener, sequencer.next()).await?;
        let call = Call {
            action,
            envelopes: vec![envelope],
        };
        crate::tx::submit(self.ledger, Transaction::Batch(vec![call]), wait).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn did_str() -> (Identity, String) {
        let id = Identity::Did(Did::random());
        (id, id.to_string())
    }

    #[test]
    fn test_from_json_set_mode() {
        let (issuer, issuer_s) = did_str();
        let (verifier, verifier_s) = did_str();
        let schema_id = SchemaId([1; 32]);

        let value = json!({
            "Set": {
                schema_id.to_string(): {
                    "issuers": { issuer_s: { "prices": { "USD": 10 } } },
                    "verifiers": [verifier_s],
                }
            }
        });
        let update = SchemasUpdate::from_json(&value).unwrap();
        let SchemasUpdate::Set(schemas) = update else {
            panic!("expected Set mode");
        };
        let schema = &schemas[&schema_id];
        assert_eq!(schema.issuers[&issuer].prices["USD"], 10);
        assert!(schema.verifiers.contains(&verifier));
    }

    #[test]
    fn test_from_json_modify_mode_nested_prices() {
        let (issuer, issuer_s) = did_str();
        let schema_id = SchemaId([2; 32]);

        let value = json!({
            "Modify": {
                schema_id.to_string(): {
                    "Modify": {
                        "issuers": {
                            "Modify": {
                                issuer_s: { "ModifyPrices": { "EUR": { "Add": 5 }, "USD": "Remove" } }
                            }
                        }
                    }
                }
            }
        });
        let update = SchemasUpdate::from_json(&value).unwrap();
        let SchemasUpdate::Modify(updates) = update else {
            panic!("expected Modify mode");
        };
        let SchemaUpdate::Modify {
            issuers: Some(IssuersUpdate::Modify(issuers)),
            verifiers: None,
        } = &updates[&schema_id]
        else {
            panic!("expected nested issuer modify");
        };
        let IssuerUpdate::ModifyPrices(prices) = &issuers[&issuer] else {
            panic!("expected price patch");
        };
        assert_eq!(prices["EUR"], PriceUpdate::Add(5));
        assert_eq!(prices["USD"], PriceUpdate::Remove);
    }

    #[test]
    fn test_from_json_rejects_bad_schema_id_with_path() {
        let value = json!({ "Set": { "not-hex": {} } });
        let err = SchemasUpdate::from_json(&value).unwrap_err();
        match err {
            ClientError::Validation { path, .. } => assert_eq!(path, "Set.not-hex"),
            other => panic!("expected validation error, got {other}"),
        }
    }

    #[test]
    fn test_from_json_rejects_negative_price_with_path() {
        let (_, issuer_s) = did_str();
        let schema_id = SchemaId([3; 32]).to_string();
        let value = json!({
            "Set": { schema_id.clone(): { "issuers": { issuer_s.clone(): { "prices": { "USD": -1 } } } } }
        });
        let err = SchemasUpdate::from_json(&value).unwrap_err();
        match err {
            ClientError::Validation { path, .. } => {
                assert_eq!(path, format!("Set.{schema_id}.issuers.{issuer_s}.prices.USD"));
            }
            other => panic!("expected validation error, got {other}"),
        }
    }

    #[test]
    fn test_change_participants_policy_from_args() {
        let convener = Did::random();
        let incoming = Identity::Did(Did::random());
        let action = TrustRegistryAction::ChangeParticipants {
            convener,
            registry_id: RegistryId([0; 32]),
            changes: BTreeMap::from([(incoming, ParticipantChange::Add)]),
        };
        let SignerPolicy::CoSignedAllOf(required) = action.policy() else {
            panic!("expected co-signed policy");
        };
        assert!(required.contains(&Identity::Did(convener)));
        assert!(required.contains(&incoming));
    }
}
