//! Trust-registry schema-map diff compiler.
//!
//! A `Set` update is compiled against the stored schema map into the
//! minimal `Modify` delta reproducing it, so the signed action carries
//! only what actually changes. A `Modify` update is validated against
//! the stored map first: `Add` requires the element to be absent,
//! `Remove` requires it to be present, `Set` upserts. Validation
//! failures carry the dotted path of the offending element.

use std::collections::{BTreeMap, BTreeSet};

use crate::did::Identity;
use crate::error::{ClientError, Result};
use crate::modules::trust_registry::{
    IssuerInfo, IssuerUpdate, IssuersUpdate, PriceUpdate, RegistrySchema, SchemaMap, SchemaUpdate,
    SchemasUpdate, VerifierUpdate, VerifiersUpdate,
};

/// Compile an update into the minimal delta against the stored map.
///
/// Fails with [`ClientError::NoChanges`] when the update would leave
/// the map untouched, and with [`ClientError::Validation`] when a
/// `Modify` update references elements the stored map does not hold
/// (or `Add`s ones it already does).
pub fn compile(current: &SchemaMap, update: SchemasUpdate) -> Result<SchemasUpdate> {
    match update {
        SchemasUpdate::Set(desired) => {
            let mut delta = BTreeMap::new();
            for (id, _) in current.iter().filter(|(id, _)| !desired.contains_key(id)) {
                delta.insert(*id, SchemaUpdate::Remove);
            }
            for (id, des) in &desired {
                match current.get(id) {
                    None => {
                        delta.insert(*id, SchemaUpdate::Add(des.clone()));
                    }
                    Some(cur) if cur != des => {
                        delta.insert(
                            *id,
                            SchemaUpdate::Modify {
                                issuers: issuers_delta(&cur.issuers, &des.issuers),
                                verifiers: verifiers_delta(&cur.verifiers, &des.verifiers),
                            },
                        );
                    }
                    Some(_) => {}
                }
            }
            if delta.is_empty() {
                return Err(ClientError::NoChanges);
            }
            Ok(SchemasUpdate::Modify(delta))
        }
        SchemasUpdate::Modify(updates) => {
            let applied = apply(current, &SchemasUpdate::Modify(updates.clone()))?;
            if applied == *current {
                return Err(ClientError::NoChanges);
            }
            Ok(SchemasUpdate::Modify(updates))
        }
    }
}

fn issuers_delta(
    current: &BTreeMap<Identity, IssuerInfo>,
    desired: &BTreeMap<Identity, IssuerInfo>,
) -> Option<IssuersUpdate> {
    if current == desired {
        return None;
    }
    let mut updates = BTreeMap::new();
    for (issuer, _) in current.iter().filter(|(i, _)| !desired.contains_key(i)) {
        updates.insert(*issuer, IssuerUpdate::Remove);
    }
    for (issuer, des) in desired {
        match current.get(issuer) {
            None => {
                updates.insert(*issuer, IssuerUpdate::Set(des.clone()));
            }
            Some(cur) if cur != des => {
                updates.insert(
                    *issuer,
                    IssuerUpdate::ModifyPrices(prices_delta(&cur.prices, &des.prices)),
                );
            }
            Some(_) => {}
        }
    }
    Some(IssuersUpdate::Modify(updates))
}

fn prices_delta(
    current: &BTreeMap<String, u64>,
    desired: &BTreeMap<String, u64>,
) -> BTreeMap<String, PriceUpdate> {
    let mut updates = BTreeMap::new();
    for (currency, _) in current.iter().filter(|(c, _)| !desired.contains_key(*c)) {
        updates.insert(currency.clone(), PriceUpdate::Remove);
    }
    for (currency, price) in desired {
        match current.get(currency) {
            None => {
                updates.insert(currency.clone(), PriceUpdate::Add(*price));
            }
            Some(cur) if cur != price => {
                updates.insert(currency.clone(), PriceUpdate::Set(*price));
            }
            Some(_) => {}
        }
    }
    updates
}

fn verifiers_delta(
    current: &BTreeSet<Identity>,
    desired: &BTreeSet<Identity>,
) -> Option<VerifiersUpdate> {
    if current == desired {
        return None;
    }
    let mut updates = BTreeMap::new();
    for gone in current.difference(desired) {
        updates.insert(*gone, VerifierUpdate::Remove);
    }
    for incoming in desired.difference(current) {
        updates.insert(*incoming, VerifierUpdate::Add);
    }
    Some(VerifiersUpdate::Modify(updates))
}

// ── Replay ────────────────────────────────────────────────────────────────────

/// Replay an update over a schema map, mirroring the ledger's
/// semantics and enforcing the `Add`/`Remove` presence rules.
pub fn apply(current: &SchemaMap, update: &SchemasUpdate) -> Result<SchemaMap> {
    match update {
        SchemasUpdate::Set(desired) => Ok(desired.clone()),
        SchemasUpdate::Modify(updates) => {
            let mut map = current.clone();
            for (id, update) in updates {
                let path = format!("schemas.{id}");
                match update {
                    SchemaUpdate::Add(schema) => {
                        if map.contains_key(id) {
                            return Err(presence(&path, "an absent schema id", "an existing entry"));
                        }
                        map.insert(*id, schema.clone());
                    }
                    SchemaUpdate::Remove => {
                        if map.remove(id).is_none() {
                            return Err(presence(&path, "an existing schema id", "nothing"));
                        }
                    }
                    SchemaUpdate::Modify { issuers, verifiers } => {
                        let schema = map
                            .get_mut(id)
                            .ok_or_else(|| presence(&path, "an existing schema id", "nothing"))?;
                        if let Some(update) = issuers {
                            apply_issuers(schema, update, &path)?;
                        }
                        if let Some(update) = verifiers {
                            apply_verifiers(schema, update, &path)?;
                        }
                    }
                }
            }
            Ok(map)
        }
    }
}

fn apply_issuers(
    schema: &mut RegistrySchema,
    update: &IssuersUpdate,
    path: &str,
) -> Result<()> {
    match update {
        IssuersUpdate::Set(issuers) => {
            schema.issuers = issuers.clone();
        }
        IssuersUpdate::Modify(updates) => {
            for (issuer, update) in updates {
                let path = format!("{path}.issuers.{issuer}");
                match update {
                    IssuerUpdate::Set(info) => {
                        schema.issuers.insert(*issuer, info.clone());
                    }
                    IssuerUpdate::Remove => {
                        if schema.issuers.remove(issuer).is_none() {
                            return Err(presence(&path, "an existing issuer", "nothing"));
                        }
                    }
                    IssuerUpdate::ModifyPrices(prices) => {
                        let info = schema
                            .issuers
                            .get_mut(issuer)
                            .ok_or_else(|| presence(&path, "an existing issuer", "nothing"))?;
                        for (currency, update) in prices {
                            let path = format!("{path}.prices.{currency}");
                            match update {
                                PriceUpdate::Add(price) => {
                                    if info.prices.contains_key(currency) {
                                        return Err(presence(
                                            &path,
                                            "an unpriced currency",
                                            "an existing price",
                                        ));
                                    }
                                    info.prices.insert(currency.clone(), *price);
                                }
                                PriceUpdate::Set(price) => {
                                    info.prices.insert(currency.clone(), *price);
                                }
                                PriceUpdate::Remove => {
                                    if info.prices.remove(currency).is_none() {
                                        return Err(presence(
                                            &path,
                                            "a priced currency",
                                            "nothing",
                                        ));
                                    }
                                }
                            }
                        }
                    }
                }
            }
        }
    }
    Ok(())
}

fn apply_verifiers(
    schema: &mut RegistrySchema,
    update: &VerifiersUpdate,
    path: &str,
) -> Result<()> {
    match update {
        VerifiersUpdate::Set(verifiers) => {
            schema.verifiers = verifiers.clone();
        }
        VerifiersUpdate::Modify(updates) => {
            for (verifier, update) in updates {
                let path = format!("{path}.verifiers.{verifier}");
                match update {
                    VerifierUpdate::Add => {
                        if !schema.verifiers.insert(*verifier) {
                            return Err(presence(
                                &path,
                                "an absent verifier",
                                "an existing entry",
                            ));
                        }
                    }
                    VerifierUpdate::Remove => {
                        if !schema.verifiers.remove(verifier) {
                            return Err(presence(&path, "an existing verifier", "nothing"));
                        }
                    }
                }
            }
        }
    }
    Ok(())
}

fn presence(path: &str, expected: &str, found: &str) -> ClientError {
    ClientError::Validation {
        path: path.to_string(),
        expected: expected.to_string(),
        found: found.to_string(),
    }
}
