//! Declarative shape validation for structured update input.
//!
//! Composite updates (trust-registry schema maps in particular) arrive
//! as untyped JSON. Before the diff compiler touches them they are
//! checked against a [`Shape`] — a composable predicate tree. A
//! mismatch produces a [`ClientError::Validation`] carrying the dotted
//! path of the failing element, what was expected, and what was found.

use serde_json::Value;

use crate::error::{ClientError, Result};

/// JSON value categories for type-match predicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JsonType {
    Null,
    Bool,
    Number,
    String,
    Array,
    Object,
}

impl JsonType {
    fn matches(self, value: &Value) -> bool {
        matches!(
            (self, value),
            (Self::Null, Value::Null)
                | (Self::Bool, Value::Bool(_))
                | (Self::Number, Value::Number(_))
                | (Self::String, Value::String(_))
                | (Self::Array, Value::Array(_))
                | (Self::Object, Value::Object(_))
        )
    }

    fn name(self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool => "bool",
            Self::Number => "number",
            Self::String => "string",
            Self::Array => "array",
            Self::Object => "object",
        }
    }
}

/// A field of an object shape.
#[derive(Clone)]
pub struct Field {
    pub name: &'static str,
    pub shape: Shape,
    pub required: bool,
}

impl Field {
    pub fn required(name: &'static str, shape: Shape) -> Self {
        Self {
            name,
            shape,
            required: true,
        }
    }

    pub fn optional(name: &'static str, shape: Shape) -> Self {
        Self {
            name,
            shape,
            required: false,
        }
    }
}

/// A composable predicate over JSON values.
#[derive(Clone)]
pub enum Shape {
    /// The value must be of the given JSON type.
    Type(JsonType),
    /// The value must equal this value exactly.
    Value(Value),
    /// An object with the given fields; unknown fields are rejected.
    Object(Vec<Field>),
    /// An object whose every value matches the inner shape; keys are
    /// additionally checked by the named key predicate.
    MapOf {
        key_name: &'static str,
        key: fn(&str) -> bool,
        value: Box<Shape>,
    },
    /// An array whose every element matches the inner shape.
    IterableOf(Box<Shape>),
    /// At least one alternative must match.
    AnyOf(Vec<Shape>),
    /// An object with exactly one key, drawn from the listed variants.
    OneOfKeys(Vec<(&'static str, Shape)>),
    /// A named custom predicate.
    Custom {
        name: &'static str,
        check: fn(&Value) -> bool,
    },
}

impl Shape {
    /// Check `value` against this shape, reporting the first mismatch
    /// with its dotted path.
    pub fn check(&self, value: &Value) -> Result<()> {
        self.check_at(value, &mut Vec::new())
    }

    fn check_at(&self, value: &Value, path: &mut Vec<String>) -> Result<()> {
        match self {
            Shape::Type(t) => {
                if t.matches(value) {
                    Ok(())
                } else {
                    Err(mismatch(path, t.name(), value))
                }
            }
            Shape::Value(expected) => {
                if value == expected {
                    Ok(())
                } else {
                    Err(mismatch(path, &format!("the value {expected}"), value))
                }
            }
            Shape::Object(fields) => {
                let map = match value {
                    Value::Object(map) => map,
                    other => return Err(mismatch(path, "object", other)),
                };
                for field in fields {
                    match map.get(field.name) {
                        Some(inner) => {
                            path.push(field.name.to_string());
                            field.shape.check_at(inner, path)?;
                            path.pop();
                        }
                        None if field.required => {
                            path.push(field.name.to_string());
                            let err = mismatch(path, "a present field", &Value::Null);
                            path.pop();
                            return Err(err);
                        }
                        None => {}
                    }
                }
                if let Some(unknown) = map.keys().find(|k| !fields.iter().any(|f| f.name == *k)) {
                    path.push(unknown.clone());
                    let err = mismatch(path, "a known field", &map[unknown]);
                    path.pop();
                    return Err(err);
                }
                Ok(())
            }
            Shape::MapOf {
                key_name,
                key,
                value: inner,
            } => {
                let map = match value {
                    Value::Object(map) => map,
                    other => return Err(mismatch(path, "object", other)),
                };
                for (k, v) in map {
                    path.push(k.clone());
                    if !key(k) {
                        let err = mismatch(path, key_name, &Value::String(k.clone()));
                        path.pop();
                        return Err(err);
                    }
                    inner.check_at(v, path)?;
                    path.pop();
                }
                Ok(())
            }
            Shape::IterableOf(inner) => {
                let items = match value {
                    Value::Array(items) => items,
                    other => return Err(mismatch(path, "array", other)),
                };
                for (i, item) in items.iter().enumerate() {
                    path.push(i.to_string());
                    inner.check_at(item, path)?;
                    path.pop();
                }
                Ok(())
            }
            Shape::AnyOf(alternatives) => {
                for alt in alternatives {
                    if alt.check_at(value, &mut path.clone()).is_ok() {
                        return Ok(());
                    }
                }
                Err(mismatch(path, "any of the allowed alternatives", value))
            }
            Shape::OneOfKeys(variants) => {
                let map = match value {
                    Value::Object(map) => map,
                    other => return Err(mismatch(path, "a single-variant object", other)),
                };
                let (k, v) = match (map.len(), map.iter().next()) {
                    (1, Some(kv)) => kv,
                    _ => return Err(mismatch(path, "exactly one variant key", value)),
                };
                match variants.iter().find(|(name, _)| name == k) {
                    Some((name, shape)) => {
                        path.push(name.to_string());
                        shape.check_at(v, path)?;
                        path.pop();
                        Ok(())
                    }
                    None => {
                        let allowed: Vec<&str> = variants.iter().map(|(n, _)| *n).collect();
                        Err(mismatch(
                            path,
                            &format!("one of the keys {allowed:?}"),
                            value,
                        ))
                    }
                }
            }
            Shape::Custom { name, check } => {
                if check(value) {
                    Ok(())
                } else {
                    Err(mismatch(path, name, value))
                }
            }
        }
    }
}

fn mismatch(path: &[String], expected: &str, found: &Value) -> ClientError {
    let found = match found {
        Value::String(s) => format!("\"{s}\""),
        Value::Object(_) => "an object".to_string(),
        Value::Array(_) => "an array".to_string(),
        other => other.to_string(),
    };
    ClientError::Validation {
        path: path.join("."),
        expected: expected.to_string(),
        found,
    }
}

/// A non-negative integer that fits in `u64`.
pub fn is_u64(value: &Value) -> bool {
    value.as_u64().is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn path_of(err: ClientError) -> String {
        match err {
            ClientError::Validation { path, .. } => path,
            other => panic!("expected validation error, got {other}"),
        }
    }

    #[test]
    fn test_type_match() {
        assert!(Shape::Type(JsonType::String).check(&json!("x")).is_ok());
        assert!(Shape::Type(JsonType::String).check(&json!(1)).is_err());
    }

    #[test]
    fn test_object_shape_reports_nested_path() {
        let shape = Shape::Object(vec![Field::required(
            "outer",
            Shape::Object(vec![Field::required("inner", Shape::Type(JsonType::Number))]),
        )]);
        let err = shape.check(&json!({"outer": {"inner": "oops"}})).unwrap_err();
        assert_eq!(path_of(err), "outer.inner");
    }

    #[test]
    fn test_object_shape_rejects_unknown_field() {
        let shape = Shape::Object(vec![Field::optional("known", Shape::Type(JsonType::Bool))]);
        let err = shape.check(&json!({"mystery": 1})).unwrap_err();
        assert_eq!(path_of(err), "mystery");
    }

    #[test]
    fn test_map_of_checks_keys_and_values() {
        let shape = Shape::MapOf {
            key_name: "an uppercase key",
            key: |k| k.chars().all(|c| c.is_ascii_uppercase()),
            value: Shape::Custom {
                name: "a u64",
                check: is_u64,
            }
            .into(),
        };
        assert!(shape.check(&json!({"USD": 10})).is_ok());
        assert_eq!(path_of(shape.check(&json!({"usd": 10})).unwrap_err()), "usd");
        assert_eq!(path_of(shape.check(&json!({"USD": -1})).unwrap_err()), "USD");
    }

    #[test]
    fn test_iterable_of_reports_index() {
        let shape = Shape::IterableOf(Box::new(Shape::Type(JsonType::String)));
        let err = shape.check(&json!(["ok", 3])).unwrap_err();
        assert_eq!(path_of(err), "1");
    }

    #[test]
    fn test_any_of() {
        let shape = Shape::AnyOf(vec![
            Shape::Value(json!("Remove")),
            Shape::Type(JsonType::Object),
        ]);
        assert!(shape.check(&json!("Remove")).is_ok());
        assert!(shape.check(&json!({})).is_ok());
        assert!(shape.check(&json!(7)).is_err());
    }

    #[test]
    fn test_one_of_keys() {
        let shape = Shape::OneOfKeys(vec![
            ("Add", Shape::Type(JsonType::Number)),
            ("Remove", Shape::Type(JsonType::Null)),
        ]);
        assert!(shape.check(&json!({"Add": 5})).is_ok());
        assert!(shape.check(&json!({"Add": 5, "Remove": null})).is_err());
        assert!(shape.check(&json!({"Replace": 5})).is_err());
        let err = shape.check(&json!({"Add": "five"})).unwrap_err();
        assert_eq!(path_of(err), "Add");
    }
}
