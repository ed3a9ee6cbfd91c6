//! Mutation generator - derives a corrupted field map from a baseline one
//!
//! `mutate` is pure with respect to its input: the baseline map is never
//! touched, every call returns a fresh map. Only the `invalid_value`
//! substitution involves randomness, drawn from a seeded generator so that
//! identical runs produce identical reports.

use parking_lot::Mutex;
use rand::Rng;
use rand::SeedableRng;
use rand::rngs::SmallRng;
use serde_json::{Value, json};

use crate::fault::{FaultKind, FaultScope};
use crate::response::FieldMap;

/// Default seed for the `invalid_value` candidate picker.
const DEFAULT_SEED: u64 = 0x5EED_FA07;

/// Produces corrupted variants of a baseline field map.
pub struct MutationGenerator {
    rng: Mutex<SmallRng>,
}

impl Default for MutationGenerator {
    fn default() -> Self {
        Self::with_seed(DEFAULT_SEED)
    }
}

impl MutationGenerator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Generator with an explicit seed, for reproducing a specific run.
    #[must_use]
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: Mutex::new(SmallRng::seed_from_u64(seed)),
        }
    }

    /// Apply one field-scoped fault to one field, returning a fresh map.
    ///
    /// A `field` absent from the map yields an unchanged copy: fields are
    /// sourced from the same baseline map, so absence is a defined no-op,
    /// not an error. `null_field` and `invalid_value` on an already-null
    /// value are no-ops for the same reason - there is no same-type
    /// substitute for null. Callers compare the result against the input to
    /// skip attempts that would rerun against an unmutated response.
    ///
    /// # Errors
    ///
    /// Returns [`MutationError::NotFieldScoped`] for the method/status/delay
    /// kinds, which corrupt response metadata rather than body fields.
    pub fn mutate(
        &self,
        field_map: &FieldMap,
        field: &str,
        kind: FaultKind,
    ) -> Result<FieldMap, MutationError> {
        if kind.scope() != FaultScope::Field {
            return Err(MutationError::NotFieldScoped(kind));
        }

        let mut mutated = field_map.clone();
        match kind {
            FaultKind::NullField => {
                if mutated.contains_key(field) {
                    mutated.insert(field.to_string(), Value::Null);
                }
            }
            FaultKind::MissingField => {
                mutated.remove(field);
            }
            FaultKind::InvalidDataType => {
                if let Some(value) = mutated.get(field) {
                    let replacement = incompatible_type_value(value);
                    mutated.insert(field.to_string(), replacement);
                }
            }
            FaultKind::InvalidValue => {
                if let Some(value) = mutated.get(field) {
                    let replacement = out_of_range_value(value, &mut *self.rng.lock());
                    mutated.insert(field.to_string(), replacement);
                }
            }
            _ => unreachable!("scope checked above"),
        }
        Ok(mutated)
    }
}

/// Deterministic incompatible-type substitution table.
///
/// Each JSON type maps to a fixed value of a different type, so a consumer
/// that deserializes the field into its baseline type must fail.
fn incompatible_type_value(baseline: &Value) -> Value {
    match baseline {
        Value::String(_) => json!(12345),
        Value::Number(_) => json!("not_a_number"),
        Value::Bool(_) => json!("not_a_bool"),
        Value::Null => json!("not_null"),
        Value::Array(_) => json!({}),
        Value::Object(_) => json!([]),
    }
}

/// Same-type but out-of-range substitution, drawn from a small per-type pool.
fn out_of_range_value(baseline: &Value, rng: &mut SmallRng) -> Value {
    match baseline {
        Value::Number(n) if n.is_f64() => {
            let candidates = [f64::MAX, f64::MIN, -1.0e300];
            json!(candidates[rng.gen_range(0..candidates.len())])
        }
        Value::Number(_) => {
            let candidates = [i64::MIN, i64::MAX, -1];
            json!(candidates[rng.gen_range(0..candidates.len())])
        }
        Value::String(s) => {
            let candidates = [String::new(), "A".repeat(10_000)];
            let mut index = rng.gen_range(0..candidates.len());
            // Never replace a value with itself
            if *s == candidates[index] {
                index = 1 - index;
            }
            Value::String(candidates[index].clone())
        }
        Value::Bool(b) => Value::Bool(!b),
        Value::Array(_) => json!([]),
        Value::Object(_) => json!({}),
        // No in-type out-of-range variant exists for null
        Value::Null => Value::Null,
    }
}

#[derive(Debug, thiserror::Error)]
pub enum MutationError {
    #[error("fault kind `{0}` corrupts response metadata, not a body field")]
    NotFieldScoped(FaultKind),
}
