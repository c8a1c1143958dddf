//! Schema-driven planning.
//!
//! Compares prior state with the proposed declaration attribute by
//! attribute. Force-new attributes turn an update into a replacement, and
//! computed attributes are carried over or left unknown (`null`).

use serde_json::{Map, Value};

use crate::schema::Schema;
use crate::types::{AttributeChange, PlanResult};

/// Plan the transition from `prior` to `proposed`.
///
/// - `prior` of `None` (or `null`) plans a create.
/// - `proposed` of `null` plans a destroy.
/// - Anything else plans an in-place update or, when a force-new attribute
///   changes, a replacement.
///
/// `proposed` is expected to be normalized by the resource beforehand.
pub fn plan(schema: &Schema, prior: Option<&Value>, proposed: &Value) -> PlanResult {
    let prior = prior.filter(|v| !v.is_null());

    match (prior, proposed) {
        (None, Value::Null) => PlanResult::no_change(Value::Null),
        (Some(prior), Value::Null) => plan_destroy(schema, prior),
        (None, proposed) => plan_create(schema, proposed),
        (Some(prior), proposed) => plan_update(schema, prior, proposed),
    }
}

fn plan_create(schema: &Schema, proposed: &Value) -> PlanResult {
    let mut planned = configured_attributes(schema, proposed);
    let mut changes = Vec::new();

    for (name, attr) in schema.attributes() {
        if attr.flags.is_computed_only() {
            planned.insert(name.to_string(), Value::Null);
            continue;
        }
        if let Some(value) = present(proposed, name) {
            changes.push(AttributeChange::added(name, value.clone()));
        }
    }

    PlanResult::with_changes(Value::Object(planned), changes, false)
}

fn plan_destroy(schema: &Schema, prior: &Value) -> PlanResult {
    let changes = schema
        .attributes()
        .filter_map(|(name, _)| present(prior, name).map(|v| AttributeChange::removed(name, v.clone())))
        .collect();

    PlanResult::with_changes(Value::Null, changes, false)
}

fn plan_update(schema: &Schema, prior: &Value, proposed: &Value) -> PlanResult {
    let mut planned = configured_attributes(schema, proposed);
    let mut changes = Vec::new();
    let mut requires_replace = false;

    for (name, attr) in schema.attributes() {
        if attr.flags.is_computed_only() {
            continue;
        }

        let change = match (present(prior, name), present(proposed, name)) {
            (None, None) => None,
            (Some(before), Some(after)) if before == after => None,
            (None, Some(after)) => Some(AttributeChange::added(name, after.clone())),
            (Some(before), None) => Some(AttributeChange::removed(name, before.clone())),
            (Some(before), Some(after)) => {
                Some(AttributeChange::modified(name, before.clone(), after.clone()))
            }
        };

        if let Some(change) = change {
            requires_replace |= attr.force_new;
            changes.push(change);
        }
    }

    // Computed values survive an in-place update and become unknown on replace.
    for (name, attr) in schema.attributes() {
        if attr.flags.is_computed_only() {
            let value = if requires_replace {
                Value::Null
            } else {
                present(prior, name).cloned().unwrap_or(Value::Null)
            };
            planned.insert(name.to_string(), value);
        }
    }

    PlanResult::with_changes(Value::Object(planned), changes, requires_replace)
}

/// Non-computed attributes of `value` declared by the schema.
fn configured_attributes(schema: &Schema, value: &Value) -> Map<String, Value> {
    schema
        .attributes()
        .filter(|(_, attr)| !attr.flags.is_computed_only())
        .map(|(name, _)| {
            (
                name.to_string(),
                present(value, name).cloned().unwrap_or(Value::Null),
            )
        })
        .collect()
}

/// The value of `name`, treating `null` as absent.
fn present<'a>(value: &'a Value, name: &str) -> Option<&'a Value> {
    value.get(name).filter(|v| !v.is_null())
}
