//! Mapping engine.
//!
//! Applies a [`MappingProfile`] to one decoded record, producing either a
//! [`TargetRecord`] or a [`MappingFailure`]. Pure computation: no I/O, no
//! side effects beyond constructing the result, deterministic for
//! identical inputs.
//!
//! Coercion precedence, per field: exact type match, then numeric-string
//! parse, then enumerated-value lookup (case-insensitive), then the
//! rule's default, then required-field failure. Mapping is all-or-nothing
//! per record: one failed required field fails the whole record.

use serde_json::{Map, Value};

use super::rules::{Derivation, MappingProfile, MappingRule, RuleSource, TargetType};
use crate::markup;
use crate::models::{FailureReason, MappingFailure, MappingNote, RawRecord, TargetRecord};

/// Map one raw record through a profile.
///
/// Rules resolve in profile order; a derivation may read target fields
/// written by earlier rules in the same profile.
pub fn map_record(raw: &RawRecord, profile: &MappingProfile) -> Result<TargetRecord, MappingFailure> {
    let mut output = Map::new();
    let mut notes = Vec::new();

    for rule in &profile.rules {
        let (value, missing_refs) = resolve(rule, raw, &output);

        let value = match value {
            Some(v) if rule.markup => match v {
                Value::String(s) => Some(Value::String(markup::convert(&s))),
                other => Some(other),
            },
            other => other,
        };

        match value {
            None => {
                if let Some(default) = &rule.default {
                    write_path(&mut output, &rule.target, default.clone());
                } else if rule.required {
                    let reason = if missing_refs.is_empty() {
                        FailureReason::MissingRequired
                    } else {
                        FailureReason::UnresolvedReference
                    };
                    let detail = if missing_refs.is_empty() {
                        "no value and no default".to_string()
                    } else {
                        format!("unresolved references: {}", missing_refs.join(", "))
                    };
                    return Err(failure(raw, rule, reason, detail));
                }
                // Optional, absent, no default: the field is omitted.
            }
            Some(v) => match coerce(v, &rule.target_type) {
                Ok(coerced) => write_path(&mut output, &rule.target, coerced),
                Err(detail) => {
                    if rule.required {
                        return Err(failure(raw, rule, FailureReason::TypeCoercion, detail));
                    }
                    if let Some(default) = &rule.default {
                        write_path(&mut output, &rule.target, default.clone());
                        notes.push(MappingNote {
                            field: rule.target.clone(),
                            message: format!("{detail}; fell back to default"),
                        });
                    } else {
                        notes.push(MappingNote {
                            field: rule.target.clone(),
                            message: format!("{detail}; field omitted"),
                        });
                    }
                }
            },
        }
    }

    Ok(TargetRecord {
        record_type: raw.record_type,
        name: raw.name.clone(),
        category: raw.category.clone(),
        fields: Value::Object(output),
        origin: raw.origin.clone(),
        notes,
    })
}

fn failure(raw: &RawRecord, rule: &MappingRule, reason: FailureReason, detail: String) -> MappingFailure {
    MappingFailure {
        record: raw.name.clone(),
        origin: raw.origin.clone(),
        rule: rule.target.clone(),
        reason,
        detail,
    }
}

/// Resolve a rule's source to a value.
///
/// Returns the value (None when absent) plus, for derivations, the
/// referenced target fields that were never written.
fn resolve(
    rule: &MappingRule,
    raw: &RawRecord,
    output: &Map<String, Value>,
) -> (Option<Value>, Vec<String>) {
    match &rule.source {
        RuleSource::Path { path } => (present(resolve_path(&raw.fields, path).cloned()), Vec::new()),
        RuleSource::Constant { constant } => (present(Some(constant.clone())), Vec::new()),
        RuleSource::Derivation { derivation } => derive(derivation, raw, output),
    }
}

fn derive(
    derivation: &Derivation,
    raw: &RawRecord,
    output: &Map<String, Value>,
) -> (Option<Value>, Vec<String>) {
    match derivation {
        Derivation::Concat { fields, separator } => {
            let mut parts = Vec::new();
            let mut missing = Vec::new();
            for field in fields {
                match present(read_output(output, field)) {
                    Some(v) => parts.push(scalar_to_string(&v)),
                    None => missing.push(field.clone()),
                }
            }
            if parts.is_empty() {
                (None, missing)
            } else {
                (Some(Value::String(parts.join(separator))), missing)
            }
        }
        Derivation::Sum { fields } => {
            let mut total: i64 = 0;
            let mut any = false;
            let mut missing = Vec::new();
            for field in fields {
                match present(read_output(output, field)).as_ref().and_then(as_integer) {
                    Some(n) => {
                        total += n;
                        any = true;
                    }
                    None => missing.push(field.clone()),
                }
            }
            if any {
                (Some(Value::from(total)), missing)
            } else {
                (None, missing)
            }
        }
        Derivation::Coalesce { paths } => {
            for path in paths {
                if let Some(v) = present(resolve_path(&raw.fields, path).cloned()) {
                    return (Some(v), Vec::new());
                }
            }
            (None, Vec::new())
        }
    }
}

/// Collapse "empty" values to absent: null, blank strings, empty
/// collections all feed the same default/required logic as a missing
/// source path.
fn present(value: Option<Value>) -> Option<Value> {
    match value {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) if s.trim().is_empty() => None,
        Some(Value::Array(a)) if a.is_empty() => None,
        Some(Value::Object(o)) if o.is_empty() => None,
        Some(v) => Some(v),
    }
}

/// Walk a dotted path through a value tree. Numeric segments index
/// arrays. Missing keys resolve to None.
pub fn resolve_path<'a>(tree: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = tree;
    for segment in path.split('.') {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Write a value at a dotted path, creating intermediate objects.
fn write_path(output: &mut Map<String, Value>, path: &str, value: Value) {
    let mut segments = path.split('.').collect::<Vec<_>>();
    let last = segments.pop().unwrap_or(path);

    let mut current = output;
    for segment in segments {
        let entry = current
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if !entry.is_object() {
            *entry = Value::Object(Map::new());
        }
        current = entry.as_object_mut().unwrap();
    }
    current.insert(last.to_string(), value);
}

/// Read a previously written target field.
fn read_output(output: &Map<String, Value>, path: &str) -> Option<Value> {
    let mut segments = path.split('.');
    let first = segments.next()?;
    let mut current = output.get(first)?;
    for segment in segments {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            _ => return None,
        };
    }
    Some(current.clone())
}

fn scalar_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        other => other.to_string(),
    }
}

fn as_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

/// Coerce a present value to the expected target type.
fn coerce(value: Value, target_type: &TargetType) -> Result<Value, String> {
    match target_type {
        TargetType::String => match value {
            Value::String(_) => Ok(value),
            Value::Number(n) => Ok(Value::String(n.to_string())),
            Value::Bool(b) => Ok(Value::String(b.to_string())),
            other => Err(format!("cannot coerce {} to string", kind_of(&other))),
        },
        TargetType::Integer => match &value {
            Value::Number(_) | Value::String(_) => as_integer(&value)
                .map(Value::from)
                .ok_or_else(|| format!("cannot coerce '{}' to integer", scalar_to_string(&value))),
            other => Err(format!("cannot coerce {} to integer", kind_of(other))),
        },
        TargetType::Boolean => match &value {
            Value::Bool(_) => Ok(value),
            Value::String(s) => match s.trim().to_lowercase().as_str() {
                "true" | "yes" | "1" | "x" | "on" => Ok(Value::Bool(true)),
                "false" | "no" | "0" | "off" => Ok(Value::Bool(false)),
                other => Err(format!("cannot coerce '{other}' to boolean")),
            },
            Value::Number(n) => match n.as_i64() {
                Some(0) => Ok(Value::Bool(false)),
                Some(1) => Ok(Value::Bool(true)),
                _ => Err(format!("cannot coerce {n} to boolean")),
            },
            other => Err(format!("cannot coerce {} to boolean", kind_of(other))),
        },
        TargetType::Enumerated { values, aliases } => {
            let raw = match &value {
                Value::String(s) => s.trim().to_string(),
                Value::Number(n) => n.to_string(),
                other => return Err(format!("cannot coerce {} to enumerated value", kind_of(other))),
            };
            // Aliases first (export-side spellings), then canonical values.
            if let Some(canonical) = aliases.get(&raw) {
                return Ok(Value::String(canonical.clone()));
            }
            let lowered = raw.to_lowercase();
            if let Some((_, canonical)) = aliases.iter().find(|(k, _)| k.to_lowercase() == lowered) {
                return Ok(Value::String(canonical.clone()));
            }
            if let Some(canonical) = values.iter().find(|v| v.to_lowercase() == lowered) {
                return Ok(Value::String(canonical.clone()));
            }
            Err(format!("'{raw}' is not one of the allowed values"))
        }
        TargetType::List => match value {
            Value::Array(_) => Ok(value),
            scalar => Ok(Value::Array(vec![scalar])),
        },
        TargetType::Object => match value {
            Value::Object(_) => Ok(value),
            other => Err(format!("cannot coerce {} to object", kind_of(&other))),
        },
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "object",
    }
}
