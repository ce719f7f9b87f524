//! JSON decoder.
//!
//! Normalizes Adversaries-style JSON files into [`RawRecord`]s. Three
//! document shapes exist in the wild:
//!
//! - a top-level array of adversary objects,
//! - an `{"npcs": [...]}` wrapper,
//! - a single adversary object.
//!
//! The filename stem ("rebel-operatives" → "Rebel Operatives") becomes a
//! `subtype` field when the record has none. Sourcebook tags come from
//! `tags` entries prefixed `source:`, `adventure:`, or `book:`, falling
//! back to a plain `source` field.

use serde_json::Value;

use crate::error::{DecodeError, DecodeResult};
use crate::models::{RawRecord, SourceFile};

const TAG_PREFIXES: [&str; 3] = ["source:", "adventure:", "book:"];

/// Decode one JSON file into records.
pub fn decode_file(file: &SourceFile) -> DecodeResult<Vec<RawRecord>> {
    let text = super::read_file(&file.path)?;
    decode_str(&text, file)
}

/// Decode JSON text into records.
pub fn decode_str(text: &str, file: &SourceFile) -> DecodeResult<Vec<RawRecord>> {
    let value: Value = serde_json::from_str(text).map_err(|e| DecodeError::JsonError {
        path: file.path.clone(),
        message: e.to_string(),
    })?;

    let items: Vec<Value> = match value {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove("npcs") {
            Some(Value::Array(items)) => items,
            Some(other) => {
                return Err(DecodeError::StructureError {
                    path: file.path.clone(),
                    message: format!("'npcs' must be an array, found {}", type_name(&other)),
                });
            }
            None => vec![Value::Object(map)],
        },
        other => {
            return Err(DecodeError::StructureError {
                path: file.path.clone(),
                message: format!("expected an object or array, found {}", type_name(&other)),
            });
        }
    };

    let subtype = subtype_from_filename(file);
    let mut records = Vec::new();
    for (index, item) in items.into_iter().enumerate() {
        let mut fields = match item {
            Value::Object(map) => map,
            other => {
                return Err(DecodeError::StructureError {
                    path: file.path.clone(),
                    message: format!("record {} is {}, not an object", index, type_name(&other)),
                });
            }
        };

        if let Some(ref subtype) = subtype {
            fields
                .entry("subtype".to_string())
                .or_insert_with(|| Value::String(subtype.clone()));
        }

        let sources = extract_sources(&fields);
        records.push(
            RawRecord::new(file.record_type, Value::Object(fields), file.clone())
                .with_sources(sources),
        );
    }

    Ok(records)
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// "rebel-operatives" → "Rebel Operatives".
fn subtype_from_filename(file: &SourceFile) -> Option<String> {
    let stem = file.path.file_stem()?.to_str()?;
    let titled = stem
        .replace('-', " ")
        .split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ");
    if titled.is_empty() {
        None
    } else {
        Some(titled)
    }
}

/// Sourcebook tags from `tags`, else the `source` field.
fn extract_sources(fields: &serde_json::Map<String, Value>) -> Vec<String> {
    let mut sources = Vec::new();

    if let Some(Value::Array(tags)) = fields.get("tags") {
        for tag in tags {
            if let Some(tag) = tag.as_str() {
                if TAG_PREFIXES.iter().any(|p| tag.starts_with(p)) {
                    sources.push(tag.to_string());
                }
            }
        }
    }

    if sources.is_empty() {
        if let Some(source) = fields
            .get("source")
            .or_else(|| fields.get("Source"))
            .and_then(Value::as_str)
            .filter(|s| !s.trim().is_empty())
        {
            sources.push(source.trim().to_string());
        }
    }

    sources
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FileFormat, RecordType};

    fn adversary_file(name: &str) -> SourceFile {
        SourceFile::new(name, RecordType::Adversary, FileFormat::Json)
    }

    #[test]
    fn test_top_level_array() {
        let json = r#"[
            {"name": "Stormtrooper", "type": "Minion", "tags": ["book:eote", "imperial"]},
            {"name": "Imperial Officer", "type": "Rival"}
        ]"#;
        let records = decode_str(json, &adversary_file("imperials.json")).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].name, "Stormtrooper");
        assert_eq!(records[0].sources, vec!["book:eote"]);
        assert!(records[1].sources.is_empty());
    }

    #[test]
    fn test_npcs_wrapper() {
        let json = r#"{"npcs": [{"name": "Rancor"}]}"#;
        let records = decode_str(json, &adversary_file("beasts.json")).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "Rancor");
    }

    #[test]
    fn test_single_object() {
        let json = r#"{"name": "Jabba the Hutt", "source": "Lords of Nal Hutta"}"#;
        let records = decode_str(json, &adversary_file("jabba.json")).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].sources, vec!["Lords of Nal Hutta"]);
    }

    #[test]
    fn test_subtype_from_filename() {
        let json = r#"[{"name": "Operative"}]"#;
        let records = decode_str(json, &adversary_file("rebel-operatives.json")).unwrap();
        assert_eq!(records[0].fields["subtype"], "Rebel Operatives");
    }

    #[test]
    fn test_existing_subtype_kept() {
        let json = r#"[{"name": "Operative", "subtype": "Spy"}]"#;
        let records = decode_str(json, &adversary_file("rebel-operatives.json")).unwrap();
        assert_eq!(records[0].fields["subtype"], "Spy");
    }

    #[test]
    fn test_tag_priority_over_source_field() {
        let json = r#"[{"name": "X", "tags": ["adventure:mask"], "source": "Ignored"}]"#;
        let records = decode_str(json, &adversary_file("x.json")).unwrap();
        assert_eq!(records[0].sources, vec!["adventure:mask"]);
    }

    #[test]
    fn test_malformed_json_fails_with_path() {
        let err = decode_str("[{", &adversary_file("bad.json")).unwrap_err();
        assert!(matches!(err, DecodeError::JsonError { .. }));
        assert!(err.to_string().contains("bad.json"));
    }

    #[test]
    fn test_non_object_record_is_structural_error() {
        let err = decode_str(r#"[1, 2]"#, &adversary_file("nums.json")).unwrap_err();
        assert!(matches!(err, DecodeError::StructureError { .. }));
    }

    #[test]
    fn test_scalar_document_is_structural_error() {
        let err = decode_str(r#""just a string""#, &adversary_file("s.json")).unwrap_err();
        assert!(matches!(err, DecodeError::StructureError { .. }));
    }
}
