//! Run configuration: source selection and field mapping profiles.
//!
//! Both configuration files are read once before a run and validated
//! against JSON Schemas embedded at compile time from the `schemas/`
//! directory:
//!
//! - `sources.schema.json` - the sourcebook list
//! - `field-mapping.schema.json` - per-record-type mapping rules
//!
//! A structurally invalid file aborts the entire run before any source
//! file is touched; every rule must carry a target and exactly one of a
//! source path, a constant, or a derivation.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;

use crate::error::{ConfigError, ConfigResult};
use crate::mapping::{MappingProfile, MappingRule, ProfileSet};
use crate::models::RecordType;

// =============================================================================
// Schema Validation
// =============================================================================

/// Validate a JSON document against a schema.
///
/// Returns all validation errors, not just the first, so a config author
/// can fix a file in one pass.
pub fn validate(schema: &Value, data: &Value) -> Result<(), Vec<String>> {
    let validator = jsonschema::draft7::new(schema)
        .map_err(|e| vec![format!("Invalid schema: {}", e)])?;

    let errors: Vec<String> = validator.iter_errors(data).map(|e| e.to_string()).collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn sources_schema() -> Value {
    serde_json::from_str(include_str!("../../schemas/sources.schema.json"))
        .expect("Invalid embedded schema")
}

fn field_mapping_schema() -> Value {
    serde_json::from_str(include_str!("../../schemas/field-mapping.schema.json"))
        .expect("Invalid embedded schema")
}

// =============================================================================
// Source Selection
// =============================================================================

/// One recognized sourcebook.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceBook {
    /// Stable selection key (e.g. `book:eote`, `far-horizons`).
    pub key: String,
    /// Display name, used as the category for matching records.
    pub name: String,
    /// Whether the book is selected when a job names no sources.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Source strings as they appear in XML exports.
    #[serde(default)]
    pub oggdude_sources: Vec<String>,
    /// Source tags as they appear in adversary JSON files.
    #[serde(default)]
    pub adversaries_sources: Vec<String>,
}

fn default_enabled() -> bool {
    true
}

impl SourceBook {
    /// All aliases this book is known by, lowercased for matching.
    pub fn aliases_lowercase(&self) -> Vec<String> {
        self.oggdude_sources
            .iter()
            .chain(self.adversaries_sources.iter())
            .map(|s| s.to_lowercase())
            .collect()
    }
}

/// The sources configuration: a named list of recognized sourcebooks.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourcesConfig {
    pub sources: Vec<SourceBook>,
}

impl SourcesConfig {
    /// Parse and validate from a JSON string. `origin` names the file in
    /// error messages.
    pub fn from_json(json: &str, origin: &str) -> ConfigResult<Self> {
        let value: Value = serde_json::from_str(json)?;
        validate(&sources_schema(), &value).map_err(|errors| ConfigError::SchemaError {
            path: origin.to_string(),
            errors,
        })?;
        Ok(serde_json::from_value(value)?)
    }

    /// Load and validate from a file.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content, &path.display().to_string())
    }

    pub fn get(&self, key: &str) -> Option<&SourceBook> {
        self.sources.iter().find(|s| s.key == key)
    }

    /// Keys of all enabled sourcebooks, in config order.
    pub fn enabled_keys(&self) -> Vec<String> {
        self.sources
            .iter()
            .filter(|s| s.enabled)
            .map(|s| s.key.clone())
            .collect()
    }
}

// =============================================================================
// Mapping Profiles
// =============================================================================

/// Parse and validate the field mapping configuration from a JSON string.
///
/// The file maps record type keys to ordered rule arrays; an unknown key
/// is a fatal configuration error rather than a silently ignored section.
pub fn profiles_from_json(json: &str, origin: &str) -> ConfigResult<ProfileSet> {
    let value: Value = serde_json::from_str(json)?;
    validate(&field_mapping_schema(), &value).map_err(|errors| ConfigError::SchemaError {
        path: origin.to_string(),
        errors,
    })?;

    let table: serde_json::Map<String, Value> = match value {
        Value::Object(map) => map,
        _ => unreachable!("schema guarantees an object"),
    };

    let mut profiles = ProfileSet::new();
    for (key, rules_value) in table {
        let record_type =
            RecordType::from_key(&key).ok_or_else(|| ConfigError::UnknownRecordType(key.clone()))?;
        let rules: Vec<MappingRule> = serde_json::from_value(rules_value)?;
        profiles.insert(MappingProfile::new(record_type, rules));
    }
    Ok(profiles)
}

/// Load and validate the field mapping configuration from a file.
pub fn load_profiles(path: &Path) -> ConfigResult<ProfileSet> {
    let content = std::fs::read_to_string(path)?;
    profiles_from_json(&content, &path.display().to_string())
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const SOURCES_JSON: &str = r#"{
        "sources": [
            {
                "key": "book:eote",
                "name": "Edge of the Empire Core Rulebook",
                "oggdude_sources": ["Edge of the Empire Core Rulebook"],
                "adversaries_sources": ["book:eote"]
            },
            {
                "key": "far-horizons",
                "name": "Far Horizons",
                "enabled": false,
                "oggdude_sources": ["Far Horizons"],
                "adversaries_sources": ["far-horizons"]
            }
        ]
    }"#;

    #[test]
    fn test_sources_config_parse() {
        let config = SourcesConfig::from_json(SOURCES_JSON, "sources.json").unwrap();
        assert_eq!(config.sources.len(), 2);
        assert!(config.get("book:eote").unwrap().enabled);
        assert!(!config.get("far-horizons").unwrap().enabled);
        assert_eq!(config.enabled_keys(), vec!["book:eote".to_string()]);
    }

    #[test]
    fn test_sources_config_rejects_missing_key() {
        let json = r#"{"sources": [{"name": "No Key"}]}"#;
        let err = SourcesConfig::from_json(json, "sources.json").unwrap_err();
        assert!(matches!(err, ConfigError::SchemaError { .. }));
    }

    #[test]
    fn test_book_aliases_lowercased() {
        let config = SourcesConfig::from_json(SOURCES_JSON, "sources.json").unwrap();
        let aliases = config.get("book:eote").unwrap().aliases_lowercase();
        assert!(aliases.contains(&"edge of the empire core rulebook".to_string()));
        assert!(aliases.contains(&"book:eote".to_string()));
    }

    #[test]
    fn test_profiles_parse() {
        let json = r#"{
            "items": [
                {"target": "name", "path": "Name", "required": true},
                {"target": "locked", "constant": true, "type": "boolean"}
            ],
            "species": [
                {"target": "name", "path": "Name", "required": true}
            ]
        }"#;
        let profiles = profiles_from_json(json, "field_mapping.json").unwrap();
        assert_eq!(profiles.len(), 2);
        assert_eq!(profiles.get(RecordType::Item).unwrap().rules.len(), 2);
    }

    #[test]
    fn test_profiles_reject_rule_without_source() {
        // A rule needs exactly one of path/constant/derivation.
        let json = r#"{"items": [{"target": "name"}]}"#;
        let err = profiles_from_json(json, "field_mapping.json").unwrap_err();
        assert!(matches!(err, ConfigError::SchemaError { .. }));
    }

    #[test]
    fn test_profiles_reject_rule_with_two_sources() {
        let json = r#"{"items": [{"target": "name", "path": "Name", "constant": "x"}]}"#;
        let err = profiles_from_json(json, "field_mapping.json").unwrap_err();
        assert!(matches!(err, ConfigError::SchemaError { .. }));
    }

    #[test]
    fn test_profiles_reject_unknown_record_type() {
        let json = r#"{"starships": [{"target": "name", "path": "Name"}]}"#;
        let err = profiles_from_json(json, "field_mapping.json").unwrap_err();
        assert!(matches!(err, ConfigError::UnknownRecordType(ref k) if k == "starships"));
    }

    #[test]
    fn test_profiles_reject_bad_target_type() {
        let json = r#"{"items": [{"target": "name", "path": "Name", "type": "decimal"}]}"#;
        let err = profiles_from_json(json, "field_mapping.json").unwrap_err();
        assert!(matches!(err, ConfigError::SchemaError { .. }));
    }

    #[test]
    fn test_shipped_default_configs_are_valid() {
        let sources = include_str!("../../config/sources.json");
        SourcesConfig::from_json(sources, "config/sources.json").unwrap();

        let mapping = include_str!("../../config/field_mapping.json");
        let profiles = profiles_from_json(mapping, "config/field_mapping.json").unwrap();
        assert!(!profiles.is_empty());
    }
}
