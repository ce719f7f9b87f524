//! Mapping rule and profile definitions.
//!
//! A profile is an ordered list of rules for one record type, describing
//! how to build a campaign-API record from a decoded attribute tree.
//! Profiles are loaded once before a run and are read-only for the run's
//! lifetime.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};

use crate::models::RecordType;

/// Where a rule's value comes from.
///
/// Exactly one of the three forms; the config schema enforces this before
/// deserialization, so the untagged representation never has to guess
/// between two present keys.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RuleSource {
    /// Dotted path into the raw record's attribute tree.
    Path { path: String },
    /// A fixed value.
    Constant { constant: Value },
    /// A computed value; see [`Derivation`].
    Derivation { derivation: Derivation },
}

/// The small, fixed set of derivations a rule may use.
///
/// `Concat` and `Sum` read target fields already written by earlier rules
/// in the same profile, which is what makes rule order meaningful.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Derivation {
    /// Join earlier target fields into one string.
    Concat {
        fields: Vec<String>,
        #[serde(default = "default_separator")]
        separator: String,
    },
    /// Sum earlier numeric target fields.
    Sum { fields: Vec<String> },
    /// First present value among several source paths.
    Coalesce { paths: Vec<String> },
}

fn default_separator() -> String {
    " ".to_string()
}

/// Expected type of a target field.
///
/// Scalars are written as plain strings in config (`"integer"`);
/// enumerated types carry their allowed values and an optional
/// alias table (`{"enumerated": {"values": [...], "aliases": {...}}}`).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TargetType {
    #[default]
    String,
    Integer,
    Boolean,
    List,
    Object,
    Enumerated {
        /// Canonical values, matched case-insensitively.
        values: Vec<String>,
        /// Export-side spellings mapped to canonical values
        /// (e.g. `RANGLT` → `Ranged (Light)`).
        #[serde(default)]
        aliases: HashMap<String, String>,
    },
}

/// One field mapping rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MappingRule {
    /// Dotted target field path.
    pub target: String,

    /// Value source: path, constant, or derivation.
    #[serde(flatten)]
    pub source: RuleSource,

    /// Expected target type.
    #[serde(rename = "type", default)]
    pub target_type: TargetType,

    /// Fallback when the source is absent or coercion fails.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,

    /// Required fields fail the whole record when unresolvable.
    #[serde(default)]
    pub required: bool,

    /// Run export-markup conversion on the value before coercion.
    #[serde(default)]
    pub markup: bool,
}

impl MappingRule {
    /// Rule reading a source path.
    pub fn from_path(target: &str, path: &str) -> Self {
        Self {
            target: target.to_string(),
            source: RuleSource::Path {
                path: path.to_string(),
            },
            target_type: TargetType::String,
            default: None,
            required: false,
            markup: false,
        }
    }

    /// Rule carrying a constant value.
    pub fn from_constant(target: &str, constant: Value) -> Self {
        Self {
            target: target.to_string(),
            source: RuleSource::Constant { constant },
            target_type: TargetType::String,
            default: None,
            required: false,
            markup: false,
        }
    }

    /// Rule computing a derived value.
    pub fn from_derivation(target: &str, derivation: Derivation) -> Self {
        Self {
            target: target.to_string(),
            source: RuleSource::Derivation { derivation },
            target_type: TargetType::String,
            default: None,
            required: false,
            markup: false,
        }
    }

    pub fn with_type(mut self, target_type: TargetType) -> Self {
        self.target_type = target_type;
        self
    }

    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn with_markup(mut self) -> Self {
        self.markup = true;
        self
    }
}

/// Ordered rules for one record type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MappingProfile {
    pub record_type: RecordType,
    pub rules: Vec<MappingRule>,
}

impl MappingProfile {
    pub fn new(record_type: RecordType, rules: Vec<MappingRule>) -> Self {
        Self { record_type, rules }
    }

    /// All target field paths, in rule order.
    pub fn target_fields(&self) -> Vec<&str> {
        self.rules.iter().map(|r| r.target.as_str()).collect()
    }
}

/// All profiles for a run, keyed by record type. Shared, read-only.
#[derive(Debug, Clone, Default)]
pub struct ProfileSet {
    profiles: BTreeMap<RecordType, MappingProfile>,
}

impl ProfileSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, profile: MappingProfile) {
        self.profiles.insert(profile.record_type, profile);
    }

    pub fn get(&self, record_type: RecordType) -> Option<&MappingProfile> {
        self.profiles.get(&record_type)
    }

    pub fn record_types(&self) -> impl Iterator<Item = RecordType> + '_ {
        self.profiles.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}

/// A small item profile used by documentation and tests.
pub fn example_profile() -> MappingProfile {
    let mut skill_aliases = HashMap::new();
    skill_aliases.insert("RANGLT".to_string(), "Ranged (Light)".to_string());
    skill_aliases.insert("RANGHV".to_string(), "Ranged (Heavy)".to_string());
    skill_aliases.insert("RANGHVY".to_string(), "Ranged (Heavy)".to_string());
    skill_aliases.insert("GUNN".to_string(), "Gunnery".to_string());
    skill_aliases.insert("MELEE".to_string(), "Melee".to_string());
    skill_aliases.insert("BRAWL".to_string(), "Brawl".to_string());
    skill_aliases.insert("LTSABER".to_string(), "Lightsaber".to_string());
    skill_aliases.insert("LIGHTSABER".to_string(), "Lightsaber".to_string());

    let mut range_aliases = HashMap::new();
    range_aliases.insert("wrEngaged".to_string(), "Engaged".to_string());
    range_aliases.insert("wrShort".to_string(), "Short".to_string());
    range_aliases.insert("wrMedium".to_string(), "Medium".to_string());
    range_aliases.insert("wrLong".to_string(), "Long".to_string());
    range_aliases.insert("wrExtreme".to_string(), "Extreme".to_string());

    MappingProfile::new(
        RecordType::Item,
        vec![
            MappingRule::from_path("name", "Name").required(),
            MappingRule::from_path("description", "Description")
                .with_default(Value::String(String::new()))
                .with_markup(),
            MappingRule::from_path("damage", "Damage")
                .with_type(TargetType::Integer)
                .with_default(Value::from(0)),
            MappingRule::from_path("crit", "Crit")
                .with_type(TargetType::Integer)
                .with_default(Value::from(0)),
            MappingRule::from_path("weaponSkill", "SkillKey").with_type(TargetType::Enumerated {
                values: vec![
                    "Ranged (Light)".to_string(),
                    "Ranged (Heavy)".to_string(),
                    "Gunnery".to_string(),
                    "Melee".to_string(),
                    "Brawl".to_string(),
                    "Lightsaber".to_string(),
                ],
                aliases: skill_aliases,
            }),
            MappingRule::from_path("range", "RangeValue").with_type(TargetType::Enumerated {
                values: vec![
                    "Engaged".to_string(),
                    "Short".to_string(),
                    "Medium".to_string(),
                    "Long".to_string(),
                    "Extreme".to_string(),
                ],
                aliases: range_aliases,
            }),
            MappingRule::from_path("restricted", "Restricted")
                .with_type(TargetType::Boolean)
                .with_default(Value::Bool(false)),
            MappingRule::from_path("special", "Qualities.Quality")
                .with_type(TargetType::List)
                .with_default(Value::Array(Vec::new())),
            MappingRule::from_constant("locked", Value::Bool(true)).with_type(TargetType::Boolean),
            MappingRule::from_derivation(
                "summary",
                Derivation::Concat {
                    fields: vec!["name".to_string(), "range".to_string()],
                    separator: " — ".to_string(),
                },
            ),
        ],
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rule_source_untagged_path() {
        let rule: MappingRule =
            serde_json::from_str(r#"{"target": "name", "path": "Name", "required": true}"#)
                .unwrap();
        assert!(matches!(rule.source, RuleSource::Path { ref path } if path == "Name"));
        assert!(rule.required);
    }

    #[test]
    fn test_rule_source_untagged_constant() {
        let rule: MappingRule =
            serde_json::from_str(r#"{"target": "locked", "constant": true, "type": "boolean"}"#)
                .unwrap();
        assert!(matches!(rule.source, RuleSource::Constant { .. }));
        assert!(matches!(rule.target_type, TargetType::Boolean));
    }

    #[test]
    fn test_rule_source_untagged_derivation() {
        let json = r#"{
            "target": "total",
            "derivation": {"op": "sum", "fields": ["soak", "defense"]},
            "type": "integer"
        }"#;
        let rule: MappingRule = serde_json::from_str(json).unwrap();
        match rule.source {
            RuleSource::Derivation {
                derivation: Derivation::Sum { ref fields },
            } => assert_eq!(fields.len(), 2),
            _ => panic!("expected sum derivation"),
        }
    }

    #[test]
    fn test_enumerated_type_deserialization() {
        let json = r#"{
            "target": "range",
            "path": "RangeValue",
            "type": {"enumerated": {"values": ["Short", "Medium"], "aliases": {"wrShort": "Short"}}}
        }"#;
        let rule: MappingRule = serde_json::from_str(json).unwrap();
        match rule.target_type {
            TargetType::Enumerated {
                ref values,
                ref aliases,
            } => {
                assert_eq!(values.len(), 2);
                assert_eq!(aliases.get("wrShort").map(String::as_str), Some("Short"));
            }
            _ => panic!("expected enumerated type"),
        }
    }

    #[test]
    fn test_profile_roundtrip() {
        let profile = example_profile();
        let json = serde_json::to_string(&profile).unwrap();
        let parsed: MappingProfile = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.record_type, RecordType::Item);
        assert_eq!(parsed.rules.len(), profile.rules.len());
        assert_eq!(parsed.target_fields(), profile.target_fields());
    }

    #[test]
    fn test_profile_set_lookup() {
        let mut set = ProfileSet::new();
        set.insert(example_profile());
        assert!(set.get(RecordType::Item).is_some());
        assert!(set.get(RecordType::Vehicle).is_none());
        assert_eq!(set.len(), 1);
    }
}
