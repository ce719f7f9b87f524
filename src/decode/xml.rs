//! XML decoder.
//!
//! Normalizes an OggDude-style XML document into [`RawRecord`]s. Two
//! document shapes exist in the exports:
//!
//! - container roots (`<Weapons><Weapon>…</Weapon>…</Weapons>`): each
//!   element child of the root is one record;
//! - single-record roots (`<Career><Name>…</Name>…</Career>`): the root
//!   itself is the record. Recognized by a direct `Name` child.
//!
//! Normalization rules: element children become object keys, repeated
//! sibling names fold into an array (so a mapping rule whose source path
//! lands on a repeated element sees the whole list), text-only elements
//! become strings, attribute-only elements become objects of their
//! attributes, empty elements become null.

use roxmltree::{Document, Node};
use serde_json::{Map, Value};

use crate::error::{DecodeError, DecodeResult};
use crate::models::{RawRecord, SourceFile};

/// Decode one XML file into records.
pub fn decode_file(file: &SourceFile) -> DecodeResult<Vec<RawRecord>> {
    let text = super::read_file(&file.path)?;
    decode_str(&text, file)
}

/// Decode XML text into records.
pub fn decode_str(text: &str, file: &SourceFile) -> DecodeResult<Vec<RawRecord>> {
    let doc = Document::parse(text).map_err(|e| DecodeError::XmlError {
        path: file.path.clone(),
        message: e.to_string(),
    })?;

    let root = doc.root_element();
    let mut records = Vec::new();

    if has_child_element(&root, "Name") {
        records.push(node_to_record(&root, file));
    } else {
        for child in root.children().filter(Node::is_element) {
            records.push(node_to_record(&child, file));
        }
    }

    Ok(records)
}

fn node_to_record(node: &Node, file: &SourceFile) -> RawRecord {
    let value = element_to_value(node);
    let sources = extract_sources(node);
    RawRecord::new(file.record_type, value, file.clone()).with_sources(sources)
}

fn has_child_element(node: &Node, name: &str) -> bool {
    node.children()
        .any(|c| c.is_element() && c.tag_name().name() == name)
}

/// Normalize an element into a JSON value.
fn element_to_value(node: &Node) -> Value {
    let children: Vec<Node> = node.children().filter(|c| c.is_element()).collect();

    if children.is_empty() {
        let text = node.text().map(str::trim).unwrap_or("");
        if !text.is_empty() {
            return Value::String(text.to_string());
        }
        if node.attributes().next().is_some() {
            let map: Map<String, Value> = node
                .attributes()
                .map(|a| (a.name().to_string(), Value::String(a.value().to_string())))
                .collect();
            return Value::Object(map);
        }
        return Value::Null;
    }

    // Group children by tag name in document order; repeats fold into
    // an array.
    let mut map: Map<String, Value> = Map::new();
    for child in children {
        let name = child.tag_name().name().to_string();
        let value = element_to_value(&child);
        match map.get_mut(&name) {
            None => {
                map.insert(name, value);
            }
            Some(Value::Array(items)) => items.push(value),
            Some(existing) => {
                let first = existing.take();
                *existing = Value::Array(vec![first, value]);
            }
        }
    }
    Value::Object(map)
}

/// Collect sourcebook tags: direct `Source` children plus a `Sources`
/// container's `Source` children, in document order.
fn extract_sources(node: &Node) -> Vec<String> {
    let mut sources = Vec::new();

    for child in node.children().filter(Node::is_element) {
        match child.tag_name().name() {
            "Source" => {
                if let Some(text) = child.text().map(str::trim).filter(|t| !t.is_empty()) {
                    sources.push(text.to_string());
                }
            }
            "Sources" => {
                for nested in child.children().filter(Node::is_element) {
                    if nested.tag_name().name() == "Source" {
                        if let Some(text) = nested.text().map(str::trim).filter(|t| !t.is_empty()) {
                            sources.push(text.to_string());
                        }
                    }
                }
            }
            _ => {}
        }
    }

    sources
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FileFormat, RecordType};
    use serde_json::json;

    fn item_file() -> SourceFile {
        SourceFile::new("Data/Weapons.xml", RecordType::Item, FileFormat::Xml)
    }

    const WEAPONS_XML: &str = r#"<?xml version='1.0' encoding='utf-8'?>
<Weapons>
  <Weapon>
    <Name>Blaster Pistol</Name>
    <Damage>6</Damage>
    <Source Page="40">Edge of the Empire Core Rulebook</Source>
    <Qualities>
      <Quality><Key>STUN</Key></Quality>
      <Quality><Key>ACCURATE</Key></Quality>
    </Qualities>
  </Weapon>
  <Weapon>
    <Name>Vibro-axe</Name>
    <Damage>3</Damage>
  </Weapon>
</Weapons>"#;

    #[test]
    fn test_container_root_yields_one_record_per_child() {
        let records = decode_str(WEAPONS_XML, &item_file()).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].name, "Blaster Pistol");
        assert_eq!(records[1].name, "Vibro-axe");
    }

    #[test]
    fn test_repeated_elements_fold_into_array() {
        let records = decode_str(WEAPONS_XML, &item_file()).unwrap();
        assert_eq!(
            records[0].fields["Qualities"]["Quality"],
            json!([{"Key": "STUN"}, {"Key": "ACCURATE"}])
        );
    }

    #[test]
    fn test_source_extraction_from_attribute_element() {
        let records = decode_str(WEAPONS_XML, &item_file()).unwrap();
        assert_eq!(records[0].sources, vec!["Edge of the Empire Core Rulebook"]);
        assert!(records[1].sources.is_empty());
    }

    #[test]
    fn test_sources_container() {
        let xml = r#"<Weapons><Weapon>
            <Name>Multi</Name>
            <Sources>
              <Source Page="230">Edge of the Empire Core Rulebook</Source>
              <Source Page="240">Age of Rebellion Core Rulebook</Source>
            </Sources>
        </Weapon></Weapons>"#;
        let records = decode_str(xml, &item_file()).unwrap();
        assert_eq!(records[0].sources.len(), 2);
        assert_eq!(records[0].sources[0], "Edge of the Empire Core Rulebook");
    }

    #[test]
    fn test_single_record_root() {
        let xml = r#"<Career>
            <Name>Bounty Hunter</Name>
            <Description>Hunts bounties.</Description>
        </Career>"#;
        let file = SourceFile::new("Careers/BountyHunter.xml", RecordType::Career, FileFormat::Xml);
        let records = decode_str(xml, &file).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "Bounty Hunter");
        assert_eq!(records[0].fields["Description"], "Hunts bounties.");
    }

    #[test]
    fn test_empty_element_is_null() {
        let xml = "<Weapons><Weapon><Name>X</Name><Notes/></Weapon></Weapons>";
        let records = decode_str(xml, &item_file()).unwrap();
        assert_eq!(records[0].fields["Notes"], Value::Null);
    }

    #[test]
    fn test_malformed_xml_fails_with_path() {
        let err = decode_str("<Weapons><Weapon>", &item_file()).unwrap_err();
        assert!(matches!(err, DecodeError::XmlError { .. }));
        assert!(err.to_string().contains("Weapons.xml"));
    }
}
