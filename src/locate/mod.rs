//! Source file discovery.
//!
//! Walks the two category roots (an OggDude-style XML export directory
//! and an Adversaries-style JSON directory) and classifies each candidate
//! file by record type using filename hints first and the XML document's
//! root element as a content hint when the filename is ambiguous.
//!
//! Discovery order is stable (directories walked in sorted order) but
//! carries no semantic meaning. An unreadable root is fatal for the whole
//! run: a partial inventory would misreport what was imported.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{DiscoveryError, DiscoveryResult};
use crate::models::{FileFormat, RecordType, SourceFile};

/// Enumerate all candidate source files under the given roots.
///
/// XML files that cannot be classified are skipped; every JSON file under
/// the adversaries root is an adversary file by convention.
pub fn discover(
    xml_root: Option<&Path>,
    json_root: Option<&Path>,
) -> DiscoveryResult<Vec<SourceFile>> {
    let mut files = Vec::new();

    if let Some(root) = xml_root {
        for path in walk(root)? {
            if !has_extension(&path, "xml") {
                continue;
            }
            if let Some(record_type) = classify_xml(&path) {
                files.push(SourceFile::new(path, record_type, FileFormat::Xml));
            }
        }
    }

    if let Some(root) = json_root {
        for path in walk(root)? {
            if has_extension(&path, "json") {
                files.push(SourceFile::new(path, RecordType::Adversary, FileFormat::Json));
            }
        }
    }

    Ok(files)
}

/// Recursively collect files under a root, in sorted order.
fn walk(root: &Path) -> DiscoveryResult<Vec<PathBuf>> {
    if !root.exists() {
        return Err(DiscoveryError::RootNotFound(root.to_path_buf()));
    }
    if !root.is_dir() {
        return Err(DiscoveryError::NotADirectory(root.to_path_buf()));
    }

    let mut files = Vec::new();
    walk_into(root, &mut files)?;
    Ok(files)
}

fn walk_into(dir: &Path, files: &mut Vec<PathBuf>) -> DiscoveryResult<()> {
    let entries = fs::read_dir(dir).map_err(|source| DiscoveryError::IoError {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut paths: Vec<PathBuf> = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| DiscoveryError::IoError {
            path: dir.to_path_buf(),
            source,
        })?;
        paths.push(entry.path());
    }
    paths.sort();

    for path in paths {
        if is_hidden(&path) {
            continue;
        }
        if path.is_dir() {
            walk_into(&path, files)?;
        } else {
            files.push(path);
        }
    }
    Ok(())
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with('.'))
}

fn has_extension(path: &Path, ext: &str) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(ext))
}

/// Classify an XML file by filename hint, falling back to the document's
/// root element name.
pub fn classify_xml(path: &Path) -> Option<RecordType> {
    if let Some(record_type) = classify_by_filename(path) {
        return Some(record_type);
    }
    classify_by_root_element(path)
}

fn classify_by_filename(path: &Path) -> Option<RecordType> {
    let stem = path.file_stem()?.to_str()?.to_lowercase();
    classify_hint(&stem)
}

fn classify_hint(hint: &str) -> Option<RecordType> {
    // Item subtypes first: an "ItemAttachments" file must not fall
    // through to a generic match.
    if ["weapon", "armor", "gear", "attachment", "item"]
        .iter()
        .any(|h| hint.contains(h))
    {
        return Some(RecordType::Item);
    }
    if hint.contains("species") {
        return Some(RecordType::Species);
    }
    if hint.contains("career") {
        return Some(RecordType::Career);
    }
    if hint.contains("specialization") {
        return Some(RecordType::Specialization);
    }
    if hint.contains("talent") {
        return Some(RecordType::Talent);
    }
    if hint.contains("force") {
        return Some(RecordType::ForcePower);
    }
    if hint.contains("sigab") || hint.contains("signature") {
        return Some(RecordType::SignatureAbility);
    }
    if hint.contains("skill") {
        return Some(RecordType::Skill);
    }
    if hint.contains("vehicle") {
        return Some(RecordType::Vehicle);
    }
    if hint.contains("npc") || hint.contains("adversar") {
        return Some(RecordType::Adversary);
    }
    None
}

/// Peek at the start of the file and classify by root element name.
fn classify_by_root_element(path: &Path) -> Option<RecordType> {
    let bytes = read_prefix(path, 4096)?;
    let text = String::from_utf8_lossy(&bytes);
    let root = root_element_name(&text)?;
    classify_hint(&root.to_lowercase())
}

fn read_prefix(path: &Path, limit: usize) -> Option<Vec<u8>> {
    use std::io::Read;
    let mut file = fs::File::open(path).ok()?;
    let mut buf = vec![0u8; limit];
    let n = file.read(&mut buf).ok()?;
    buf.truncate(n);
    Some(buf)
}

/// First element name past the XML prolog and comments.
fn root_element_name(text: &str) -> Option<&str> {
    let mut rest = text;
    loop {
        let open = rest.find('<')?;
        rest = &rest[open + 1..];
        match rest.chars().next()? {
            '?' | '!' => continue,
            _ => {
                let end = rest.find(|c: char| c.is_whitespace() || c == '>' || c == '/')?;
                return Some(&rest[..end]);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_classify_by_filename() {
        assert_eq!(classify_by_filename(Path::new("Weapons.xml")), Some(RecordType::Item));
        assert_eq!(classify_by_filename(Path::new("Armor.xml")), Some(RecordType::Item));
        assert_eq!(
            classify_by_filename(Path::new("ItemAttachments.xml")),
            Some(RecordType::Item)
        );
        assert_eq!(classify_by_filename(Path::new("Species.xml")), Some(RecordType::Species));
        assert_eq!(
            classify_by_filename(Path::new("Force Abilities.xml")),
            Some(RecordType::ForcePower)
        );
        assert_eq!(classify_by_filename(Path::new("Vehicles.xml")), Some(RecordType::Vehicle));
        assert_eq!(classify_by_filename(Path::new("Export.xml")), None);
    }

    #[test]
    fn test_classify_by_content_hint() {
        let dir = TempDir::new().unwrap();
        let path = write(
            dir.path(),
            "Export.xml",
            "<?xml version='1.0'?>\n<!-- export -->\n<Talents><Talent/></Talents>",
        );
        assert_eq!(classify_xml(&path), Some(RecordType::Talent));
    }

    #[test]
    fn test_discover_sorted_and_classified() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "Weapons.xml", "<Weapons/>");
        write(dir.path(), "Species.xml", "<Species/>");
        write(dir.path(), "Sub/Careers.xml", "<Careers/>");
        write(dir.path(), "notes.txt", "not xml");

        let files = discover(Some(dir.path()), None).unwrap();
        assert_eq!(files.len(), 3);
        // Sorted walk: Species.xml, Sub/Careers.xml, Weapons.xml.
        assert_eq!(files[0].record_type, RecordType::Species);
        assert_eq!(files[1].record_type, RecordType::Career);
        assert_eq!(files[2].record_type, RecordType::Item);
    }

    #[test]
    fn test_discover_json_root_all_adversaries() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "stormtroopers.json", "[]");
        write(dir.path(), "officers.json", "[]");
        write(dir.path(), "readme.md", "no");

        let files = discover(None, Some(dir.path())).unwrap();
        assert_eq!(files.len(), 2);
        assert!(files.iter().all(|f| f.record_type == RecordType::Adversary));
        assert!(files.iter().all(|f| f.format == FileFormat::Json));
    }

    #[test]
    fn test_discover_missing_root_is_fatal() {
        let err = discover(Some(Path::new("/no/such/dir")), None).unwrap_err();
        assert!(matches!(err, DiscoveryError::RootNotFound(_)));
    }

    #[test]
    fn test_hidden_files_skipped() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), ".hidden.xml", "<Weapons/>");
        write(dir.path(), "Weapons.xml", "<Weapons/>");

        let files = discover(Some(dir.path()), None).unwrap();
        assert_eq!(files.len(), 1);
    }

    #[test]
    fn test_unclassifiable_xml_skipped() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "Export.xml", "<Mystery><Thing/></Mystery>");
        let files = discover(Some(dir.path()), None).unwrap();
        assert!(files.is_empty());
    }
}
