//! Source filter.
//!
//! Applies the job's sourcebook allow-list to decoded records. A record
//! survives when any of its source tags matches an alias of an allowed
//! book (case-insensitive substring, since export source strings carry
//! page numbers and edition suffixes). Surviving records are annotated
//! with the first matching book's display name as their category.
//!
//! With an active allow-list, records carrying no source tag are
//! filtered out: their provenance cannot be established. An empty
//! allow-list disables filtering entirely.

use crate::config::SourcesConfig;
use crate::error::{ConfigError, ConfigResult};
use crate::models::RawRecord;

#[derive(Debug)]
struct AllowedBook {
    /// Display name, assigned as category on match.
    name: String,
    /// Lowercased aliases from both export formats.
    aliases: Vec<String>,
}

/// A compiled allow-list. Build once per run from the sources config.
#[derive(Debug)]
pub struct SourceFilter {
    books: Vec<AllowedBook>,
}

/// Filter verdict for one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Record survives; category is the matching book's display name.
    Keep { category: Option<String> },
    /// Record's provenance is not in the allow-list.
    Drop,
}

impl SourceFilter {
    /// Compile the allow-list from selected source keys.
    ///
    /// An empty selection falls back to every enabled book in the config.
    /// Naming a key the config does not define is a fatal configuration
    /// error, not a silent no-op.
    pub fn from_config(config: &SourcesConfig, selected: &[String]) -> ConfigResult<Self> {
        let keys: Vec<String> = if selected.is_empty() {
            config.enabled_keys()
        } else {
            for key in selected {
                if config.get(key).is_none() {
                    return Err(ConfigError::UnknownSource(key.clone()));
                }
            }
            selected.to_vec()
        };

        let books = config
            .sources
            .iter()
            .filter(|book| keys.contains(&book.key))
            .map(|book| AllowedBook {
                name: book.name.clone(),
                aliases: book.aliases_lowercase(),
            })
            .collect();

        Ok(Self { books })
    }

    /// A filter with no allow-list passes everything through unchanged.
    pub fn is_active(&self) -> bool {
        !self.books.is_empty()
    }

    /// Evaluate one record against the allow-list.
    pub fn evaluate(&self, record: &RawRecord) -> Verdict {
        if !self.is_active() {
            return Verdict::Keep { category: None };
        }

        for tag in &record.sources {
            let tag_lower = tag.to_lowercase();
            for book in &self.books {
                if book.aliases.iter().any(|alias| tag_lower.contains(alias)) {
                    return Verdict::Keep {
                        category: Some(book.name.clone()),
                    };
                }
            }
        }

        Verdict::Drop
    }

    /// Apply the filter, annotating survivors with their category.
    pub fn apply(&self, mut record: RawRecord) -> Option<RawRecord> {
        match self.evaluate(&record) {
            Verdict::Keep { category } => {
                if record.category.is_none() {
                    record.category = category;
                }
                Some(record)
            }
            Verdict::Drop => None,
        }
    }
}
