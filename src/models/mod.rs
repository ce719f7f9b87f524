//! Domain models for the Realmload import pipeline.
//!
//! This module contains the core data structures used throughout the pipeline:
//!
//! - [`RecordType`] - The kinds of records the importer understands
//! - [`SourceFile`] - A discovered input file, classified
//! - [`RawRecord`] - A decoded, loosely-typed record tree
//! - [`TargetRecord`] - A mapped record in the campaign API schema
//! - [`MappingFailure`] - A record that could not be mapped
//! - [`ImportJob`] - One run's parameters, including the cancellation flag
//! - [`ImportResult`] - Per-type counts and failure details for a run

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use uuid::Uuid;

// =============================================================================
// Record Types
// =============================================================================

/// The record types the importer understands.
///
/// Serialized names match the campaign API's record-type keys
/// (adversaries are `npcs` on the wire).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RecordType {
    #[serde(rename = "items")]
    Item,
    #[serde(rename = "species")]
    Species,
    #[serde(rename = "careers")]
    Career,
    #[serde(rename = "specializations")]
    Specialization,
    #[serde(rename = "talents")]
    Talent,
    #[serde(rename = "force_powers")]
    ForcePower,
    #[serde(rename = "signature_abilities")]
    SignatureAbility,
    #[serde(rename = "skills")]
    Skill,
    #[serde(rename = "vehicles")]
    Vehicle,
    #[serde(rename = "npcs")]
    Adversary,
}

impl RecordType {
    /// All record types, in a stable order.
    pub const ALL: [RecordType; 10] = [
        RecordType::Item,
        RecordType::Species,
        RecordType::Career,
        RecordType::Specialization,
        RecordType::Talent,
        RecordType::ForcePower,
        RecordType::SignatureAbility,
        RecordType::Skill,
        RecordType::Vehicle,
        RecordType::Adversary,
    ];

    /// The campaign API key for this record type.
    pub fn key(&self) -> &'static str {
        match self {
            RecordType::Item => "items",
            RecordType::Species => "species",
            RecordType::Career => "careers",
            RecordType::Specialization => "specializations",
            RecordType::Talent => "talents",
            RecordType::ForcePower => "force_powers",
            RecordType::SignatureAbility => "signature_abilities",
            RecordType::Skill => "skills",
            RecordType::Vehicle => "vehicles",
            RecordType::Adversary => "npcs",
        }
    }

    /// Parse a record type from its API key or a common alias.
    pub fn from_key(key: &str) -> Option<Self> {
        let normalized = key.trim().to_lowercase().replace('-', "_");
        match normalized.as_str() {
            "items" | "item" => Some(RecordType::Item),
            "species" => Some(RecordType::Species),
            "careers" | "career" => Some(RecordType::Career),
            "specializations" | "specialization" => Some(RecordType::Specialization),
            "talents" | "talent" => Some(RecordType::Talent),
            "force_powers" | "force_power" => Some(RecordType::ForcePower),
            "signature_abilities" | "signature_ability" => Some(RecordType::SignatureAbility),
            "skills" | "skill" => Some(RecordType::Skill),
            "vehicles" | "vehicle" => Some(RecordType::Vehicle),
            "npcs" | "npc" | "adversaries" | "adversary" => Some(RecordType::Adversary),
            _ => None,
        }
    }

    /// Human-readable display name.
    pub fn display_name(&self) -> &'static str {
        match self {
            RecordType::Item => "Items",
            RecordType::Species => "Species",
            RecordType::Career => "Careers",
            RecordType::Specialization => "Specializations",
            RecordType::Talent => "Talents",
            RecordType::ForcePower => "Force Powers",
            RecordType::SignatureAbility => "Signature Abilities",
            RecordType::Skill => "Skills",
            RecordType::Vehicle => "Vehicles",
            RecordType::Adversary => "NPCs",
        }
    }
}

impl std::fmt::Display for RecordType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}

// =============================================================================
// Source Files
// =============================================================================

/// On-disk format of a source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileFormat {
    Xml,
    Json,
}

/// A discovered input file, classified by record type.
///
/// Immutable once discovered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceFile {
    /// Path to the file.
    pub path: PathBuf,
    /// Detected record type.
    pub record_type: RecordType,
    /// On-disk format, selects the decoder.
    pub format: FileFormat,
}

impl SourceFile {
    pub fn new(path: impl Into<PathBuf>, record_type: RecordType, format: FileFormat) -> Self {
        Self {
            path: path.into(),
            record_type,
            format,
        }
    }

    /// File name for display, falling back to the full path.
    pub fn display_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }
}

// =============================================================================
// Raw Records
// =============================================================================

/// A decoded record: a loosely-typed attribute tree plus provenance.
///
/// Produced by a decoder, consumed once by the filter/mapping stage,
/// never mutated after creation. Nested structure is `serde_json::Value`
/// so coercion logic in the mapping engine stays exhaustive over a small
/// tagged-variant value type.
#[derive(Debug, Clone, Serialize)]
pub struct RawRecord {
    /// Record type, inherited from the source file.
    pub record_type: RecordType,
    /// Record name, for diagnostics ("Unknown" when the tree has none).
    pub name: String,
    /// Sourcebook tags extracted during normalization, in document order.
    pub sources: Vec<String>,
    /// Category assigned by the source filter (matching book's display name).
    pub category: Option<String>,
    /// The attribute tree.
    pub fields: Value,
    /// Originating file.
    pub origin: SourceFile,
}

impl RawRecord {
    pub fn new(record_type: RecordType, fields: Value, origin: SourceFile) -> Self {
        let name = fields
            .get("Name")
            .or_else(|| fields.get("name"))
            .and_then(|v| v.as_str())
            .unwrap_or("Unknown")
            .to_string();
        Self {
            record_type,
            name,
            sources: Vec::new(),
            category: None,
            fields,
            origin,
        }
    }

    /// Attach sourcebook tags extracted during normalization.
    pub fn with_sources(mut self, sources: Vec<String>) -> Self {
        self.sources = sources;
        self
    }
}

// =============================================================================
// Target Records
// =============================================================================

/// A non-fatal note recorded while mapping a record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MappingNote {
    /// Target field the note concerns.
    pub field: String,
    /// What happened (e.g. a coercion fell back to the default).
    pub message: String,
}

/// A record mapped into the campaign API schema.
///
/// Invariant: every field marked required in the record type's mapping
/// profile is present and of the expected type; otherwise the record
/// does not exist and a [`MappingFailure`] took its place.
#[derive(Debug, Clone, Serialize)]
pub struct TargetRecord {
    /// Record type.
    pub record_type: RecordType,
    /// Record name, for diagnostics.
    pub name: String,
    /// Source category assigned by the filter, if any.
    pub category: Option<String>,
    /// Mapped fields, in profile order.
    pub fields: Value,
    /// Originating file, for diagnostics.
    pub origin: SourceFile,
    /// Non-fatal notes recorded during mapping.
    pub notes: Vec<MappingNote>,
}

// =============================================================================
// Mapping Failures
// =============================================================================

/// Why a record failed to map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureReason {
    /// A required field resolved to nothing and had no default.
    #[serde(rename = "missing-required")]
    MissingRequired,
    /// A required field's value could not be coerced to the target type.
    #[serde(rename = "type-coercion-error")]
    TypeCoercion,
    /// A derivation referenced a target field that was never written.
    #[serde(rename = "unresolved-reference")]
    UnresolvedReference,
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            FailureReason::MissingRequired => "missing-required",
            FailureReason::TypeCoercion => "type-coercion-error",
            FailureReason::UnresolvedReference => "unresolved-reference",
        };
        f.write_str(s)
    }
}

/// A record the mapping engine could not produce.
///
/// Never silently dropped: always surfaces in the aggregate result.
#[derive(Debug, Clone, Serialize)]
pub struct MappingFailure {
    /// Name of the failing record.
    pub record: String,
    /// Originating file.
    pub origin: SourceFile,
    /// Target field of the failing rule.
    pub rule: String,
    /// Reason code.
    pub reason: FailureReason,
    /// Human-readable detail.
    pub detail: String,
}

// =============================================================================
// Import Jobs
// =============================================================================

/// Cooperative cancellation handle.
///
/// Cloneable so it can be triggered from outside the pipeline's own
/// thread of control; single writer, many readers.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle {
    flag: Arc<AtomicBool>,
}

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. In-flight units of work complete; no new
    /// work is issued once the flag is observed.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Parameters for one import run.
///
/// Created once per run and owned exclusively by the import manager;
/// multiple runs never share a job.
#[derive(Debug, Clone)]
pub struct ImportJob {
    /// Unique identifier for this run.
    pub job_id: Uuid,
    /// Campaign to import into.
    pub campaign_id: String,
    /// Root directory of OggDude-style XML exports.
    pub xml_root: Option<PathBuf>,
    /// Root directory of Adversaries-style JSON files.
    pub json_root: Option<PathBuf>,
    /// Selected sourcebook keys; empty selects every enabled source.
    pub sources: Vec<String>,
    /// Record types to process; empty selects all.
    pub record_types: Vec<RecordType>,
    /// Upload batch size (payload limit at the API).
    pub batch_size: usize,
    /// Cap on records per type, for trial runs.
    pub limit: Option<usize>,
    /// Cooperative cancellation flag.
    pub cancel: CancelHandle,
}

/// Default upload batch size.
pub const DEFAULT_BATCH_SIZE: usize = 20;

impl ImportJob {
    pub fn new(campaign_id: impl Into<String>) -> Self {
        Self {
            job_id: Uuid::new_v4(),
            campaign_id: campaign_id.into(),
            xml_root: None,
            json_root: None,
            sources: Vec::new(),
            record_types: Vec::new(),
            batch_size: DEFAULT_BATCH_SIZE,
            limit: None,
            cancel: CancelHandle::new(),
        }
    }

    pub fn with_xml_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.xml_root = Some(root.into());
        self
    }

    pub fn with_json_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.json_root = Some(root.into());
        self
    }

    pub fn with_sources(mut self, sources: Vec<String>) -> Self {
        self.sources = sources;
        self
    }

    pub fn with_record_types(mut self, types: Vec<RecordType>) -> Self {
        self.record_types = types;
        self
    }

    pub fn with_batch_size(mut self, size: usize) -> Self {
        self.batch_size = size.max(1);
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// The record types this job processes, defaulting to all.
    pub fn selected_types(&self) -> Vec<RecordType> {
        if self.record_types.is_empty() {
            RecordType::ALL.to_vec()
        } else {
            let mut types = self.record_types.clone();
            types.sort();
            types.dedup();
            types
        }
    }

    /// Handle for cancelling this job from another task.
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }
}

// =============================================================================
// Pipeline Stages
// =============================================================================

/// Per-record-type pipeline stage.
///
/// Transitions only move forward, driven by completion of the
/// corresponding stage's work; `Cancelled` is terminal and reachable from
/// any non-terminal stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Pending,
    Discovering,
    Decoding,
    Filtering,
    Mapping,
    Uploading,
    Done,
    Cancelled,
}

impl Stage {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Stage::Done | Stage::Cancelled)
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Stage::Pending => "pending",
            Stage::Discovering => "discovering",
            Stage::Decoding => "decoding",
            Stage::Filtering => "filtering",
            Stage::Mapping => "mapping",
            Stage::Uploading => "uploading",
            Stage::Done => "done",
            Stage::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

// =============================================================================
// Import Results
// =============================================================================

/// Per-record-type counters. Monotonically non-decreasing during a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeCounts {
    /// Records decoded from source files.
    pub discovered: u64,
    /// Records dropped by the source filter.
    pub filtered_out: u64,
    /// Records successfully mapped.
    pub mapped: u64,
    /// Records the mapping engine rejected.
    pub failed_mapping: u64,
    /// Records the server accepted.
    pub uploaded: u64,
    /// Records the server rejected.
    pub failed_upload: u64,
}

/// A failure recorded against one record type.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FailureDetail {
    /// A file that could not be decoded; all its records were skipped.
    Decode { file: PathBuf, cause: String },
    /// A record the mapping engine rejected.
    Mapping(MappingFailure),
    /// A record the server rejected.
    Upload { record: String, reason: String },
}

/// Everything known about one record type's progress.
#[derive(Debug, Clone, Serialize)]
pub struct TypeReport {
    pub counts: TypeCounts,
    pub stage: Stage,
    /// Ordered failure details.
    pub failures: Vec<FailureDetail>,
    /// Type-level fatal error (e.g. upload transport failure), kept
    /// separate from the per-record failure list.
    pub fatal: Option<String>,
}

impl Default for TypeReport {
    fn default() -> Self {
        Self {
            counts: TypeCounts::default(),
            stage: Stage::Pending,
            failures: Vec::new(),
            fatal: None,
        }
    }
}

/// Aggregate outcome of an import run.
///
/// Accumulated monotonically during the run via the `record_*` methods,
/// which the manager calls under a lock; exposed to reporters only as
/// cloned snapshots. A completed run always carries full counts and the
/// failure list; failures are never masked.
#[derive(Debug, Clone, Serialize)]
pub struct ImportResult {
    pub job_id: Uuid,
    pub campaign_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    types: BTreeMap<RecordType, TypeReport>,
}

impl ImportResult {
    pub fn new(job: &ImportJob) -> Self {
        Self::for_types(job, &job.selected_types())
    }

    /// Result tracking a specific set of record types (the ones the run
    /// will actually process).
    pub fn for_types(job: &ImportJob, types: &[RecordType]) -> Self {
        let types = types.iter().map(|t| (*t, TypeReport::default())).collect();
        Self {
            job_id: job.job_id,
            campaign_id: job.campaign_id.clone(),
            started_at: Utc::now(),
            finished_at: None,
            types,
        }
    }

    /// Report for one record type.
    pub fn report(&self, record_type: RecordType) -> Option<&TypeReport> {
        self.types.get(&record_type)
    }

    /// All per-type reports, in stable type order.
    pub fn reports(&self) -> impl Iterator<Item = (RecordType, &TypeReport)> {
        self.types.iter().map(|(t, r)| (*t, r))
    }

    fn entry(&mut self, record_type: RecordType) -> &mut TypeReport {
        self.types.entry(record_type).or_default()
    }

    /// Advance a type's stage. Backward transitions are ignored, and
    /// terminal stages are final; `Cancelled` wins over any non-terminal
    /// stage.
    pub fn set_stage(&mut self, record_type: RecordType, stage: Stage) {
        let report = self.entry(record_type);
        if report.stage.is_terminal() {
            return;
        }
        if stage == Stage::Cancelled || stage > report.stage {
            report.stage = stage;
        }
    }

    pub fn record_discovered(&mut self, record_type: RecordType, count: u64) {
        self.entry(record_type).counts.discovered += count;
    }

    pub fn record_filtered_out(&mut self, record_type: RecordType) {
        self.entry(record_type).counts.filtered_out += 1;
    }

    pub fn record_mapped(&mut self, record_type: RecordType) {
        self.entry(record_type).counts.mapped += 1;
    }

    pub fn record_mapping_failure(&mut self, failure: MappingFailure) {
        let report = self.entry(failure.origin.record_type);
        report.counts.failed_mapping += 1;
        report.failures.push(FailureDetail::Mapping(failure));
    }

    pub fn record_decode_error(&mut self, record_type: RecordType, file: PathBuf, cause: String) {
        self.entry(record_type)
            .failures
            .push(FailureDetail::Decode { file, cause });
    }

    pub fn record_uploaded(&mut self, record_type: RecordType, count: u64) {
        self.entry(record_type).counts.uploaded += count;
    }

    pub fn record_upload_rejected(
        &mut self,
        record_type: RecordType,
        record: String,
        reason: String,
    ) {
        let report = self.entry(record_type);
        report.counts.failed_upload += 1;
        report.failures.push(FailureDetail::Upload { record, reason });
    }

    /// Record a type-level fatal error. First writer wins.
    pub fn set_fatal(&mut self, record_type: RecordType, message: String) {
        let report = self.entry(record_type);
        if report.fatal.is_none() {
            report.fatal = Some(message);
        }
    }

    /// Finalize the run. After this the result is read-only by convention.
    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    /// Totals across all record types.
    pub fn totals(&self) -> TypeCounts {
        let mut totals = TypeCounts::default();
        for report in self.types.values() {
            totals.discovered += report.counts.discovered;
            totals.filtered_out += report.counts.filtered_out;
            totals.mapped += report.counts.mapped;
            totals.failed_mapping += report.counts.failed_mapping;
            totals.uploaded += report.counts.uploaded;
            totals.failed_upload += report.counts.failed_upload;
        }
        totals
    }
}

// =============================================================================
// Tests
// =============================================================================
