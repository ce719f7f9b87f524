//! # Realmload - OggDude to Realm VTT migration pipeline
//!
//! Realmload discovers OggDude Character Creator XML exports and
//! Adversaries JSON files, normalizes them into loosely-typed records,
//! applies a declarative field-mapping configuration, and uploads the
//! mapped records into a Realm VTT campaign in concurrent, bounded
//! batches.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────┐   ┌─────────┐   ┌──────────┐   ┌──────────┐
//! │ Locator  │──▶│ Decoders │──▶│ Filter  │──▶│ Mapping  │──▶│  Upload  │
//! │ (2 roots)│   │ XML/JSON │   │ sources │   │  engine  │   │ batches  │
//! └──────────┘   └──────────┘   └─────────┘   └──────────┘   └──────────┘
//!        one worker per record type, bounded queues between stages
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use realmload::{ImportJob, ImportManager, NullClient};
//!
//! #[tokio::main]
//! async fn main() {
//!     let sources = realmload::SourcesConfig::load("config/sources.json".as_ref()).unwrap();
//!     let profiles = realmload::load_profiles("config/field_mapping.json".as_ref()).unwrap();
//!     let manager = ImportManager::new(Arc::new(NullClient), profiles, sources);
//!
//!     let job = ImportJob::new("campaign-id").with_xml_root("OggData");
//!     let result = manager.run(job).await.unwrap();
//!     println!("uploaded: {}", result.totals().uploaded);
//! }
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Hierarchical error types
//! - [`models`] - Domain models (records, jobs, results)
//! - [`config`] - Schema-validated run configuration
//! - [`locate`] - Source file discovery and classification
//! - [`decode`] - XML/JSON tree normalization into records
//! - [`filter`] - Sourcebook allow-list filtering
//! - [`mapping`] - Declarative field mapping engine
//! - [`markup`] - Export markup to display-text conversion
//! - [`manager`] - Import orchestration and concurrency
//! - [`progress`] - Progress event broadcasting
//! - [`upload`] - Upload client contract and HTTP implementation

// Core modules
pub mod error;
pub mod models;

// Configuration
pub mod config;

// Discovery and decoding
pub mod decode;
pub mod locate;

// Filtering and mapping
pub mod filter;
pub mod mapping;
pub mod markup;

// Orchestration
pub mod manager;
pub mod progress;

// Upload
pub mod upload;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{
    ConfigError, DecodeError, DiscoveryError, ImportError, UploadError,
};

// =============================================================================
// Re-exports - Models
// =============================================================================

pub use models::{
    CancelHandle, FailureDetail, FailureReason, FileFormat, ImportJob, ImportResult,
    MappingFailure, MappingNote, RawRecord, RecordType, SourceFile, Stage, TargetRecord,
    TypeCounts, TypeReport,
};

// =============================================================================
// Re-exports - Configuration
// =============================================================================

pub use config::{load_profiles, profiles_from_json, SourceBook, SourcesConfig};

// =============================================================================
// Re-exports - Mapping
// =============================================================================

pub use mapping::{
    example_profile, map_record, Derivation, MappingProfile, MappingRule, ProfileSet, RuleSource,
    TargetType,
};

// =============================================================================
// Re-exports - Pipeline
// =============================================================================

pub use filter::{SourceFilter, Verdict};
pub use locate::discover;
pub use manager::ImportManager;
pub use progress::{LogEntry, LogLevel, PipelineEvent, ProgressBroadcaster, ProgressEvent};

// =============================================================================
// Re-exports - Upload
// =============================================================================

pub use upload::{HttpClient, NullClient, UploadClient, UploadStatus, DEFAULT_API_URL};
