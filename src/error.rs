//! Error types for the Realmload import pipeline.
//!
//! This module defines a hierarchy of error types:
//!
//! - [`ConfigError`] - Configuration loading/validation errors
//! - [`DiscoveryError`] - Source directory enumeration errors
//! - [`DecodeError`] - File decoding errors
//! - [`UploadError`] - Upload client errors
//! - [`ImportError`] - Top-level orchestration errors
//!
//! Error conversion is automatic via `From` implementations,
//! allowing `?` to work across error boundaries.
//!
//! Record-level problems (a single malformed file, a record missing a
//! required field, a server-side rejection) are NOT errors in this
//! hierarchy; they are captured into the run's
//! [`ImportResult`](crate::models::ImportResult) and never interrupt
//! sibling work.

use std::path::PathBuf;
use thiserror::Error;

// =============================================================================
// Configuration Errors
// =============================================================================

/// Errors while loading or validating configuration.
///
/// All of these are fatal: a structurally invalid configuration aborts
/// the run before any file is touched.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read a configuration file.
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    /// Configuration file is not valid JSON.
    #[error("Config JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Configuration file does not match its schema.
    #[error("Config validation failed for {path}: {errors:?}")]
    SchemaError { path: String, errors: Vec<String> },

    /// A record type key in the mapping config is not recognized.
    #[error("Unknown record type: {0}")]
    UnknownRecordType(String),

    /// A selected source key does not exist in the sources config.
    #[error("Unknown source key: {0}")]
    UnknownSource(String),

    /// No mapping profile exists for a selected record type.
    #[error("No mapping profile for record type: {0}")]
    MissingProfile(String),
}

// =============================================================================
// Discovery Errors
// =============================================================================

/// Errors while enumerating source files.
///
/// Discovery errors are fatal for the whole run: an unreadable root
/// means the record inventory would be incomplete in unknowable ways.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// Root directory does not exist.
    #[error("Source directory not found: {0}")]
    RootNotFound(PathBuf),

    /// Root path exists but is not a directory.
    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),

    /// Failed to read a directory during the walk.
    #[error("Failed to read directory {path}: {source}")]
    IoError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

// =============================================================================
// Decode Errors
// =============================================================================

/// Errors while decoding a single source file.
///
/// A decode error aborts only that file; its records are skipped and the
/// run continues. Every variant carries the offending path.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// Failed to read the file.
    #[error("Failed to read {path}: {source}")]
    IoError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// File content is not valid XML.
    #[error("Invalid XML in {path}: {message}")]
    XmlError { path: PathBuf, message: String },

    /// File content is not valid JSON.
    #[error("Invalid JSON in {path}: {message}")]
    JsonError { path: PathBuf, message: String },

    /// File parsed but its structure does not yield records.
    #[error("Unexpected structure in {path}: {message}")]
    StructureError { path: PathBuf, message: String },
}

impl DecodeError {
    /// The path of the file that failed to decode.
    pub fn path(&self) -> &PathBuf {
        match self {
            DecodeError::IoError { path, .. }
            | DecodeError::XmlError { path, .. }
            | DecodeError::JsonError { path, .. }
            | DecodeError::StructureError { path, .. } => path,
        }
    }
}

// =============================================================================
// Upload Errors
// =============================================================================

/// Transport-level errors from the upload client.
///
/// These are distinct from per-record rejections (which come back inside
/// a successful response): a transport error aborts the remaining uploads
/// for the affected record type only. Timeouts are treated identically to
/// any other transport failure.
#[derive(Debug, Error)]
pub enum UploadError {
    /// Missing API token.
    #[error("Missing REALM_API_TOKEN environment variable")]
    MissingToken,

    /// Authentication rejected (expired or invalid token).
    #[error("Authentication failed: {0}")]
    AuthError(String),

    /// HTTP request failed (connectivity, timeout, server error).
    #[error("Transport error: {0}")]
    TransportError(String),

    /// Server returned the wrong number of per-record statuses.
    #[error("Server returned {got} statuses for a batch of {expected}")]
    BatchShape { expected: usize, got: usize },
}

impl From<reqwest::Error> for UploadError {
    fn from(err: reqwest::Error) -> Self {
        UploadError::TransportError(err.to_string())
    }
}

// =============================================================================
// Import Errors (top-level)
// =============================================================================

/// Top-level orchestration errors.
///
/// This is the error type returned by
/// [`ImportManager::run`](crate::manager::ImportManager::run). Only
/// run-level failures surface here; everything record- or type-scoped is
/// recorded in the [`ImportResult`](crate::models::ImportResult) instead.
#[derive(Debug, Error)]
pub enum ImportError {
    /// Configuration error.
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// Discovery error.
    #[error("Discovery error: {0}")]
    Discovery(#[from] DiscoveryError),

    /// The job selected no record types and none were discoverable.
    #[error("Nothing to import: no source roots configured")]
    NoSourceRoots,

    /// The job has no campaign to upload into.
    #[error("Nothing to import: no campaign id set")]
    NoCampaign,
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Result type for discovery operations.
pub type DiscoveryResult<T> = Result<T, DiscoveryError>;

/// Result type for decode operations.
pub type DecodeResult<T> = Result<T, DecodeError>;

/// Result type for upload operations.
pub type UploadResult<T> = Result<T, UploadError>;

/// Result type for run-level operations.
pub type RunResult<T> = Result<T, ImportError>;
