//! Upload client.
//!
//! The pipeline consumes uploads through the [`UploadClient`] trait: a
//! batch of mapped records for one record type and campaign goes in, one
//! accept/reject status per record comes back, in submission order.
//! Transport policy (token acquisition, request signing, retries) stays
//! on the far side of this seam; a transport-level failure surfaces as a
//! single [`UploadError`] and the orchestrator treats the affected record
//! type as fatally stopped.
//!
//! [`HttpClient`] is the production implementation, posting JSON batches
//! with a pre-acquired bearer token. [`NullClient`] accepts everything
//! and backs `--dry-run`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::{UploadError, UploadResult};
use crate::models::{RecordType, TargetRecord};

/// Default API endpoint.
pub const DEFAULT_API_URL: &str = "https://utilities.realmvtt.com";

/// Per-record outcome of a batch upload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadStatus {
    /// Whether the server accepted the record.
    pub accepted: bool,
    /// Server-provided rejection reason.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Accepts a batch of target records and reports per-record status.
#[async_trait]
pub trait UploadClient: Send + Sync {
    /// Upload one batch. The response carries one entry per input
    /// record, in the same order as submitted.
    async fn upload(
        &self,
        campaign_id: &str,
        record_type: RecordType,
        batch: &[TargetRecord],
    ) -> UploadResult<Vec<UploadStatus>>;
}

// =============================================================================
// HTTP Client
// =============================================================================

/// HTTP implementation posting batches with a bearer token.
#[derive(Debug)]
pub struct HttpClient {
    base_url: String,
    token: String,
    http: reqwest::Client,
}

impl HttpClient {
    /// Create a client for the given endpoint and pre-acquired token.
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> UploadResult<Self> {
        let token = token.into();
        if token.trim().is_empty() {
            return Err(UploadError::MissingToken);
        }
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
            http: reqwest::Client::new(),
        })
    }

    /// Create a client from `REALM_API_URL` / `REALM_API_TOKEN`.
    pub fn from_env() -> UploadResult<Self> {
        let base_url =
            std::env::var("REALM_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.to_string());
        let token = std::env::var("REALM_API_TOKEN").map_err(|_| UploadError::MissingToken)?;
        Self::new(base_url, token)
    }

    fn batch_url(&self, campaign_id: &str, record_type: RecordType) -> String {
        format!(
            "{}/campaigns/{}/{}/batch",
            self.base_url,
            campaign_id,
            record_type.key()
        )
    }
}

/// Shape one record for the wire.
pub fn wire_record(record: &TargetRecord, campaign_id: &str) -> Value {
    json!({
        "name": record.name,
        "recordType": record.record_type.key(),
        "campaignId": campaign_id,
        "category": record.category.clone().unwrap_or_default(),
        "data": record.fields,
    })
}

#[async_trait]
impl UploadClient for HttpClient {
    async fn upload(
        &self,
        campaign_id: &str,
        record_type: RecordType,
        batch: &[TargetRecord],
    ) -> UploadResult<Vec<UploadStatus>> {
        let records: Vec<Value> = batch.iter().map(|r| wire_record(r, campaign_id)).collect();

        let response = self
            .http
            .post(self.batch_url(campaign_id, record_type))
            .bearer_auth(&self.token)
            .json(&json!({ "records": records }))
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            let body = response.text().await.unwrap_or_default();
            return Err(UploadError::AuthError(if body.is_empty() {
                status.to_string()
            } else {
                body
            }));
        }
        if !status.is_success() {
            return Err(UploadError::TransportError(format!(
                "server returned {status}"
            )));
        }

        let statuses: Vec<UploadStatus> = response.json().await?;
        if statuses.len() != batch.len() {
            return Err(UploadError::BatchShape {
                expected: batch.len(),
                got: statuses.len(),
            });
        }
        Ok(statuses)
    }
}

// =============================================================================
// Null Client
// =============================================================================

/// Accepts every record without touching the network. Backs dry runs.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullClient;

#[async_trait]
impl UploadClient for NullClient {
    async fn upload(
        &self,
        _campaign_id: &str,
        _record_type: RecordType,
        batch: &[TargetRecord],
    ) -> UploadResult<Vec<UploadStatus>> {
        Ok(batch
            .iter()
            .map(|_| UploadStatus {
                accepted: true,
                reason: None,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FileFormat, SourceFile};
    use serde_json::json;

    fn record() -> TargetRecord {
        TargetRecord {
            record_type: RecordType::Item,
            name: "Blaster Pistol".into(),
            category: Some("Edge of the Empire Core Rulebook".into()),
            fields: json!({"damage": 6}),
            origin: SourceFile::new("Weapons.xml", RecordType::Item, FileFormat::Xml),
            notes: Vec::new(),
        }
    }

    #[test]
    fn test_wire_record_shape() {
        let wire = wire_record(&record(), "camp-1");
        assert_eq!(wire["name"], "Blaster Pistol");
        assert_eq!(wire["recordType"], "items");
        assert_eq!(wire["campaignId"], "camp-1");
        assert_eq!(wire["category"], "Edge of the Empire Core Rulebook");
        assert_eq!(wire["data"]["damage"], 6);
    }

    #[test]
    fn test_empty_token_rejected() {
        let err = HttpClient::new(DEFAULT_API_URL, "  ").unwrap_err();
        assert!(matches!(err, UploadError::MissingToken));
    }

    #[test]
    fn test_batch_url() {
        let client = HttpClient::new("https://example.test/", "tok").unwrap();
        assert_eq!(
            client.batch_url("c1", RecordType::Adversary),
            "https://example.test/campaigns/c1/npcs/batch"
        );
    }

    #[tokio::test]
    async fn test_null_client_accepts_all() {
        let client = NullClient;
        let statuses = client
            .upload("camp-1", RecordType::Item, &[record(), record()])
            .await
            .unwrap();
        assert_eq!(statuses.len(), 2);
        assert!(statuses.iter().all(|s| s.accepted));
    }

    #[test]
    fn test_status_deserialization() {
        let statuses: Vec<UploadStatus> =
            serde_json::from_str(r#"[{"accepted": false, "reason": "duplicate"}]"#).unwrap();
        assert!(!statuses[0].accepted);
        assert_eq!(statuses[0].reason.as_deref(), Some("duplicate"));
    }
}
