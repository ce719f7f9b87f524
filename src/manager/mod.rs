//! Import orchestration.
//!
//! [`ImportManager::run`] drives a whole import:
//!
//! 1. validates the job and compiles the source filter (fatal before any
//!    file is touched),
//! 2. enumerates source files under both roots (fatal on error),
//! 3. spawns one worker per selected record type; within a type,
//!    decode → map → upload run as a producer/consumer pipeline over
//!    bounded queues, so a slow upload exerts backpressure on decoding
//!    instead of buffering the whole export in memory,
//! 4. aggregates per-record outcomes into a shared [`ImportResult`] and
//!    emits progress events after each file decoded and each batch
//!    uploaded.
//!
//! Record types proceed independently and concurrently; no ordering is
//! guaranteed between them. Within a type, records upload in the order
//! they were decoded, files in discovery order.
//!
//! Failure containment: a malformed file skips only that file; a record
//! the engine rejects is recorded and processing continues; a rejected
//! upload is recorded and never retried here. A transport-level upload
//! error stops the affected record type only: its remaining queue
//! drains away and the other types keep running. Cancellation is
//! cooperative: the flag is checked between units of work, in-flight
//! work completes, nothing is interrupted mid-batch.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::mpsc;

use crate::config::SourcesConfig;
use crate::decode;
use crate::error::{ConfigError, ImportError, RunResult};
use crate::filter::SourceFilter;
use crate::locate;
use crate::mapping::{self, MappingProfile, ProfileSet};
use crate::models::{
    CancelHandle, ImportJob, ImportResult, RawRecord, RecordType, SourceFile, Stage, TargetRecord,
    TypeReport,
};
use crate::progress::ProgressBroadcaster;
use crate::upload::UploadClient;

/// Depth of the bounded queues between pipeline stages.
const QUEUE_DEPTH: usize = 64;

/// Shared, append-only result aggregate. All mutation goes through
/// short-lived exclusive access; reporters only ever see clones.
#[derive(Clone)]
struct SharedResult(Arc<Mutex<ImportResult>>);

impl SharedResult {
    fn new(result: ImportResult) -> Self {
        Self(Arc::new(Mutex::new(result)))
    }

    fn with<R>(&self, f: impl FnOnce(&mut ImportResult) -> R) -> R {
        let mut guard = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }

    fn snapshot(&self, record_type: RecordType) -> TypeReport {
        self.with(|r| r.report(record_type).cloned().unwrap_or_default())
    }

    fn into_result(self) -> ImportResult {
        self.with(|r| r.clone())
    }
}

/// Sequences discovery → decode → filter → map → upload across record
/// types. Holds all cross-cutting state for a run; everything else is
/// handed through the pipeline by value.
pub struct ImportManager {
    client: Arc<dyn UploadClient>,
    profiles: Arc<ProfileSet>,
    sources: SourcesConfig,
    progress: ProgressBroadcaster,
}

impl ImportManager {
    pub fn new(
        client: Arc<dyn UploadClient>,
        profiles: ProfileSet,
        sources: SourcesConfig,
    ) -> Self {
        Self {
            client,
            profiles: Arc::new(profiles),
            sources,
            progress: ProgressBroadcaster::new(),
        }
    }

    /// Replace the default broadcaster (e.g. with a quiet one in tests).
    pub fn with_progress(mut self, progress: ProgressBroadcaster) -> Self {
        self.progress = progress;
        self
    }

    /// The broadcaster reporters should subscribe to.
    pub fn progress(&self) -> &ProgressBroadcaster {
        &self.progress
    }

    /// Run one import job to completion.
    ///
    /// Always returns a full [`ImportResult`] with explicit counts and
    /// failure details once processing starts; only pre-flight problems
    /// (bad config, unreadable roots, nothing to do) surface as `Err`.
    pub async fn run(&self, job: ImportJob) -> RunResult<ImportResult> {
        if job.campaign_id.trim().is_empty() {
            return Err(ImportError::NoCampaign);
        }
        if job.xml_root.is_none() && job.json_root.is_none() {
            return Err(ImportError::NoSourceRoots);
        }

        // Which types this run processes. Explicitly selected types must
        // have a profile; a default (select-all) job quietly narrows to
        // the types the mapping config covers.
        let types: Vec<RecordType> = if job.record_types.is_empty() {
            self.profiles.record_types().collect()
        } else {
            for ty in &job.record_types {
                if self.profiles.get(*ty).is_none() {
                    return Err(ConfigError::MissingProfile(ty.key().to_string()).into());
                }
            }
            job.selected_types()
        };

        let filter = Arc::new(SourceFilter::from_config(&self.sources, &job.sources)?);
        let result = SharedResult::new(ImportResult::for_types(&job, &types));

        self.progress
            .info(format!("Starting import job {}", job.job_id));

        // Discovery runs up front for all types: an unreadable root is
        // fatal before any decoding starts.
        for ty in &types {
            result.with(|r| r.set_stage(*ty, Stage::Discovering));
        }
        let files = locate::discover(job.xml_root.as_deref(), job.json_root.as_deref())?;
        self.progress
            .success(format!("Discovered {} source files", files.len()));

        let mut files_by_type: BTreeMap<RecordType, Vec<SourceFile>> = BTreeMap::new();
        for file in files {
            if types.contains(&file.record_type) {
                files_by_type.entry(file.record_type).or_default().push(file);
            }
        }

        let mut handles = Vec::new();
        for ty in &types {
            let ty = *ty;
            let files = files_by_type.remove(&ty).unwrap_or_default();
            if files.is_empty() {
                result.with(|r| r.set_stage(ty, Stage::Done));
                self.progress.progress(ty, Stage::Done, result.snapshot(ty));
                continue;
            }

            // Profile presence was checked above; record_types() only
            // yields covered types.
            let profile = match self.profiles.get(ty) {
                Some(p) => p.clone(),
                None => continue,
            };

            let worker = TypeWorker {
                record_type: ty,
                files,
                profile,
                filter: Arc::clone(&filter),
                client: Arc::clone(&self.client),
                campaign_id: job.campaign_id.clone(),
                batch_size: job.batch_size.max(1),
                limit: job.limit,
                cancel: job.cancel_handle(),
                result: result.clone(),
                progress: self.progress.clone(),
            };
            handles.push(tokio::spawn(worker.run()));
        }

        // Workers contain their own failures; a join error would mean a
        // panic inside one, which must not lose the partial result.
        let _ = futures::future::join_all(handles).await;

        result.with(|r| r.finish());
        let final_result = result.into_result();

        let totals = final_result.totals();
        self.progress.success(format!(
            "Import finished: {} uploaded, {} rejected, {} mapping failures, {} filtered out",
            totals.uploaded, totals.failed_upload, totals.failed_mapping, totals.filtered_out
        ));

        Ok(final_result)
    }
}

// =============================================================================
// Per-type Worker
// =============================================================================

/// One record type's pipeline: decode/filter task → mapping task →
/// upload task, linked by bounded queues.
struct TypeWorker {
    record_type: RecordType,
    files: Vec<SourceFile>,
    profile: MappingProfile,
    filter: Arc<SourceFilter>,
    client: Arc<dyn UploadClient>,
    campaign_id: String,
    batch_size: usize,
    limit: Option<usize>,
    cancel: CancelHandle,
    result: SharedResult,
    progress: ProgressBroadcaster,
}

impl TypeWorker {
    async fn run(self) {
        let ty = self.record_type;
        self.result.with(|r| r.set_stage(ty, Stage::Decoding));
        self.progress
            .progress(ty, Stage::Decoding, self.result.snapshot(ty));

        let (raw_tx, raw_rx) = mpsc::channel::<RawRecord>(QUEUE_DEPTH);
        let (mapped_tx, mapped_rx) = mpsc::channel::<TargetRecord>(QUEUE_DEPTH);

        let decode_task = tokio::spawn(decode_stage(
            ty,
            self.files,
            self.filter,
            self.limit,
            self.cancel.clone(),
            self.result.clone(),
            self.progress.clone(),
            raw_tx,
        ));
        let map_task = tokio::spawn(map_stage(
            ty,
            self.profile,
            raw_rx,
            mapped_tx,
            self.cancel.clone(),
            self.result.clone(),
        ));
        let upload_task = tokio::spawn(upload_stage(
            ty,
            self.client,
            self.campaign_id,
            self.batch_size,
            mapped_rx,
            self.cancel.clone(),
            self.result.clone(),
            self.progress.clone(),
        ));

        let _ = tokio::join!(decode_task, map_task, upload_task);

        let terminal = if self.cancel.is_cancelled() {
            Stage::Cancelled
        } else {
            Stage::Done
        };
        self.result.with(|r| r.set_stage(ty, terminal));
        self.progress.progress(ty, terminal, self.result.snapshot(ty));
    }
}

/// Decode files in discovery order and push surviving records onward.
/// The source filter rides this loop, so decoding and filtering complete
/// together and the stage label jumps straight to `Mapping`.
#[allow(clippy::too_many_arguments)]
async fn decode_stage(
    ty: RecordType,
    files: Vec<SourceFile>,
    filter: Arc<SourceFilter>,
    limit: Option<usize>,
    cancel: CancelHandle,
    result: SharedResult,
    progress: ProgressBroadcaster,
    raw_tx: mpsc::Sender<RawRecord>,
) {
    let mut sent: usize = 0;

    'files: for file in files {
        if cancel.is_cancelled() {
            break;
        }

        match decode::decode(&file) {
            Err(err) => {
                // A malformed file aborts only that file.
                result.with(|r| r.record_decode_error(ty, file.path.clone(), err.to_string()));
                progress.warning(format!("Skipping {}: {err}", file.display_name()));
            }
            Ok(records) => {
                for raw in records {
                    if limit.is_some_and(|l| sent >= l) {
                        break 'files;
                    }
                    result.with(|r| r.record_discovered(ty, 1));
                    match filter.apply(raw) {
                        None => result.with(|r| r.record_filtered_out(ty)),
                        Some(kept) => {
                            sent += 1;
                            if raw_tx.send(kept).await.is_err() {
                                // Downstream stopped (fatal upload error).
                                break 'files;
                            }
                        }
                    }
                }
            }
        }

        progress.progress(ty, Stage::Decoding, result.snapshot(ty));
    }

    result.with(|r| r.set_stage(ty, Stage::Mapping));
}

/// Map records as they arrive. Pure computation; the only suspension
/// point is the bounded send to the upload queue.
async fn map_stage(
    ty: RecordType,
    profile: MappingProfile,
    mut raw_rx: mpsc::Receiver<RawRecord>,
    mapped_tx: mpsc::Sender<TargetRecord>,
    cancel: CancelHandle,
    result: SharedResult,
) {
    while let Some(raw) = raw_rx.recv().await {
        if cancel.is_cancelled() {
            break;
        }
        match mapping::map_record(&raw, &profile) {
            Ok(target) => {
                result.with(|r| r.record_mapped(ty));
                if mapped_tx.send(target).await.is_err() {
                    break;
                }
            }
            // Mapping failures never abort the run.
            Err(failure) => result.with(|r| r.record_mapping_failure(failure)),
        }
    }

    result.with(|r| r.set_stage(ty, Stage::Uploading));
}

/// Batch mapped records and submit them. A rejected record is recorded
/// with the server's reason and never retried here; a transport-level
/// error is fatal for this record type only.
#[allow(clippy::too_many_arguments)]
async fn upload_stage(
    ty: RecordType,
    client: Arc<dyn UploadClient>,
    campaign_id: String,
    batch_size: usize,
    mut mapped_rx: mpsc::Receiver<TargetRecord>,
    cancel: CancelHandle,
    result: SharedResult,
    progress: ProgressBroadcaster,
) {
    let mut batch: Vec<TargetRecord> = Vec::with_capacity(batch_size);

    loop {
        match mapped_rx.recv().await {
            Some(record) => {
                batch.push(record);
                if batch.len() >= batch_size {
                    if cancel.is_cancelled() {
                        break;
                    }
                    if !flush_batch(
                        ty,
                        &client,
                        &campaign_id,
                        &mut batch,
                        &result,
                        &progress,
                    )
                    .await
                    {
                        break;
                    }
                }
            }
            None => {
                // Upstream finished; flush the tail unless cancelled.
                if !cancel.is_cancelled() {
                    let _ = flush_batch(
                        ty,
                        &client,
                        &campaign_id,
                        &mut batch,
                        &result,
                        &progress,
                    )
                    .await;
                }
                break;
            }
        }
    }
}

/// Submit one batch. Returns false when the record type must stop.
async fn flush_batch(
    ty: RecordType,
    client: &Arc<dyn UploadClient>,
    campaign_id: &str,
    batch: &mut Vec<TargetRecord>,
    result: &SharedResult,
    progress: &ProgressBroadcaster,
) -> bool {
    if batch.is_empty() {
        return true;
    }
    let records = std::mem::take(batch);

    match client.upload(campaign_id, ty, &records).await {
        Ok(statuses) if statuses.len() != records.len() => {
            result.with(|r| {
                r.set_fatal(
                    ty,
                    format!(
                        "server returned {} statuses for a batch of {}",
                        statuses.len(),
                        records.len()
                    ),
                )
            });
            progress.error(format!("{ty}: malformed batch response"));
            false
        }
        Ok(statuses) => {
            for (record, status) in records.iter().zip(statuses) {
                if status.accepted {
                    result.with(|r| r.record_uploaded(ty, 1));
                } else {
                    let reason = status.reason.unwrap_or_else(|| "rejected".to_string());
                    result.with(|r| {
                        r.record_upload_rejected(ty, record.name.clone(), reason)
                    });
                }
            }
            progress.progress(ty, Stage::Uploading, result.snapshot(ty));
            true
        }
        Err(err) => {
            // Fatal for this record type; siblings keep running.
            result.with(|r| r.set_fatal(ty, err.to_string()));
            progress.error(format!("{ty}: uploads stopped: {err}"));
            false
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SourcesConfig;
    use crate::error::{UploadError, UploadResult};
    use crate::mapping::{example_profile, MappingProfile, MappingRule, ProfileSet};
    use crate::upload::UploadStatus;
    use async_trait::async_trait;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

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
                "oggdude_sources": ["Far Horizons"],
                "adversaries_sources": ["far-horizons"]
            }
        ]
    }"#;

    fn sources() -> SourcesConfig {
        SourcesConfig::from_json(SOURCES_JSON, "sources.json").unwrap()
    }

    fn profiles() -> ProfileSet {
        let mut set = ProfileSet::new();
        set.insert(example_profile());
        set.insert(MappingProfile::new(
            RecordType::Adversary,
            vec![
                MappingRule::from_path("name", "name").required(),
                MappingRule::from_path("subtype", "subtype"),
            ],
        ));
        set
    }

    fn write(dir: &Path, name: &str, content: &str) {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
    }

    fn weapons_xml(names: &[&str]) -> String {
        let mut xml = String::from("<Weapons>");
        for name in names {
            xml.push_str(&format!(
                "<Weapon><Name>{name}</Name><Damage>6</Damage>\
                 <Source>Edge of the Empire Core Rulebook</Source></Weapon>"
            ));
        }
        xml.push_str("</Weapons>");
        xml
    }

    /// Scripted client: records upload order, can reject or fail.
    #[derive(Default)]
    struct MockClient {
        uploaded: Mutex<Vec<String>>,
        reject_with: Option<String>,
        fail_type: Option<RecordType>,
    }

    impl MockClient {
        fn uploaded_names(&self) -> Vec<String> {
            self.uploaded
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone()
        }
    }

    #[async_trait]
    impl UploadClient for MockClient {
        async fn upload(
            &self,
            _campaign_id: &str,
            record_type: RecordType,
            batch: &[TargetRecord],
        ) -> UploadResult<Vec<UploadStatus>> {
            if self.fail_type == Some(record_type) {
                return Err(UploadError::TransportError("connection reset".into()));
            }
            let mut uploaded = self.uploaded.lock().unwrap_or_else(PoisonError::into_inner);
            for record in batch {
                uploaded.push(record.name.clone());
            }
            Ok(batch
                .iter()
                .map(|_| UploadStatus {
                    accepted: self.reject_with.is_none(),
                    reason: self.reject_with.clone(),
                })
                .collect())
        }
    }

    fn manager(client: Arc<MockClient>) -> ImportManager {
        ImportManager::new(client, profiles(), sources())
            .with_progress(ProgressBroadcaster::quiet())
    }

    #[tokio::test]
    async fn test_end_to_end_counts_and_order() {
        let xml_dir = TempDir::new().unwrap();
        write(xml_dir.path(), "A-Weapons.xml", &weapons_xml(&["Blaster", "Axe"]));
        write(xml_dir.path(), "B-Weapons.xml", &weapons_xml(&["Rifle"]));

        let client = Arc::new(MockClient::default());
        let job = ImportJob::new("camp-1")
            .with_xml_root(xml_dir.path())
            .with_record_types(vec![RecordType::Item])
            .with_batch_size(2);

        let result = manager(Arc::clone(&client)).run(job).await.unwrap();

        let report = result.report(RecordType::Item).unwrap();
        assert_eq!(report.counts.discovered, 3);
        assert_eq!(report.counts.mapped, 3);
        assert_eq!(report.counts.uploaded, 3);
        assert_eq!(report.counts.failed_upload, 0);
        assert_eq!(report.stage, Stage::Done);
        assert!(result.finished_at.is_some());

        // Files in discovery order, records in decode order.
        assert_eq!(client.uploaded_names(), vec!["Blaster", "Axe", "Rifle"]);
    }

    #[tokio::test]
    async fn test_rejected_record_recorded_with_reason() {
        let xml_dir = TempDir::new().unwrap();
        write(xml_dir.path(), "Weapons.xml", &weapons_xml(&["Blaster"]));

        let client = Arc::new(MockClient {
            reject_with: Some("duplicate".into()),
            ..Default::default()
        });
        let job = ImportJob::new("camp-1")
            .with_xml_root(xml_dir.path())
            .with_record_types(vec![RecordType::Item]);

        let result = manager(client).run(job).await.unwrap();
        let report = result.report(RecordType::Item).unwrap();
        assert_eq!(report.counts.uploaded, 0);
        assert_eq!(report.counts.failed_upload, 1);
        assert!(report.failures.iter().any(|f| matches!(
            f,
            crate::models::FailureDetail::Upload { reason, .. } if reason == "duplicate"
        )));
    }

    #[tokio::test]
    async fn test_transport_error_fatal_for_type_only() {
        let xml_dir = TempDir::new().unwrap();
        write(xml_dir.path(), "Weapons.xml", &weapons_xml(&["Blaster"]));
        let json_dir = TempDir::new().unwrap();
        write(
            json_dir.path(),
            "troopers.json",
            r#"[{"name": "Stormtrooper", "tags": ["book:eote"]}]"#,
        );

        let client = Arc::new(MockClient {
            fail_type: Some(RecordType::Item),
            ..Default::default()
        });
        let job = ImportJob::new("camp-1")
            .with_xml_root(xml_dir.path())
            .with_json_root(json_dir.path())
            .with_record_types(vec![RecordType::Item, RecordType::Adversary]);

        let result = manager(Arc::clone(&client)).run(job).await.unwrap();

        let items = result.report(RecordType::Item).unwrap();
        assert!(items.fatal.as_deref().unwrap().contains("connection reset"));
        assert_eq!(items.counts.uploaded, 0);

        // The other record type continued unaffected.
        let npcs = result.report(RecordType::Adversary).unwrap();
        assert!(npcs.fatal.is_none());
        assert_eq!(npcs.counts.uploaded, 1);
        assert_eq!(client.uploaded_names(), vec!["Stormtrooper"]);
    }

    #[tokio::test]
    async fn test_filtered_records_never_reach_mapping() {
        let xml_dir = TempDir::new().unwrap();
        write(
            xml_dir.path(),
            "Weapons.xml",
            "<Weapons><Weapon><Name>Exotic</Name><Damage>1</Damage>\
             <Source>Far Horizons</Source></Weapon></Weapons>",
        );

        let client = Arc::new(MockClient::default());
        let job = ImportJob::new("camp-1")
            .with_xml_root(xml_dir.path())
            .with_record_types(vec![RecordType::Item])
            .with_sources(vec!["book:eote".to_string()]);

        let result = manager(Arc::clone(&client)).run(job).await.unwrap();
        let report = result.report(RecordType::Item).unwrap();
        assert_eq!(report.counts.discovered, 1);
        assert_eq!(report.counts.filtered_out, 1);
        assert_eq!(report.counts.mapped, 0);
        assert!(client.uploaded_names().is_empty());
    }

    #[tokio::test]
    async fn test_decode_error_skips_file_and_continues() {
        let xml_dir = TempDir::new().unwrap();
        write(xml_dir.path(), "A-Weapons.xml", "<Weapons><Weapon>");
        write(xml_dir.path(), "B-Weapons.xml", &weapons_xml(&["Blaster"]));

        let client = Arc::new(MockClient::default());
        let job = ImportJob::new("camp-1")
            .with_xml_root(xml_dir.path())
            .with_record_types(vec![RecordType::Item]);

        let result = manager(Arc::clone(&client)).run(job).await.unwrap();
        let report = result.report(RecordType::Item).unwrap();
        assert_eq!(report.counts.uploaded, 1);
        assert!(report.failures.iter().any(|f| matches!(
            f,
            crate::models::FailureDetail::Decode { file, .. }
                if file.to_string_lossy().contains("A-Weapons.xml")
        )));
    }

    #[tokio::test]
    async fn test_mapping_failure_recorded_and_run_continues() {
        let xml_dir = TempDir::new().unwrap();
        // Second weapon has no Name: required-field failure.
        write(
            xml_dir.path(),
            "Weapons.xml",
            "<Weapons>\
             <Weapon><Name>Blaster</Name><Damage>6</Damage>\
              <Source>Edge of the Empire Core Rulebook</Source></Weapon>\
             <Weapon><Damage>3</Damage>\
              <Source>Edge of the Empire Core Rulebook</Source></Weapon>\
             </Weapons>",
        );

        let client = Arc::new(MockClient::default());
        let job = ImportJob::new("camp-1")
            .with_xml_root(xml_dir.path())
            .with_record_types(vec![RecordType::Item]);

        let result = manager(Arc::clone(&client)).run(job).await.unwrap();
        let report = result.report(RecordType::Item).unwrap();
        assert_eq!(report.counts.mapped, 1);
        assert_eq!(report.counts.failed_mapping, 1);
        assert_eq!(report.counts.uploaded, 1);
    }

    #[tokio::test]
    async fn test_cancelled_before_start_counts_nothing() {
        let xml_dir = TempDir::new().unwrap();
        write(xml_dir.path(), "Weapons.xml", &weapons_xml(&["Blaster"]));

        let client = Arc::new(MockClient::default());
        let job = ImportJob::new("camp-1")
            .with_xml_root(xml_dir.path())
            .with_record_types(vec![RecordType::Item]);
        job.cancel_handle().cancel();

        let result = manager(Arc::clone(&client)).run(job).await.unwrap();
        let report = result.report(RecordType::Item).unwrap();
        assert_eq!(report.stage, Stage::Cancelled);
        assert_eq!(report.counts.discovered, 0);
        assert_eq!(report.counts.uploaded, 0);
        assert!(client.uploaded_names().is_empty());
    }

    #[tokio::test]
    async fn test_limit_caps_records_per_type() {
        let xml_dir = TempDir::new().unwrap();
        write(
            xml_dir.path(),
            "Weapons.xml",
            &weapons_xml(&["One", "Two", "Three", "Four"]),
        );

        let client = Arc::new(MockClient::default());
        let job = ImportJob::new("camp-1")
            .with_xml_root(xml_dir.path())
            .with_record_types(vec![RecordType::Item])
            .with_limit(2);

        let result = manager(Arc::clone(&client)).run(job).await.unwrap();
        let report = result.report(RecordType::Item).unwrap();
        assert_eq!(report.counts.uploaded, 2);
        assert_eq!(client.uploaded_names(), vec!["One", "Two"]);
    }

    #[tokio::test]
    async fn test_missing_profile_for_selected_type_is_fatal() {
        let xml_dir = TempDir::new().unwrap();
        let client = Arc::new(MockClient::default());
        let job = ImportJob::new("camp-1")
            .with_xml_root(xml_dir.path())
            .with_record_types(vec![RecordType::Vehicle]);

        let err = manager(client).run(job).await.unwrap_err();
        assert!(matches!(
            err,
            ImportError::Config(ConfigError::MissingProfile(_))
        ));
    }

    #[tokio::test]
    async fn test_unreadable_root_is_fatal() {
        let client = Arc::new(MockClient::default());
        let job = ImportJob::new("camp-1")
            .with_xml_root("/no/such/directory")
            .with_record_types(vec![RecordType::Item]);

        let err = manager(client).run(job).await.unwrap_err();
        assert!(matches!(err, ImportError::Discovery(_)));
    }

    #[tokio::test]
    async fn test_empty_campaign_rejected() {
        let client = Arc::new(MockClient::default());
        let err = manager(client)
            .run(ImportJob::new("  ").with_xml_root("/tmp"))
            .await
            .unwrap_err();
        assert!(matches!(err, ImportError::NoCampaign));
    }

    #[tokio::test]
    async fn test_progress_events_emitted_per_type() {
        let xml_dir = TempDir::new().unwrap();
        write(xml_dir.path(), "Weapons.xml", &weapons_xml(&["Blaster"]));

        let client = Arc::new(MockClient::default());
        let mgr = manager(client);
        let mut rx = mgr.progress().subscribe();

        let job = ImportJob::new("camp-1")
            .with_xml_root(xml_dir.path())
            .with_record_types(vec![RecordType::Item]);
        let _result = mgr.run(job).await.unwrap();

        let mut saw_uploading = false;
        let mut saw_done = false;
        while let Ok(event) = rx.try_recv() {
            if let crate::progress::PipelineEvent::Progress(p) = event {
                assert_eq!(p.record_type, RecordType::Item);
                if p.stage == Stage::Uploading {
                    saw_uploading = true;
                }
                if p.stage == Stage::Done {
                    saw_done = true;
                    assert_eq!(p.snapshot.counts.uploaded, 1);
                }
            }
        }
        assert!(saw_uploading);
        assert!(saw_done);
    }
}
