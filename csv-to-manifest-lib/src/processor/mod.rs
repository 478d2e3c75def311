use crate::config::{LoadManifest, MappingStep};
use crate::error::{ProcessingState, ProcessorError};
use crate::mapping::{bind, HeaderIndex};
use crate::materialize::Materializer;
use crate::progress::{MappingSummary, Phase, ProgressReporter, TracingReporter};
use crate::schema::{SchemaDocument, SchemaResolver};
use crate::template::{load_template, scan_template};
use crate::writer::ManifestWriter;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Summaries are bounded so one pathological file cannot flood the caller.
const MAX_SUMMARY_MESSAGES: usize = 10;
const ROWS_PER_PROGRESS_EVENT: usize = 100;

/// Result of one engine run over a whole load manifest.
#[derive(Debug)]
pub struct BatchSummary {
    pub run_id: String,
    pub mappings: Vec<MappingSummary>,
    pub cancelled: bool,
    pub succeeded: bool,
}

/// Drives every mapping of a load manifest: template scan, column binding,
/// row materialization and output. Pair-level failures stop only their own
/// mapping; siblings keep running.
pub struct Processor {
    load_manifest: Arc<LoadManifest>,
    base_path: PathBuf,
    output_path: PathBuf,
    reporter: Arc<dyn ProgressReporter>,
    cancel: Arc<AtomicBool>,
    schemas: Vec<SchemaDocument>,
}

impl Processor {
    pub fn with_base_path<P: Into<PathBuf>>(
        load_manifest: LoadManifest,
        base_path: P,
        output_path: P,
    ) -> Self {
        let base_path = base_path.into();
        tracing::info!("Creating processor with base path: {:?}", base_path);
        Self {
            load_manifest: Arc::new(load_manifest),
            base_path,
            output_path: output_path.into(),
            reporter: Arc::new(TracingReporter),
            cancel: Arc::new(AtomicBool::new(false)),
            schemas: Vec::new(),
        }
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    /// Cooperative cancellation: set the flag and the processor stops
    /// between rows or mappings, leaving already-written manifests in place.
    pub fn cancellation_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    /// Normalized schema documents loaded during the last run, for
    /// downstream validation use.
    pub fn schemas(&self) -> &[SchemaDocument] {
        &self.schemas
    }

    fn resolve_path(&self, relative_path: &str) -> PathBuf {
        self.base_path.join(relative_path)
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }

    pub async fn process(&mut self) -> Result<BatchSummary, ProcessorError> {
        let run_id = uuid::Uuid::new_v4().to_string();
        tracing::info!(
            "Starting run {} with load manifest: {}",
            run_id,
            self.load_manifest.name
        );

        if let Some(section) = &self.load_manifest.schema {
            let resolver = SchemaResolver::new(
                self.resolve_path(&section.path),
                section.namespace_token.clone(),
                section.partition.clone(),
            );
            self.schemas = resolver.load()?;
        }

        // One writer per output directory: duplicate-name suffixes stay
        // deterministic across every mapping that targets it.
        let mut writer = ManifestWriter::new(&self.output_path);
        let manifest = Arc::clone(&self.load_manifest);
        let mut summaries = Vec::with_capacity(manifest.mappings.len());
        let mut cancelled = false;

        for step in &manifest.mappings {
            if self.is_cancelled() {
                tracing::warn!("Run {} cancelled; skipping remaining mappings", run_id);
                cancelled = true;
                break;
            }
            let label = step.csv.clone();
            let summary = match self.process_mapping(step, &mut writer) {
                Ok(summary) => summary,
                // Output-side filesystem trouble ends the run; nothing else
                // a sibling mapping does can succeed either.
                Err(e @ ProcessorError::Filesystem(_)) => return Err(e),
                Err(e) => {
                    let mut state = ProcessingState::new();
                    state.add_error(e.to_string(), None, None);
                    MappingSummary {
                        mapping: label,
                        rows_processed: 0,
                        manifests_written: 0,
                        warning_count: 0,
                        messages: state.get_errors().to_vec(),
                        succeeded: false,
                    }
                }
            };
            self.reporter.mapping_finished(&summary);
            summaries.push(summary);
        }

        let succeeded = summaries.iter().all(|s| s.succeeded);
        tracing::info!(
            "Run {} finished: {}/{} mappings succeeded",
            run_id,
            summaries.iter().filter(|s| s.succeeded).count(),
            summaries.len()
        );

        Ok(BatchSummary {
            run_id,
            mappings: summaries,
            cancelled,
            succeeded,
        })
    }

    fn process_mapping(
        &self,
        step: &MappingStep,
        writer: &mut ManifestWriter,
    ) -> Result<MappingSummary, ProcessorError> {
        let label = step.csv.as_str();
        tracing::info!("Processing mapping: {} -> {}", step.template, step.csv);

        self.reporter.phase_started(label, Phase::Parse);
        let template = load_template(self.resolve_path(&step.template))?;
        let required = step
            .required_template
            .as_deref()
            .map(|path| load_template(self.resolve_path(path)))
            .transpose()?;
        let occurrences = scan_template(&template);
        tracing::debug!("Found {} distinct tokens in template", occurrences.len());

        self.reporter.phase_started(label, Phase::Bind);
        let csv_path = self.resolve_path(&step.csv);
        let mut reader = csv::Reader::from_path(&csv_path).map_err(|e| {
            ProcessorError::Processing(format!("Failed to read CSV {}: {}", csv_path.display(), e))
        })?;
        let header = HeaderIndex::from_headers(reader.headers()?)?;
        let bindings = bind(&occurrences, &header)?;

        self.reporter.phase_started(label, Phase::Materialize);
        let materializer = Materializer::new(
            &template,
            required.as_ref(),
            &occurrences,
            &bindings,
            &self.load_manifest.acl,
            &self.load_manifest.legal,
        );

        let stem = step.output_stem();
        let mut state = ProcessingState::new();
        let mut grouped: Vec<Value> = Vec::new();
        let mut rows_processed = 0usize;
        let mut manifests_written = 0usize;

        for (i, result) in reader.records().enumerate() {
            let row = i + 1;
            if self.is_cancelled() {
                tracing::warn!("[{}] cancelled at row {}; keeping partial output", label, row);
                break;
            }
            let record = result?;

            let reported = state.get_warnings().len();
            let manifest = materializer.materialize(&record, row, &mut state)?;
            for message in &state.get_warnings()[reported..] {
                self.reporter.row_message(label, message);
            }

            if step.grouped {
                grouped.push(manifest);
            } else {
                writer.write_manifest(&manifest, &format!("{}_row{}", stem, row))?;
                manifests_written += 1;
            }
            rows_processed += 1;
            if rows_processed % ROWS_PER_PROGRESS_EVENT == 0 {
                self.reporter.rows_processed(label, rows_processed);
            }
        }
        self.reporter.rows_processed(label, rows_processed);

        if step.grouped && !grouped.is_empty() {
            self.reporter.phase_started(label, Phase::Write);
            manifests_written = grouped.len();
            writer.write_grouped(&grouped, &stem)?;
        }

        let mut messages: Vec<_> = state.get_errors().to_vec();
        messages.extend(state.get_warnings().iter().cloned());
        messages.truncate(MAX_SUMMARY_MESSAGES);

        Ok(MappingSummary {
            mapping: label.to_string(),
            rows_processed,
            manifests_written,
            warning_count: state.get_warnings().len(),
            messages,
            succeeded: true,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AclConfig, LegalConfig};
    use serde_json::json;
    use std::fs;
    use std::path::Path;

    fn write_file(dir: &Path, name: &str, content: &str) {
        fs::write(dir.join(name), content).unwrap();
    }

    fn load_manifest(mappings: Vec<MappingStep>) -> LoadManifest {
        LoadManifest {
            name: "test".into(),
            description: String::new(),
            acl: AclConfig {
                viewer: "v@example.com".into(),
                owner: "o@example.com".into(),
            },
            legal: LegalConfig {
                legal_tag: "tag".into(),
            },
            schema: None,
            mappings,
        }
    }

    fn step(template: &str, csv: &str) -> MappingStep {
        MappingStep {
            template: template.into(),
            csv: csv.into(),
            required_template: None,
            grouped: false,
            output_name: None,
        }
    }

    #[tokio::test]
    async fn processes_rows_into_per_row_manifests() {
        let base = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        write_file(
            base.path(),
            "well.json",
            r#"{ "id": "{{id}}", "kind": "osdu:wks:well:1.0.0", "data": { "Name": "{{name}}" } }"#,
        );
        write_file(base.path(), "wells.csv", "id,name\nW-1,Well One\nW-2,Well Two\n");

        let mut processor = Processor::with_base_path(
            load_manifest(vec![step("well.json", "wells.csv")]),
            base.path(),
            out.path(),
        );
        let summary = processor.process().await.unwrap();

        assert!(summary.succeeded);
        assert_eq!(summary.mappings[0].rows_processed, 2);
        assert_eq!(summary.mappings[0].manifests_written, 2);

        let manifest: Value =
            serde_json::from_str(&fs::read_to_string(out.path().join("W-1.json")).unwrap())
                .unwrap();
        assert_eq!(manifest["data"]["Name"], "Well One");
        assert_eq!(manifest["Acl"]["Viewers"], json!(["v@example.com"]));
        assert_eq!(manifest["Legal"]["legaltags"], json!(["tag"]));
    }

    #[tokio::test]
    async fn grouped_mapping_writes_one_array_file() {
        let base = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        write_file(base.path(), "well.json", r#"{ "id": "{{id}}", "kind": "k" }"#);
        write_file(base.path(), "wells.csv", "id\nW-1\nW-2\n");

        let mut grouped_step = step("well.json", "wells.csv");
        grouped_step.grouped = true;
        grouped_step.output_name = Some("wells-batch".into());

        let mut processor = Processor::with_base_path(
            load_manifest(vec![grouped_step]),
            base.path(),
            out.path(),
        );
        let summary = processor.process().await.unwrap();
        assert_eq!(summary.mappings[0].manifests_written, 2);

        let group: Value =
            serde_json::from_str(&fs::read_to_string(out.path().join("wells-batch.json")).unwrap())
                .unwrap();
        assert_eq!(group.as_array().unwrap().len(), 2);
        assert_eq!(group[0]["id"], "W-1");
        assert_eq!(group[1]["id"], "W-2");
    }

    #[tokio::test]
    async fn failing_mapping_leaves_siblings_running() {
        let base = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        write_file(base.path(), "well.json", r#"{ "id": "{{id}}", "kind": "k" }"#);
        // Duplicate header column: pair-aborting.
        write_file(base.path(), "bad.csv", "id,id\nW-1,W-2\n");
        write_file(base.path(), "good.csv", "id\nW-3\n");

        let mut processor = Processor::with_base_path(
            load_manifest(vec![
                step("well.json", "bad.csv"),
                step("well.json", "good.csv"),
            ]),
            base.path(),
            out.path(),
        );
        let summary = processor.process().await.unwrap();

        assert!(!summary.succeeded);
        assert!(!summary.mappings[0].succeeded);
        assert!(summary.mappings[0].messages[0]
            .message
            .contains("Duplicate column"));
        assert!(summary.mappings[1].succeeded);
        assert!(out.path().join("W-3.json").exists());
    }

    #[tokio::test]
    async fn missing_csv_fails_only_its_mapping() {
        let base = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        write_file(base.path(), "well.json", r#"{ "id": "{{id}}", "kind": "k" }"#);

        let mut processor = Processor::with_base_path(
            load_manifest(vec![step("well.json", "absent.csv")]),
            base.path(),
            out.path(),
        );
        let summary = processor.process().await.unwrap();
        assert!(!summary.succeeded);
        assert_eq!(summary.mappings.len(), 1);
    }

    #[tokio::test]
    async fn cancellation_before_run_skips_all_mappings() {
        let base = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        write_file(base.path(), "well.json", r#"{ "id": "{{id}}", "kind": "k" }"#);
        write_file(base.path(), "wells.csv", "id\nW-1\n");

        let mut processor = Processor::with_base_path(
            load_manifest(vec![step("well.json", "wells.csv")]),
            base.path(),
            out.path(),
        );
        processor.cancellation_flag().store(true, Ordering::Relaxed);
        let summary = processor.process().await.unwrap();

        assert!(summary.cancelled);
        assert!(summary.mappings.is_empty());
        assert!(!out.path().join("W-1.json").exists());
    }

    #[derive(Default)]
    struct CollectingReporter {
        events: std::sync::Mutex<Vec<String>>,
    }

    impl ProgressReporter for CollectingReporter {
        fn phase_started(&self, _mapping: &str, phase: Phase) {
            self.events.lock().unwrap().push(format!("phase:{}", phase));
        }

        fn rows_processed(&self, _mapping: &str, rows: usize) {
            self.events.lock().unwrap().push(format!("rows:{}", rows));
        }

        fn row_message(&self, _mapping: &str, message: &crate::error::ProcessingMessage) {
            self.events
                .lock()
                .unwrap()
                .push(format!("row-message:{}", message.row.unwrap_or(0)));
        }

        fn mapping_finished(&self, summary: &MappingSummary) {
            self.events
                .lock()
                .unwrap()
                .push(format!("finished:{}", summary.succeeded));
        }
    }

    #[tokio::test]
    async fn reporter_receives_checkpoints_and_row_messages() {
        let base = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        write_file(
            base.path(),
            "well.json",
            r#"{ "id": "{{id}}", "kind": "k", "data": { "Depth": "int({{depth}})" } }"#,
        );
        write_file(base.path(), "wells.csv", "id,depth\nW-1,not-a-number\n");

        let reporter = Arc::new(CollectingReporter::default());
        let mut processor = Processor::with_base_path(
            load_manifest(vec![step("well.json", "wells.csv")]),
            base.path(),
            out.path(),
        )
        .with_reporter(reporter.clone());
        processor.process().await.unwrap();

        let events = reporter.events.lock().unwrap();
        assert!(events.contains(&"phase:parse".to_string()));
        assert!(events.contains(&"phase:bind".to_string()));
        assert!(events.contains(&"phase:materialize".to_string()));
        assert!(events.contains(&"row-message:1".to_string()));
        assert!(events.contains(&"finished:true".to_string()));
    }

    #[tokio::test]
    async fn schema_section_is_loaded_and_normalized() {
        let base = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let schema_dir = base.path().join("schemas");
        fs::create_dir_all(&schema_dir).unwrap();
        write_file(
            &schema_dir,
            "well.json",
            r#"{ "$id": "{{NS}}/well/1.0.0" }"#,
        );
        write_file(base.path(), "well.json", r#"{ "id": "{{id}}", "kind": "k" }"#);
        write_file(base.path(), "wells.csv", "id\nW-1\n");

        let mut manifest = load_manifest(vec![step("well.json", "wells.csv")]);
        manifest.schema = Some(crate::config::SchemaSection {
            path: "schemas".into(),
            namespace_token: Some("{{NS}}".into()),
            partition: Some("opendes".into()),
        });

        let mut processor = Processor::with_base_path(manifest, base.path(), out.path());
        processor.process().await.unwrap();
        assert_eq!(processor.schemas().len(), 1);
        assert_eq!(
            processor.schemas()[0].id.as_deref(),
            Some("opendes/well/1.0.0")
        );
    }
}
