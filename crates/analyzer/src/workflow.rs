//! Extraction workflow
//!
//! Walks the configured source root and runs the per-file pipeline:
//! clean → structural parse → per-object signature parse + call extraction
//! → store. Files whose content hash is unchanged are skipped unless
//! force-reprocessed. No error escapes a file boundary; failures downgrade
//! to logged skips and counters, and a partial file never stays committed
//! (its record is removed so the next run reprocesses it from scratch).

use crate::calls::CallExtractor;
use crate::cleaner::clean;
use crate::config::AnalyzerConfig;
use crate::files;
use crate::signature;
use crate::store::ObjectStore;
use crate::structure::StructuralParser;
use crate::AnalyzerError;
use oradep_core::CodeObject;
use std::path::Path;
use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

/// Counters for one extraction run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ExtractionStats {
    pub files_processed: usize,
    pub files_skipped_unchanged: usize,
    pub files_failed_hash: usize,
    pub files_failed_read: usize,
    pub objects_extracted: usize,
    pub objects_failed_signature: usize,
    pub objects_skipped_invalid_span: usize,
    pub objects_failed_store: usize,
}

/// Drives extraction over a source tree into an object store.
pub struct ExtractionWorkflow<'a> {
    config: &'a AnalyzerConfig,
    store: ObjectStore,
    extractor: CallExtractor,
    stats: ExtractionStats,
}

impl<'a> ExtractionWorkflow<'a> {
    pub fn new(config: &'a AnalyzerConfig, store: ObjectStore) -> Self {
        let extractor = CallExtractor::new(
            &config.call_keywords_to_drop,
            config.allow_parameterless_calls,
            config.strict_lpar_only_calls,
        );
        ExtractionWorkflow {
            config,
            store,
            extractor,
            stats: ExtractionStats::default(),
        }
    }

    /// Run the workflow. Returns the counters; individual file failures are
    /// logged, not propagated.
    pub fn run(&mut self) -> Result<ExtractionStats, AnalyzerError> {
        info!(root = %self.config.source_root.display(), "starting extraction workflow");

        for stored_path in &self.config.clear_history_for_file {
            if let Err(e) = self.store.remove_file_record(stored_path) {
                error!(file = stored_path.as_str(), error = %e, "failed to clear history");
            }
        }

        if !self.config.source_root.is_dir() {
            return Err(AnalyzerError::Config(format!(
                "source root is not a directory: {}",
                self.config.source_root.display()
            )));
        }

        let mut entries: Vec<_> = WalkDir::new(&self.config.source_root)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| e.into_path())
            .filter(|p| self.has_configured_extension(p))
            .collect();
        entries.sort();

        if entries.is_empty() {
            warn!("no files found to process");
        }
        for path in entries {
            self.process_file(&path);
        }

        self.log_summary();
        Ok(self.stats.clone())
    }

    fn has_configured_extension(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .is_some_and(|e| self.config.file_extensions.contains(&e))
    }

    fn process_file(&mut self, path: &Path) {
        info!(file = %path.display(), "processing file");
        let relative = path
            .strip_prefix(&self.config.source_root)
            .unwrap_or(path)
            .to_path_buf();
        let stored_path =
            files::processed_path(&relative, &self.config.exclude_from_processed_path);

        let hash = match files::compute_file_hash(path) {
            Ok(h) => h,
            Err(e) => {
                warn!(file = %path.display(), error = %e, "hashing failed, skipping file");
                self.stats.files_failed_hash += 1;
                return;
            }
        };

        match self.store.file_hash(&stored_path) {
            Ok(Some(stored)) if stored == hash && !self.config.force_reprocess.contains(&stored_path) => {
                info!(file = stored_path.as_str(), "unchanged, skipping");
                self.stats.files_skipped_unchanged += 1;
                return;
            }
            Ok(_) => {}
            Err(e) => {
                error!(file = stored_path.as_str(), error = %e, "hash lookup failed, skipping file");
                self.stats.files_failed_hash += 1;
                return;
            }
        }

        let raw = match std::fs::read(path) {
            Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
            Err(e) => {
                error!(file = %path.display(), error = %e, "read failed, skipping file");
                self.stats.files_failed_read += 1;
                return;
            }
        };

        let (cleaned, literal_map) = clean(&raw);
        let outcome = StructuralParser::new().parse(&cleaned);
        let package_name = files::derive_package_name(
            outcome.package_name.as_deref(),
            &relative,
            &self.config.file_extensions,
            &self.config.exclude_for_package_derivation,
        );
        info!(
            file = stored_path.as_str(),
            package = package_name.as_str(),
            objects = outcome.objects.values().map(Vec::len).sum::<usize>(),
            "structural parse complete"
        );

        if let Err(e) = self.store.update_file_hash(&stored_path, &hash) {
            error!(file = stored_path.as_str(), error = %e, "hash update failed, skipping file");
            return;
        }

        let code_lines: Vec<&str> = cleaned.split('\n').collect();
        let mut file_had_store_error = false;

        for (key, spans) in &outcome.objects {
            let overloaded = spans.len() > 1;
            for span in spans {
                let Some(end_line) = span.end_line else {
                    warn!(object = key.as_str(), start = span.start_line, "object never closed, skipping");
                    self.stats.objects_skipped_invalid_span += 1;
                    continue;
                };
                if span.start_line < 1 || end_line < span.start_line || end_line > code_lines.len()
                {
                    error!(
                        object = key.as_str(),
                        start = span.start_line,
                        end = end_line,
                        "invalid line span, skipping"
                    );
                    self.stats.objects_skipped_invalid_span += 1;
                    continue;
                }
                let snippet = code_lines[span.start_line - 1..end_line].join("\n");

                let sig = signature::parse(&snippet);
                if sig.is_none() {
                    warn!(
                        object = key.as_str(),
                        line = span.start_line,
                        "signature parsing failed, recording object without parameters"
                    );
                    self.stats.objects_failed_signature += 1;
                }
                let name = sig
                    .as_ref()
                    .map(|s| s.name.clone())
                    .unwrap_or_else(|| key.clone());

                let calls = self.extractor.extract(&snippet, &literal_map);
                debug!(object = name.as_str(), calls = calls.len(), "calls extracted");

                let mut object = CodeObject::new(&name, &package_name, span.kind);
                object.overloaded = overloaded;
                if let Some(sig) = sig {
                    object.parameters = sig.parameters;
                    object.return_type = sig.return_type;
                }
                object.clean_code = Some(cleaned.clone());
                object.literal_map = literal_map.clone();
                object.calls = calls;
                object.start_line = span.start_line;
                object.end_line = end_line;
                object.generate_id();

                match self.store.add_object(&object, &stored_path) {
                    Ok(()) => {
                        info!(id = object.id.as_str(), "object extracted and stored");
                        self.stats.objects_extracted += 1;
                    }
                    Err(e) => {
                        error!(id = object.id.as_str(), error = %e, "store write failed");
                        self.stats.objects_failed_store += 1;
                        file_had_store_error = true;
                    }
                }
            }
        }

        if file_had_store_error {
            warn!(
                file = stored_path.as_str(),
                "removing file record after store errors so the next run retries it"
            );
            if let Err(e) = self.store.remove_file_record(&stored_path) {
                error!(file = stored_path.as_str(), error = %e, "failed to remove file record");
            }
        }
        self.stats.files_processed += 1;
    }

    fn log_summary(&self) {
        let s = &self.stats;
        info!(
            files_processed = s.files_processed,
            files_skipped_unchanged = s.files_skipped_unchanged,
            files_failed_hash = s.files_failed_hash,
            files_failed_read = s.files_failed_read,
            objects_extracted = s.objects_extracted,
            objects_failed_signature = s.objects_failed_signature,
            objects_skipped_invalid_span = s.objects_skipped_invalid_span,
            objects_failed_store = s.objects_failed_store,
            "extraction summary"
        );
    }

    /// Hand the store back once the run is done.
    pub fn into_store(self) -> ObjectStore {
        self.store
    }
}
