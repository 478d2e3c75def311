use crate::error::ProcessorError;
use crate::utils::sanitize_file_stem;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::PathBuf;

/// Serializes manifests under one output directory. The duplicate-name
/// tracking is scoped to the instance, so independent directories never
/// share suffix state.
pub struct ManifestWriter {
    output_dir: PathBuf,
    used: HashSet<String>,
    seen: HashMap<String, usize>,
}

impl ManifestWriter {
    pub fn new<P: Into<PathBuf>>(output_dir: P) -> Self {
        Self {
            output_dir: output_dir.into(),
            used: HashSet::new(),
            seen: HashMap::new(),
        }
    }

    /// Per-row mode: one file per manifest, named after the manifest id when
    /// it survived materialization, otherwise after the caller's fallback.
    pub fn write_manifest(
        &mut self,
        manifest: &Value,
        fallback_stem: &str,
    ) -> Result<PathBuf, ProcessorError> {
        let stem = manifest
            .get("id")
            .and_then(Value::as_str)
            .map(sanitize_file_stem)
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| fallback_stem.to_string());
        self.write_value(manifest, &stem)
    }

    /// Grouped mode: every manifest of one source file in a single JSON
    /// array, in row order.
    pub fn write_grouped(
        &mut self,
        manifests: &[Value],
        stem: &str,
    ) -> Result<PathBuf, ProcessorError> {
        let group = Value::Array(manifests.to_vec());
        self.write_value(&group, stem)
    }

    fn write_value(&mut self, value: &Value, stem: &str) -> Result<PathBuf, ProcessorError> {
        let name = self.dedup(stem);
        let path = self.output_dir.join(format!("{}.json", name));

        fs::create_dir_all(&self.output_dir).map_err(|e| {
            ProcessorError::Filesystem(format!(
                "Failed to create output directory {}: {}",
                self.output_dir.display(),
                e
            ))
        })?;

        let json = serde_json::to_string_pretty(value)
            .map_err(|e| ProcessorError::Processing(format!("Failed to serialize manifest: {}", e)))?;
        fs::write(&path, json).map_err(|e| {
            ProcessorError::Filesystem(format!("Failed to write {}: {}", path.display(), e))
        })?;

        tracing::debug!("Wrote manifest file {:?}", path);
        Ok(path)
    }

    /// First use of a stem keeps the plain name; later uses get `_1`, `_2`,
    /// ... in first-seen order. Suffixed names that collide with a literal
    /// stem already written are skipped forward.
    fn dedup(&mut self, stem: &str) -> String {
        let mut count = self.seen.get(stem).copied().unwrap_or(0);
        let mut candidate = if count == 0 {
            stem.to_string()
        } else {
            format!("{}_{}", stem, count)
        };
        while self.used.contains(&candidate) {
            count += 1;
            candidate = format!("{}_{}", stem, count);
        }
        self.seen.insert(stem.to_string(), count + 1);
        self.used.insert(candidate.clone());
        candidate
    }
}
