use crate::error::ProcessorError;
use json_comments::StripComments;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// One template/CSV pairing plus its output naming, resolved by the calling
/// layer and handed to the engine as-is.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct MappingStep {
    pub template: String,
    pub csv: String,
    #[serde(default, rename = "requiredTemplate")]
    pub required_template: Option<String>,
    /// true: all manifests of the pair go into one JSON array file;
    /// false: one file per row.
    #[serde(default)]
    pub grouped: bool,
    #[serde(default, rename = "outputName")]
    pub output_name: Option<String>,
}

impl MappingStep {
    /// Stem used for grouped output files and per-row fallbacks. Defaults to
    /// the CSV file name without extension.
    pub fn output_stem(&self) -> String {
        if let Some(name) = &self.output_name {
            return name.clone();
        }
        PathBuf::from(&self.csv)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "manifest".to_string())
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct AclConfig {
    pub viewer: String,
    pub owner: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct LegalConfig {
    #[serde(rename = "legalTag")]
    pub legal_tag: String,
}

/// Optional schema-normalization section. The engine only loads and
/// normalizes the documents; validating manifests against them is the
/// destination platform's job.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct SchemaSection {
    pub path: String,
    #[serde(default, rename = "namespaceToken")]
    pub namespace_token: Option<String>,
    #[serde(default)]
    pub partition: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoadManifest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub acl: AclConfig,
    pub legal: LegalConfig,
    #[serde(default)]
    pub schema: Option<SchemaSection>,
    pub mappings: Vec<MappingStep>,
}

impl LoadManifest {
    pub fn from_file<P: Into<PathBuf>>(path: P) -> Result<Self, ProcessorError> {
        let path = path.into();
        tracing::info!("Loading load manifest from {:?}", path);
        let file = std::fs::File::open(&path)?;
        // Starter manifests ship as commented JSONC; tolerate comments on
        // every load.
        let manifest = serde_json::from_reader(StripComments::new(file))?;
        tracing::info!("Successfully loaded load manifest: {}", path.display());
        Ok(manifest)
    }

    pub fn validate(&self) -> Result<(), ProcessorError> {
        tracing::info!("Validating load manifest...");

        if self.mappings.is_empty() {
            return Err(ProcessorError::InvalidManifest(
                "Load manifest must declare at least one mapping".into(),
            ));
        }

        for (i, step) in self.mappings.iter().enumerate() {
            if step.template.is_empty() {
                return Err(ProcessorError::InvalidManifest(format!(
                    "Mapping {} is missing a template path",
                    i + 1
                )));
            }
            if step.csv.is_empty() {
                return Err(ProcessorError::InvalidManifest(format!(
                    "Mapping {} is missing a CSV path",
                    i + 1
                )));
            }
        }

        if self.acl.viewer.is_empty() || self.acl.owner.is_empty() {
            return Err(ProcessorError::InvalidManifest(
                "ACL viewer and owner principals must both be set".into(),
            ));
        }

        if self.legal.legal_tag.is_empty() {
            return Err(ProcessorError::InvalidManifest(
                "A legal tag name must be set".into(),
            ));
        }

        if let Some(schema) = &self.schema {
            if schema.namespace_token.is_some() != schema.partition.is_some() {
                return Err(ProcessorError::InvalidManifest(
                    "Schema namespaceToken and partition must be set together".into(),
                ));
            }
        }

        tracing::info!("Load manifest validation successful");
        Ok(())
    }
}
