use crate::error::ProcessorError;
use serde_json::Value;
use std::collections::HashMap;
use std::path::PathBuf;

pub const TOKEN_OPEN: &str = "{{";
pub const TOKEN_CLOSE: &str = "}}";

/// One length-one template array acting as the exemplar for index-driven
/// replication. The exemplar is a value snapshot taken at scan time, never a
/// reference into the live template tree.
#[derive(Debug, Clone)]
pub struct ArrayFrame {
    pub exemplar: Value,
    /// Object-key path to the array, relative to the enclosing frame (or the
    /// template root for the outermost frame).
    pub path: Vec<String>,
}

/// One concrete template location where a placeholder must be substituted.
#[derive(Debug, Clone)]
pub struct Occurrence {
    pub token: String,
    /// Path to the string leaf, relative to the innermost frame (or root).
    pub path: Vec<String>,
    /// Enclosing array-root frames, outermost first. Empty for scalars.
    pub frames: Vec<ArrayFrame>,
}

impl Occurrence {
    pub fn depth(&self) -> usize {
        self.frames.len()
    }
}

pub fn load_template<P: Into<PathBuf>>(path: P) -> Result<Value, ProcessorError> {
    let path = path.into();
    tracing::debug!("Loading template from {:?}", path);
    let file = std::fs::File::open(&path)?;
    let template = serde_json::from_reader(file)?;
    Ok(template)
}

/// Discover every `{{name}}` placeholder in the template, keyed by token
/// name. One leaf may contribute several occurrences, of the same or
/// different tokens.
pub fn scan_template(template: &Value) -> HashMap<String, Vec<Occurrence>> {
    let mut occurrences: HashMap<String, Vec<Occurrence>> = HashMap::new();
    let mut path = Vec::new();
    let mut frames = Vec::new();
    walk(template, &mut path, &mut frames, &mut occurrences);
    occurrences
}

fn walk(
    node: &Value,
    path: &mut Vec<String>,
    frames: &mut Vec<ArrayFrame>,
    occurrences: &mut HashMap<String, Vec<Occurrence>>,
) {
    match node {
        Value::Object(map) => {
            for (key, child) in map {
                path.push(key.clone());
                walk(child, path, frames, occurrences);
                path.pop();
            }
        }
        Value::Array(items) if items.len() == 1 => {
            frames.push(ArrayFrame {
                exemplar: items[0].clone(),
                path: path.clone(),
            });
            // Paths inside the frame are relative to the exemplar element.
            let saved = std::mem::take(path);
            walk(&items[0], path, frames, occurrences);
            *path = saved;
            frames.pop();
        }
        // Authoring convention: only a single exemplar element carries
        // parameters. Longer or empty arrays are literal values.
        Value::Array(_) => {}
        Value::String(text) => {
            for token in scan_leaf(text) {
                occurrences.entry(token.clone()).or_default().push(Occurrence {
                    token,
                    path: path.clone(),
                    frames: frames.clone(),
                });
            }
        }
        _ => {}
    }
}

/// Left-to-right scan of one string leaf. Scanning resumes after each
/// closing delimiter; an opening delimiter with no close ends the scan of
/// the leaf.
fn scan_leaf(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut rest = text;
    while let Some(open) = rest.find(TOKEN_OPEN) {
        let after = &rest[open + TOKEN_OPEN.len()..];
        match after.find(TOKEN_CLOSE) {
            Some(close) => {
                tokens.push(after[..close].trim().to_string());
                rest = &after[close + TOKEN_CLOSE.len()..];
            }
            None => break,
        }
    }
    tokens
}
