use crate::error::ProcessorError;
use crate::template::{TOKEN_CLOSE, TOKEN_OPEN};
use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

/// Remove every node that still carries an unresolved placeholder or ended
/// up as an empty object/array/string. Post-order, so parents emptied by the
/// removal of their children fall as well.
pub fn prune(manifest: &mut Value) {
    should_remove(manifest);
}

fn should_remove(value: &mut Value) -> bool {
    match value {
        Value::Object(map) => {
            map.retain(|_, child| !should_remove(child));
            map.is_empty()
        }
        Value::Array(items) => {
            items.retain_mut(|child| !should_remove(child));
            items.is_empty()
        }
        Value::String(text) => text.is_empty() || contains_unresolved(text),
        _ => false,
    }
}

/// A complete `{{...}}` pair marks the leaf unresolved. A dangling opener
/// with no close is literal text, matching the scanner's silent stop.
fn contains_unresolved(text: &str) -> bool {
    match text.find(TOKEN_OPEN) {
        Some(open) => text[open + TOKEN_OPEN.len()..].contains(TOKEN_CLOSE),
        None => false,
    }
}

fn reserved_tag_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\$\$_(?:oneOf|anyOf)_[0-9]+\$\$$").expect("reserved tag pattern")
    })
}

/// Delete `$$_oneOf_<n>$$` / `$$_anyOf_<n>$$` suffixes from key names.
/// A post-strip name collision is a hard error for the pair.
pub fn strip_reserved_tags(manifest: &mut Value) -> Result<(), ProcessorError> {
    match manifest {
        Value::Object(map) => {
            let mut renamed = serde_json::Map::new();
            for (key, mut child) in std::mem::take(map) {
                strip_reserved_tags(&mut child)?;
                let stripped = reserved_tag_pattern().replace(&key, "").into_owned();
                if renamed.insert(stripped.clone(), child).is_some() {
                    return Err(ProcessorError::Processing(format!(
                        "Duplicate attribute '{}' after reserved tag removal",
                        stripped
                    )));
                }
            }
            *map = renamed;
        }
        Value::Array(items) => {
            for item in items {
                strip_reserved_tags(item)?;
            }
        }
        _ => {}
    }
    Ok(())
}
