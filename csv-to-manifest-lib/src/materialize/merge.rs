use serde_json::{Map, Value};

/// Key-name prefix marking a required-template field as optional: the field
/// documents shape but is never inserted on its own.
pub const OPTIONAL_PREFIX: &str = "optional:";

/// Merge the required-field skeleton into the manifest. Keys absent from the
/// manifest are inserted (optional-marked keys skipped); keys present in
/// both with matching JSON type recurse; existing values are never
/// overwritten. Array merge is index-aligned.
pub fn merge_required(manifest: &mut Value, required: &Value) {
    if let (Value::Object(target), Value::Object(source)) = (manifest, required) {
        merge_object(target, source);
    }
}

fn merge_object(target: &mut Map<String, Value>, source: &Map<String, Value>) {
    for (key, required_value) in source {
        let (name, optional) = match key.strip_prefix(OPTIONAL_PREFIX) {
            Some(rest) => (rest, true),
            None => (key.as_str(), false),
        };
        match target.get_mut(name) {
            None => {
                if !optional {
                    target.insert(name.to_string(), clone_without_optional(required_value));
                }
            }
            Some(existing) => merge_value(existing, required_value),
        }
    }
}

fn merge_value(existing: &mut Value, required: &Value) {
    match (existing, required) {
        (Value::Object(target), Value::Object(source)) => merge_object(target, source),
        (Value::Array(target), Value::Array(source)) => {
            for (item, required_item) in target.iter_mut().zip(source) {
                merge_value(item, required_item);
            }
        }
        // Scalars already present win; type mismatches are left alone.
        _ => {}
    }
}

/// Optional-marked keys are dropped wherever they appear in an inserted
/// shape, not just at the top level.
fn clone_without_optional(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .filter(|(key, _)| !key.starts_with(OPTIONAL_PREFIX))
                .map(|(key, child)| (key.clone(), clone_without_optional(child)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(clone_without_optional).collect()),
        other => other.clone(),
    }
}

/// Look up an existing key under either casing, falling back to the
/// canonical capitalized spelling for creation.
fn resolve_key(map: &Map<String, Value>, canonical: &str, lower: &str) -> String {
    if map.contains_key(canonical) {
        canonical.to_string()
    } else if map.contains_key(lower) {
        lower.to_string()
    } else {
        canonical.to_string()
    }
}

fn ensure_object<'a>(map: &'a mut Map<String, Value>, key: &str) -> &'a mut Map<String, Value> {
    if !map.get(key).map(Value::is_object).unwrap_or(false) {
        map.insert(key.to_string(), Value::Object(Map::new()));
    }
    map.get_mut(key)
        .and_then(Value::as_object_mut)
        .expect("just ensured object")
}

fn append_unique(map: &mut Map<String, Value>, key: &str, entry: &str) {
    if !map.get(key).map(Value::is_array).unwrap_or(false) {
        map.insert(key.to_string(), Value::Array(Vec::new()));
    }
    let values = map
        .get_mut(key)
        .and_then(Value::as_array_mut)
        .expect("just ensured array");
    if !values.iter().any(|v| v.as_str() == Some(entry)) {
        values.push(Value::String(entry.to_string()));
    }
}

/// Ensure the manifest carries an ACL block and that both principals are
/// listed exactly once. Pre-existing lower-case spellings are respected.
pub fn inject_acl(manifest: &mut Value, viewer: &str, owner: &str) {
    let root = match manifest.as_object_mut() {
        Some(root) => root,
        None => return,
    };
    let acl_key = resolve_key(root, "Acl", "acl");
    let acl = ensure_object(root, &acl_key);
    let viewers_key = resolve_key(acl, "Viewers", "viewers");
    append_unique(acl, &viewers_key, viewer);
    let owners_key = resolve_key(acl, "Owners", "owners");
    append_unique(acl, &owners_key, owner);
}

/// Ensure the manifest carries a legal block listing the configured tag.
/// The tag list key is lower-case on the destination platform.
pub fn inject_legal(manifest: &mut Value, legal_tag: &str) {
    let root = match manifest.as_object_mut() {
        Some(root) => root,
        None => return,
    };
    let legal_key = resolve_key(root, "Legal", "legal");
    let legal = ensure_object(root, &legal_key);
    append_unique(legal, "legaltags", legal_tag);
}
