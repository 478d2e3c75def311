mod merge;
mod prune;
mod values;

pub use merge::OPTIONAL_PREFIX;
pub use values::{Directive, TRUTHY_VALUES};

use crate::config::{AclConfig, LegalConfig};
use crate::error::{ProcessingState, ProcessorError};
use crate::mapping::ColumnBinding;
use crate::template::{Occurrence, TOKEN_CLOSE, TOKEN_OPEN};
use serde_json::Value;
use std::collections::HashMap;
use std::ops::Range;

const SUBSTITUTE_PHASE: &str = "substitute";
const MATERIALIZE_PHASE: &str = "materialize";

/// Per-pair row engine. Holds the read-only template, required skeleton and
/// bindings; produces one manifest per CSV record in a fixed order: clone,
/// substitute, prune, strip reserved tags, merge required fields, inject
/// ACL/legal metadata.
pub struct Materializer<'a> {
    template: &'a Value,
    required: Option<&'a Value>,
    occurrences: &'a HashMap<String, Vec<Occurrence>>,
    bindings: &'a HashMap<String, ColumnBinding>,
    acl: &'a AclConfig,
    legal: &'a LegalConfig,
}

impl<'a> Materializer<'a> {
    pub fn new(
        template: &'a Value,
        required: Option<&'a Value>,
        occurrences: &'a HashMap<String, Vec<Occurrence>>,
        bindings: &'a HashMap<String, ColumnBinding>,
        acl: &'a AclConfig,
        legal: &'a LegalConfig,
    ) -> Self {
        Self {
            template,
            required,
            occurrences,
            bindings,
            acl,
            legal,
        }
    }

    /// Produce the manifest for one CSV record. `row` is the 1-based data
    /// row number, used in per-row messages. Hard errors abort the pair;
    /// everything else degrades to unset-then-pruned with a warning.
    pub fn materialize(
        &self,
        record: &csv::StringRecord,
        row: usize,
        state: &mut ProcessingState,
    ) -> Result<Value, ProcessorError> {
        let mut manifest = self.template.clone();

        self.substitute(&mut manifest, record, row, state);
        prune::prune(&mut manifest);
        prune::strip_reserved_tags(&mut manifest)?;
        if let Some(required) = self.required {
            merge::merge_required(&mut manifest, required);
        }
        merge::inject_acl(&mut manifest, &self.acl.viewer, &self.acl.owner);
        merge::inject_legal(&mut manifest, &self.legal.legal_tag);

        for field in ["id", "kind"] {
            if manifest.get(field).is_none() {
                state.add_warning(
                    format!("Manifest is missing required field '{}'", field),
                    Some(MATERIALIZE_PHASE.to_string()),
                    Some(row),
                );
            }
        }

        Ok(manifest)
    }

    fn substitute(
        &self,
        manifest: &mut Value,
        record: &csv::StringRecord,
        row: usize,
        state: &mut ProcessingState,
    ) {
        // Token order is made stable so per-row messages replay identically.
        let mut tokens: Vec<&String> = self.occurrences.keys().collect();
        tokens.sort();

        for token in tokens {
            let binding = match self.bindings.get(token) {
                Some(binding) => binding,
                None => continue,
            };
            let sites = &self.occurrences[token];
            match binding {
                ColumnBinding::Scalar(column) => {
                    let cell = column.and_then(|c| record.get(c)).unwrap_or("");
                    if cell.is_empty() {
                        continue;
                    }
                    for site in sites {
                        if let Some(leaf) = navigate_mut(manifest, &site.path) {
                            substitute_leaf(leaf, token, cell, row, state);
                        }
                    }
                }
                ColumnBinding::Array { cells, .. } => {
                    let site = &sites[0];
                    let mut tuples: Vec<&Vec<usize>> = cells.keys().collect();
                    tuples.sort();
                    for tuple in tuples {
                        let cell = record.get(cells[tuple]).unwrap_or("");
                        if cell.is_empty() {
                            continue;
                        }
                        if let Some(leaf) = navigate_array_site(manifest, site, tuple) {
                            substitute_leaf(leaf, token, cell, row, state);
                        }
                    }
                }
            }
        }
    }
}

/// Follow an object-key path from `root` to the addressed node.
fn navigate_mut<'v>(root: &'v mut Value, path: &[String]) -> Option<&'v mut Value> {
    let mut node = root;
    for key in path {
        node = node.as_object_mut()?.get_mut(key)?;
    }
    Some(node)
}

/// Descend through the occurrence's frame stack for one index tuple, growing
/// each target array with exemplar clones up to the needed index.
fn navigate_array_site<'v>(
    manifest: &'v mut Value,
    site: &Occurrence,
    tuple: &[usize],
) -> Option<&'v mut Value> {
    let mut node = manifest;
    for (frame, &index) in site.frames.iter().zip(tuple) {
        node = navigate_mut(node, &frame.path)?;
        let items = node.as_array_mut()?;
        while items.len() <= index {
            items.push(frame.exemplar.clone());
        }
        node = &mut items[index];
    }
    navigate_mut(node, &site.path)
}

/// Substitute one token in one leaf. A directive leaf becomes a typed value
/// (or stays templated on soft failure); any other leaf gets the cell text
/// spliced over the placeholder.
fn substitute_leaf(
    leaf: &mut Value,
    token: &str,
    cell: &str,
    row: usize,
    state: &mut ProcessingState,
) {
    let text = match leaf {
        Value::String(text) => text,
        _ => return,
    };

    if let Some((directive, inner)) = values::leaf_directive(text) {
        if inner == token {
            match values::coerce(directive, cell) {
                Some(coerced) => *leaf = coerced,
                None => state.add_warning(
                    format!(
                        "[Column: {}, Row: {}] Could not coerce value '{}', leaving field unset",
                        token, row, cell
                    ),
                    Some(SUBSTITUTE_PHASE.to_string()),
                    Some(row),
                ),
            }
            return;
        }
    }

    if let Some(range) = find_placeholder(text, token) {
        text.replace_range(range, cell);
    }
}

/// Locate the first `{{token}}` span in the leaf, tolerating whitespace
/// inside the delimiters. Stops at an unmatched opener, like the scanner.
fn find_placeholder(text: &str, token: &str) -> Option<Range<usize>> {
    let mut offset = 0;
    while let Some(open_rel) = text[offset..].find(TOKEN_OPEN) {
        let open = offset + open_rel;
        let after = &text[open + TOKEN_OPEN.len()..];
        let close_rel = after.find(TOKEN_CLOSE)?;
        let end = open + TOKEN_OPEN.len() + close_rel + TOKEN_CLOSE.len();
        if after[..close_rel].trim() == token {
            return Some(open..end);
        }
        offset = end;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::{bind, HeaderIndex};
    use crate::template::scan_template;
    use serde_json::json;

    fn acl() -> AclConfig {
        AclConfig {
            viewer: "data.viewers@example.com".into(),
            owner: "data.owners@example.com".into(),
        }
    }

    fn legal() -> LegalConfig {
        LegalConfig {
            legal_tag: "example-legal-tag".into(),
        }
    }

    fn materialize_one(
        template: Value,
        required: Option<Value>,
        headers: &[&str],
        row: &[&str],
    ) -> (Value, ProcessingState) {
        let occurrences = scan_template(&template);
        let header = HeaderIndex::from_headers(&csv::StringRecord::from(headers.to_vec())).unwrap();
        let bindings = bind(&occurrences, &header).unwrap();
        let acl = acl();
        let legal = legal();
        let materializer = Materializer::new(
            &template,
            required.as_ref(),
            &occurrences,
            &bindings,
            &acl,
            &legal,
        );
        let mut state = ProcessingState::new();
        let manifest = materializer
            .materialize(&csv::StringRecord::from(row.to_vec()), 1, &mut state)
            .unwrap();
        (manifest, state)
    }

    fn assert_no_residual_tokens(value: &Value) {
        match value {
            Value::Object(map) => map.values().for_each(assert_no_residual_tokens),
            Value::Array(items) => items.iter().for_each(assert_no_residual_tokens),
            Value::String(text) => {
                assert!(
                    !(text.contains(TOKEN_OPEN)
                        && text[text.find(TOKEN_OPEN).unwrap()..].contains(TOKEN_CLOSE)),
                    "residual placeholder in {:?}",
                    text
                );
            }
            _ => {}
        }
    }

    #[test]
    fn substitutes_scalars_into_nested_objects() {
        let template = json!({ "id": "{{id}}", "kind": "osdu:wks:well:1.0.0", "data": { "Name": "{{name}}" } });
        let (manifest, state) =
            materialize_one(template, None, &["id", "name"], &["W-1", "Well One"]);
        assert_eq!(manifest["id"], "W-1");
        assert_eq!(manifest["data"]["Name"], "Well One");
        assert!(!state.has_warnings());
        assert_no_residual_tokens(&manifest);
    }

    #[test]
    fn coercion_directives_produce_typed_leaves() {
        let template = json!({
            "id": "{{id}}",
            "kind": "k",
            "data": {
                "Depth": "int({{depth}})",
                "Active": "bool({{active}})",
                "Spud": "datetime_YYYY-MM-DD({{spud}})"
            }
        });
        let (manifest, _) = materialize_one(
            template,
            None,
            &["id", "depth", "active", "spud"],
            &["W-1", "42", "Y", "2024-06-17"],
        );
        assert_eq!(manifest["data"]["Depth"], json!(42));
        assert_eq!(manifest["data"]["Active"], json!(true));
        assert_eq!(manifest["data"]["Spud"], json!("2024-06-17T00:00:00Z"));
    }

    #[test]
    fn falsy_boolean_cells_coerce_to_false() {
        let template = json!({ "id": "{{id}}", "kind": "k", "data": { "Active": "bool({{active}})" } });
        let (manifest, _) = materialize_one(template, None, &["id", "active"], &["W-1", "no"]);
        assert_eq!(manifest["data"]["Active"], json!(false));
    }

    #[test]
    fn unparsable_numeric_cell_is_pruned_with_a_warning() {
        let template = json!({ "id": "{{id}}", "kind": "k", "data": { "Depth": "int({{depth}})" } });
        let (manifest, state) =
            materialize_one(template, None, &["id", "depth"], &["W-1", "deep"]);
        assert!(manifest["data"].get("Depth").is_none());
        assert!(state.has_warnings());
        assert_eq!(state.get_warnings()[0].row, Some(1));
    }

    #[test]
    fn exemplar_array_replicates_in_index_order() {
        let template = json!({
            "id": "{{id}}",
            "kind": "k",
            "data": { "NameAliases": [ { "AliasName": "{{alias}}" } ] }
        });
        let (manifest, _) = materialize_one(
            template,
            None,
            &["id", "alias_1", "alias_2"],
            &["W-1", "First", "Second"],
        );
        assert_eq!(
            manifest["data"]["NameAliases"],
            json!([{ "AliasName": "First" }, { "AliasName": "Second" }])
        );
    }

    #[test]
    fn sparse_array_cells_prune_their_elements() {
        let template = json!({
            "id": "{{id}}",
            "kind": "k",
            "data": { "NameAliases": [ { "AliasName": "{{alias}}" } ] }
        });
        let (manifest, _) = materialize_one(
            template,
            None,
            &["id", "alias_1", "alias_2", "alias_3"],
            &["W-1", "First", "", "Third"],
        );
        // The middle element lost its only field and fell to pruning.
        assert_eq!(
            manifest["data"]["NameAliases"],
            json!([{ "AliasName": "First" }, { "AliasName": "Third" }])
        );
    }

    #[test]
    fn empty_cells_prune_whole_branches() {
        let template = json!({
            "id": "{{id}}",
            "kind": "k",
            "data": { "Location": { "Lat": "{{lat}}", "Lon": "{{lon}}" } }
        });
        let (manifest, _) =
            materialize_one(template, None, &["id", "lat", "lon"], &["W-1", "", ""]);
        assert!(manifest["data"].get("Location").is_none());
    }

    #[test]
    fn required_fields_merge_without_overwriting() {
        let template = json!({ "id": "{{id}}", "data": { "Name": "{{name}}" } });
        let required = json!({
            "kind": "osdu:wks:master-data--Well:1.0.0",
            "data": { "Name": "Default Name", "Source": "csv-loader" }
        });
        let (manifest, _) = materialize_one(
            template,
            Some(required),
            &["id", "name"],
            &["W-1", "Well One"],
        );
        assert_eq!(manifest["data"]["Name"], "Well One");
        assert_eq!(manifest["data"]["Source"], "csv-loader");
        assert_eq!(manifest["kind"], "osdu:wks:master-data--Well:1.0.0");
    }

    #[test]
    fn acl_and_legal_are_always_injected() {
        let template = json!({ "id": "{{id}}", "kind": "k" });
        let (manifest, _) = materialize_one(template, None, &["id"], &["W-1"]);
        assert_eq!(
            manifest["Acl"]["Viewers"],
            json!(["data.viewers@example.com"])
        );
        assert_eq!(manifest["Acl"]["Owners"], json!(["data.owners@example.com"]));
        assert_eq!(manifest["Legal"]["legaltags"], json!(["example-legal-tag"]));
    }

    #[test]
    fn missing_id_is_reported_not_fatal() {
        let template = json!({ "id": "{{id}}", "kind": "k" });
        let (manifest, state) = materialize_one(template, None, &["id"], &[""]);
        assert!(manifest.get("id").is_none());
        assert!(state
            .get_warnings()
            .iter()
            .any(|w| w.message.contains("'id'")));
    }

    #[test]
    fn repeated_runs_are_structurally_identical() {
        let template = json!({
            "id": "{{id}}",
            "kind": "k",
            "data": {
                "Name": "{{name}}",
                "Depth": "float({{depth}})",
                "Aliases": [ { "Alias": "{{alias}}" } ]
            }
        });
        let headers = ["id", "name", "depth", "alias_1", "alias_2"];
        let row = ["W-1", "Well One", "123.5", "A", "B"];
        let (first, _) = materialize_one(template.clone(), None, &headers, &row);
        let (second, _) = materialize_one(template, None, &headers, &row);
        assert_eq!(first, second);
    }

    #[test]
    fn mixed_text_leaf_splices_cell_values() {
        let template = json!({ "id": "{{id}}", "kind": "k", "data": { "Label": "{{name}} ({{id}})" } });
        let (manifest, _) =
            materialize_one(template, None, &["id", "name"], &["W-1", "Well One"]);
        assert_eq!(manifest["data"]["Label"], "Well One (W-1)");
    }
}
