use crate::template::{TOKEN_CLOSE, TOKEN_OPEN};
use serde_json::Value;

/// Truthy spellings accepted by `bool(...)` directives, case-insensitive.
pub const TRUTHY_VALUES: [&str; 5] = ["true", "yes", "y", "t", "1"];

pub const DATE_FORMAT_ISO: &str = "%Y-%m-%d";
pub const DATE_FORMAT_US: &str = "%m/%d/%Y";

/// Typed coercion directives a template leaf may wrap around a placeholder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Directive {
    Int,
    Float,
    Bool,
    /// `datetime_YYYY-MM-DD(...)`, re-emitted as `yyyy-MM-ddTHH:mm:ssZ`.
    DateIso,
    /// `datetime_MM/DD/YYYY(...)`, re-emitted with fraction and offset.
    DateUs,
}

const DIRECTIVE_PREFIXES: [(&str, Directive); 5] = [
    ("int(", Directive::Int),
    ("float(", Directive::Float),
    ("bool(", Directive::Bool),
    ("datetime_YYYY-MM-DD(", Directive::DateIso),
    ("datetime_MM/DD/YYYY(", Directive::DateUs),
];

/// Detect a coercion directive. Only fires when the whole leaf is exactly
/// `directive({{token}})` with a single placeholder inside; returns the
/// directive and the wrapped token name.
pub fn leaf_directive(text: &str) -> Option<(Directive, String)> {
    for (prefix, directive) in DIRECTIVE_PREFIXES {
        let inner = match text.strip_prefix(prefix).and_then(|r| r.strip_suffix(')')) {
            Some(inner) => inner,
            None => continue,
        };
        let name = inner
            .strip_prefix(TOKEN_OPEN)
            .and_then(|r| r.strip_suffix(TOKEN_CLOSE))?;
        if name.contains(TOKEN_OPEN) || name.contains(TOKEN_CLOSE) {
            return None;
        }
        return Some((directive, name.trim().to_string()));
    }
    None
}

/// Apply a directive to one cell value. `None` is the soft-failure path: the
/// templated leaf stays as-is and later falls to pruning.
pub fn coerce(directive: Directive, cell: &str) -> Option<Value> {
    let trimmed = cell.trim();
    match directive {
        Directive::Int => trimmed
            .parse::<i64>()
            .ok()
            .map(|n| Value::Number(serde_json::Number::from(n))),
        Directive::Float => trimmed
            .parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number),
        Directive::Bool => {
            let lowered = trimmed.to_lowercase();
            Some(Value::Bool(
                TRUTHY_VALUES.iter().any(|candidate| *candidate == lowered),
            ))
        }
        Directive::DateIso => chrono::NaiveDate::parse_from_str(trimmed, DATE_FORMAT_ISO)
            .ok()
            .map(|date| Value::String(format!("{}T00:00:00Z", date.format(DATE_FORMAT_ISO)))),
        Directive::DateUs => chrono::NaiveDate::parse_from_str(trimmed, DATE_FORMAT_US)
            .ok()
            .and_then(|date| date.and_hms_opt(0, 0, 0))
            .map(|datetime| {
                Value::String(format!(
                    "{}+00:00",
                    datetime.format("%Y-%m-%dT%H:%M:%S%.3f")
                ))
            }),
    }
}
