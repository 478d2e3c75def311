/// Normalize a CSV header name for lookup: surrounding whitespace is
/// insignificant and matching is case-insensitive.
pub fn normalize_header(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Reduce a manifest id to something usable as a file stem. Record ids use
/// `:` and `/` as structural separators, which are not portable in file
/// names.
pub fn sanitize_file_stem(id: &str) -> String {
    let replaced: String = id
        .trim()
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '-' || c == '.' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    replaced.trim_matches('_').to_string()
}

/// Parse a dotted version segment ("1.2.0") into a numeric tuple for
/// comparison. Returns None when any segment is non-numeric.
pub fn parse_version_tuple(segment: &str) -> Option<Vec<u64>> {
    segment
        .split('.')
        .map(|part| part.parse::<u64>().ok())
        .collect()
}
