use crate::error::ProcessorError;
use crate::template::Occurrence;
use crate::utils::normalize_header;
use regex::Regex;
use std::collections::HashMap;

/// Normalized CSV header lookup. Duplicate names after normalization abort
/// the whole template/CSV pair.
#[derive(Debug)]
pub struct HeaderIndex {
    columns: HashMap<String, usize>,
    raw: Vec<String>,
}

impl HeaderIndex {
    pub fn from_headers(headers: &csv::StringRecord) -> Result<Self, ProcessorError> {
        let mut columns = HashMap::new();
        let mut raw = Vec::new();
        for (i, header) in headers.iter().enumerate() {
            let normalized = normalize_header(header);
            if columns.insert(normalized, i).is_some() {
                return Err(ProcessorError::Mapping(format!(
                    "Duplicate column '{}' in CSV header",
                    header.trim()
                )));
            }
            raw.push(header.to_string());
        }
        Ok(Self { columns, raw })
    }

    pub fn get(&self, name: &str) -> Option<usize> {
        self.columns.get(&normalize_header(name)).copied()
    }

    pub fn raw(&self) -> &[String] {
        &self.raw
    }
}

/// Resolution of one token against the header: a single column, or an
/// index-tuple grid of columns for array parameters.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnBinding {
    /// None when the column is absent; the token then resolves to empty and
    /// falls to pruning.
    Scalar(Option<usize>),
    Array {
        /// Maximum observed index per dimension (exclusive bounds).
        dims: Vec<usize>,
        /// Sparse tuple-to-column map over the Cartesian index grid.
        cells: HashMap<Vec<usize>, usize>,
    },
}

/// Resolve every scanned token to its column binding. Structural errors
/// (duplicate array declaration, scalar/array conflict) fail the whole pair.
pub fn bind(
    occurrences: &HashMap<String, Vec<Occurrence>>,
    header: &HeaderIndex,
) -> Result<HashMap<String, ColumnBinding>, ProcessorError> {
    let mut bindings = HashMap::new();

    for (token, sites) in occurrences {
        let array_sites: Vec<&Occurrence> = sites.iter().filter(|o| o.depth() > 0).collect();

        if array_sites.len() > 1 {
            return Err(ProcessorError::Mapping(format!(
                "Duplicate array parameter '{}': declared at {} template locations",
                token,
                array_sites.len()
            )));
        }

        if let Some(array_site) = array_sites.first() {
            if array_sites.len() != sites.len() {
                return Err(ProcessorError::Mapping(format!(
                    "Parameter '{}' is declared both as a scalar and as an array",
                    token
                )));
            }
            bindings.insert(
                token.clone(),
                bind_array(token, array_site.depth(), header),
            );
        } else {
            bindings.insert(token.clone(), ColumnBinding::Scalar(header.get(token)));
        }
    }

    Ok(bindings)
}

/// Array parameters follow the `base_i1_..._id` header convention with
/// 1-based indices. The grid spans the maximum observed index per dimension;
/// holes in the header stay unbound.
fn bind_array(token: &str, depth: usize, header: &HeaderIndex) -> ColumnBinding {
    let pattern = format!(
        "(?i)^{}((?:_[1-9][0-9]*){{{}}})$",
        regex::escape(token),
        depth
    );
    // The pattern is built from a fixed shape; only the escaped token varies.
    let matcher = Regex::new(&pattern).expect("indexed-column pattern");

    let mut dims = vec![0usize; depth];
    for raw in header.raw() {
        if let Some(captures) = matcher.captures(raw.trim()) {
            let suffix = &captures[1];
            for (dim, part) in suffix.split('_').skip(1).enumerate() {
                let index: usize = part.parse().expect("matched digits");
                if index > dims[dim] {
                    dims[dim] = index;
                }
            }
        }
    }

    let mut cells = HashMap::new();
    if dims.iter().all(|&d| d > 0) {
        for tuple in index_grid(&dims) {
            let mut name = token.to_string();
            for index in &tuple {
                name.push('_');
                name.push_str(&(index + 1).to_string());
            }
            if let Some(column) = header.get(&name) {
                cells.insert(tuple, column);
            }
        }
    }

    ColumnBinding::Array { dims, cells }
}

/// Full Cartesian product [0,d1) x ... x [0,dn), in odometer order.
fn index_grid(dims: &[usize]) -> Vec<Vec<usize>> {
    let mut tuples = vec![Vec::new()];
    for &dim in dims {
        let mut next = Vec::with_capacity(tuples.len() * dim);
        for tuple in &tuples {
            for i in 0..dim {
                let mut extended = tuple.clone();
                extended.push(i);
                next.push(extended);
            }
        }
        tuples = next;
    }
    tuples
}
