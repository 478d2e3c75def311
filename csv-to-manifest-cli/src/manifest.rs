pub enum Template {
    Basic,
    Full,
}

pub const BASIC_MANIFEST: &str = r#"{
  // Human-readable name for this load
  "name": "Your Load Name",
  // Description of what this load manifest processes
  "description": "Description of your data load",

  // Access-control principals stamped into every generated manifest
  "acl": {
    "viewer": "data.default.viewers@yourpartition.example.com",
    "owner": "data.default.owners@yourpartition.example.com"
  },
  // Legal tag stamped into every generated manifest
  "legal": {
    "legalTag": "yourpartition-default-legal"
  },

  // Template/CSV pairings, processed in order
  "mappings": [
    {
      // JSON template with {{placeholder}} parameters
      "template": "templates/well.json",
      // CSV data file; one manifest is generated per row
      "csv": "data/wells.csv"
    }
  ]
}"#;

pub const FULL_MANIFEST: &str = r#"{
  // Human-readable name for this load
  "name": "Your Load Name",
  // Description of what this load manifest processes
  "description": "Description of your data load",

  // Access-control principals stamped into every generated manifest
  "acl": {
    "viewer": "data.default.viewers@yourpartition.example.com",
    "owner": "data.default.owners@yourpartition.example.com"
  },
  // Legal tag stamped into every generated manifest
  "legal": {
    "legalTag": "yourpartition-default-legal"
  },

  // Optional: schema documents to load and normalize for later validation
  "schema": {
    // Directory tree searched recursively for *.json schema documents
    "path": "schemas",
    // Raw-text token replaced by the destination partition before parsing
    "namespaceToken": "{{NAMESPACE}}",
    "partition": "yourpartition"
  },

  // Template/CSV pairings, processed in order
  "mappings": [
    {
      // JSON template with {{placeholder}} parameters
      "template": "templates/well.json",
      // CSV data file; one manifest is generated per row
      "csv": "data/wells.csv",
      // Optional: skeleton of fields every manifest must contain
      "requiredTemplate": "templates/well.required.json",
      // false: one file per row, named by manifest id
      "grouped": false
    },
    {
      "template": "templates/wellbore.json",
      "csv": "data/wellbores.csv",
      // true: all manifests of this pair go into one JSON array file
      "grouped": true,
      // File stem for grouped output (and per-row fallbacks)
      "outputName": "wellbores-batch"
    }
  ]
}"#;
