//! Serde shape of the mapping configuration as it arrives from the mapping
//! source (inline `[mappings]` section, a separate TOML/JSON file, or any
//! other serde-compatible nested structure).
//!
//! ```toml
//! [facets.format]
//! type = "normal"
//!
//! [facets.format.backends.Primo]
//! field = "formatPrimo"
//! values = { barPrimo = "bar", bazPrimo = "baz" }
//! regex = [{ search = "^(.*)$", replace = "fmt_$1" }]
//! default = "book"
//! ignore = ["any"]
//!
//! [search.Title]
//! Solr = "Title"
//! EDS = "TI"
//!
//! [sorting.year]
//! Primo = "scdate"
//! ```
use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawMappings {
    pub facets: BTreeMap<String, RawFacetField>,
    pub search: BTreeMap<String, BTreeMap<String, String>>,
    pub sorting: BTreeMap<String, BTreeMap<String, String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawFacetField {
    #[serde(rename = "type")]
    pub facet_type: Option<String>,
    pub backends: BTreeMap<String, RawBackendMapping>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawBackendMapping {
    pub field: String,
    /// Native value to canonical value, in configured order.
    #[serde(deserialize_with = "scalar_map")]
    pub values: IndexMap<String, String>,
    pub regex: Vec<RawRegexRewrite>,
    #[serde(deserialize_with = "optional_scalar")]
    pub default: Option<String>,
    pub ignore: RawIgnore,
    pub hierarchical: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawRegexRewrite {
    pub search: String,
    pub replace: String,
}

/// `ignore = true` or `ignore = ["value", ...]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawIgnore {
    Flag(bool),
    Values(Vec<String>),
    Value(String),
}

impl Default for RawIgnore {
    fn default() -> Self {
        Self::Flag(false)
    }
}

// Value tables are frequently written with bare booleans or numbers
// (`true = 1`), so accept any scalar and keep its text form.
#[derive(Deserialize)]
#[serde(untagged)]
enum Scalar {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl From<Scalar> for String {
    fn from(s: Scalar) -> Self {
        match s {
            Scalar::Bool(b) => b.to_string(),
            Scalar::Int(i) => i.to_string(),
            Scalar::Float(f) => f.to_string(),
            Scalar::Text(t) => t,
        }
    }
}

fn scalar_map<'de, D>(deserializer: D) -> Result<IndexMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = IndexMap::<String, Scalar>::deserialize(deserializer)?;
    Ok(raw.into_iter().map(|(k, v)| (k, v.into())).collect())
}

fn optional_scalar<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Scalar>::deserialize(deserializer)?.map(Into::into))
}
