//! Domain types exchanged between the parameter builder, the merger and the
//! backend connectors.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

pub type BackendId = String;
pub type FacetCounts = BTreeMap<String, Vec<FacetCount>>;

/// Pseudo-field addressing the backend-origin tag of the blended index.
pub const BACKEND_FIELD: &str = "blender_backend";

/// A `field:value` filter in the canonical (blended) schema.
///
/// Textual form is `[-|~]field:value`. A leading `-` negates the filter and a
/// leading `~` marks it as an OR-style filter; both survive translation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CanonicalFilter {
    pub field: String,
    pub value: String,
    pub negated: bool,
    pub exclusion_prefix: bool,
}

impl CanonicalFilter {
    pub fn new(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self { field: field.into(), value: value.into(), negated: false, exclusion_prefix: false }
    }

    pub fn negate(mut self) -> Self {
        self.negated = true;
        self.exclusion_prefix = false;
        self
    }

    pub fn or_prefixed(mut self) -> Self {
        self.exclusion_prefix = true;
        self.negated = false;
        self
    }

    /// Parse `[-|~]field:value`; a double-quoted value is unquoted.
    pub fn parse(expr: &str) -> Option<Self> {
        let (negated, exclusion_prefix, rest) = if let Some(rest) = expr.strip_prefix('-') {
            (true, false, rest)
        } else if let Some(rest) = expr.strip_prefix('~') {
            (false, true, rest)
        } else {
            (false, false, expr)
        };
        let (field, value) = rest.split_once(':')?;
        if field.is_empty() {
            return None;
        }
        let value = value
            .strip_prefix('"')
            .and_then(|v| v.strip_suffix('"'))
            .unwrap_or(value);
        Some(Self { field: field.to_string(), value: value.to_string(), negated, exclusion_prefix })
    }

    pub fn prefix(&self) -> &'static str {
        if self.negated {
            "-"
        } else if self.exclusion_prefix {
            "~"
        } else {
            ""
        }
    }

    pub fn is_backend_pin(&self) -> bool {
        self.field == BACKEND_FIELD
    }
}

impl fmt::Display for CanonicalFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}:{}", self.prefix(), self.field, self.value)
    }
}

/// A user query: either a single lookfor string with an optional search
/// handler, or an advanced group of queries joined by a boolean operator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Query {
    Basic { lookfor: String, handler: Option<String> },
    Group { operator: String, queries: Vec<Query> },
}

impl Default for Query {
    fn default() -> Self {
        Self::Basic { lookfor: String::new(), handler: None }
    }
}

impl Query {
    pub fn basic(lookfor: impl Into<String>, handler: Option<&str>) -> Self {
        Self::Basic { lookfor: lookfor.into(), handler: handler.map(str::to_string) }
    }

    pub fn handler(&self) -> Option<&str> {
        match self {
            Self::Basic { handler, .. } => handler.as_deref(),
            Self::Group { .. } => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Self::Basic { lookfor, .. } => lookfor.trim().is_empty(),
            Self::Group { queries, .. } => queries.iter().all(Query::is_empty),
        }
    }

    /// Case-insensitive whole-token containment.
    pub fn contains_term(&self, term: &str) -> bool {
        let needle = term.to_lowercase();
        match self {
            Self::Basic { lookfor, .. } => lookfor
                .split_whitespace()
                .map(|t| t.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase())
                .any(|t| t == needle),
            Self::Group { queries, .. } => queries.iter().any(|q| q.contains_term(term)),
        }
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Basic { lookfor, .. } => f.write_str(lookfor),
            Self::Group { operator, queries } => {
                for (i, q) in queries.iter().enumerate() {
                    if i > 0 {
                        write!(f, " {operator} ")?;
                    }
                    write!(f, "({q})")?;
                }
                Ok(())
            }
        }
    }
}

/// One value stored in a [`ParamBag`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Text(String),
    Query(Query),
    Bag(ParamBag),
}

impl From<String> for ParamValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<Query> for ParamValue {
    fn from(v: Query) -> Self {
        Self::Query(v)
    }
}

impl From<ParamBag> for ParamValue {
    fn from(v: ParamBag) -> Self {
        Self::Bag(v)
    }
}

/// Multi-valued parameter map sent to a backend. `add` appends, `set`
/// replaces.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamBag {
    params: BTreeMap<String, Vec<ParamValue>>,
}

impl ParamBag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, key: impl Into<String>, value: impl Into<ParamValue>) {
        self.params.entry(key.into()).or_default().push(value.into());
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<ParamValue>) {
        self.params.insert(key.into(), vec![value.into()]);
    }

    pub fn get(&self, key: &str) -> Option<&[ParamValue]> {
        self.params.get(key).map(Vec::as_slice)
    }

    pub fn remove(&mut self, key: &str) -> Option<Vec<ParamValue>> {
        self.params.remove(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.params.contains_key(key)
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// All text values stored under `key`, in insertion order.
    pub fn texts(&self, key: &str) -> Vec<&str> {
        self.get(key)
            .unwrap_or_default()
            .iter()
            .filter_map(|v| match v {
                ParamValue::Text(s) => Some(s.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn first_text(&self, key: &str) -> Option<&str> {
        self.texts(key).into_iter().next()
    }

    pub fn query(&self, key: &str) -> Option<&Query> {
        self.get(key)?.iter().find_map(|v| match v {
            ParamValue::Query(q) => Some(q),
            _ => None,
        })
    }

    pub fn bag(&self, key: &str) -> Option<&ParamBag> {
        self.get(key)?.iter().find_map(|v| match v {
            ParamValue::Bag(b) => Some(b),
            _ => None,
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Vec<ParamValue>)> {
        self.params.iter()
    }
}

/// Raw key/value request as received from the web layer. Values are lists so
/// that repeated keys (`filter[]`) survive; single-valued keys hold one item.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawRequest {
    values: BTreeMap<String, Vec<String>>,
}

impl RawRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    pub fn with_all<I, S>(mut self, key: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.set_all(key, values);
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).and_then(|v| v.first()).map(String::as_str)
    }

    pub fn get_all(&self, key: &str) -> &[String] {
        self.values.get(key).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), vec![value.into()]);
    }

    pub fn set_all<I, S>(&mut self, key: impl Into<String>, values: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.values.insert(key.into(), values.into_iter().map(Into::into).collect());
    }

    pub fn remove(&mut self, key: &str) -> Option<Vec<String>> {
        self.values.remove(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.values.keys()
    }
}

/// A single search hit. `source` is the backend the record came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: String,
    pub source: BackendId,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub fields: serde_json::Map<String, serde_json::Value>,
}

impl Record {
    pub fn new(id: impl Into<String>, source: impl Into<BackendId>) -> Self {
        Self { id: id.into(), source: source.into(), labels: Vec::new(), fields: serde_json::Map::new() }
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FacetCount {
    pub value: String,
    pub count: u64,
}

impl FacetCount {
    pub fn new(value: impl Into<String>, count: u64) -> Self {
        Self { value: value.into(), count }
    }
}

/// Spellcheck data for one misspelled term of the query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpellTerm {
    pub term: String,
    pub orig_freq: u64,
    /// `(word, frequency)` pairs, best first.
    pub suggestions: Vec<(String, u64)>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Spellcheck {
    pub query: String,
    pub terms: Vec<SpellTerm>,
    pub secondary: Option<Box<Spellcheck>>,
}

/// Processed suggestions for one term.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Suggestion {
    pub term: String,
    pub freq: u64,
    pub suggestions: Vec<(String, u64)>,
}

/// An error descriptor attached to an otherwise usable result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchError {
    pub message: String,
    pub details: Option<String>,
    #[serde(default)]
    pub tokens: BTreeMap<String, String>,
}

impl SearchError {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into(), details: None, tokens: BTreeMap::new() }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_token(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tokens.insert(key.into(), value.into());
        self
    }
}

/// What a backend returns for one search call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordCollection {
    pub records: Vec<Record>,
    pub facets: FacetCounts,
    pub spellcheck: Spellcheck,
    pub total: u64,
    pub errors: Vec<SearchError>,
}

impl RecordCollection {
    pub fn add_error(&mut self, error: SearchError) {
        if !self.errors.contains(&error) {
            self.errors.push(error);
        }
    }
}

/// A search addressed to one backend through the search service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchCommand {
    pub backend_id: BackendId,
    pub query: Query,
    pub offset: usize,
    pub limit: usize,
    pub params: ParamBag,
}
