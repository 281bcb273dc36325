//! Canonical → backend-native translation of facets, filters, search types
//! and sort keys.

use blender_core::types::CanonicalFilter;

use crate::mapping::{BackendFacetMapping, FacetType, MappingTable};

/// One translated filter expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranslatedFilter {
    /// Native `[-|~]field:value` expression to replay on the backend.
    Expr(String),
    /// The mapping says this value must not filter the backend at all.
    Ignore,
}

impl TranslatedFilter {
    pub fn expr(&self) -> Option<&str> {
        match self {
            Self::Expr(e) => Some(e),
            Self::Ignore => None,
        }
    }
}

impl MappingTable {
    /// Native field for a canonical facet field, or `None` when the backend
    /// cannot honor it.
    pub fn translate_facet_field(&self, field: &str, backend: &str) -> Option<&str> {
        self.backend_mapping(field, backend)
            .map(|m| m.native_field.as_str())
            .filter(|f| !f.is_empty())
    }

    /// Translate a canonical filter for `backend`.
    ///
    /// `None` means the backend cannot honor the filter and has to be
    /// excluded. `Some(vec![])` is a legal "nothing to apply" result.
    pub fn translate_filter(&self, filter: &CanonicalFilter, backend: &str) -> Option<Vec<TranslatedFilter>> {
        if let Some(mapping) = self.backend_mapping(&filter.field, backend) {
            if mapping.ignore.matches(&filter.value) {
                return Some(vec![TranslatedFilter::Ignore]);
            }
        }
        let native_field = self.translate_facet_field(&filter.field, backend)?;
        let facet_type = self.facet_field(&filter.field)?.facet_type;
        let mapping = self.backend_mapping(&filter.field, backend)?;

        let mut values = candidate_values(facet_type, mapping, &filter.value);
        for rewrite in &mapping.regex_rewrites {
            if let Some(v) = rewrite.apply(&filter.value) {
                if !values.contains(&v) {
                    values.push(v);
                }
            }
        }

        // Several native values for one canonical value widen the filter
        let mut prefix = filter.prefix();
        if prefix.is_empty() && values.len() > 1 {
            prefix = "~";
        }
        Some(
            values
                .into_iter()
                .map(|v| TranslatedFilter::Expr(format!("{prefix}{native_field}:{v}")))
                .collect(),
        )
    }

    /// Native search handler; empty when unmapped (backend default).
    pub fn translate_search_type(&self, search_type: &str, backend: &str) -> &str {
        self.search_type_fields
            .get(search_type)
            .and_then(|m| m.get(backend))
            .map_or("", String::as_str)
    }

    /// Native sort key; empty when unmapped (backend default).
    pub fn translate_sort(&self, sort: &str, backend: &str) -> &str {
        self.sort_fields
            .get(sort)
            .and_then(|m| m.get(backend))
            .map_or("", String::as_str)
    }
}

/// Boolean reading of a facet value: empty, `0`, `false`, `no` and `off`
/// are false, any other text is true.
pub fn coerce_bool(value: &str) -> bool {
    !matches!(value.trim().to_ascii_lowercase().as_str(), "" | "0" | "false" | "no" | "off")
}

fn candidate_values(facet_type: FacetType, mapping: &BackendFacetMapping, value: &str) -> Vec<String> {
    let rewrites = &mapping.value_rewrites;
    let mut values: Vec<String> = if rewrites.is_empty() {
        vec![value.to_string()]
    } else if facet_type == FacetType::Boolean {
        let wanted = coerce_bool(value);
        rewrites
            .iter()
            .filter(|(_, canonical)| coerce_bool(canonical) == wanted)
            .map(|(native, _)| native.clone())
            .collect()
    } else {
        rewrites
            .iter()
            .filter(|(_, canonical)| canonical == value)
            .map(|(native, _)| native.clone())
            .collect()
    };
    if facet_type == FacetType::Hierarchical || mapping.hierarchical {
        values.extend(ancestor_matches(rewrites, value));
    }
    values
}

/// Native keys whose canonical hierarchical value (`"<depth>/<p1>/.../"`)
/// has `value` as an ancestor.
///
/// Walks level offsets -1, -2, ... and stops at the first offset where no
/// entry yields a valid ancestor level.
fn ancestor_matches(rewrites: &[(String, String)], value: &str) -> Vec<String> {
    let mut matches = Vec::new();
    let mut offset: i64 = -1;
    loop {
        let mut level_good = false;
        for (native, canonical) in rewrites {
            let parts: Vec<&str> = canonical.split('/').collect();
            let depth: i64 = parts[0].parse().unwrap_or(0);
            if depth <= 0 || parts.len() <= 2 {
                continue;
            }
            let Ok(level) = usize::try_from(depth + offset) else {
                continue;
            };
            level_good = true;
            let end = (level + 2).min(parts.len());
            let candidate = format!("{level}/{}/", parts[1..end].join("/"));
            if candidate == value {
                matches.push(native.clone());
            }
        }
        if !level_good {
            break;
        }
        offset -= 1;
    }
    matches
}
