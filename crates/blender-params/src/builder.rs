//! The blended parameter builder.
//!
//! Every operation is received once in canonical form, applied untranslated
//! to the aggregating backend's own parameters and replayed, translated, on
//! each secondary backend's parameters. Filters a backend cannot honor gate
//! that backend out of the blended result for the rest of the request.

use std::sync::Arc;

use tracing::debug;

use blender_core::traits::BackendParams;
use blender_core::types::{CanonicalFilter, ParamBag, Query, RawRequest};
use blender_core::Result;
use blender_mapping::{MappingTable, TranslatedFilter};

use crate::gate::CapabilityGate;

/// Request keys handled at the canonical level and never passed verbatim to a
/// secondary backend.
const CANONICAL_KEYS: [&str; 6] = ["lookfor", "type", "sort", "filter", "hiddenFilters", "daterange"];

#[derive(Clone, Copy)]
enum Channel<'a> {
    Filter,
    Hidden,
    Checkbox(&'a str),
}

#[derive(Clone)]
pub struct BlendedParams {
    mappings: Arc<MappingTable>,
    primary: Box<dyn BackendParams>,
    secondaries: Vec<Box<dyn BackendParams>>,
    gate: CapabilityGate,
}

impl BlendedParams {
    pub fn new(
        mappings: Arc<MappingTable>,
        primary: Box<dyn BackendParams>,
        secondaries: Vec<Box<dyn BackendParams>>,
    ) -> Self {
        Self { mappings, primary, secondaries, gate: CapabilityGate::new() }
    }

    pub fn gate(&self) -> &CapabilityGate {
        &self.gate
    }

    pub fn primary(&self) -> &dyn BackendParams {
        self.primary.as_ref()
    }

    pub fn secondary(&self, backend: &str) -> Option<&dyn BackendParams> {
        self.secondaries
            .iter()
            .find(|p| p.search_class_id() == backend)
            .map(|p| p.as_ref())
    }

    pub fn secondary_ids(&self) -> Vec<&str> {
        self.secondaries.iter().map(|p| p.search_class_id()).collect()
    }

    /// Exclude `backend` regardless of the active filters.
    pub fn disable_backend(&mut self, backend: &str) {
        self.gate.disable(backend);
    }

    fn replay_filter(&mut self, expr: &str, channel: Channel<'_>) {
        let Some(filter) = CanonicalFilter::parse(expr) else {
            return;
        };
        if filter.is_backend_pin() {
            return;
        }
        for params in &mut self.secondaries {
            let backend = params.search_class_id().to_string();
            let Some(translated) = self.mappings.translate_filter(&filter, &backend) else {
                debug!(backend = %backend, filter = %filter, "Filter not supported, excluding backend");
                self.gate.record_unsupported(&backend, filter.clone());
                continue;
            };
            for native in translated.iter().filter_map(TranslatedFilter::expr) {
                match channel {
                    Channel::Filter => params.add_filter(native),
                    Channel::Hidden => params.add_hidden_filter(native),
                    Channel::Checkbox(description) => params.add_checkbox_facet(native, description),
                }
            }
        }
    }

    /// Inject configured default filters the backend does not already have
    /// a filter for.
    fn add_default_filters(&self, params: &mut dyn BackendParams) {
        let backend = params.search_class_id().to_string();
        for (_, field) in self.mappings.facet_fields() {
            let Some(mapping) = field.per_backend.get(&backend) else {
                continue;
            };
            let Some(default) = &mapping.default_value else {
                continue;
            };
            if mapping.native_field.is_empty() {
                continue;
            }
            let present = params.filter_list().iter().any(|f| f.field == mapping.native_field);
            if !present {
                params.add_filter(&format!("{}:{default}", mapping.native_field));
            }
        }
    }
}

fn is_canonical_key(key: &str) -> bool {
    CANONICAL_KEYS.contains(&key)
        || key
            .strip_prefix("type")
            .is_some_and(|n| !n.is_empty() && n.chars().all(|c| c.is_ascii_digit()))
}

impl BackendParams for BlendedParams {
    fn search_class_id(&self) -> &str {
        self.primary.search_class_id()
    }

    fn init_from_request(&mut self, request: &RawRequest) {
        self.gate.clear();

        let mut stripped = request.clone();
        let keys: Vec<String> = stripped.keys().filter(|k| is_canonical_key(k)).cloned().collect();
        for key in keys {
            stripped.remove(&key);
        }
        // Exclusions are rebuilt below, so no filter may outlive the gate
        for params in &mut self.secondaries {
            params.remove_all_filters(None);
            params.init_from_request(&stripped);
        }
        self.primary.remove_all_filters(None);
        self.primary.init_from_request(&stripped);

        self.init_search(request);
        self.init_sort(request);
        for expr in request.get_all("filter") {
            self.add_filter(expr);
        }
        for expr in request.get_all("hiddenFilters") {
            self.add_hidden_filter(expr);
        }
    }

    fn init_search(&mut self, request: &RawRequest) {
        for params in &mut self.secondaries {
            let backend = params.search_class_id().to_string();
            let mut translated = request.clone();
            if let Some(search_type) = request.get("type") {
                translated.set("type", self.mappings.translate_search_type(search_type, &backend));
            }
            for i in 0.. {
                let key = format!("type{i}");
                if !request.contains(&key) {
                    break;
                }
                let types: Vec<&str> = request
                    .get_all(&key)
                    .iter()
                    .map(|t| self.mappings.translate_search_type(t, &backend))
                    .collect();
                translated.set_all(key, types);
            }
            params.init_search(&translated);
        }
        self.primary.init_search(request);
    }

    fn init_sort(&mut self, request: &RawRequest) {
        for params in &mut self.secondaries {
            let backend = params.search_class_id().to_string();
            let mut translated = request.clone();
            if let Some(sort) = request.get("sort") {
                translated.set("sort", self.mappings.translate_sort(sort, &backend));
            }
            params.init_sort(&translated);
        }
        self.primary.init_sort(request);
    }

    fn set_basic_search(&mut self, lookfor: &str, handler: Option<&str>) {
        for params in &mut self.secondaries {
            let backend = params.search_class_id().to_string();
            let native = handler.map(|h| self.mappings.translate_search_type(h, &backend));
            params.set_basic_search(lookfor, native);
        }
        self.primary.set_basic_search(lookfor, handler);
    }

    fn set_sort(&mut self, sort: Option<&str>) {
        for params in &mut self.secondaries {
            let backend = params.search_class_id().to_string();
            let native = sort.map(|s| self.mappings.translate_sort(s, &backend));
            params.set_sort(native);
        }
        self.primary.set_sort(sort);
    }

    fn limit(&self) -> usize {
        self.primary.limit()
    }

    fn offset(&self) -> usize {
        self.primary.offset()
    }

    fn add_filter(&mut self, expr: &str) {
        self.primary.add_filter(expr);
        self.replay_filter(expr, Channel::Filter);
    }

    fn add_hidden_filter(&mut self, expr: &str) {
        self.primary.add_hidden_filter(expr);
        self.replay_filter(expr, Channel::Hidden);
    }

    fn add_checkbox_facet(&mut self, expr: &str, description: &str) {
        self.primary.add_checkbox_facet(expr, description);
        self.replay_filter(expr, Channel::Checkbox(description));
    }

    fn remove_filter(&mut self, expr: &str) {
        self.primary.remove_filter(expr);
        let Some(filter) = CanonicalFilter::parse(expr) else {
            return;
        };
        if filter.is_backend_pin() {
            return;
        }
        self.gate.release(&filter);
        for params in &mut self.secondaries {
            let backend = params.search_class_id().to_string();
            if let Some(translated) = self.mappings.translate_filter(&filter, &backend) {
                for native in translated.iter().filter_map(TranslatedFilter::expr) {
                    params.remove_filter(native);
                }
            }
        }
    }

    fn remove_all_filters(&mut self, field: Option<&str>) {
        self.primary.remove_all_filters(field);
        let Some(field) = field else {
            self.gate.clear();
            for params in &mut self.secondaries {
                params.remove_all_filters(None);
            }
            return;
        };
        self.gate.release_field(field);
        for params in &mut self.secondaries {
            let backend = params.search_class_id().to_string();
            if let Some(native) = self.mappings.translate_facet_field(field, &backend) {
                params.remove_all_filters(Some(native));
            }
        }
    }

    fn add_facet(&mut self, field: &str, alias: Option<&str>, or_facet: bool) {
        self.primary.add_facet(field, alias, or_facet);
        for params in &mut self.secondaries {
            let backend = params.search_class_id().to_string();
            if let Some(native) = self.mappings.translate_facet_field(field, &backend) {
                params.add_facet(native, alias, or_facet);
            }
        }
    }

    fn filter_list(&self) -> Vec<CanonicalFilter> {
        self.primary.filter_list()
    }

    fn query(&self) -> Query {
        self.primary.query()
    }

    /// The aggregating backend's bag: its own parameters, the exclusion
    /// clause and one `query_<id>`/`params_<id>` pair per secondary backend.
    fn backend_parameters(&self) -> Result<ParamBag> {
        let mut bag = self.primary.backend_parameters()?;
        for clause in self.gate.exclusion_clause() {
            bag.add("fq", clause);
        }
        for params in &self.secondaries {
            let backend = params.search_class_id();
            // Defaults go on a copy so repeated calls never accumulate them
            let mut params = params.clone_box();
            if !self.gate.is_disabled(backend) {
                self.add_default_filters(params.as_mut());
            }
            bag.set(format!("query_{backend}"), params.query());
            bag.set(format!("params_{backend}"), params.backend_parameters()?);
        }
        Ok(bag)
    }

    fn clone_box(&self) -> Box<dyn BackendParams> {
        Box::new(self.clone())
    }
}
