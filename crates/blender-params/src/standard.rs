//! Solr-style parameter object.
//!
//! Used for the aggregating backend itself and for any secondary backend
//! speaking the same `fq`/`facet.field`/`sort` dialect.

use tracing::warn;

use blender_core::traits::BackendParams;
use blender_core::types::{BackendId, CanonicalFilter, ParamBag, Query, RawRequest};
use blender_core::Result;

pub const DEFAULT_LIMIT: usize = 20;
pub const MAX_LIMIT: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FacetRequest {
    pub field: String,
    pub alias: Option<String>,
    pub or_facet: bool,
}

#[derive(Debug, Clone)]
pub struct StandardParams {
    id: BackendId,
    query: Query,
    sort: Option<String>,
    limit: usize,
    page: usize,
    filters: Vec<CanonicalFilter>,
    hidden_filters: Vec<CanonicalFilter>,
    facets: Vec<FacetRequest>,
    checkbox_facets: Vec<(String, String)>,
}

impl StandardParams {
    pub fn new(id: impl Into<BackendId>) -> Self {
        Self {
            id: id.into(),
            query: Query::default(),
            sort: None,
            limit: DEFAULT_LIMIT,
            page: 1,
            filters: Vec::new(),
            hidden_filters: Vec::new(),
            facets: Vec::new(),
            checkbox_facets: Vec::new(),
        }
    }

    pub fn hidden_filters(&self) -> &[CanonicalFilter] {
        &self.hidden_filters
    }

    pub fn facets(&self) -> &[FacetRequest] {
        &self.facets
    }

    pub fn checkbox_facets(&self) -> &[(String, String)] {
        &self.checkbox_facets
    }

    pub fn sort(&self) -> Option<&str> {
        self.sort.as_deref()
    }

    fn init_limit(&mut self, request: &RawRequest) {
        self.limit = request
            .get("limit")
            .and_then(|l| l.trim().parse::<usize>().ok())
            .filter(|l| (1..=MAX_LIMIT).contains(l))
            .unwrap_or(DEFAULT_LIMIT);
    }

    fn init_page(&mut self, request: &RawRequest) {
        self.page = request
            .get("page")
            .and_then(|p| p.trim().parse::<usize>().ok())
            .unwrap_or(1)
            .max(1);
    }

    fn init_filters(&mut self, request: &RawRequest) {
        for expr in request.get_all("filter") {
            self.add_filter(expr);
        }
        for expr in request.get_all("hiddenFilters") {
            self.add_hidden_filter(expr);
        }
    }

    /// `fq` values: hidden filters first, OR filters grouped per field last.
    pub fn filter_queries(&self) -> Vec<String> {
        let mut fq = Vec::new();
        let mut or_groups: Vec<(&str, Vec<String>)> = Vec::new();
        for filter in self.hidden_filters.iter().chain(&self.filters) {
            let q = field_query(&filter.field, &filter.value);
            if filter.exclusion_prefix {
                match or_groups.iter().position(|(field, _)| *field == filter.field) {
                    Some(pos) => or_groups[pos].1.push(q),
                    None => or_groups.push((filter.field.as_str(), vec![q])),
                }
            } else if filter.negated {
                fq.push(format!("-{q}"));
            } else {
                fq.push(q);
            }
        }
        for (field, parts) in or_groups {
            fq.push(format!("{{!tag={field}_filter}}{field}:({})", parts.join(" OR ")));
        }
        fq
    }
}

fn parse_filter(expr: &str) -> Option<CanonicalFilter> {
    let filter = CanonicalFilter::parse(expr);
    if filter.is_none() {
        warn!(filter = expr, "Ignoring malformed filter");
    }
    filter
}

fn field_query(field: &str, value: &str) -> String {
    let is_range = value.starts_with('[') && value.ends_with(']') && value.contains(" TO ");
    if value.ends_with('*') || is_range {
        format!("{field}:{value}")
    } else {
        let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
        format!("{field}:\"{escaped}\"")
    }
}

fn advanced_query(request: &RawRequest) -> Option<Query> {
    let mut groups = Vec::new();
    for i in 0.. {
        let key = format!("lookfor{i}");
        if !request.contains(&key) {
            break;
        }
        let types = request.get_all(&format!("type{i}"));
        let terms: Vec<Query> = request
            .get_all(&key)
            .iter()
            .enumerate()
            .filter(|(_, lookfor)| !lookfor.is_empty())
            .map(|(n, lookfor)| {
                let handler = types.get(n).map(String::as_str).filter(|t| !t.is_empty());
                Query::basic(lookfor.as_str(), handler)
            })
            .collect();
        if !terms.is_empty() {
            let operator = request.get(&format!("bool{i}")).unwrap_or("AND");
            groups.push(Query::Group { operator: operator.to_string(), queries: terms });
        }
    }
    if groups.is_empty() {
        return None;
    }
    let operator = request.get("join").unwrap_or("AND");
    Some(Query::Group { operator: operator.to_string(), queries: groups })
}

impl BackendParams for StandardParams {
    fn search_class_id(&self) -> &str {
        &self.id
    }

    /// Rebuilds the request state; filters and checkbox facets of an earlier
    /// request do not survive.
    fn init_from_request(&mut self, request: &RawRequest) {
        self.filters.clear();
        self.hidden_filters.clear();
        self.checkbox_facets.clear();
        self.init_limit(request);
        self.init_page(request);
        self.init_search(request);
        self.init_sort(request);
        self.init_filters(request);
    }

    fn init_search(&mut self, request: &RawRequest) {
        if let Some(lookfor) = request.get("lookfor") {
            self.set_basic_search(lookfor, request.get("type"));
        } else if let Some(query) = advanced_query(request) {
            self.query = query;
        } else {
            self.set_basic_search("", None);
        }
    }

    fn init_sort(&mut self, request: &RawRequest) {
        self.set_sort(request.get("sort"));
    }

    fn set_basic_search(&mut self, lookfor: &str, handler: Option<&str>) {
        self.query = Query::basic(lookfor, handler.filter(|h| !h.is_empty()));
    }

    fn set_sort(&mut self, sort: Option<&str>) {
        self.sort = sort.filter(|s| !s.is_empty()).map(str::to_string);
    }

    fn limit(&self) -> usize {
        self.limit
    }

    fn offset(&self) -> usize {
        self.page.saturating_sub(1).saturating_mul(self.limit)
    }

    fn add_filter(&mut self, expr: &str) {
        if let Some(filter) = parse_filter(expr) {
            if !self.filters.contains(&filter) {
                self.filters.push(filter);
            }
        }
    }

    fn add_hidden_filter(&mut self, expr: &str) {
        if let Some(filter) = parse_filter(expr) {
            if !self.hidden_filters.contains(&filter) {
                self.hidden_filters.push(filter);
            }
        }
    }

    fn remove_filter(&mut self, expr: &str) {
        if let Some(filter) = CanonicalFilter::parse(expr) {
            self.filters.retain(|f| *f != filter);
        }
    }

    fn remove_all_filters(&mut self, field: Option<&str>) {
        match field {
            Some(field) => self.filters.retain(|f| f.field != field),
            None => self.filters.clear(),
        }
    }

    fn add_facet(&mut self, field: &str, alias: Option<&str>, or_facet: bool) {
        self.facets.retain(|f| f.field != field);
        self.facets.push(FacetRequest {
            field: field.to_string(),
            alias: alias.map(str::to_string),
            or_facet,
        });
    }

    fn add_checkbox_facet(&mut self, expr: &str, description: &str) {
        self.checkbox_facets.retain(|(e, _)| e != expr);
        self.checkbox_facets.push((expr.to_string(), description.to_string()));
    }

    fn filter_list(&self) -> Vec<CanonicalFilter> {
        self.filters.clone()
    }

    fn query(&self) -> Query {
        self.query.clone()
    }

    fn backend_parameters(&self) -> Result<ParamBag> {
        let mut bag = ParamBag::new();
        if !self.facets.is_empty() || !self.checkbox_facets.is_empty() {
            bag.set("facet", "true");
            for facet in &self.facets {
                let field = if facet.or_facet {
                    format!("{{!ex={0}_filter}}{0}", facet.field)
                } else {
                    facet.field.clone()
                };
                bag.add("facet.field", field);
            }
            for (expr, _) in &self.checkbox_facets {
                if let Some(filter) = CanonicalFilter::parse(expr) {
                    bag.add("facet.query", field_query(&filter.field, &filter.value));
                }
            }
            bag.set("facet.mincount", "1");
            bag.set("facet.sort", "count");
        }
        for fq in self.filter_queries() {
            bag.add("fq", fq);
        }
        if let Some(sort) = &self.sort {
            bag.set("sort", sort.as_str());
        }
        Ok(bag)
    }

    fn clone_box(&self) -> Box<dyn BackendParams> {
        Box::new(self.clone())
    }
}
