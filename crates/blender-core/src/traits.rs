use crate::error::{Error, Result};
use crate::types::{
    CanonicalFilter, ParamBag, Query, RawRequest, RecordCollection, SearchCommand, Spellcheck,
    Suggestion,
};

/// Per-backend search parameter object.
///
/// Each connector owns one of these per request and translates the calls into
/// its own native parameter bag. Expressions passed to the filter methods use
/// the textual `[-|~]field:value` form.
pub trait BackendParams: Send {
    fn search_class_id(&self) -> &str;

    fn init_from_request(&mut self, request: &RawRequest);
    fn init_search(&mut self, request: &RawRequest);
    fn init_sort(&mut self, request: &RawRequest);

    fn set_basic_search(&mut self, lookfor: &str, handler: Option<&str>);
    fn set_sort(&mut self, sort: Option<&str>);

    fn limit(&self) -> usize;
    fn offset(&self) -> usize;

    fn add_filter(&mut self, expr: &str);
    fn add_hidden_filter(&mut self, expr: &str);
    fn remove_filter(&mut self, expr: &str);
    /// Remove every filter on `field`, or all filters when `field` is `None`.
    fn remove_all_filters(&mut self, field: Option<&str>);

    fn add_facet(&mut self, field: &str, alias: Option<&str>, or_facet: bool);
    fn add_checkbox_facet(&mut self, expr: &str, description: &str);

    /// Active user filters (hidden filters excluded).
    fn filter_list(&self) -> Vec<CanonicalFilter>;
    fn query(&self) -> Query;

    /// Native parameters for the backend. Connectors that cannot produce them
    /// keep this default, which reports a configuration error.
    fn backend_parameters(&self) -> Result<ParamBag> {
        Err(Error::MissingCapability {
            backend: self.search_class_id().to_string(),
            capability: "backend_parameters",
        })
    }

    fn clone_box(&self) -> Box<dyn BackendParams>;
}

impl Clone for Box<dyn BackendParams> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

/// Entry point to the aggregating backend (and any other backend reachable by
/// command).
pub trait SearchService {
    fn invoke(&self, command: &SearchCommand) -> Result<RecordCollection>;
}

/// A single source catalog queried by the in-process aggregator.
pub trait SearchBackend: Send + Sync {
    fn identifier(&self) -> &str;
    fn search(&self, query: &Query, offset: usize, limit: usize, params: &ParamBag) -> Result<RecordCollection>;
}

pub trait SpellingProcessor {
    fn suggestions(&self, spellcheck: &Spellcheck, query: &Query) -> Vec<Suggestion>;
}

/// Repairs a query the backend refused to parse. `None` means nothing could
/// be fixed.
pub trait QuerySanitizer {
    fn fix(&self, query: &Query) -> Option<Query>;
}
