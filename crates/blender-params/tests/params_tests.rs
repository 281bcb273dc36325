use std::sync::Arc;

use proptest::prelude::*;

use blender_core::traits::BackendParams;
use blender_core::types::{CanonicalFilter, Query, RawRequest};
use blender_core::Error;
use blender_mapping::{BackendFacetMapping, FacetFieldMapping, FacetType, IgnoreRule, MappingTable};
use blender_params::{BlendedParams, CapabilityGate, StandardParams};

fn table() -> MappingTable {
    MappingTable::builder()
        .facet(
            "format",
            FacetFieldMapping::new(FacetType::Normal).with_backend("A", BackendFacetMapping::new("type")),
        )
        .facet(
            "access",
            FacetFieldMapping::new(FacetType::Normal)
                .with_backend("A", BackendFacetMapping::new("access").with_default("public")),
        )
        .facet(
            "collection",
            FacetFieldMapping::new(FacetType::Normal)
                .with_backend(
                    "A",
                    BackendFacetMapping::new("coll").with_ignore(IgnoreRule::Values(vec!["all".into()])),
                )
                .with_backend("B", BackendFacetMapping::new("collection_str")),
        )
        .search_type("Title", "A", "TI")
        .sort("year", "A", "date")
        .build()
}

fn blended() -> BlendedParams {
    let secondaries: Vec<Box<dyn BackendParams>> =
        vec![Box::new(StandardParams::new("A")), Box::new(StandardParams::new("B"))];
    BlendedParams::new(Arc::new(table()), Box::new(StandardParams::new("Blender")), secondaries)
}

fn fq_of(p: &BlendedParams, backend: &str) -> Vec<String> {
    let bag = p.backend_parameters().expect("params");
    bag.bag(&format!("params_{backend}"))
        .expect("secondary bag")
        .texts("fq")
        .into_iter()
        .map(str::to_string)
        .collect()
}

#[test]
fn untranslatable_filter_excludes_backend() {
    let mut p = blended();
    p.add_filter("format:Book");

    assert!(p.gate().is_disabled("B"));
    assert!(!p.gate().is_disabled("A"));
    assert!(p.secondary("B").unwrap().filter_list().is_empty());
    assert_eq!(p.secondary("A").unwrap().filter_list(), vec![CanonicalFilter::new("type", "Book")]);
    assert_eq!(p.filter_list(), vec![CanonicalFilter::new("format", "Book")]);

    let bag = p.backend_parameters().unwrap();
    assert_eq!(bag.texts("fq"), vec!["format:\"Book\"", "-blender_backend:\"B\""]);
}

#[test]
fn backend_pin_stays_canonical() {
    let mut p = blended();
    p.add_filter("blender_backend:A");
    assert!(p.gate().disabled().is_empty());
    assert!(p.secondary("A").unwrap().filter_list().is_empty());
    assert!(p.secondary("B").unwrap().filter_list().is_empty());
    assert_eq!(p.filter_list().len(), 1);
}

#[test]
fn ignore_sentinel_is_dropped_without_excluding() {
    let mut p = blended();
    p.add_filter("collection:all");
    assert!(p.gate().disabled().is_empty());
    assert!(p.secondary("A").unwrap().filter_list().is_empty());
    assert_eq!(p.secondary("B").unwrap().filter_list(), vec![CanonicalFilter::new("collection_str", "all")]);
}

#[test]
fn hidden_filters_use_hidden_channel() {
    let mut p = blended();
    p.add_hidden_filter("format:Book");
    assert!(p.gate().is_disabled("B"));
    // Hidden filters are not part of the user filter list
    assert!(p.secondary("A").unwrap().filter_list().is_empty());
    assert_eq!(fq_of(&p, "A"), vec!["type:\"Book\"", "access:\"public\""]);
}

#[test]
fn checkbox_facets_translate_and_exclude() {
    let mut p = blended();
    p.add_checkbox_facet("format:Book", "Books only");
    assert!(p.gate().is_disabled("B"));
    let bag = p.backend_parameters().unwrap();
    let a = bag.bag("params_A").unwrap();
    assert_eq!(a.texts("facet.query"), vec!["type:\"Book\""]);
}

#[test]
fn unsupported_facet_is_omitted_not_fatal() {
    let mut p = blended();
    p.add_facet("format", None, true);
    assert!(p.gate().disabled().is_empty());

    let bag = p.backend_parameters().unwrap();
    assert_eq!(bag.texts("facet.field"), vec!["{!ex=format_filter}format"]);
    assert_eq!(bag.bag("params_A").unwrap().texts("facet.field"), vec!["{!ex=type_filter}type"]);
    assert!(!bag.bag("params_B").unwrap().contains("facet.field"));
}

#[test]
fn default_filter_injected_once() {
    let p = blended();
    let first = fq_of(&p, "A");
    let second = fq_of(&p, "A");
    assert_eq!(first.iter().filter(|f| *f == "access:\"public\"").count(), 1);
    assert_eq!(first, second);
    // The backend's own parameters are left untouched
    assert!(p.secondary("A").unwrap().filter_list().is_empty());
}

#[test]
fn explicit_filter_suppresses_default() {
    let mut p = blended();
    p.add_filter("access:restricted");
    assert_eq!(fq_of(&p, "A"), vec!["access:\"restricted\""]);
}

#[test]
fn no_defaults_for_disabled_backend() {
    let mut p = blended();
    p.disable_backend("A");
    assert!(fq_of(&p, "A").is_empty());
}

#[test]
fn remove_filter_releases_gate() {
    let mut p = blended();
    p.add_filter("format:Book");
    p.add_filter("format:Journal");
    p.remove_filter("format:Book");
    assert!(p.gate().is_disabled("B"), "Journal still unsupported");
    assert_eq!(p.secondary("A").unwrap().filter_list(), vec![CanonicalFilter::new("type", "Journal")]);

    p.remove_filter("format:Journal");
    assert!(!p.gate().is_disabled("B"));
    assert!(p.gate().exclusion_clause().is_empty());
    assert!(p.filter_list().is_empty());
}

#[test]
fn remove_all_filters_by_field_and_globally() {
    let mut p = blended();
    p.add_filter("format:Book");
    p.add_filter("collection:x");
    p.remove_all_filters(Some("format"));
    assert!(p.gate().disabled().is_empty());
    assert_eq!(p.secondary("A").unwrap().filter_list(), vec![CanonicalFilter::new("coll", "x")]);

    p.add_filter("format:Book");
    p.disable_backend("A");
    p.remove_all_filters(None);
    assert!(p.gate().disabled().is_empty());
    assert!(p.filter_list().is_empty());
    assert!(p.secondary("A").unwrap().filter_list().is_empty());
    assert!(p.secondary("B").unwrap().filter_list().is_empty());
}

#[test]
fn init_from_request_translates_per_backend() {
    let request = RawRequest::new()
        .with("lookfor", "rust")
        .with("type", "Title")
        .with("sort", "year")
        .with_all("filter", ["format:Book"])
        .with("limit", "50")
        .with("page", "2");

    let mut p = blended();
    p.init_from_request(&request);

    assert_eq!(p.query(), Query::basic("rust", Some("Title")));
    assert_eq!(p.limit(), 50);
    assert_eq!(p.offset(), 50);
    assert_eq!(p.secondary("A").unwrap().limit(), 50);
    assert_eq!(p.secondary("A").unwrap().query(), Query::basic("rust", Some("TI")));
    assert_eq!(p.secondary("B").unwrap().query(), Query::basic("rust", None));
    assert!(p.gate().is_disabled("B"));

    let bag = p.backend_parameters().unwrap();
    assert_eq!(bag.first_text("sort"), Some("year"));
    assert_eq!(bag.bag("params_A").unwrap().first_text("sort"), Some("date"));
    assert!(!bag.bag("params_B").unwrap().contains("sort"));
    assert_eq!(bag.query("query_A"), Some(&Query::basic("rust", Some("TI"))));
}

#[test]
fn reinitialising_drops_earlier_filters_with_their_exclusions() {
    let mut p = blended();
    p.add_filter("format:Book");
    p.add_hidden_filter("format:Map");
    p.add_checkbox_facet("format:Journal", "Journals only");
    assert!(p.gate().is_disabled("B"));

    p.init_from_request(&RawRequest::new().with("lookfor", "x"));
    assert!(p.gate().disabled().is_empty());
    assert!(p.filter_list().is_empty());
    assert!(p.secondary("A").unwrap().filter_list().is_empty());
    let bag = p.backend_parameters().unwrap();
    assert!(bag.texts("fq").is_empty(), "stale fq: {:?}", bag.texts("fq"));
    assert!(!bag.contains("facet.query"));
    assert!(fq_of(&p, "A").iter().all(|f| !f.starts_with("type:")));
}

#[test]
fn reinitialising_with_filters_keeps_gate_consistent() {
    let mut p = blended();
    p.add_filter("format:Book");
    p.init_from_request(&RawRequest::new().with("lookfor", "x").with("filter", "format:Map"));

    assert!(p.gate().is_disabled("B"));
    assert_eq!(p.filter_list(), vec![CanonicalFilter::new("format", "Map")]);
    assert_eq!(
        p.backend_parameters().unwrap().texts("fq"),
        vec!["format:\"Map\"", "-blender_backend:\"B\""]
    );
}

#[test]
fn huge_page_saturates_offset() {
    let mut p = blended();
    p.init_from_request(&RawRequest::new().with("page", usize::MAX.to_string()).with("limit", "20"));
    assert_eq!(p.offset(), usize::MAX);

    let mut standard = StandardParams::new("Solr");
    standard.init_from_request(&RawRequest::new().with("page", "0"));
    assert_eq!(standard.offset(), 0);
}

#[test]
fn advanced_search_types_translated() {
    let request = RawRequest::new()
        .with_all("lookfor0", ["a", "b"])
        .with_all("type0", ["Title", "Author"])
        .with("bool0", "OR");

    let mut p = blended();
    p.init_search(&request);

    let expected = |first: Option<&str>, second: Option<&str>| Query::Group {
        operator: "AND".into(),
        queries: vec![Query::Group {
            operator: "OR".into(),
            queries: vec![Query::basic("a", first), Query::basic("b", second)],
        }],
    };
    assert_eq!(p.query(), expected(Some("Title"), Some("Author")));
    assert_eq!(p.secondary("A").unwrap().query(), expected(Some("TI"), None));
}

#[test]
fn basic_search_and_sort_setters_translate() {
    let mut p = blended();
    p.set_basic_search("dune", Some("Title"));
    p.set_sort(Some("year"));
    assert_eq!(p.secondary("A").unwrap().query(), Query::basic("dune", Some("TI")));
    let bag = p.backend_parameters().unwrap();
    assert_eq!(bag.bag("params_A").unwrap().first_text("sort"), Some("date"));
}

#[derive(Clone)]
struct BareParams;

impl BackendParams for BareParams {
    fn search_class_id(&self) -> &str {
        "Bare"
    }
    fn init_from_request(&mut self, _request: &RawRequest) {}
    fn init_search(&mut self, _request: &RawRequest) {}
    fn init_sort(&mut self, _request: &RawRequest) {}
    fn set_basic_search(&mut self, _lookfor: &str, _handler: Option<&str>) {}
    fn set_sort(&mut self, _sort: Option<&str>) {}
    fn limit(&self) -> usize {
        20
    }
    fn offset(&self) -> usize {
        0
    }
    fn add_filter(&mut self, _expr: &str) {}
    fn add_hidden_filter(&mut self, _expr: &str) {}
    fn remove_filter(&mut self, _expr: &str) {}
    fn remove_all_filters(&mut self, _field: Option<&str>) {}
    fn add_facet(&mut self, _field: &str, _alias: Option<&str>, _or_facet: bool) {}
    fn add_checkbox_facet(&mut self, _expr: &str, _description: &str) {}
    fn filter_list(&self) -> Vec<CanonicalFilter> {
        Vec::new()
    }
    fn query(&self) -> Query {
        Query::default()
    }
    fn clone_box(&self) -> Box<dyn BackendParams> {
        Box::new(self.clone())
    }
}

#[test]
fn secondary_without_parameters_fails_loudly() {
    let secondaries: Vec<Box<dyn BackendParams>> = vec![Box::new(BareParams)];
    let p = BlendedParams::new(Arc::new(table()), Box::new(StandardParams::new("Blender")), secondaries);
    match p.backend_parameters() {
        Err(Error::MissingCapability { backend, .. }) => assert_eq!(backend, "Bare"),
        other => panic!("unexpected: {other:?}"),
    }
}

#[test]
fn standard_params_filter_queries() {
    let mut p = StandardParams::new("Solr");
    p.add_hidden_filter("building:main");
    p.add_filter("~format:A");
    p.add_filter("~format:B");
    p.add_filter("~format:B");
    p.add_filter("-lang:fi");
    p.add_filter("year:[2000 TO 2010]");
    p.add_filter("title:foo*");
    p.add_filter("author:Say \"hi\"");
    p.add_filter("garbage");

    assert_eq!(
        p.filter_queries(),
        vec![
            "building:\"main\"".to_string(),
            "-lang:\"fi\"".to_string(),
            "year:[2000 TO 2010]".to_string(),
            "title:foo*".to_string(),
            "author:\"Say \\\"hi\\\"\"".to_string(),
            "{!tag=format_filter}format:(format:\"A\" OR format:\"B\")".to_string(),
        ]
    );
    assert_eq!(p.filter_list().len(), 6);
}

#[test]
fn standard_params_paging() {
    let mut p = StandardParams::new("Solr");
    p.init_from_request(&RawRequest::new().with("limit", "10").with("page", "3"));
    assert_eq!((p.limit(), p.offset()), (10, 20));

    p.init_from_request(&RawRequest::new().with("limit", "1000").with("page", "-1"));
    assert_eq!((p.limit(), p.offset()), (20, 0));
}

proptest! {
    #[test]
    fn unmapped_filters_never_reach_backend(field in "[a-z]{1,8}", value in "[A-Za-z0-9]{1,12}") {
        prop_assume!(field != "format" && field != "access" && field != "collection");
        let mut p = blended();
        p.add_filter(&format!("{field}:{value}"));
        prop_assert!(p.gate().is_disabled("A"));
        prop_assert!(p.gate().is_disabled("B"));
        prop_assert!(p.secondary("A").unwrap().filter_list().is_empty());
        prop_assert!(p.secondary("B").unwrap().filter_list().is_empty());
    }

    #[test]
    fn disable_is_idempotent(ids in proptest::collection::vec("[A-Z]{1,3}", 0..6)) {
        let mut once = CapabilityGate::new();
        let mut twice = CapabilityGate::new();
        for id in &ids {
            once.disable(id);
            twice.disable(id);
            twice.disable(id);
        }
        prop_assert_eq!(&once, &twice);
        prop_assert_eq!(once.exclusion_clause(), twice.exclusion_clause());
    }
}
