//! Merge native facet counts of several backends into canonical facets.

use blender_core::config::BackendConfig;
use blender_core::types::{FacetCount, FacetCounts, RecordCollection, BACKEND_FIELD};
use blender_mapping::{coerce_bool, FacetType, MappingTable};

/// `<depth>/<part>/.../`
fn is_hierarchical_value(value: &str) -> bool {
    match value.split_once('/') {
        Some((depth, rest)) => {
            !depth.is_empty() && depth.chars().all(|c| c.is_ascii_digit()) && rest.len() > 1 && rest.ends_with('/')
        }
        None => false,
    }
}

fn add_count(list: &mut Vec<(String, u64)>, value: &str, count: u64) {
    match list.iter_mut().find(|(v, _)| v == value) {
        Some((_, total)) => *total += count,
        None => list.push((value.to_string(), count)),
    }
}

/// Counts for every canonical facet field of the mapping table, plus a
/// `blender_backend` facet holding each configured backend's total.
///
/// Values are mapped back through the value rewrites. Boolean facets keep only
/// mapped values, as `true`/`false`. Hierarchical values not already in
/// `depth/.../` form become top-level values, and every count is also added to
/// each ancestor level.
pub fn merge_facets(
    mappings: &MappingTable,
    configured: &[BackendConfig],
    collections: &[(&str, &RecordCollection)],
) -> FacetCounts {
    let mut merged = FacetCounts::new();

    for (field, settings) in mappings.facet_fields() {
        let mut list: Vec<(String, u64)> = Vec::new();
        for (backend, collection) in collections {
            let Some(mapping) = settings.per_backend.get(*backend) else {
                continue;
            };
            let counts = collection
                .facets
                .get(&mapping.native_field)
                .map(Vec::as_slice)
                .unwrap_or_default();
            for count in counts {
                let mut value = match mapping.canonical_value(&count.value) {
                    Some(canonical) if settings.facet_type == FacetType::Boolean => {
                        coerce_bool(canonical).to_string()
                    }
                    Some(canonical) => canonical.to_string(),
                    None if settings.facet_type == FacetType::Boolean => continue,
                    None => count.value.clone(),
                };
                if settings.facet_type != FacetType::Hierarchical {
                    add_count(&mut list, &value, count.count);
                    continue;
                }

                if !is_hierarchical_value(&value) {
                    value = format!("0/{value}/");
                }
                add_count(&mut list, &value, count.count);
                let mut parts = value.split('/');
                let level: usize = parts.next().and_then(|d| d.parse().ok()).unwrap_or(0);
                let parts: Vec<&str> = parts.collect();
                for i in (0..level).rev() {
                    if parts.len() <= i {
                        continue;
                    }
                    let key = format!("{i}/{}/", parts[..=i].join("/"));
                    add_count(&mut list, &key, count.count);
                }
            }
        }
        list.sort_by(|a, b| b.1.cmp(&a.1));
        merged.insert(
            field.clone(),
            list.into_iter().map(|(value, count)| FacetCount::new(value, count)).collect(),
        );
    }

    let totals = configured
        .iter()
        .map(|b| {
            let total = collections
                .iter()
                .find(|(id, _)| *id == b.id)
                .map_or(0, |(_, c)| c.total);
            FacetCount::new(b.id.clone(), total)
        })
        .collect();
    merged.insert(BACKEND_FIELD.to_string(), totals);
    merged
}
