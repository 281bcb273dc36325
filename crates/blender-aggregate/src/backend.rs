use std::collections::VecDeque;
use std::sync::Arc;

use tracing::{debug, error, warn};

use blender_core::config::{BackendConfig, Config};
use blender_core::traits::{SearchBackend, SearchService};
use blender_core::types::{
    BackendId, ParamBag, Query, Record, RecordCollection, SearchCommand, SearchError, BACKEND_FIELD,
};
use blender_core::{Error, Result};
use blender_mapping::MappingTable;

use crate::blocks::{backend_at_position, BlockPlan};
use crate::facets::merge_facets;

/// Error message attached when some, but not all, backends failed.
pub const PARTIAL_FAILURE: &str = "search_backend_partial_failure";

const MIN_BLEND_LIMIT: usize = 20;
const OR_PIN_PREFIX: &str = "{!tag=blender_backend_filter}blender_backend:(";

struct Source {
    config: BackendConfig,
    backend: Arc<dyn SearchBackend>,
}

/// What one active backend is asked for.
struct Plan<'a> {
    source: &'a Source,
    query: Query,
    params: ParamBag,
}

impl Plan<'_> {
    fn id(&self) -> &str {
        &self.source.config.id
    }

    fn search(&self, offset: usize, limit: usize) -> Result<Vec<Record>> {
        let collection = self.source.backend.search(&self.query, offset, limit, &self.params)?;
        Ok(collection.records.into_iter().map(|r| self.tag(r)).collect())
    }

    fn tag(&self, mut record: Record) -> Record {
        record.source = self.source.config.id.clone();
        let label = &self.source.config.label;
        if !label.is_empty() && !record.labels.contains(label) {
            record.labels.push(label.clone());
        }
        record
    }
}

/// Cursor over one backend's hits during the fill phase.
struct Cursor {
    queue: VecDeque<Record>,
    offset: usize,
    total: u64,
}

/// Aggregating backend blending several source catalogs into one result.
pub struct BlenderBackend {
    identifier: BackendId,
    sources: Vec<Source>,
    mappings: Arc<MappingTable>,
    plan: BlockPlan,
}

impl BlenderBackend {
    pub fn new(identifier: impl Into<BackendId>, mappings: Arc<MappingTable>, plan: BlockPlan) -> Self {
        Self { identifier: identifier.into(), sources: Vec::new(), mappings, plan }
    }

    /// Register a source catalog; registration order is the blending order.
    pub fn with_backend(mut self, config: BackendConfig, backend: Arc<dyn SearchBackend>) -> Self {
        self.sources.push(Source { config, backend });
        self
    }

    /// Wire the configured `[[backends]]` to the given connectors by id.
    pub fn from_config(
        identifier: impl Into<BackendId>,
        config: &Config,
        mappings: Arc<MappingTable>,
        connectors: &[Arc<dyn SearchBackend>],
    ) -> anyhow::Result<Self> {
        let plan = BlockPlan::from_config(&config.blending()?)?;
        let mut blender = Self::new(identifier, mappings, plan);
        for backend in config.backends()? {
            let Some(connector) = connectors.iter().find(|c| c.identifier() == backend.id) else {
                anyhow::bail!("No connector for configured backend '{}'", backend.id);
            };
            blender = blender.with_backend(backend, Arc::clone(connector));
        }
        Ok(blender)
    }

    fn source(&self, id: &str) -> Option<&Source> {
        self.sources.iter().find(|s| s.config.id == id)
    }

    fn configured(&self) -> Vec<BackendConfig> {
        self.sources.iter().map(|s| s.config.clone()).collect()
    }

    fn blend_limit(&self) -> usize {
        MIN_BLEND_LIMIT.max(self.plan.initial_results.len())
    }

    /// Sources selected by the `blender_backend` pseudo-filters in `fq`.
    ///
    /// Positive filters (plain or OR-grouped) narrow the set, negative ones
    /// remove from it. Unknown ids are ignored.
    fn active_sources(&self, params: &ParamBag) -> Vec<&Source> {
        let fq = params.texts("fq");
        let pin = format!("{BACKEND_FIELD}:");
        let exclude = format!("-{BACKEND_FIELD}:");

        let mut pinned: Vec<&Source> = Vec::new();
        for filter in &fq {
            let members: Vec<&str> = match or_members(filter) {
                Some(inner) => inner.split(" OR ").collect(),
                None => vec![*filter],
            };
            for member in members {
                let Some(id) = member.strip_prefix(pin.as_str()) else {
                    continue;
                };
                let id = id.trim_matches('"');
                match self.source(id) {
                    Some(source) if !pinned.iter().any(|s| s.config.id == id) => pinned.push(source),
                    Some(_) => {}
                    None => warn!(backend = id, "Invalid blender_backend filter: backend not enabled"),
                }
            }
        }

        let mut active: Vec<&Source> = if pinned.is_empty() { self.sources.iter().collect() } else { pinned };
        for filter in &fq {
            if let Some(id) = filter.strip_prefix(exclude.as_str()) {
                let id = id.trim_matches('"');
                active.retain(|s| s.config.id != id);
            }
        }
        active
    }

    pub fn search(&self, query: &Query, offset: usize, limit: usize, params: &ParamBag) -> Result<RecordCollection> {
        let plans: Vec<Plan<'_>> = self
            .active_sources(params)
            .into_iter()
            .map(|source| {
                let id = &source.config.id;
                Plan {
                    source,
                    query: params.query(&format!("query_{id}")).cloned().unwrap_or_else(|| query.clone()),
                    params: params.bag(&format!("params_{id}")).cloned().unwrap_or_default(),
                }
            })
            .collect();
        if plans.is_empty() {
            return Ok(RecordCollection::default());
        }

        let blend_limit = if limit == 0 { 0 } else { self.blend_limit() };
        let mut collections: Vec<(usize, RecordCollection)> = Vec::new();
        let mut failures: Vec<(usize, Error)> = Vec::new();
        for (i, plan) in plans.iter().enumerate() {
            match plan.source.backend.search(&plan.query, 0, blend_limit, &plan.params) {
                Ok(collection) => collections.push((i, collection)),
                Err(e) => failures.push((i, e)),
            }
        }

        let mut merged = RecordCollection::default();
        if collections.is_empty() {
            if let Some((_, e)) = failures.into_iter().next() {
                return Err(e);
            }
        } else if !failures.is_empty() {
            let mut labels = Vec::new();
            for (i, e) in &failures {
                error!(backend = plans[*i].id(), error = %e, "Search in backend failed");
                labels.push(plans[*i].source.config.label.as_str());
            }
            merged.add_error(SearchError::new(PARTIAL_FAILURE).with_token("%%sources%%", labels.join(", ")));
        }

        merged.total = collections.iter().map(|(_, c)| c.total).sum();
        let block_size = self.plan.block_size_for(merged.total);
        debug!(total = merged.total, block_size, backends = collections.len(), "Blending results");

        merged.facets = {
            let views: Vec<(&str, &RecordCollection)> =
                collections.iter().map(|(i, c)| (plans[*i].id(), c)).collect();
            merge_facets(&self.mappings, &self.configured(), &views)
        };

        // Tag records and carry backend errors over
        let mut cursors: Vec<(usize, Cursor)> = Vec::new();
        for (i, collection) in collections {
            let plan = &plans[i];
            for mut e in collection.errors {
                if e.details.is_none() {
                    e.details = Some(plan.source.config.label.clone());
                }
                merged.add_error(e);
            }
            let queue = collection.records.into_iter().map(|r| plan.tag(r)).collect();
            cursors.push((i, Cursor { queue, offset: 0, total: collection.total }));
        }

        let ids: Vec<&str> = cursors.iter().map(|(i, _)| plans[*i].id()).collect();
        let initial: Vec<&str> = self
            .plan
            .initial_results
            .iter()
            .map(String::as_str)
            .filter(|id| ids.contains(id))
            .collect();
        for pos in 0..blend_limit {
            let Some(id) = backend_at_position(pos, block_size, &ids, &initial) else {
                break;
            };
            let Some(k) = ids.iter().position(|b| *b == id) else {
                continue;
            };
            let cursor = &mut cursors[k].1;
            if let Some(record) = cursor.queue.pop_front() {
                cursor.offset += 1;
                merged.records.push(record);
            }
        }

        if limit > 0 {
            self.fill(&mut merged.records, &plans, &mut cursors, offset.saturating_add(limit), block_size)?;
        }
        merged.records = merged.records.into_iter().skip(offset).take(limit).collect();
        Ok(merged)
    }

    /// Round-robin by block up to `target` records, paging further into the
    /// backends as needed and falling back to other backends when the one
    /// owning a position is exhausted.
    fn fill(
        &self,
        records: &mut Vec<Record>,
        plans: &[Plan<'_>],
        cursors: &mut [(usize, Cursor)],
        target: usize,
        block_size: usize,
    ) -> Result<()> {
        if cursors.is_empty() {
            return Ok(());
        }
        let fetch_size = block_size.max(MIN_BLEND_LIMIT);
        let mut pos = records.len();
        while pos < target {
            let owner = (pos / block_size.max(1)) % cursors.len();
            let order = std::iter::once(owner).chain((0..cursors.len()).filter(|k| *k != owner));
            let mut next = None;
            for k in order {
                let (i, cursor) = &mut cursors[k];
                if cursor.offset as u64 >= cursor.total {
                    continue;
                }
                if cursor.queue.is_empty() {
                    cursor.queue = plans[*i].search(cursor.offset, fetch_size)?.into();
                }
                cursor.offset += 1;
                if let Some(record) = cursor.queue.pop_front() {
                    next = Some(record);
                    break;
                }
            }
            let Some(record) = next else {
                break;
            };
            records.push(record);
            pos += 1;
        }
        Ok(())
    }
}

fn or_members(filter: &str) -> Option<&str> {
    let start = filter.find(OR_PIN_PREFIX)? + OR_PIN_PREFIX.len();
    let end = filter.rfind(')')?;
    (end > start).then(|| &filter[start..end])
}

impl SearchBackend for BlenderBackend {
    fn identifier(&self) -> &str {
        &self.identifier
    }

    fn search(&self, query: &Query, offset: usize, limit: usize, params: &ParamBag) -> Result<RecordCollection> {
        BlenderBackend::search(self, query, offset, limit, params)
    }
}

impl SearchService for BlenderBackend {
    fn invoke(&self, command: &SearchCommand) -> Result<RecordCollection> {
        if command.backend_id != self.identifier {
            return Err(Error::NotFound(format!("backend {}", command.backend_id)));
        }
        BlenderBackend::search(self, &command.query, command.offset, command.limit, &command.params)
    }
}
