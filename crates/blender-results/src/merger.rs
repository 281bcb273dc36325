//! Blended query execution with one query-parse recovery.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use blender_core::traits::{BackendParams, QuerySanitizer, SearchService, SpellingProcessor};
use blender_core::types::{
    BackendId, FacetCounts, Query, Record, RecordCollection, SearchCommand, SearchError, Suggestion,
};
use blender_core::Result;

use crate::sanitize::EscapeColons;
use crate::spelling::DefaultSpellingProcessor;

/// Identifier of the aggregating backend commands are addressed to.
pub const BLENDER_BACKEND_ID: &str = "Blender";

/// Unified response of one blended search.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BlendedResponse {
    /// The query that produced the result (sanitized after a recovery).
    pub query: Query,
    pub records: Vec<Record>,
    pub facets: FacetCounts,
    pub spelling_query: String,
    pub suggestions: Vec<Suggestion>,
    pub total: u64,
    /// Partial failures reported by the aggregating backend.
    pub errors: Vec<SearchError>,
}

pub struct ResultMerger {
    backend_id: BackendId,
    sanitizer: Box<dyn QuerySanitizer>,
    spelling: Box<dyn SpellingProcessor>,
}

impl Default for ResultMerger {
    fn default() -> Self {
        Self::new(BLENDER_BACKEND_ID)
    }
}

impl ResultMerger {
    pub fn new(backend_id: impl Into<BackendId>) -> Self {
        Self {
            backend_id: backend_id.into(),
            sanitizer: Box::new(EscapeColons),
            spelling: Box::new(DefaultSpellingProcessor::default()),
        }
    }

    pub fn with_sanitizer(mut self, sanitizer: Box<dyn QuerySanitizer>) -> Self {
        self.sanitizer = sanitizer;
        self
    }

    pub fn with_spelling_processor(mut self, spelling: Box<dyn SpellingProcessor>) -> Self {
        self.spelling = spelling;
        self
    }

    fn command(&self, query: Query, offset: usize, limit: usize, params: &dyn BackendParams) -> Result<SearchCommand> {
        Ok(SearchCommand {
            backend_id: self.backend_id.clone(),
            query,
            offset,
            limit,
            params: params.backend_parameters()?,
        })
    }

    /// Run the search once. A query-parse error gets exactly one retry with a
    /// sanitized query and a freshly built parameter bag; if that fails too,
    /// the first error is returned. Other errors are returned as-is.
    pub fn execute(
        &self,
        params: &dyn BackendParams,
        offset: usize,
        limit: usize,
        service: &dyn SearchService,
    ) -> Result<BlendedResponse> {
        let query = params.query();
        let first = self.command(query.clone(), offset, limit, params)?;
        let error = match service.invoke(&first) {
            Ok(collection) => return Ok(self.resolve(query, collection)),
            Err(e) if e.is_retriable() => e,
            Err(e) => return Err(e),
        };

        let Some(fixed) = self.sanitizer.fix(&query).filter(|q| *q != query) else {
            debug!(error = %error, "Query could not be sanitized");
            return Err(error);
        };
        warn!(original = %query, sanitized = %fixed, "Retrying search with sanitized query");

        let retry = self.command(fixed.clone(), offset, limit, params)?;
        match service.invoke(&retry) {
            Ok(collection) => Ok(self.resolve(fixed, collection)),
            Err(retry_error) => {
                debug!(error = %retry_error, "Sanitized query failed as well");
                Err(error)
            }
        }
    }

    /// [`execute`](Self::execute) with the paging the parameters carry.
    pub fn search(&self, params: &dyn BackendParams, service: &dyn SearchService) -> Result<BlendedResponse> {
        self.execute(params, params.offset(), params.limit(), service)
    }

    fn resolve(&self, query: Query, collection: RecordCollection) -> BlendedResponse {
        for error in &collection.errors {
            warn!(message = %error.message, tokens = ?error.tokens, "Partial search failure");
        }
        let suggestions = self.spelling.suggestions(&collection.spellcheck, &query);
        BlendedResponse {
            query,
            records: collection.records,
            facets: collection.facets,
            spelling_query: collection.spellcheck.query,
            suggestions,
            total: collection.total,
            errors: collection.errors,
        }
    }
}
