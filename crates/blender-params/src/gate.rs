//! Per-request record of backends that must be kept out of the blended
//! result.

use blender_core::types::{BackendId, CanonicalFilter, BACKEND_FIELD};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct GateEntry {
    backend: BackendId,
    pinned: bool,
    filters: Vec<CanonicalFilter>,
}

impl GateEntry {
    fn is_disabled(&self) -> bool {
        self.pinned || !self.filters.is_empty()
    }
}

/// Backends excluded for the rest of a request.
///
/// A backend is excluded either explicitly ([`disable`](Self::disable)) or
/// because at least one active filter could not be translated for it. The
/// second kind is released again when the filter is removed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapabilityGate {
    entries: Vec<GateEntry>,
}

impl CapabilityGate {
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(&mut self, backend: &str) -> &mut GateEntry {
        let pos = match self.entries.iter().position(|e| e.backend == backend) {
            Some(pos) => pos,
            None => {
                self.entries.push(GateEntry { backend: backend.to_string(), ..GateEntry::default() });
                self.entries.len() - 1
            }
        };
        &mut self.entries[pos]
    }

    /// Idempotent.
    pub fn disable(&mut self, backend: &str) {
        self.entry(backend).pinned = true;
    }

    pub fn record_unsupported(&mut self, backend: &str, filter: CanonicalFilter) {
        self.entry(backend).filters.push(filter);
    }

    /// Forget `filter` for every backend.
    pub fn release(&mut self, filter: &CanonicalFilter) {
        for entry in &mut self.entries {
            entry.filters.retain(|f| f != filter);
        }
    }

    /// Forget every unsupported filter on `field`.
    pub fn release_field(&mut self, field: &str) {
        for entry in &mut self.entries {
            entry.filters.retain(|f| f.field != field);
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn is_disabled(&self, backend: &str) -> bool {
        self.entries.iter().any(|e| e.backend == backend && e.is_disabled())
    }

    /// Disabled backends in the order they were first gated.
    pub fn disabled(&self) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|e| e.is_disabled())
            .map(|e| e.backend.as_str())
            .collect()
    }

    /// Filters that caused `backend` to be gated.
    pub fn unsupported_filters(&self, backend: &str) -> &[CanonicalFilter] {
        self.entries
            .iter()
            .find(|e| e.backend == backend)
            .map(|e| e.filters.as_slice())
            .unwrap_or_default()
    }

    /// Negative filters keeping disabled backends' records out of the
    /// blended index.
    pub fn exclusion_clause(&self) -> Vec<String> {
        self.disabled()
            .into_iter()
            .map(|backend| format!("-{BACKEND_FIELD}:\"{backend}\""))
            .collect()
    }
}
