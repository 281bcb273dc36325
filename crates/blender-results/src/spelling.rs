//! Default spelling suggestion filter.

use serde::{Deserialize, Serialize};

use blender_core::config::Config;
use blender_core::traits::SpellingProcessor;
use blender_core::types::{Query, Spellcheck, Suggestion};

/// `[spelling]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpellingSettings {
    /// Maximum suggestions kept per term.
    pub limit: usize,
    /// Never suggest for, or suggest, numeric terms.
    pub skip_numeric: bool,
}

impl Default for SpellingSettings {
    fn default() -> Self {
        Self { limit: 3, skip_numeric: true }
    }
}

impl SpellingSettings {
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        if !config.contains("spelling") {
            return Ok(Self::default());
        }
        config.get("spelling")
    }
}

#[derive(Debug, Clone, Default)]
pub struct DefaultSpellingProcessor {
    settings: SpellingSettings,
}

impl DefaultSpellingProcessor {
    pub fn new(settings: SpellingSettings) -> Self {
        Self { settings }
    }

    fn is_numeric(term: &str) -> bool {
        let term = term.trim();
        term.parse::<f64>().is_ok()
            && term.chars().all(|c| c.is_ascii_digit() || matches!(c, '.' | '-' | '+' | 'e' | 'E'))
    }

    /// Terms must appear in the query; suggestions must not.
    fn skip(&self, query: &Query, term: &str, is_suggestion: bool) -> bool {
        if self.settings.skip_numeric && Self::is_numeric(term) {
            return true;
        }
        query.contains_term(term) == is_suggestion
    }
}

impl SpellingProcessor for DefaultSpellingProcessor {
    fn suggestions(&self, spellcheck: &Spellcheck, query: &Query) -> Vec<Suggestion> {
        let mut all = Vec::new();
        for term in &spellcheck.terms {
            if self.skip(query, &term.term, false) {
                continue;
            }
            let suggestions: Vec<(String, u64)> = term
                .suggestions
                .iter()
                .filter(|(word, _)| !self.skip(query, word, true))
                .take(self.settings.limit)
                .cloned()
                .collect();
            if !suggestions.is_empty() {
                all.push(Suggestion { term: term.term.clone(), freq: term.orig_freq, suggestions });
            }
        }
        match &spellcheck.secondary {
            Some(secondary) if all.is_empty() => self.suggestions(secondary, query),
            _ => all,
        }
    }
}
