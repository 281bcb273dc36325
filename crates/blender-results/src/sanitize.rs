use blender_core::traits::QuerySanitizer;
use blender_core::types::Query;

/// Escapes every unescaped `:` so a query the backend refused as field syntax
/// is searched as plain text. Groups are fixed member by member.
#[derive(Debug, Clone, Copy, Default)]
pub struct EscapeColons;

impl EscapeColons {
    fn escape(lookfor: &str) -> String {
        lookfor.replace("\\:", ":").replace(':', "\\:")
    }
}

impl QuerySanitizer for EscapeColons {
    fn fix(&self, query: &Query) -> Option<Query> {
        match query {
            Query::Basic { lookfor, handler } => {
                let fixed = Self::escape(lookfor);
                (fixed != *lookfor).then(|| Query::Basic { lookfor: fixed, handler: handler.clone() })
            }
            Query::Group { operator, queries } => {
                let mut changed = false;
                let queries = queries
                    .iter()
                    .map(|q| match self.fix(q) {
                        Some(fixed) => {
                            changed = true;
                            fixed
                        }
                        None => q.clone(),
                    })
                    .collect();
                changed.then(|| Query::Group { operator: operator.clone(), queries })
            }
        }
    }
}
