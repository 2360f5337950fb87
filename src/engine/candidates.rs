use std::collections::HashSet;

use crate::model::Category;

/// Retrieval results at or above this size are used as-is.
pub const TRUST_RETRIEVAL_THRESHOLD: usize = 20;
/// Catalog entries appended when retrieval comes back short.
pub const FALLBACK_TAIL: usize = 30;

/// Builds the candidate pool shown to the model: ranked retrieval hits first,
/// topped up from the catalog when retrieval finds fewer than 20.
pub fn build<'a>(retrieved: Vec<&'a Category>, catalog: &'a [Category]) -> Vec<&'a Category> {
    let mut seen = HashSet::<&str>::with_capacity(retrieved.len() + FALLBACK_TAIL);
    let mut candidates = Vec::with_capacity(retrieved.len() + FALLBACK_TAIL);

    for category in retrieved {
        if seen.insert(category.category_id.as_str()) {
            candidates.push(category);
        }
    }

    if candidates.len() >= TRUST_RETRIEVAL_THRESHOLD {
        return candidates;
    }

    let mut appended = 0;
    for category in catalog {
        if appended == FALLBACK_TAIL {
            break;
        }
        if seen.insert(category.category_id.as_str()) {
            candidates.push(category);
            appended += 1;
        }
    }

    candidates
}
