use crate::storage::{BlogDraft, BlogRecord};

/// Returns true if writing `candidate` would change `existing`.
///
/// Blank and absent optional values are equivalent. The canonical URL is
/// only compared when the candidate carries a non-blank one, so a feed that
/// stops declaring its site never erases the stored link.
pub fn differs(existing: &BlogRecord, candidate: &BlogDraft) -> bool {
    existing.external_id != candidate.external_id
        || existing.author != candidate.author
        || present(existing.twitter.as_deref()) != present(candidate.twitter.as_deref())
        || existing.rss_url != candidate.rss_url
        || existing.category != candidate.category
        || canonical_changed(
            existing.canonical_url.as_deref(),
            candidate.canonical_url.as_deref(),
        )
}

fn present(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

fn canonical_changed(existing: Option<&str>, candidate: Option<&str>) -> bool {
    match present(candidate) {
        Some(candidate) => present(existing) != Some(candidate),
        None => false,
    }
}
