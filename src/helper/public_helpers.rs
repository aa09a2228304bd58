use crate::models::{ContentItem, ContentPage, ContentType};
use crate::store::content_store::DEFAULT_PAGE_SIZE;
use crate::store::ContentStore;

pub const DEFAULT_LATEST_LIMIT: usize = 5;
pub const MAX_PAGE_SIZE: usize = 100;

pub fn fetch_item_by_id(store: &ContentStore, id: &str) -> Option<ContentItem> {
    store.get_by_id(id)
}

pub fn fetch_item_by_slug(store: &ContentStore, slug: &str) -> Option<ContentItem> {
    store.get_by_slug(slug)
}

pub fn fetch_featured_item(store: &ContentStore) -> Option<ContentItem> {
    store.get_featured()
}

pub fn fetch_latest_items(store: &ContentStore, limit: Option<usize>) -> Vec<ContentItem> {
    store.get_latest(limit.unwrap_or(DEFAULT_LATEST_LIMIT))
}

/// Page numbers start at 1; the page size is clamped to `1..=MAX_PAGE_SIZE`.
pub fn fetch_content_page(
    store: &ContentStore,
    content_type: Option<ContentType>,
    page: Option<usize>,
    per_page: Option<usize>,
) -> ContentPage {
    let per_page = per_page.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
    store.get_page(content_type, page.unwrap_or(1), per_page)
}
