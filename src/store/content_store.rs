use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};
use thiserror::Error;
use uuid::Uuid;

use crate::models::db_operations::{ChangeMarker, ContentStorage, DbError};
use crate::models::{ContentItem, ContentPage, ContentPatch, ContentType, NewContentItem};
use crate::store::change_feed::{ChangeFeed, ChangeOrigin, ChangeSignal, ChangeSubscription};
use crate::store::slug;

pub const DEFAULT_PAGE_SIZE: usize = 10;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Storage error: {0}")]
    Storage(#[from] DbError),
    #[error("The slug '{0}' is already used by another item.")]
    SlugConflict(String),
    #[error("Item '{id}' was changed since it was loaded.")]
    VersionConflict { id: String },
    #[error("'{0}' is not a valid slug. Use lowercase letters, digits and single hyphens.")]
    InvalidSlug(String),
    #[error("Duplicate item id '{0}' in import.")]
    DuplicateId(String),
    #[error("Duplicate slug '{0}' in import.")]
    DuplicateSlug(String),
}

/// What a mutation closure decided: `Apply` persists and signals, `Skip`
/// returns the value untouched (e.g. not found).
enum Mutation<T> {
    Apply(T),
    Skip(T),
}

struct Collection {
    newest_first: Vec<ContentItem>,
    marker: ChangeMarker,
}

/// Exclusive owner of the content collection.
///
/// Queries answer from an in-memory copy ordered newest first. Every mutation
/// re-reads the stored document, applies the change, writes the whole
/// document back, bumps the "last updated" marker and publishes a
/// [`ChangeSignal`]. Construct one per process and share it.
pub struct ContentStore {
    storage: Box<dyn ContentStorage>,
    writer_id: String,
    state: RwLock<Collection>,
    writer: Mutex<()>,
    feed: ChangeFeed,
}

impl ContentStore {
    /// Loads the collection. A storage that cannot be read yields an empty
    /// store; the failure is logged.
    pub fn open(storage: Box<dyn ContentStorage>) -> Self {
        let (items, marker) = match load_items(storage.as_ref()) {
            Ok(items) => {
                let marker = storage.last_updated().unwrap_or_else(|e| {
                    log::warn!("Could not read change marker from {}: {}", storage.describe(), e);
                    None
                });
                (items, marker.unwrap_or_default())
            }
            Err(e) => {
                log::error!(
                    "Failed to load content from {}: {}. Starting with an empty collection.",
                    storage.describe(),
                    e
                );
                (Vec::new(), ChangeMarker::default())
            }
        };
        log::info!("Content store opened on {} with {} item(s).", storage.describe(), items.len());

        Self {
            storage,
            writer_id: Uuid::new_v4().to_string(),
            state: RwLock::new(Collection {
                newest_first: newest_first(items),
                marker,
            }),
            writer: Mutex::new(()),
            feed: ChangeFeed::new(),
        }
    }

    // ====================================================================
    // ============================ QUERIES ===============================
    // ====================================================================

    pub fn get_all(&self) -> Vec<ContentItem> {
        self.read_state().newest_first.clone()
    }

    pub fn get_by_type(&self, content_type: ContentType) -> Vec<ContentItem> {
        self.read_state()
            .newest_first
            .iter()
            .filter(|item| item.content_type == content_type)
            .cloned()
            .collect()
    }

    pub fn get_by_slug(&self, slug: &str) -> Option<ContentItem> {
        self.read_state().newest_first.iter().find(|item| item.slug == slug).cloned()
    }

    pub fn get_by_id(&self, id: &str) -> Option<ContentItem> {
        self.read_state().newest_first.iter().find(|item| item.id == id).cloned()
    }

    /// The most recently created item of any type.
    pub fn get_featured(&self) -> Option<ContentItem> {
        self.read_state().newest_first.first().cloned()
    }

    pub fn get_latest(&self, n: usize) -> Vec<ContentItem> {
        self.read_state().newest_first.iter().take(n).cloned().collect()
    }

    /// One page of the newest-first list, optionally restricted to a type.
    /// Pages count from 1; page 0 means page 1.
    pub fn get_page(&self, content_type: Option<ContentType>, page: usize, per_page: usize) -> ContentPage {
        let per_page = if per_page == 0 { DEFAULT_PAGE_SIZE } else { per_page };
        let page = page.max(1);

        let state = self.read_state();
        let matching: Vec<&ContentItem> = state
            .newest_first
            .iter()
            .filter(|item| content_type.map_or(true, |t| item.content_type == t))
            .collect();
        let total_items = matching.len();
        let total_pages = total_items.div_ceil(per_page);
        let items = matching
            .into_iter()
            .skip((page - 1).saturating_mul(per_page))
            .take(per_page)
            .cloned()
            .collect();

        ContentPage {
            items,
            page,
            per_page,
            total_items,
            total_pages,
        }
    }

    pub fn len(&self) -> usize {
        self.read_state().newest_first.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The last change marker this store wrote or observed.
    pub fn version(&self) -> i64 {
        self.read_state().marker.version
    }

    pub fn subscribe(&self) -> ChangeSubscription {
        self.feed.subscribe()
    }

    pub fn storage_description(&self) -> String {
        self.storage.describe()
    }

    // ====================================================================
    // =========================== MUTATIONS ==============================
    // ====================================================================

    pub fn create(&self, fields: NewContentItem) -> Result<ContentItem, StoreError> {
        let item = self.mutate(move |items| {
            let id = Uuid::new_v4().to_string();
            let slug = resolve_slug(items, &fields.slug, &fields.title, &id)?;
            let now = Utc::now();
            let item = ContentItem {
                id,
                title: fields.title,
                description: fields.description,
                date: fields.date,
                content_type: fields.content_type,
                image_url: fields.image_url,
                original_url: fields.original_url,
                slug,
                created_at: now,
                updated_at: now,
            };
            items.push(item.clone());
            Ok(Mutation::Apply(item))
        })?;
        log::info!("Created {} item '{}' ({}).", item.content_type, item.title, item.id);
        Ok(item)
    }

    /// Merges `patch` onto the item. Last write wins.
    pub fn update(&self, id: &str, patch: ContentPatch) -> Result<Option<ContentItem>, StoreError> {
        self.apply_update(id, None, patch)
    }

    /// Like [`update`](Self::update), but refuses when the stored item's
    /// `updated_at` is not `expected_updated_at`.
    pub fn update_if_unchanged(
        &self,
        id: &str,
        expected_updated_at: DateTime<Utc>,
        patch: ContentPatch,
    ) -> Result<Option<ContentItem>, StoreError> {
        self.apply_update(id, Some(expected_updated_at), patch)
    }

    pub fn delete(&self, id: &str) -> Result<bool, StoreError> {
        let deleted = self.mutate(|items| {
            let Some(index) = items.iter().position(|item| item.id == id) else {
                return Ok(Mutation::Skip(false));
            };
            let removed = items.remove(index);
            log::info!("Deleting item '{}' ({}).", removed.title, removed.id);
            Ok(Mutation::Apply(true))
        })?;
        if !deleted {
            log::debug!("Delete requested for unknown item {}.", id);
        }
        Ok(deleted)
    }

    /// Replaces the whole collection, keeping the records as given. Used for
    /// imports. Ids and slugs must be unique and every slug URL-safe.
    pub fn replace_all(&self, items: Vec<ContentItem>) -> Result<usize, StoreError> {
        let mut ids = HashSet::new();
        let mut slugs = HashSet::new();
        for item in &items {
            if !ids.insert(item.id.as_str()) {
                return Err(StoreError::DuplicateId(item.id.clone()));
            }
            if !is_normalised_slug(&item.slug) {
                return Err(StoreError::InvalidSlug(item.slug.clone()));
            }
            if !slugs.insert(item.slug.as_str()) {
                return Err(StoreError::DuplicateSlug(item.slug.clone()));
            }
        }
        let count = items.len();
        self.mutate(move |current| {
            *current = items;
            Ok(Mutation::Apply(()))
        })?;
        log::info!("Replaced the content collection with {} item(s).", count);
        Ok(count)
    }

    /// Picks up writes made by other processes. Returns `true` when the
    /// storage marker differs from the last one this store wrote or saw and
    /// the collection was reloaded.
    pub fn sync_from_storage(&self) -> Result<bool, StoreError> {
        let marker = self.storage.last_updated()?.unwrap_or_default();
        if marker == self.read_state().marker {
            return Ok(false);
        }

        let _writer = self.lock_writer();
        // A local mutation may have landed while we waited for the lock.
        let marker = self.storage.last_updated()?.unwrap_or_default();
        if marker == self.read_state().marker {
            return Ok(false);
        }
        let items = load_items(self.storage.as_ref())?;
        let version = marker.version;
        {
            let mut state = self.write_state();
            state.newest_first = newest_first(items);
            state.marker = marker;
        }
        log::info!("Reloaded content after external change (v{}).", version);
        self.feed.publish(ChangeSignal {
            version,
            origin: ChangeOrigin::Storage,
        });
        Ok(true)
    }

    fn apply_update(
        &self,
        id: &str,
        expected_updated_at: Option<DateTime<Utc>>,
        patch: ContentPatch,
    ) -> Result<Option<ContentItem>, StoreError> {
        self.mutate(move |items| {
            let Some(index) = items.iter().position(|item| item.id == id) else {
                return Ok(Mutation::Skip(None));
            };
            if let Some(expected) = expected_updated_at {
                if items[index].updated_at != expected {
                    return Err(StoreError::VersionConflict { id: id.to_string() });
                }
            }

            let mut updated = items[index].clone();
            if let Some(title) = patch.title {
                updated.title = title;
            }
            if let Some(description) = patch.description {
                updated.description = description;
            }
            if let Some(date) = patch.date {
                updated.date = date;
            }
            if let Some(content_type) = patch.content_type {
                updated.content_type = content_type;
            }
            if let Some(image_url) = patch.image_url {
                updated.image_url = image_url;
            }
            if let Some(original_url) = patch.original_url {
                updated.original_url = original_url;
            }
            if let Some(requested_slug) = patch.slug {
                updated.slug = resolve_slug(items, &requested_slug, &updated.title, id)?;
            }
            updated.updated_at = Utc::now().max(updated.updated_at);

            items[index] = updated.clone();
            log::info!("Updated item '{}' ({}).", updated.title, updated.id);
            Ok(Mutation::Apply(Some(updated)))
        })
    }

    /// Read-modify-write under the writer lock. Nothing is persisted or
    /// signalled for `Mutation::Skip` or an error from `apply`.
    fn mutate<T>(
        &self,
        apply: impl FnOnce(&mut Vec<ContentItem>) -> Result<Mutation<T>, StoreError>,
    ) -> Result<T, StoreError> {
        let _writer = self.lock_writer();

        let mut items = load_items(self.storage.as_ref())?;
        let outcome = match apply(&mut items)? {
            Mutation::Apply(outcome) => outcome,
            Mutation::Skip(outcome) => return Ok(outcome),
        };

        let document = serde_json::to_string_pretty(&items).map_err(DbError::from)?;
        let marker = ChangeMarker {
            version: self.next_version(),
            writer: self.writer_id.clone(),
        };
        self.storage.write(&document, &marker)?;

        let version = marker.version;
        {
            let mut state = self.write_state();
            state.newest_first = newest_first(items);
            state.marker = marker;
        }
        self.feed.publish(ChangeSignal {
            version,
            origin: ChangeOrigin::Local,
        });
        Ok(outcome)
    }

    /// Milliseconds since the epoch, forced above every marker seen so far.
    fn next_version(&self) -> i64 {
        let stored = self.storage.last_updated().ok().flatten().map_or(0, |m| m.version);
        let last = stored.max(self.version());
        Utc::now().timestamp_millis().max(last + 1)
    }

    fn lock_writer(&self) -> MutexGuard<'_, ()> {
        self.writer.lock().unwrap_or_else(|poisoned| {
            log::error!("Content store writer lock was poisoned! Recovering lock.");
            poisoned.into_inner()
        })
    }

    fn read_state(&self) -> RwLockReadGuard<'_, Collection> {
        self.state.read().unwrap_or_else(|poisoned| {
            log::error!("RwLock for the content collection was poisoned! Using stale data.");
            poisoned.into_inner()
        })
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, Collection> {
        self.state.write().unwrap_or_else(|poisoned| {
            log::error!("RwLock for the content collection was poisoned during a write! Recovering lock.");
            poisoned.into_inner()
        })
    }
}

/// Items in storage order. An absent document is an empty collection.
fn load_items(storage: &dyn ContentStorage) -> Result<Vec<ContentItem>, DbError> {
    match storage.read()? {
        Some(document) if !document.trim().is_empty() => Ok(serde_json::from_str(&document)?),
        _ => Ok(Vec::new()),
    }
}

/// Descending by `created_at`; on a tie the item stored later counts as newer.
fn newest_first(stored: Vec<ContentItem>) -> Vec<ContentItem> {
    let mut indexed: Vec<(usize, ContentItem)> = stored.into_iter().enumerate().collect();
    indexed.sort_by(|(ia, a), (ib, b)| b.created_at.cmp(&a.created_at).then(ib.cmp(ia)));
    indexed.into_iter().map(|(_, item)| item).collect()
}

/// Explicit slugs must already be in slug form and free; a blank one is
/// derived from the title and numbered until free. `id` is the item the slug
/// is for.
fn resolve_slug(items: &[ContentItem], requested: &str, title: &str, id: &str) -> Result<String, StoreError> {
    let taken = |candidate: &str| items.iter().any(|other| other.id != id && other.slug == candidate);
    let requested = requested.trim();
    if requested.is_empty() {
        Ok(slug::disambiguate(&slug::derive_slug(title, id), taken))
    } else if !is_normalised_slug(requested) {
        Err(StoreError::InvalidSlug(requested.to_string()))
    } else if taken(requested) {
        Err(StoreError::SlugConflict(requested.to_string()))
    } else {
        Ok(requested.to_string())
    }
}

fn is_normalised_slug(candidate: &str) -> bool {
    !candidate.is_empty() && slug::slugify(candidate) == candidate
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::db_operations::JsonFileStorage;
    use chrono::TimeZone;
    use tempfile::{tempdir, TempDir};

    /// Storage whose reads or writes can be switched off.
    struct FlakyStorage {
        inner: JsonFileStorage,
        fail_reads: bool,
        fail_writes: bool,
    }

    impl ContentStorage for FlakyStorage {
        fn read(&self) -> Result<Option<String>, DbError> {
            if self.fail_reads {
                return Err(std::io::Error::other("disk unplugged").into());
            }
            self.inner.read()
        }
        fn write(&self, document: &str, marker: &ChangeMarker) -> Result<(), DbError> {
            if self.fail_writes {
                return Err(std::io::Error::other("read-only filesystem").into());
            }
            self.inner.write(document, marker)
        }
        fn last_updated(&self) -> Result<Option<ChangeMarker>, DbError> {
            self.inner.last_updated()
        }
        fn describe(&self) -> String {
            "flaky".to_string()
        }
    }

    fn json_store(dir: &TempDir) -> ContentStore {
        ContentStore::open(Box::new(JsonFileStorage::new(dir.path().join("content.json"))))
    }

    fn fields(title: &str, content_type: ContentType) -> NewContentItem {
        NewContentItem {
            title: title.to_string(),
            description: format!("About {}", title),
            date: "2025.01.15".to_string(),
            content_type,
            image_url: None,
            original_url: None,
            slug: String::new(),
        }
    }

    fn stored_item(id: &str, day: u32) -> ContentItem {
        let at = Utc.with_ymd_and_hms(2025, 1, day, 0, 0, 0).unwrap();
        ContentItem {
            id: id.to_string(),
            title: format!("Item {}", id),
            description: "d".to_string(),
            date: format!("2025.01.{:02}", day),
            content_type: ContentType::News,
            image_url: None,
            original_url: None,
            slug: format!("item-{}", id),
            created_at: at,
            updated_at: at,
        }
    }

    #[test]
    fn unreadable_storage_opens_empty() {
        let dir = tempdir().unwrap();
        let storage = FlakyStorage {
            inner: JsonFileStorage::new(dir.path().join("content.json")),
            fail_reads: true,
            fail_writes: false,
        };
        let store = ContentStore::open(Box::new(storage));
        assert!(store.is_empty());
        assert_eq!(store.get_featured(), None);
    }

    #[test]
    fn corrupt_document_opens_empty() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("content.json"), "{ not json").unwrap();
        let store = json_store(&dir);
        assert!(store.get_all().is_empty());
    }

    #[test]
    fn failed_write_is_an_error_and_changes_nothing() {
        let dir = tempdir().unwrap();
        let store = ContentStore::open(Box::new(FlakyStorage {
            inner: JsonFileStorage::new(dir.path().join("content.json")),
            fail_reads: false,
            fail_writes: true,
        }));
        let mut sub = store.subscribe();

        let result = store.create(fields("Alpha", ContentType::News));

        assert!(matches!(result, Err(StoreError::Storage(_))));
        assert!(store.is_empty());
        assert_eq!(sub.try_changed(), None);
    }

    #[test]
    fn not_found_mutations_neither_persist_nor_signal() {
        let dir = tempdir().unwrap();
        let store = json_store(&dir);
        let mut sub = store.subscribe();

        assert_eq!(store.update("missing", ContentPatch::title("X")).unwrap(), None);
        assert!(!store.delete("missing").unwrap());
        assert_eq!(sub.try_changed(), None);
        assert!(!dir.path().join("content.json").exists());
    }

    #[test]
    fn ties_on_created_at_prefer_the_later_stored_item() {
        let dir = tempdir().unwrap();
        let mut a = stored_item("a", 3);
        let mut b = stored_item("b", 3);
        a.slug = "a".into();
        b.slug = "b".into();
        let doc = serde_json::to_string(&vec![a, b]).unwrap();
        std::fs::write(dir.path().join("content.json"), doc).unwrap();

        let store = json_store(&dir);
        let ids: Vec<String> = store.get_all().into_iter().map(|i| i.id).collect();
        assert_eq!(ids, vec!["b", "a"]);
    }

    #[test]
    fn create_appends_in_storage_order() {
        let dir = tempdir().unwrap();
        let store = json_store(&dir);
        store.create(fields("Alpha", ContentType::News)).unwrap();
        store.create(fields("Beta", ContentType::Blog)).unwrap();

        let raw = std::fs::read_to_string(dir.path().join("content.json")).unwrap();
        let stored: Vec<ContentItem> = serde_json::from_str(&raw).unwrap();
        let titles: Vec<&str> = stored.iter().map(|i| i.title.as_str()).collect();
        assert_eq!(titles, vec!["Alpha", "Beta"]);
    }

    #[test]
    fn versions_strictly_increase() {
        let dir = tempdir().unwrap();
        let store = json_store(&dir);
        let mut last = store.version();
        for title in ["a", "b", "c"] {
            store.create(fields(title, ContentType::News)).unwrap();
            assert!(store.version() > last);
            last = store.version();
        }
    }

    #[test]
    fn pages_are_one_based_and_bounded() {
        let dir = tempdir().unwrap();
        let store = json_store(&dir);
        for n in 0..12 {
            store.create(fields(&format!("News {}", n), ContentType::News)).unwrap();
        }
        store.create(fields("Blog", ContentType::Blog)).unwrap();

        let first = store.get_page(Some(ContentType::News), 0, 5);
        assert_eq!(first.page, 1);
        assert_eq!(first.items.len(), 5);
        assert_eq!(first.total_items, 12);
        assert_eq!(first.total_pages, 3);
        assert_eq!(first.items[0].title, "News 11");

        let last = store.get_page(Some(ContentType::News), 3, 5);
        assert_eq!(last.items.len(), 2);
        assert!(store.get_page(Some(ContentType::News), 4, 5).items.is_empty());

        let all = store.get_page(None, 1, 0);
        assert_eq!(all.per_page, DEFAULT_PAGE_SIZE);
        assert_eq!(all.total_items, 13);
    }

    #[test]
    fn replace_all_rejects_duplicate_ids() {
        let dir = tempdir().unwrap();
        let store = json_store(&dir);
        let result = store.replace_all(vec![stored_item("1", 1), stored_item("1", 2)]);
        assert!(matches!(result, Err(StoreError::DuplicateId(id)) if id == "1"));
        assert!(store.is_empty());
    }

    #[test]
    fn replace_all_rejects_duplicate_and_malformed_slugs() {
        let dir = tempdir().unwrap();
        let store = json_store(&dir);
        let mut first = stored_item("1", 1);
        let mut second = stored_item("2", 2);
        first.slug = "same".to_string();
        second.slug = "same".to_string();

        let result = store.replace_all(vec![first.clone(), second.clone()]);
        assert!(matches!(result, Err(StoreError::DuplicateSlug(s)) if s == "same"));

        second.slug = "Not URL/safe".to_string();
        let result = store.replace_all(vec![first, second]);
        assert!(matches!(result, Err(StoreError::InvalidSlug(s)) if s == "Not URL/safe"));
        assert!(store.is_empty());
        assert_eq!(store.get_by_slug("same"), None);
    }

    #[test]
    fn explicit_slugs_must_already_be_url_safe() {
        let dir = tempdir().unwrap();
        let store = json_store(&dir);
        let mut input = fields("Title", ContentType::News);
        input.slug = "Not URL/safe ?x".to_string();
        assert!(matches!(store.create(input), Err(StoreError::InvalidSlug(s)) if s == "Not URL/safe ?x"));

        let item = store.create(fields("Title", ContentType::News)).unwrap();
        let patch = ContentPatch {
            slug: Some("Upper Case".to_string()),
            ..ContentPatch::default()
        };
        assert!(matches!(store.update(&item.id, patch), Err(StoreError::InvalidSlug(_))));

        let patch = ContentPatch {
            slug: Some("clean-slug-2".to_string()),
            ..ContentPatch::default()
        };
        let updated = store.update(&item.id, patch).unwrap().unwrap();
        assert_eq!(updated.slug, "clean-slug-2");
    }

    #[test]
    fn same_millisecond_write_from_another_store_is_reloaded() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("content.json");
        let store = json_store(&dir);
        store.create(fields("Mine", ContentType::News)).unwrap();

        // Another writer that landed on the very same version number.
        let other = JsonFileStorage::new(&path);
        let document = serde_json::to_string(&vec![stored_item("x", 4)]).unwrap();
        let collided = ChangeMarker {
            version: store.version(),
            writer: "another-process".to_string(),
        };
        other.write(&document, &collided).unwrap();

        assert!(store.sync_from_storage().unwrap());
        let ids: Vec<String> = store.get_all().into_iter().map(|i| i.id).collect();
        assert_eq!(ids, vec!["x"]);
        assert!(!store.sync_from_storage().unwrap());
    }
}
