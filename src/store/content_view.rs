use std::sync::Arc;

use crate::models::{ContentItem, ContentType};
use crate::store::change_feed::ChangeSubscription;
use crate::store::ContentStore;

/// The query a view keeps answering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewQuery {
    All,
    ByType(ContentType),
    Latest(usize),
    Slug(String),
}

/// A reader's derived state, e.g. one open listing page.
///
/// The view never patches its items: on any change signal it re-runs its
/// query and swaps the result in wholesale.
pub struct ContentView {
    store: Arc<ContentStore>,
    query: ViewQuery,
    items: Vec<ContentItem>,
    subscription: ChangeSubscription,
}

impl ContentView {
    pub fn new(store: Arc<ContentStore>, query: ViewQuery) -> Self {
        // Subscribe before the first fetch so no change slips in between.
        let subscription = store.subscribe();
        let mut view = Self {
            store,
            query,
            items: Vec::new(),
            subscription,
        };
        view.refresh();
        view
    }

    pub fn query(&self) -> &ViewQuery {
        &self.query
    }

    pub fn items(&self) -> &[ContentItem] {
        &self.items
    }

    pub fn refresh(&mut self) {
        self.items = match &self.query {
            ViewQuery::All => self.store.get_all(),
            ViewQuery::ByType(content_type) => self.store.get_by_type(*content_type),
            ViewQuery::Latest(n) => self.store.get_latest(*n),
            ViewQuery::Slug(slug) => self.store.get_by_slug(slug).into_iter().collect(),
        };
    }

    /// Refreshes if at least one signal arrived since the last look.
    pub fn refresh_if_changed(&mut self) -> bool {
        if self.subscription.try_changed().is_some() {
            self.refresh();
            true
        } else {
            false
        }
    }

    /// Waits for the next signal and refreshes. `false` once the store's
    /// feed has closed.
    pub async fn wait_for_change(&mut self) -> bool {
        match self.subscription.changed().await {
            Some(_) => {
                self.subscription.try_changed();
                self.refresh();
                true
            }
            None => false,
        }
    }
}
