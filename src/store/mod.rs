pub mod change_feed;
pub mod change_watcher;
pub mod content_store;
pub mod content_view;
pub mod slug;

pub use change_feed::{ChangeFeed, ChangeOrigin, ChangeSignal, ChangeSubscription};
pub use change_watcher::ChangeWatcher;
pub use content_store::{ContentStore, StoreError};
pub use content_view::{ContentView, ViewQuery};
