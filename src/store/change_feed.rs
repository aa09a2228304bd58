use serde::Serialize;
use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};

const FEED_CAPACITY: usize = 64;

#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChangeOrigin {
    /// A mutation made through this process's store.
    Local,
    /// A newer marker written by another process, found by the watcher.
    Storage,
}

/// "Something changed, re-fetch everything." Carries no diff.
#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq)]
pub struct ChangeSignal {
    pub version: i64,
    pub origin: ChangeOrigin,
}

/// In-process fan-out of change signals to any number of subscribers.
pub struct ChangeFeed {
    sender: broadcast::Sender<ChangeSignal>,
}

impl ChangeFeed {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(FEED_CAPACITY);
        Self { sender }
    }

    pub fn publish(&self, signal: ChangeSignal) {
        // No receivers is fine: nobody is looking at the content right now.
        let receivers = self.sender.send(signal).unwrap_or(0);
        log::debug!(
            "Published change signal v{} ({:?}) to {} subscriber(s).",
            signal.version,
            signal.origin,
            receivers
        );
    }

    pub fn subscribe(&self) -> ChangeSubscription {
        ChangeSubscription {
            receiver: self.sender.subscribe(),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new()
    }
}

pub struct ChangeSubscription {
    receiver: broadcast::Receiver<ChangeSignal>,
}

impl ChangeSubscription {
    /// Waits for the next signal. `None` once the feed is gone.
    ///
    /// A subscriber that fell behind gets a synthetic signal instead of an
    /// error: whatever it missed, the answer is to re-fetch.
    pub async fn changed(&mut self) -> Option<ChangeSignal> {
        match self.receiver.recv().await {
            Ok(signal) => Some(signal),
            Err(RecvError::Lagged(skipped)) => {
                log::warn!("Change subscriber lagged by {} signal(s); forcing a reload.", skipped);
                Some(self.latest_after_lag())
            }
            Err(RecvError::Closed) => None,
        }
    }

    /// Drains pending signals without waiting. Returns the newest one, if any.
    pub fn try_changed(&mut self) -> Option<ChangeSignal> {
        let mut newest = None;
        loop {
            match self.receiver.try_recv() {
                Ok(signal) => newest = Some(signal),
                Err(TryRecvError::Lagged(_)) => newest = Some(self.latest_after_lag()),
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return newest,
            }
        }
    }

    fn latest_after_lag(&mut self) -> ChangeSignal {
        let mut newest = ChangeSignal {
            version: 0,
            origin: ChangeOrigin::Local,
        };
        while let Ok(signal) = self.receiver.try_recv() {
            newest = signal;
        }
        newest
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signal(version: i64) -> ChangeSignal {
        ChangeSignal {
            version,
            origin: ChangeOrigin::Local,
        }
    }

    #[test]
    fn publish_without_subscribers_is_a_no_op() {
        let feed = ChangeFeed::new();
        feed.publish(signal(1));
        assert_eq!(feed.subscriber_count(), 0);
    }

    #[test]
    fn every_subscriber_sees_every_signal() {
        let feed = ChangeFeed::new();
        let mut a = feed.subscribe();
        let mut b = feed.subscribe();

        feed.publish(signal(1));
        feed.publish(signal(2));

        assert_eq!(a.try_changed(), Some(signal(2)));
        assert_eq!(b.try_changed(), Some(signal(2)));
        assert_eq!(a.try_changed(), None);
    }

    #[test]
    fn lagging_subscriber_still_reports_a_change() {
        let feed = ChangeFeed::new();
        let mut sub = feed.subscribe();
        for v in 0..(FEED_CAPACITY as i64 * 2) {
            feed.publish(signal(v));
        }
        assert!(sub.try_changed().is_some());
        assert_eq!(sub.try_changed(), None);
    }

    #[tokio::test]
    async fn changed_returns_none_when_feed_is_dropped() {
        let feed = ChangeFeed::new();
        let mut sub = feed.subscribe();
        feed.publish(signal(5));
        drop(feed);

        assert_eq!(sub.changed().await, Some(signal(5)));
        assert_eq!(sub.changed().await, None);
    }
}
