use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::watch;

/// A one-shot notification that may be observed many times but handled once.
#[derive(Debug)]
pub struct Event<T> {
    content: T,
    handled: AtomicBool,
}

impl<T> Event<T> {
    pub fn new(content: T) -> Self {
        Self {
            content,
            handled: AtomicBool::new(false),
        }
    }

    /// Returns the content the first time only.
    pub fn content_if_not_handled(&self) -> Option<&T> {
        if self.handled.swap(true, Ordering::AcqRel) {
            None
        } else {
            Some(&self.content)
        }
    }

    pub fn peek_content(&self) -> &T {
        &self.content
    }

    pub fn has_been_handled(&self) -> bool {
        self.handled.load(Ordering::Acquire)
    }
}

/// Latest event of one kind. Re-observing the channel hands back the same
/// `Event`, so a consumed notification stays consumed.
pub struct EventChannel<T> {
    sender: watch::Sender<Option<Arc<Event<T>>>>,
}

impl<T> EventChannel<T> {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(None);
        Self { sender }
    }

    pub fn publish(&self, content: T) {
        self.sender.send_replace(Some(Arc::new(Event::new(content))));
    }

    pub fn latest(&self) -> Option<Arc<Event<T>>> {
        self.sender.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<Arc<Event<T>>>> {
        self.sender.subscribe()
    }
}

impl<T> Default for EventChannel<T> {
    fn default() -> Self {
        Self::new()
    }
}
