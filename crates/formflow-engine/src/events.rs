//! Single-threaded publish/subscribe plumbing.
//!
//! A [`Topic`] is a cheaply cloneable handle; every clone publishes to the same subscriber list.
//! Handlers run synchronously in registration order. The subscriber list is snapshotted before
//! dispatch, so a handler may subscribe, unsubscribe or publish again without invalidating the
//! iteration in progress.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use serde::Serialize;
use serde_json::Value;

use crate::store::StoreEvent;

type Handler<T> = Rc<dyn Fn(&T)>;

struct TopicInner<T> {
    next_id: Cell<u64>,
    handlers: RefCell<Vec<(u64, Handler<T>)>>,
}

pub struct Topic<T> {
    inner: Rc<TopicInner<T>>,
}

impl<T> Clone for Topic<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T> Default for Topic<T> {
    fn default() -> Self {
        Self {
            inner: Rc::new(TopicInner {
                next_id: Cell::new(0),
                handlers: RefCell::new(Vec::new()),
            }),
        }
    }
}

impl<T> fmt::Debug for Topic<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Topic")
            .field("subscribers", &self.inner.handlers.borrow().len())
            .finish()
    }
}

impl<T: 'static> Topic<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a handler; it stays registered until the returned guard is dropped.
    pub fn subscribe<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&T) + 'static,
    {
        let id = self.inner.next_id.get();
        self.inner.next_id.set(id + 1);
        self.inner
            .handlers
            .borrow_mut()
            .push((id, Rc::new(handler)));

        let topic: Weak<TopicInner<T>> = Rc::downgrade(&self.inner);
        Subscription {
            cancel: Some(Box::new(move || {
                if let Some(inner) = topic.upgrade() {
                    inner
                        .handlers
                        .borrow_mut()
                        .retain(|(handler_id, _)| *handler_id != id);
                }
            })),
        }
    }

    /// Delivers `event` to every current subscriber and returns how many were called.
    pub fn publish(&self, event: &T) -> usize {
        let handlers: Vec<Handler<T>> = self
            .inner
            .handlers
            .borrow()
            .iter()
            .map(|(_, handler)| Rc::clone(handler))
            .collect();
        for handler in &handlers {
            handler(event);
        }
        handlers.len()
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.handlers.borrow().len()
    }
}

/// Guard that unsubscribes its handler when dropped.
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    /// Keeps the handler registered for the lifetime of the topic.
    pub fn detach(mut self) {
        self.cancel = None;
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}

/// Raw input observed on a field, before any variable binding.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldValueChanged {
    pub field_id: String,
    pub value: Value,
}

/// Emitted after every completed page transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageChanged {
    pub from: usize,
    pub to: usize,
    pub page_id: String,
}

/// The topics connecting stores, fields and navigation to the visibility engine.
#[derive(Debug, Clone, Default)]
pub struct EventBus {
    pub variables: Topic<StoreEvent>,
    pub fields: Topic<FieldValueChanged>,
    pub pages: Topic<PageChanged>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }
}
