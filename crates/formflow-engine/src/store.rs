use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use serde::Serialize;
use serde_json::Value;

use crate::events::{EventBus, Subscription, Topic};

/// One written key, with the value it replaced.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VariableChange {
    pub name: String,
    pub old_value: Option<Value>,
    pub new_value: Value,
}

/// Notification emitted by the [`VariableStore`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StoreEvent {
    Set(VariableChange),
    Batch { changes: Vec<VariableChange> },
}

impl StoreEvent {
    pub fn changes(&self) -> &[VariableChange] {
        match self {
            StoreEvent::Set(change) => std::slice::from_ref(change),
            StoreEvent::Batch { changes } => changes,
        }
    }

    pub fn keys(&self) -> Vec<&str> {
        self.changes()
            .iter()
            .map(|change| change.name.as_str())
            .collect()
    }
}

/// Form-wide key/value table shared by handle.
///
/// Clones refer to the same table and the same change topic. Writes complete before the
/// notification is published, so subscribers always read a fully updated store.
#[derive(Debug, Clone)]
pub struct VariableStore {
    values: Rc<RefCell<BTreeMap<String, Value>>>,
    topic: Topic<StoreEvent>,
}

impl Default for VariableStore {
    fn default() -> Self {
        Self::new()
    }
}

impl VariableStore {
    /// Creates a store with a private change topic.
    pub fn new() -> Self {
        Self::with_topic(Topic::new())
    }

    /// Creates a store that publishes on the bus's variable topic.
    pub fn attached(bus: &EventBus) -> Self {
        Self::with_topic(bus.variables.clone())
    }

    pub fn with_topic(topic: Topic<StoreEvent>) -> Self {
        Self {
            values: Rc::new(RefCell::new(BTreeMap::new())),
            topic,
        }
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        self.values.borrow().get(name).cloned()
    }

    pub fn has(&self, name: &str) -> bool {
        self.values.borrow().contains_key(name)
    }

    pub fn set(&self, name: impl Into<String>, value: impl Into<Value>) {
        let name = name.into();
        let new_value = value.into();
        let old_value = self
            .values
            .borrow_mut()
            .insert(name.clone(), new_value.clone());
        self.topic.publish(&StoreEvent::Set(VariableChange {
            name,
            old_value,
            new_value,
        }));
    }

    /// Writes every entry, then publishes a single [`StoreEvent::Batch`].
    ///
    /// An empty input writes nothing and publishes nothing.
    pub fn set_multiple<I, K, V>(&self, entries: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let changes = {
            let mut values = self.values.borrow_mut();
            entries
                .into_iter()
                .map(|(name, value)| {
                    let name = name.into();
                    let new_value = value.into();
                    let old_value = values.insert(name.clone(), new_value.clone());
                    VariableChange {
                        name,
                        old_value,
                        new_value,
                    }
                })
                .collect::<Vec<_>>()
        };
        if changes.is_empty() {
            return;
        }
        self.topic.publish(&StoreEvent::Batch { changes });
    }

    /// Removes a variable; subscribers see it as a write of `null`.
    pub fn remove(&self, name: &str) -> Option<Value> {
        let old_value = self.values.borrow_mut().remove(name)?;
        self.topic.publish(&StoreEvent::Set(VariableChange {
            name: name.to_string(),
            old_value: Some(old_value.clone()),
            new_value: Value::Null,
        }));
        Some(old_value)
    }

    pub fn get_all(&self) -> BTreeMap<String, Value> {
        self.values.borrow().clone()
    }

    pub fn len(&self) -> usize {
        self.values.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.borrow().is_empty()
    }

    pub fn subscribe<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&StoreEvent) + 'static,
    {
        self.topic.subscribe(handler)
    }

    pub fn topic(&self) -> &Topic<StoreEvent> {
        &self.topic
    }
}
