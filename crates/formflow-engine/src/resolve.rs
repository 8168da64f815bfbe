use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use formflow_spec::value_text;
use serde::Serialize;
use serde_json::Value;
use tracing::trace;

use crate::flow_state::FlowStates;
use crate::store::VariableStore;

/// Which source answered a dependency lookup, in priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueSource {
    Store,
    FieldCache,
    PageScope,
    FlowState,
}

#[derive(Debug, Default)]
struct PageScopeInner {
    by_page: BTreeMap<String, BTreeMap<String, Value>>,
    latest: BTreeMap<String, Value>,
}

/// Values captured by navigation when the user leaves a page.
#[derive(Debug, Clone, Default)]
pub struct PageScope {
    inner: Rc<RefCell<PageScopeInner>>,
}

impl PageScope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn capture(&self, page_id: &str, name: &str, value: Value) {
        let mut inner = self.inner.borrow_mut();
        inner
            .by_page
            .entry(page_id.to_string())
            .or_default()
            .insert(name.to_string(), value.clone());
        inner.latest.insert(name.to_string(), value);
    }

    /// Looks in `page`'s scope first when given, then in the most recent capture of `name`.
    pub fn lookup(&self, name: &str, page: Option<&str>) -> Option<Value> {
        let inner = self.inner.borrow();
        page.and_then(|page_id| inner.by_page.get(page_id))
            .and_then(|values| values.get(name))
            .or_else(|| inner.latest.get(name))
            .cloned()
    }

    pub fn page_values(&self, page_id: &str) -> BTreeMap<String, Value> {
        self.inner
            .borrow()
            .by_page
            .get(page_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn clear(&self) {
        let mut inner = self.inner.borrow_mut();
        inner.by_page.clear();
        inner.latest.clear();
    }
}

/// Resolves a dependency key through the four value sources.
///
/// Order is fixed: variable store, then the local field cache, then the page scope, then flow
/// states (only for keys containing the separator). A stale field cache entry therefore wins
/// over a newer page-scoped capture.
#[derive(Debug, Clone)]
pub struct ValueResolver {
    store: VariableStore,
    field_values: BTreeMap<String, Value>,
    page_scope: PageScope,
    flows: FlowStates,
    separator: char,
}

impl ValueResolver {
    pub fn new(
        store: VariableStore,
        page_scope: PageScope,
        flows: FlowStates,
        separator: char,
    ) -> Self {
        Self {
            store,
            field_values: BTreeMap::new(),
            page_scope,
            flows,
            separator,
        }
    }

    pub fn resolve(&self, key: &str, page: Option<&str>) -> Option<(Value, ValueSource)> {
        let resolved = self
            .store
            .get(key)
            .filter(present)
            .map(|value| (value, ValueSource::Store))
            .or_else(|| {
                self.field_values
                    .get(key)
                    .filter(|value| present(value))
                    .map(|value| (value.clone(), ValueSource::FieldCache))
            })
            .or_else(|| {
                self.page_scope
                    .lookup(key, page)
                    .filter(present)
                    .map(|value| (value, ValueSource::PageScope))
            })
            .or_else(|| {
                if !key.contains(self.separator) {
                    return None;
                }
                self.flows
                    .lookup(key, self.separator)
                    .map(|value| (value, ValueSource::FlowState))
            });
        trace!(key, source = ?resolved.as_ref().map(|(_, source)| *source), "resolved dependency");
        resolved
    }

    /// Resolved value rendered as comparison text; unresolved keys read as empty.
    pub fn text(&self, key: &str, page: Option<&str>) -> String {
        self.resolve(key, page)
            .map(|(value, _)| value_text(&value))
            .unwrap_or_default()
    }

    pub fn has_value(&self, key: &str) -> bool {
        self.resolve(key, None).is_some()
    }

    pub fn record_field(&mut self, field_id: &str, value: Value) {
        self.field_values.insert(field_id.to_string(), value);
    }

    pub fn field_value(&self, field_id: &str) -> Option<&Value> {
        self.field_values.get(field_id)
    }

    pub fn clear_fields(&mut self) {
        self.field_values.clear();
    }

    pub fn separator(&self) -> char {
        self.separator
    }

    pub fn store(&self) -> &VariableStore {
        &self.store
    }

    pub fn page_scope(&self) -> &PageScope {
        &self.page_scope
    }

    pub fn flows(&self) -> &FlowStates {
        &self.flows
    }
}

fn present(value: &Value) -> bool {
    !value.is_null()
}
