use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;

/// Lifecycle tags reported by login and verification widgets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowTag {
    Idle,
    CodeSent,
    VariableSet,
    LoginComplete,
    VerificationComplete,
    Failed,
    #[serde(other)]
    Other,
}

impl FlowTag {
    pub fn is_completion(self) -> bool {
        matches!(self, FlowTag::LoginComplete | FlowTag::VerificationComplete)
    }
}

/// Tagged state published by a verification collaborator for one field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowState {
    pub state: FlowTag,
    #[serde(default)]
    pub data: Value,
    #[serde(with = "time::serde::rfc3339", default = "OffsetDateTime::now_utc")]
    pub timestamp: OffsetDateTime,
}

impl FlowState {
    pub fn new(state: FlowTag, data: Value) -> Self {
        Self {
            state,
            data,
            timestamp: OffsetDateTime::now_utc(),
        }
    }

    /// A `variable_set` state carrying `{ "name": .., "value": .. }`.
    pub fn variable_set(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(
            FlowTag::VariableSet,
            serde_json::json!({ "name": name.into(), "value": value.into() }),
        )
    }

    /// Value this state contributes for `variable`, if any.
    pub fn value_for(&self, variable: &str) -> Option<Value> {
        match self.state {
            FlowTag::VariableSet => {
                if let Some(name) = self.data.get("name").and_then(Value::as_str)
                    && name != variable
                {
                    return None;
                }
                self.data.get("value").filter(|value| !value.is_null()).cloned()
            }
            tag if tag.is_completion() => Some(Value::String("true".into())),
            _ => None,
        }
    }
}

/// Shared table of flow states keyed by the owning field id.
#[derive(Debug, Clone, Default)]
pub struct FlowStates {
    states: Rc<RefCell<BTreeMap<String, FlowState>>>,
}

impl FlowStates {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, key: impl Into<String>, state: FlowState) {
        self.states.borrow_mut().insert(key.into(), state);
    }

    pub fn get(&self, key: &str) -> Option<FlowState> {
        self.states.borrow().get(key).cloned()
    }

    pub fn remove(&self, key: &str) -> Option<FlowState> {
        self.states.borrow_mut().remove(key)
    }

    pub fn clear(&self) {
        self.states.borrow_mut().clear();
    }

    /// Resolves a `<fieldId><sep><variableName>` dependency.
    ///
    /// Field ids may themselves contain the separator, so every split point is tried from the
    /// left until a flow state answers.
    pub fn lookup(&self, depends_on: &str, separator: char) -> Option<Value> {
        let states = self.states.borrow();
        for (index, _) in depends_on.match_indices(separator) {
            let field_id = &depends_on[..index];
            let variable = &depends_on[index + separator.len_utf8()..];
            if field_id.is_empty() || variable.is_empty() {
                continue;
            }
            if let Some(value) = states
                .get(field_id)
                .and_then(|state| state.value_for(variable))
            {
                return Some(value);
            }
        }
        None
    }
}
