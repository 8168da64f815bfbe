//! In-memory rendering surface that records every call it receives.

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};

use formflow_spec::ButtonKind;
use serde::Serialize;
use serde_json::Value;

use crate::navigation::{FieldError, NavigationSurface};
use crate::visibility::VisibilitySink;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "call", rename_all = "snake_case")]
pub enum SurfaceCall {
    FieldVisible { field_id: String, visible: bool },
    PageVisible { page_id: String, visible: bool },
    FieldError { field_id: String, message: String },
    ClearErrors { page_id: String },
    ShowPage { page_id: String, page_index: usize },
    ButtonVisible { button: ButtonKind, visible: bool },
}

#[derive(Debug, Default)]
struct SurfaceState {
    calls: Vec<SurfaceCall>,
    values: BTreeMap<String, Value>,
    signatures: BTreeSet<String>,
    fields: BTreeMap<String, bool>,
    pages: BTreeMap<String, bool>,
    buttons: BTreeMap<ButtonKind, bool>,
    errors: Vec<FieldError>,
    current_page: Option<(String, usize)>,
}

/// Headless stand-in for a rendered form.
///
/// Entered values are kept so the navigation checks can be answered; everything pushed to the
/// surface is both logged and reflected in the current state.
#[derive(Debug, Default)]
pub struct RecordingSurface {
    state: RefCell<SurfaceState>,
}

impl RecordingSurface {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores an entered value; blank strings and nulls count as no value.
    pub fn fill(&self, field_id: &str, value: impl Into<Value>) {
        self.state
            .borrow_mut()
            .values
            .insert(field_id.to_string(), value.into());
    }

    pub fn clear_value(&self, field_id: &str) {
        self.state.borrow_mut().values.remove(field_id);
    }

    pub fn sign(&self, field_id: &str) {
        self.state
            .borrow_mut()
            .signatures
            .insert(field_id.to_string());
    }

    pub fn value(&self, field_id: &str) -> Option<Value> {
        self.state.borrow().values.get(field_id).cloned()
    }

    pub fn calls(&self) -> Vec<SurfaceCall> {
        self.state.borrow().calls.clone()
    }

    pub fn take_calls(&self) -> Vec<SurfaceCall> {
        std::mem::take(&mut self.state.borrow_mut().calls)
    }

    pub fn field_visible(&self, field_id: &str) -> Option<bool> {
        self.state.borrow().fields.get(field_id).copied()
    }

    pub fn page_visible(&self, page_id: &str) -> Option<bool> {
        self.state.borrow().pages.get(page_id).copied()
    }

    pub fn button_visible(&self, button: ButtonKind) -> Option<bool> {
        self.state.borrow().buttons.get(&button).copied()
    }

    pub fn errors(&self) -> Vec<FieldError> {
        self.state.borrow().errors.clone()
    }

    pub fn current_page(&self) -> Option<(String, usize)> {
        self.state.borrow().current_page.clone()
    }

    /// Number of visibility pushes received for `field_id`.
    pub fn count_field_updates(&self, field_id: &str) -> usize {
        self.state
            .borrow()
            .calls
            .iter()
            .filter(|call| {
                matches!(call, SurfaceCall::FieldVisible { field_id: id, .. } if id == field_id)
            })
            .count()
    }

    pub fn count_page_updates(&self, page_id: &str) -> usize {
        self.state
            .borrow()
            .calls
            .iter()
            .filter(|call| {
                matches!(call, SurfaceCall::PageVisible { page_id: id, .. } if id == page_id)
            })
            .count()
    }
}

fn has_content(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(text) => !text.trim().is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Bool(checked) => *checked,
        _ => true,
    }
}

impl VisibilitySink for RecordingSurface {
    fn set_field_visible(&self, field_id: &str, visible: bool) {
        let mut state = self.state.borrow_mut();
        state.fields.insert(field_id.to_string(), visible);
        state.calls.push(SurfaceCall::FieldVisible {
            field_id: field_id.to_string(),
            visible,
        });
    }

    fn set_page_visible(&self, page_id: &str, visible: bool) {
        let mut state = self.state.borrow_mut();
        state.pages.insert(page_id.to_string(), visible);
        state.calls.push(SurfaceCall::PageVisible {
            page_id: page_id.to_string(),
            visible,
        });
    }
}

impl NavigationSurface for RecordingSurface {
    fn field_has_value(&self, field_id: &str) -> bool {
        self.state
            .borrow()
            .values
            .get(field_id)
            .is_some_and(has_content)
    }

    fn signature_captured(&self, field_id: &str) -> bool {
        self.state.borrow().signatures.contains(field_id)
    }

    fn show_field_error(&self, error: &FieldError) {
        let mut state = self.state.borrow_mut();
        state.errors.push(error.clone());
        state.calls.push(SurfaceCall::FieldError {
            field_id: error.field_id.clone(),
            message: error.message.clone(),
        });
    }

    fn clear_field_errors(&self, page_id: &str) {
        let mut state = self.state.borrow_mut();
        state.errors.retain(|error| error.page_id != page_id);
        state.calls.push(SurfaceCall::ClearErrors {
            page_id: page_id.to_string(),
        });
    }

    fn show_page(&self, page_id: &str, page_index: usize) {
        let mut state = self.state.borrow_mut();
        state.current_page = Some((page_id.to_string(), page_index));
        state.calls.push(SurfaceCall::ShowPage {
            page_id: page_id.to_string(),
            page_index,
        });
    }

    fn set_button_visible(&self, button: ButtonKind, visible: bool) {
        let mut state = self.state.borrow_mut();
        state.buttons.insert(button, visible);
        state
            .calls
            .push(SurfaceCall::ButtonVisible { button, visible });
    }
}
