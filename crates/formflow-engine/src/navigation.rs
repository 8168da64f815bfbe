//! Multi-page navigation state machine.
//!
//! The controller owns the current page index and the back-stack. Page and button visibility is
//! asked of the [`VisibilityEngine`] passed into each transition; required-field checks are asked
//! of the [`NavigationSurface`], which knows what the user actually entered.

use std::rc::Rc;

use formflow_spec::{ButtonKind, FieldSpec, FormDefinition};
use serde::Serialize;
use tracing::debug;

use crate::events::{PageChanged, Topic};
use crate::resolve::PageScope;
use crate::visibility::VisibilityEngine;

/// Rendering-layer surface driven by navigation.
pub trait NavigationSurface {
    fn field_has_value(&self, field_id: &str) -> bool;
    fn signature_captured(&self, field_id: &str) -> bool;
    fn show_field_error(&self, error: &FieldError);
    fn clear_field_errors(&self, page_id: &str);
    fn show_page(&self, page_id: &str, page_index: usize);
    fn set_button_visible(&self, button: ButtonKind, visible: bool);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldErrorCode {
    Required,
    SignatureRequired,
}

/// Field-level marker produced when the current page fails validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field_id: String,
    pub page_id: String,
    pub code: FieldErrorCode,
    pub message: String,
}

/// Outcome of a navigation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Transition {
    Moved { from: usize, to: usize },
    Blocked { errors: Vec<FieldError> },
    ReachedEnd { page_index: usize },
    Stayed { page_index: usize },
}

impl Transition {
    pub fn moved(&self) -> bool {
        matches!(self, Transition::Moved { .. })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ButtonState {
    pub next: bool,
    pub submit: bool,
}

impl ButtonState {
    pub fn get(&self, button: ButtonKind) -> bool {
        match button {
            ButtonKind::Next => self.next,
            ButtonKind::Submit => self.submit,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Progress {
    pub page_index: usize,
    pub page_count: usize,
    pub visible_pages: usize,
}

#[derive(Debug, Clone)]
struct PageLayout {
    id: String,
    fields: Vec<FieldLayout>,
}

#[derive(Debug, Clone)]
struct FieldLayout {
    id: String,
    label: Option<String>,
    required: bool,
    signature: bool,
    variable_name: Option<String>,
}

impl From<&FieldSpec> for FieldLayout {
    fn from(field: &FieldSpec) -> Self {
        Self {
            id: field.id.clone(),
            label: field.label.clone(),
            required: field.required,
            signature: field.kind.is_signature(),
            variable_name: field.variable_name.clone(),
        }
    }
}

impl FieldLayout {
    fn display_name(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.id)
    }
}

pub struct NavigationController {
    surface: Rc<dyn NavigationSurface>,
    page_scope: PageScope,
    pages_topic: Topic<PageChanged>,
    pages: Vec<PageLayout>,
    page_index: usize,
    history: Vec<usize>,
    buttons: ButtonState,
}

impl NavigationController {
    pub fn new(
        surface: Rc<dyn NavigationSurface>,
        page_scope: PageScope,
        pages_topic: Topic<PageChanged>,
    ) -> Self {
        Self {
            surface,
            page_scope,
            pages_topic,
            pages: Vec::new(),
            page_index: 0,
            history: Vec::new(),
            buttons: ButtonState::default(),
        }
    }

    /// Resets to the first page of `form` and derives the initial controls.
    pub fn load(&mut self, form: &FormDefinition, engine: &mut VisibilityEngine) {
        self.pages = form
            .pages
            .iter()
            .map(|page| PageLayout {
                id: page.id.clone(),
                fields: page.fields.iter().map(FieldLayout::from).collect(),
            })
            .collect();
        self.page_index = 0;
        self.history.clear();
        if let Some(page) = self.pages.first() {
            self.surface.show_page(&page.id, 0);
        }
        self.refresh_buttons(engine);
    }

    /// Validates the current page, then moves to the next visible page.
    pub fn next(&mut self, engine: &mut VisibilityEngine) -> Transition {
        let Some(page) = self.pages.get(self.page_index) else {
            return Transition::Stayed {
                page_index: self.page_index,
            };
        };

        let errors = self.validate_page(page, engine);
        self.surface.clear_field_errors(&page.id);
        if !errors.is_empty() {
            for error in &errors {
                self.surface.show_field_error(error);
            }
            debug!(page = %page.id, errors = errors.len(), "navigation blocked");
            return Transition::Blocked { errors };
        }

        self.capture_page(self.page_index, engine);

        let from = self.page_index;
        let target = (from + 1..self.pages.len()).find(|&index| engine.is_page_visible(index));
        match target {
            Some(to) => {
                self.history.push(from);
                self.move_to(to);
                self.refresh_buttons(engine);
                Transition::Moved { from, to }
            }
            None => {
                debug!(page_index = from, "no later visible page");
                self.refresh_buttons(engine);
                Transition::ReachedEnd { page_index: from }
            }
        }
    }

    /// Returns to the page recorded in history, or the preceding page when history is empty.
    pub fn previous(&mut self, engine: &mut VisibilityEngine) -> Transition {
        let from = self.page_index;
        let mut popped = None;
        while let Some(index) = self.history.pop() {
            if index != from {
                popped = Some(index);
                break;
            }
        }
        let to = popped.unwrap_or_else(|| from.saturating_sub(1));
        if to == from {
            return Transition::Stayed { page_index: from };
        }
        self.move_to(to);
        self.refresh_buttons(engine);
        Transition::Moved { from, to }
    }

    /// Jumps to `page_index` without validation or history; out-of-range requests are ignored.
    pub fn go_to_page(&mut self, page_index: usize, engine: &mut VisibilityEngine) -> Transition {
        let from = self.page_index;
        if page_index >= self.pages.len() || page_index == from {
            return Transition::Stayed { page_index: from };
        }
        self.move_to(page_index);
        self.refresh_buttons(engine);
        Transition::Moved {
            from,
            to: page_index,
        }
    }

    /// Reinstates saved progress. History entries outside the form, or equal to the restored
    /// page, are discarded.
    pub fn restore(
        &mut self,
        page_index: usize,
        history: Vec<usize>,
        engine: &mut VisibilityEngine,
    ) -> Transition {
        let from = self.page_index;
        if page_index >= self.pages.len() {
            return Transition::Stayed { page_index: from };
        }
        let page_count = self.pages.len();
        self.history = history
            .into_iter()
            .filter(|&index| index < page_count && index != page_index)
            .collect();
        self.move_to(page_index);
        self.refresh_buttons(engine);
        Transition::Moved {
            from,
            to: page_index,
        }
    }

    /// Re-derives Next/Submit visibility for the current page and pushes it to the surface.
    pub fn refresh_buttons(&mut self, engine: &mut VisibilityEngine) -> ButtonState {
        let later_visible =
            (self.page_index + 1..self.pages.len()).any(|index| engine.is_page_visible(index));
        let rule = |button| engine.evaluate_button(self.page_index, button).unwrap_or(true);
        let state = ButtonState {
            next: later_visible && rule(ButtonKind::Next),
            submit: !later_visible && rule(ButtonKind::Submit),
        };
        self.apply_buttons(state);
        state
    }

    pub fn progress(&self, engine: &mut VisibilityEngine) -> Progress {
        Progress {
            page_index: self.page_index,
            page_count: self.pages.len(),
            visible_pages: (0..self.pages.len())
                .filter(|&index| engine.is_page_visible(index))
                .count(),
        }
    }

    pub fn page_index(&self) -> usize {
        self.page_index
    }

    pub fn page_id(&self) -> Option<&str> {
        self.pages.get(self.page_index).map(|page| page.id.as_str())
    }

    pub fn page_ids(&self) -> impl Iterator<Item = &str> {
        self.pages.iter().map(|page| page.id.as_str())
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn history(&self) -> &[usize] {
        &self.history
    }

    pub fn buttons(&self) -> ButtonState {
        self.buttons
    }

    fn validate_page(&self, page: &PageLayout, engine: &VisibilityEngine) -> Vec<FieldError> {
        page.fields
            .iter()
            .filter(|field| field.required && engine.is_field_visible(&field.id))
            .filter_map(|field| {
                let (code, message) = if field.signature {
                    if self.surface.signature_captured(&field.id) {
                        return None;
                    }
                    (
                        FieldErrorCode::SignatureRequired,
                        format!("{} must be signed", field.display_name()),
                    )
                } else {
                    if self.surface.field_has_value(&field.id) {
                        return None;
                    }
                    (
                        FieldErrorCode::Required,
                        format!("{} is required", field.display_name()),
                    )
                };
                Some(FieldError {
                    field_id: field.id.clone(),
                    page_id: page.id.clone(),
                    code,
                    message,
                })
            })
            .collect()
    }

    fn capture_page(&self, page_index: usize, engine: &VisibilityEngine) {
        let Some(page) = self.pages.get(page_index) else {
            return;
        };
        for field in &page.fields {
            let Some(value) = engine.current_field_value(&field.id) else {
                continue;
            };
            if let Some(name) = &field.variable_name {
                self.page_scope.capture(&page.id, name, value.clone());
            }
            self.page_scope.capture(&page.id, &field.id, value);
        }
    }

    fn move_to(&mut self, to: usize) {
        let from = self.page_index;
        self.page_index = to;
        let page_id = self.pages[to].id.clone();
        debug!(from, to, page = %page_id, "page changed");
        self.surface.show_page(&page_id, to);
        self.pages_topic.publish(&PageChanged { from, to, page_id });
    }

    fn apply_buttons(&mut self, state: ButtonState) {
        self.buttons = state;
        self.surface.set_button_visible(ButtonKind::Next, state.next);
        self.surface
            .set_button_visible(ButtonKind::Submit, state.submit);
    }
}
