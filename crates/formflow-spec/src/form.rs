use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::condition::{Combinator, ConditionPredicate, Operator};
use crate::conditions::ButtonKind;
use crate::text::deserialize_text;

/// Input types a field can render as. Only signatures change engine behavior.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    #[default]
    Text,
    Email,
    Phone,
    Number,
    Textarea,
    Select,
    Radio,
    Checkbox,
    Date,
    Signature,
    File,
    RichText,
    Hidden,
    Section,
    #[serde(other)]
    Other,
}

impl FieldKind {
    pub fn is_signature(self) -> bool {
        matches!(self, FieldKind::Signature)
    }
}

/// Field-level visibility rule as authored in the form builder.
#[serde_with::skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct FieldVisibility {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub depends_on: String,
    #[serde(default, alias = "operator")]
    pub condition: Operator,
    #[serde(default, deserialize_with = "deserialize_text")]
    pub value: String,
    #[serde(default)]
    pub depends_on_page: Option<String>,
}

/// Predicate set used for page visibility and navigation buttons.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RuleGroup {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub conditions: Vec<ConditionPredicate>,
    #[serde(default, alias = "combinator")]
    pub logic: Combinator,
}

/// Per-page rules for the `next` and `submit` controls.
#[serde_with::skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct NavigationConfig {
    #[serde(default)]
    pub next: Option<RuleGroup>,
    #[serde(default)]
    pub submit: Option<RuleGroup>,
}

impl NavigationConfig {
    pub fn rule(&self, button: ButtonKind) -> Option<&RuleGroup> {
        match button {
            ButtonKind::Next => self.next.as_ref(),
            ButtonKind::Submit => self.submit.as_ref(),
        }
    }
}

/// Definition of a single field placed on a page.
#[serde_with::skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct FieldSpec {
    pub id: String,
    #[serde(rename = "type", default)]
    pub kind: FieldKind,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub required: bool,
    /// Mirrors the field's input into the variable store under this name.
    #[serde(default)]
    pub variable_name: Option<String>,
    #[serde(default)]
    pub conditional_visibility: Option<FieldVisibility>,
}

impl FieldSpec {
    pub fn new(id: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            id: id.into(),
            kind,
            label: None,
            required: false,
            variable_name: None,
            conditional_visibility: None,
        }
    }

    pub fn is_conditional(&self) -> bool {
        self.conditional_visibility
            .as_ref()
            .is_some_and(|rule| rule.enabled)
    }
}

/// One page of a multi-page form.
#[serde_with::skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PageSpec {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub fields: Vec<FieldSpec>,
    #[serde(default)]
    pub conditional_visibility: Option<RuleGroup>,
    #[serde(default)]
    pub navigation_config: Option<NavigationConfig>,
}

impl PageSpec {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: None,
            fields: Vec::new(),
            conditional_visibility: None,
            navigation_config: None,
        }
    }
}

/// Top-level published form definition.
#[serde_with::skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct FormDefinition {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub pages: Vec<PageSpec>,
}

/// Structural problems in a form definition.
#[derive(Debug, Error)]
pub enum SpecError {
    #[error("form definition is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("form '{0}' has no pages")]
    NoPages(String),
    #[error("duplicate page id '{0}'")]
    DuplicatePage(String),
    #[error("duplicate field id '{field_id}' on pages {first} and {second}")]
    DuplicateField {
        field_id: String,
        first: usize,
        second: usize,
    },
}

impl FormDefinition {
    /// Parses and structurally checks a form definition.
    pub fn from_json(raw: &str) -> Result<Self, SpecError> {
        let form: FormDefinition = serde_json::from_str(raw)?;
        form.check()?;
        Ok(form)
    }

    pub fn from_value(value: Value) -> Result<Self, SpecError> {
        let form: FormDefinition = serde_json::from_value(value)?;
        form.check()?;
        Ok(form)
    }

    /// Rejects forms without pages and duplicate page or field ids.
    pub fn check(&self) -> Result<(), SpecError> {
        if self.pages.is_empty() {
            return Err(SpecError::NoPages(self.id.clone()));
        }
        let mut pages = BTreeMap::new();
        let mut fields = BTreeMap::new();
        for (index, page) in self.pages.iter().enumerate() {
            if pages.insert(page.id.as_str(), index).is_some() {
                return Err(SpecError::DuplicatePage(page.id.clone()));
            }
            for field in &page.fields {
                if let Some(first) = fields.insert(field.id.as_str(), index) {
                    return Err(SpecError::DuplicateField {
                        field_id: field.id.clone(),
                        first,
                        second: index,
                    });
                }
            }
        }
        Ok(())
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn page_index(&self, page_id: &str) -> Option<usize> {
        self.pages.iter().position(|page| page.id == page_id)
    }

    /// Finds a field and the index of the page it sits on.
    pub fn field(&self, field_id: &str) -> Option<(usize, &FieldSpec)> {
        self.pages.iter().enumerate().find_map(|(index, page)| {
            page.fields
                .iter()
                .find(|field| field.id == field_id)
                .map(|field| (index, field))
        })
    }

    pub fn fields(&self) -> impl Iterator<Item = &FieldSpec> {
        self.pages.iter().flat_map(|page| page.fields.iter())
    }
}
