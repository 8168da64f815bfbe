use std::fmt;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::condition::{Combinator, ConditionPredicate, Operator, combine};
use crate::form::FormDefinition;

/// Navigation controls whose visibility can be conditioned.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum ButtonKind {
    Next,
    Submit,
}

impl ButtonKind {
    pub const ALL: [ButtonKind; 2] = [ButtonKind::Next, ButtonKind::Submit];

    pub fn as_str(self) -> &'static str {
        match self {
            ButtonKind::Next => "next",
            ButtonKind::Submit => "submit",
        }
    }
}

impl fmt::Display for ButtonKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Visibility condition attached to one field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct FieldCondition {
    pub field_id: String,
    pub depends_on: String,
    pub operator: Operator,
    #[serde(default)]
    pub comparand: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub depends_on_page: Option<String>,
}

impl FieldCondition {
    pub fn new(
        field_id: impl Into<String>,
        depends_on: impl Into<String>,
        operator: Operator,
        comparand: impl Into<String>,
    ) -> Self {
        Self {
            field_id: field_id.into(),
            depends_on: depends_on.into(),
            operator,
            comparand: comparand.into(),
            depends_on_page: None,
        }
    }

    pub fn test(&self, value: &str) -> bool {
        crate::condition::evaluate(value, self.operator, &self.comparand)
    }
}

/// Page-level predicate group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PageConditionGroup {
    pub page_id: String,
    pub page_index: usize,
    #[serde(default)]
    pub conditions: Vec<ConditionPredicate>,
    #[serde(default)]
    pub combinator: Combinator,
}

impl PageConditionGroup {
    pub fn depends_on(&self, key: &str) -> bool {
        self.conditions
            .iter()
            .any(|predicate| predicate.depends_on == key)
    }

    pub fn evaluate<F>(&self, test: F) -> bool
    where
        F: FnMut(&ConditionPredicate) -> bool,
    {
        combine(&self.conditions, self.combinator, test)
    }
}

/// Predicate group gating one navigation control on one page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ButtonCondition {
    pub page_id: String,
    pub page_index: usize,
    pub button: ButtonKind,
    #[serde(default)]
    pub conditions: Vec<ConditionPredicate>,
    #[serde(default)]
    pub combinator: Combinator,
}

impl ButtonCondition {
    pub fn evaluate<F>(&self, test: F) -> bool
    where
        F: FnMut(&ConditionPredicate) -> bool,
    {
        combine(&self.conditions, self.combinator, test)
    }
}

/// Serializable snapshot of every condition record extracted from a form.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConditionsConfig {
    #[serde(default)]
    pub field_conditions: Vec<FieldCondition>,
    #[serde(default)]
    pub page_conditions: Vec<PageConditionGroup>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub button_conditions: Vec<ButtonCondition>,
}

impl ConditionsConfig {
    /// Extracts the enabled field, page and button rules of a form definition.
    pub fn from_form(form: &FormDefinition) -> Self {
        let mut config = ConditionsConfig::default();
        for (page_index, page) in form.pages.iter().enumerate() {
            if let Some(rule) = &page.conditional_visibility
                && rule.enabled
            {
                config.page_conditions.push(PageConditionGroup {
                    page_id: page.id.clone(),
                    page_index,
                    conditions: rule.conditions.clone(),
                    combinator: rule.logic,
                });
            }

            if let Some(navigation) = &page.navigation_config {
                for button in ButtonKind::ALL {
                    if let Some(rule) = navigation.rule(button)
                        && rule.enabled
                    {
                        config.button_conditions.push(ButtonCondition {
                            page_id: page.id.clone(),
                            page_index,
                            button,
                            conditions: rule.conditions.clone(),
                            combinator: rule.logic,
                        });
                    }
                }
            }

            for field in &page.fields {
                let Some(rule) = &field.conditional_visibility else {
                    continue;
                };
                if !rule.enabled {
                    continue;
                }
                config.field_conditions.push(FieldCondition {
                    field_id: field.id.clone(),
                    depends_on: rule.depends_on.clone(),
                    operator: rule.condition,
                    comparand: rule.value.clone(),
                    depends_on_page: rule.depends_on_page.clone(),
                });
            }
        }
        config
    }

    pub fn is_empty(&self) -> bool {
        self.field_conditions.is_empty()
            && self.page_conditions.is_empty()
            && self.button_conditions.is_empty()
    }
}
