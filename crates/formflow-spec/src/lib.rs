#![allow(missing_docs)]

pub mod condition;
pub mod conditions;
pub mod form;
pub mod text;

pub use condition::{Combinator, ConditionPredicate, Operator, combine, evaluate, evaluate_value};
pub use conditions::{
    ButtonCondition, ButtonKind, ConditionsConfig, FieldCondition, PageConditionGroup,
};
pub use form::{
    FieldKind, FieldSpec, FieldVisibility, FormDefinition, NavigationConfig, PageSpec, RuleGroup,
    SpecError,
};
pub use text::value_text;
