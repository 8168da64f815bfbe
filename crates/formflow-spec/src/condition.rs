use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::text::{deserialize_text, value_text};

/// Comparison operators understood by the condition evaluator.
///
/// Unrecognized operator names deserialize as [`Operator::Unknown`], which never matches.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    #[default]
    Equals,
    NotEquals,
    Contains,
    NotContains,
    StartsWith,
    EndsWith,
    IsEmpty,
    IsNotEmpty,
    GreaterThan,
    LessThan,
    GreaterEqual,
    LessEqual,
    #[serde(other)]
    Unknown,
}

impl Operator {
    pub const ALL: [Operator; 12] = [
        Operator::Equals,
        Operator::NotEquals,
        Operator::Contains,
        Operator::NotContains,
        Operator::StartsWith,
        Operator::EndsWith,
        Operator::IsEmpty,
        Operator::IsNotEmpty,
        Operator::GreaterThan,
        Operator::LessThan,
        Operator::GreaterEqual,
        Operator::LessEqual,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Operator::Equals => "equals",
            Operator::NotEquals => "not_equals",
            Operator::Contains => "contains",
            Operator::NotContains => "not_contains",
            Operator::StartsWith => "starts_with",
            Operator::EndsWith => "ends_with",
            Operator::IsEmpty => "is_empty",
            Operator::IsNotEmpty => "is_not_empty",
            Operator::GreaterThan => "greater_than",
            Operator::LessThan => "less_than",
            Operator::GreaterEqual => "greater_equal",
            Operator::LessEqual => "less_equal",
            Operator::Unknown => "unknown",
        }
    }

    /// Numeric operators coerce both operands to numbers before comparing.
    pub fn is_numeric(self) -> bool {
        matches!(
            self,
            Operator::GreaterThan
                | Operator::LessThan
                | Operator::GreaterEqual
                | Operator::LessEqual
        )
    }

    /// `is_empty` and `is_not_empty` ignore their comparand.
    pub fn uses_comparand(self) -> bool {
        !matches!(self, Operator::IsEmpty | Operator::IsNotEmpty)
    }
}

impl FromStr for Operator {
    type Err = Infallible;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let normalized = raw.trim().to_ascii_lowercase();
        Ok(Operator::ALL
            .into_iter()
            .find(|operator| operator.as_str() == normalized)
            .unwrap_or(Operator::Unknown))
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the predicates of a page or button group are combined.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum Combinator {
    #[default]
    #[serde(rename = "AND", alias = "and")]
    And,
    #[serde(rename = "OR", alias = "or")]
    Or,
}

/// Atomic `(depends_on, operator, comparand)` test shared by fields, pages and buttons.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConditionPredicate {
    pub depends_on: String,
    #[serde(default, alias = "condition")]
    pub operator: Operator,
    #[serde(default, alias = "value", deserialize_with = "deserialize_text")]
    pub comparand: String,
}

impl ConditionPredicate {
    pub fn new(
        depends_on: impl Into<String>,
        operator: Operator,
        comparand: impl Into<String>,
    ) -> Self {
        Self {
            depends_on: depends_on.into(),
            operator,
            comparand: comparand.into(),
        }
    }

    /// Tests an already-resolved dependency value.
    pub fn test(&self, value: &str) -> bool {
        evaluate(value, self.operator, &self.comparand)
    }
}

/// Evaluates `value <operator> comparand`.
///
/// String operators compare case-insensitively. Numeric operators parse both sides as `f64`;
/// anything unparsable becomes NaN, so every numeric comparison involving it is `false`.
pub fn evaluate(value: &str, operator: Operator, comparand: &str) -> bool {
    match operator {
        Operator::IsEmpty => value.trim().is_empty(),
        Operator::IsNotEmpty => !value.trim().is_empty(),
        Operator::Equals => fold(value) == fold(comparand),
        Operator::NotEquals => fold(value) != fold(comparand),
        Operator::Contains => fold(value).contains(&fold(comparand)),
        Operator::NotContains => !fold(value).contains(&fold(comparand)),
        Operator::StartsWith => fold(value).starts_with(&fold(comparand)),
        Operator::EndsWith => fold(value).ends_with(&fold(comparand)),
        Operator::GreaterThan => compare_numbers(value, comparand, |left, right| left > right),
        Operator::LessThan => compare_numbers(value, comparand, |left, right| left < right),
        Operator::GreaterEqual => compare_numbers(value, comparand, |left, right| left >= right),
        Operator::LessEqual => compare_numbers(value, comparand, |left, right| left <= right),
        Operator::Unknown => false,
    }
}

/// Same as [`evaluate`] for a raw variable value; `null` reads as the empty string.
pub fn evaluate_value(value: &Value, operator: Operator, comparand: &str) -> bool {
    evaluate(&value_text(value), operator, comparand)
}

/// Combines predicate results; an empty predicate list is always `true` for both combinators.
pub fn combine<F>(conditions: &[ConditionPredicate], combinator: Combinator, mut test: F) -> bool
where
    F: FnMut(&ConditionPredicate) -> bool,
{
    if conditions.is_empty() {
        return true;
    }
    match combinator {
        Combinator::And => conditions.iter().all(|predicate| test(predicate)),
        Combinator::Or => conditions.iter().any(|predicate| test(predicate)),
    }
}

fn fold(text: &str) -> String {
    text.to_lowercase()
}

/// Non-finite spellings such as "inf" or "NaN" are not numbers here.
fn to_number(text: &str) -> f64 {
    text.trim()
        .parse::<f64>()
        .ok()
        .filter(|number| number.is_finite())
        .unwrap_or(f64::NAN)
}

fn compare_numbers<F>(value: &str, comparand: &str, predicate: F) -> bool
where
    F: Fn(f64, f64) -> bool,
{
    predicate(to_number(value), to_number(comparand))
}
