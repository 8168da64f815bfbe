use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Renders a variable value as the text the condition evaluator compares against.
///
/// `null` becomes the empty string, integral floats drop their fraction (`5.0` reads as `5`),
/// arrays are joined with commas and objects fall back to their JSON encoding.
pub fn value_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        Value::Bool(flag) => flag.to_string(),
        Value::Number(number) => number_text(number),
        Value::Array(items) => items.iter().map(value_text).collect::<Vec<_>>().join(","),
        Value::Object(_) => value.to_string(),
    }
}

fn number_text(number: &serde_json::Number) -> String {
    if number.is_f64()
        && let Some(float) = number.as_f64()
        && float.is_finite()
        && float.fract() == 0.0
        && float.abs() < 1e15
    {
        return format!("{}", float as i64);
    }
    number.to_string()
}

/// Accepts any JSON scalar where the model stores text (comparands written as `5` or `true`).
pub(crate) fn deserialize_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(value_text(&value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn scalars_render_like_form_input() {
        assert_eq!(value_text(&Value::Null), "");
        assert_eq!(value_text(&json!("US")), "US");
        assert_eq!(value_text(&json!(true)), "true");
        assert_eq!(value_text(&json!(42)), "42");
        assert_eq!(value_text(&json!(5.0)), "5");
        assert_eq!(value_text(&json!(2.5)), "2.5");
    }

    #[test]
    fn structured_values_flatten() {
        assert_eq!(value_text(&json!(["a", "b", 3])), "a,b,3");
        assert_eq!(value_text(&json!({ "id": 1 })), r#"{"id":1}"#);
    }
}
