use serde_json::json;

use formflow_spec::{
    ButtonKind, Combinator, ConditionsConfig, FieldKind, FormDefinition, Operator, SpecError,
};

fn signup_fixture() -> serde_json::Value {
    json!({
        "id": "signup",
        "title": "Sign up",
        "pages": [
            {
                "id": "p1",
                "fields": [
                    { "id": "country", "type": "select", "required": true, "variableName": "country" },
                    {
                        "id": "stateField",
                        "type": "text",
                        "conditionalVisibility": {
                            "enabled": true,
                            "dependsOn": "country",
                            "condition": "equals",
                            "value": "US"
                        }
                    },
                    {
                        "id": "disabledRule",
                        "conditionalVisibility": {
                            "enabled": false,
                            "dependsOn": "country",
                            "condition": "equals",
                            "value": "CA"
                        }
                    }
                ],
                "navigationConfig": {
                    "next": {
                        "enabled": true,
                        "conditions": [{ "dependsOn": "terms", "condition": "equals", "value": "yes" }],
                        "logic": "AND"
                    },
                    "submit": { "enabled": false, "conditions": [] }
                }
            },
            {
                "id": "p2",
                "fields": [{ "id": "sig", "type": "signature", "required": true }],
                "conditionalVisibility": {
                    "enabled": true,
                    "conditions": [
                        { "dependsOn": "tier", "condition": "equals", "value": "pro" },
                        { "dependsOn": "seats", "condition": "greater_than", "value": 10 }
                    ],
                    "logic": "OR"
                }
            }
        ]
    })
}

#[test]
fn parses_form_builder_definition() {
    let form = FormDefinition::from_value(signup_fixture()).expect("fixture should parse");
    assert_eq!(form.page_count(), 2);
    assert_eq!(form.page_index("p2"), Some(1));

    let (page, field) = form.field("sig").expect("signature field");
    assert_eq!(page, 1);
    assert_eq!(field.kind, FieldKind::Signature);
    assert!(field.required);

    let (_, country) = form.field("country").expect("country field");
    assert_eq!(country.variable_name.as_deref(), Some("country"));
    assert!(!country.is_conditional());
}

#[test]
fn unknown_field_types_fall_back_to_other() {
    let form = FormDefinition::from_value(json!({
        "id": "f",
        "pages": [{ "id": "p", "fields": [{ "id": "x", "type": "salesforce_lookup" }] }]
    }))
    .expect("parse");
    assert_eq!(form.pages[0].fields[0].kind, FieldKind::Other);
}

#[test]
fn extracts_only_enabled_rules() {
    let form = FormDefinition::from_value(signup_fixture()).expect("parse");
    let config = ConditionsConfig::from_form(&form);

    assert_eq!(config.field_conditions.len(), 1);
    let field = &config.field_conditions[0];
    assert_eq!(field.field_id, "stateField");
    assert_eq!(field.depends_on, "country");
    assert_eq!(field.operator, Operator::Equals);
    assert_eq!(field.comparand, "US");

    assert_eq!(config.page_conditions.len(), 1);
    let page = &config.page_conditions[0];
    assert_eq!(page.page_id, "p2");
    assert_eq!(page.page_index, 1);
    assert_eq!(page.combinator, Combinator::Or);
    assert_eq!(page.conditions[1].comparand, "10");
    assert!(page.depends_on("seats"));
    assert!(!page.depends_on("country"));

    assert_eq!(config.button_conditions.len(), 1);
    assert_eq!(config.button_conditions[0].button, ButtonKind::Next);
    assert_eq!(config.button_conditions[0].page_index, 0);
}

#[test]
fn conditions_config_serializes_camel_case() {
    let form = FormDefinition::from_value(signup_fixture()).expect("parse");
    let value = serde_json::to_value(ConditionsConfig::from_form(&form)).expect("serialize");
    assert_eq!(value["fieldConditions"][0]["fieldId"], "stateField");
    assert_eq!(value["pageConditions"][0]["combinator"], "OR");
    assert_eq!(value["buttonConditions"][0]["button"], "next");
    assert!(value["fieldConditions"][0].get("dependsOnPage").is_none());

    let back: ConditionsConfig = serde_json::from_value(value).expect("deserialize");
    assert_eq!(back, ConditionsConfig::from_form(&form));
}

#[test]
fn rejects_duplicate_field_ids() {
    let err = FormDefinition::from_value(json!({
        "id": "dup",
        "pages": [
            { "id": "a", "fields": [{ "id": "email" }] },
            { "id": "b", "fields": [{ "id": "email" }] }
        ]
    }))
    .expect_err("duplicate field");
    assert!(matches!(
        err,
        SpecError::DuplicateField { ref field_id, first: 0, second: 1 } if field_id == "email"
    ));
}

#[test]
fn rejects_duplicate_pages_and_empty_forms() {
    let err = FormDefinition::from_json(r#"{"id":"f","pages":[{"id":"a"},{"id":"a"}]}"#)
        .expect_err("duplicate page");
    assert!(matches!(err, SpecError::DuplicatePage(ref id) if id == "a"));

    let err = FormDefinition::from_json(r#"{"id":"empty","pages":[]}"#).expect_err("no pages");
    assert!(matches!(err, SpecError::NoPages(_)));

    let err = FormDefinition::from_json("{").expect_err("bad json");
    assert!(matches!(err, SpecError::Json(_)));
}
