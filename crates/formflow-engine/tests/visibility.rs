use std::rc::Rc;

use serde_json::json;

use formflow_engine::{
    ArtifactState, DependencyIssue, EngineConfig, FlowStates, PageScope, RecordingSurface,
    VariableStore, VisibilityEngine,
};
use formflow_spec::{ConditionsConfig, FieldCondition, FormDefinition, Operator};

struct Harness {
    store: VariableStore,
    surface: Rc<RecordingSurface>,
    engine: VisibilityEngine,
}

fn harness() -> Harness {
    let store = VariableStore::new();
    let surface = Rc::new(RecordingSurface::new());
    let engine = VisibilityEngine::new(
        store.clone(),
        PageScope::new(),
        FlowStates::new(),
        surface.clone(),
        &EngineConfig::default(),
    );
    Harness {
        store,
        surface,
        engine,
    }
}

fn form(value: serde_json::Value) -> FormDefinition {
    FormDefinition::from_value(value).expect("form definition")
}

fn country_form() -> FormDefinition {
    form(json!({
        "id": "address",
        "pages": [{
            "id": "p1",
            "fields": [
                { "id": "country", "type": "select" },
                {
                    "id": "stateField",
                    "conditionalVisibility": {
                        "enabled": true,
                        "dependsOn": "country",
                        "condition": "equals",
                        "value": "US"
                    }
                }
            ]
        }]
    }))
}

fn page_group_form(logic: &str, conditions: serde_json::Value) -> FormDefinition {
    form(json!({
        "id": "groups",
        "pages": [
            { "id": "intro", "fields": [] },
            {
                "id": "extras",
                "fields": [],
                "conditionalVisibility": { "enabled": true, "conditions": conditions, "logic": logic }
            }
        ]
    }))
}

#[test]
fn state_field_follows_country() {
    let Harness {
        store,
        surface,
        mut engine,
    } = harness();
    engine.load(&country_form());
    assert_eq!(surface.field_visible("stateField"), Some(false));
    assert_eq!(engine.field_state("stateField"), Some(ArtifactState::Hidden));

    store.set("country", "US");
    engine.handle_changes(["country"]);
    assert_eq!(surface.field_visible("stateField"), Some(true));
    assert!(engine.is_field_visible("stateField"));

    store.set("country", "CA");
    engine.handle_changes(["country"]);
    assert_eq!(surface.field_visible("stateField"), Some(false));
}

#[test]
fn comparison_is_case_insensitive() {
    let Harness {
        store,
        surface,
        mut engine,
    } = harness();
    engine.load(&country_form());
    store.set("country", "us");
    engine.handle_changes(["country"]);
    assert_eq!(surface.field_visible("stateField"), Some(true));
}

#[test]
fn unrelated_keys_trigger_nothing() {
    let Harness {
        store,
        surface,
        mut engine,
    } = harness();
    engine.load(&country_form());
    surface.take_calls();
    store.set("language", "en");
    let summary = engine.handle_changes(["language"]);
    assert_eq!(summary.fields, 0);
    assert_eq!(summary.pages, 0);
    assert!(surface.calls().is_empty());
}

#[test]
fn field_input_feeds_dependents() {
    let Harness {
        surface,
        mut engine,
        ..
    } = harness();
    engine.load(&country_form());
    engine.field_input("country", json!("US"));
    assert_eq!(surface.field_visible("stateField"), Some(true));
    assert_eq!(engine.current_field_value("country"), Some(json!("US")));
}

#[test]
fn empty_page_groups_are_visible() {
    for logic in ["AND", "OR"] {
        let Harness {
            surface,
            mut engine,
            ..
        } = harness();
        engine.load(&page_group_form(logic, json!([])));
        assert_eq!(surface.page_visible("extras"), Some(true), "{logic}");
        assert!(engine.is_page_visible(1));
    }
}

#[test]
fn and_group_needs_every_predicate() {
    let Harness {
        store,
        surface,
        mut engine,
    } = harness();
    engine.load(&page_group_form(
        "AND",
        json!([
            { "dependsOn": "tier", "condition": "equals", "value": "pro" },
            { "dependsOn": "seats", "condition": "greater_equal", "value": 5 }
        ]),
    ));
    store.set("tier", "pro");
    engine.handle_changes(["tier"]);
    assert_eq!(surface.page_visible("extras"), Some(false));

    store.set("seats", 5);
    engine.handle_changes(["seats"]);
    assert_eq!(surface.page_visible("extras"), Some(true));
}

#[test]
fn or_group_needs_any_predicate() {
    let Harness {
        store,
        surface,
        mut engine,
    } = harness();
    engine.load(&page_group_form(
        "OR",
        json!([
            { "dependsOn": "tier", "condition": "equals", "value": "pro" },
            { "dependsOn": "seats", "condition": "greater_than", "value": 10 }
        ]),
    ));
    assert_eq!(surface.page_visible("extras"), Some(false));
    store.set("seats", "25");
    engine.handle_changes(["seats"]);
    assert_eq!(surface.page_visible("extras"), Some(true));
    assert!(engine.is_page_visible(1));
    assert!(engine.is_page_visible(0));
}

#[test]
fn batched_keys_evaluate_each_dependent_once() {
    let Harness {
        store,
        surface,
        mut engine,
    } = harness();
    engine.load(&page_group_form(
        "AND",
        json!([
            { "dependsOn": "tier", "condition": "equals", "value": "pro" },
            { "dependsOn": "seats", "condition": "greater_than", "value": 1 }
        ]),
    ));
    surface.take_calls();
    store.set_multiple([("tier", json!("pro")), ("seats", json!(3))]);
    let summary = engine.handle_changes(["tier", "seats"]);
    assert_eq!(summary.pages, 1);
    assert_eq!(surface.count_page_updates("extras"), 1);
    assert_eq!(surface.page_visible("extras"), Some(true));
}

#[test]
fn thousand_field_cycle_is_reported_per_field() {
    let Harness { mut engine, .. } = harness();
    let length = 1_000;
    let config = ConditionsConfig {
        field_conditions: (0..length)
            .map(|index| {
                FieldCondition::new(
                    format!("f{index}"),
                    format!("f{}", (index + 1) % length),
                    Operator::IsNotEmpty,
                    "",
                )
            })
            .collect(),
        ..ConditionsConfig::default()
    };
    engine.import_conditions(config);

    let report = engine.validate();
    assert!(!report.valid);
    assert_eq!(report.cycles().count(), length);
    match &report.errors[0] {
        DependencyIssue::Circular { field_id, chain } => {
            assert_eq!(field_id, "f0");
            assert_eq!(chain.len(), length + 1);
            assert_eq!(chain.first().map(String::as_str), Some("f0"));
            assert_eq!(chain.get(1).map(String::as_str), Some("f1"));
            assert_eq!(chain.last().map(String::as_str), Some("f0"));
        }
        other => panic!("expected a cycle, got {other:?}"),
    }
}

#[test]
fn long_acyclic_chain_is_valid() {
    let Harness { mut engine, .. } = harness();
    let length = 1_000;
    let mut field_conditions: Vec<_> = (0..length - 1)
        .map(|index| {
            FieldCondition::new(
                format!("f{index}"),
                format!("f{}", index + 1),
                Operator::IsNotEmpty,
                "",
            )
        })
        .collect();
    field_conditions.push(FieldCondition::new(
        format!("f{}", length - 1),
        "f0_root",
        Operator::IsEmpty,
        "",
    ));
    let fields: Vec<_> = (0..length)
        .map(|index| format!("f{index}"))
        .chain(["f0_root".to_string()])
        .map(|id| json!({ "id": id }))
        .collect();
    engine.load(&form(json!({
        "id": "chain",
        "pages": [{ "id": "p1", "fields": fields }]
    })));
    engine.import_conditions(ConditionsConfig {
        field_conditions,
        ..ConditionsConfig::default()
    });

    let report = engine.validate();
    assert!(report.valid, "{:?}", report.messages());
    assert!(report.errors.is_empty());
}

#[test]
fn dangling_references_are_warnings() {
    let Harness {
        store,
        mut engine,
        ..
    } = harness();
    engine.load(&form(json!({
        "id": "dangling",
        "pages": [{
            "id": "p1",
            "fields": [{
                "id": "notes",
                "conditionalVisibility": {
                    "enabled": true,
                    "dependsOn": "ghost",
                    "condition": "is_not_empty"
                }
            }]
        }]
    })));

    let report = engine.validate();
    assert!(report.valid);
    assert_eq!(
        report.errors,
        vec![DependencyIssue::Dangling {
            owner: "notes".into(),
            depends_on: "ghost".into(),
        }]
    );
    assert!(report.messages()[0].contains("ghost"));

    store.set("ghost", "boo");
    assert!(engine.validate().errors.is_empty());
}

#[test]
fn two_field_cycle_message_names_chain() {
    let Harness { mut engine, .. } = harness();
    engine.import_conditions(ConditionsConfig {
        field_conditions: vec![
            FieldCondition::new("a", "b", Operator::IsNotEmpty, ""),
            FieldCondition::new("b", "a", Operator::IsNotEmpty, ""),
            FieldCondition::new("c", "a", Operator::IsNotEmpty, ""),
        ],
        ..ConditionsConfig::default()
    });
    let report = engine.validate();
    assert_eq!(report.cycles().count(), 2);
    assert_eq!(
        report.messages()[0],
        "circular dependency detected for field 'a': a -> b -> a"
    );
}

#[test]
fn exported_conditions_round_trip() {
    let Harness { mut engine, .. } = harness();
    engine.load(&form(json!({
        "id": "roundtrip",
        "pages": [
            {
                "id": "p1",
                "fields": [
                    { "id": "country" },
                    {
                        "id": "stateField",
                        "conditionalVisibility": {
                            "enabled": true,
                            "dependsOn": "country",
                            "condition": "equals",
                            "value": "US",
                            "dependsOnPage": "p1"
                        }
                    }
                ],
                "navigationConfig": {
                    "submit": {
                        "enabled": true,
                        "conditions": [{ "dependsOn": "terms", "condition": "equals", "value": "yes" }]
                    }
                }
            },
            {
                "id": "p2",
                "fields": [],
                "conditionalVisibility": {
                    "enabled": true,
                    "conditions": [{ "dependsOn": "country", "condition": "not_equals", "value": "US" }],
                    "logic": "OR"
                }
            }
        ]
    })));

    let exported = engine.export_conditions();
    let wire = serde_json::to_string(&exported).expect("serialize");
    let restored: ConditionsConfig = serde_json::from_str(&wire).expect("deserialize");

    let Harness {
        surface: other_surface,
        engine: mut other,
        ..
    } = harness();
    other.import_conditions(restored);
    assert_eq!(other.export_conditions(), exported);
    assert_eq!(other_surface.field_visible("stateField"), Some(false));
    assert_eq!(other_surface.page_visible("p2"), Some(true));
}

#[test]
fn flow_scoped_keys_are_listed_for_a_flow_field() {
    let Harness { mut engine, .. } = harness();
    engine.import_conditions(ConditionsConfig {
        field_conditions: vec![
            FieldCondition::new("welcome", "login_email", Operator::IsNotEmpty, ""),
            FieldCondition::new("badge", "login_verified", Operator::Equals, "true"),
            FieldCondition::new("other", "loginx", Operator::IsNotEmpty, ""),
        ],
        ..ConditionsConfig::default()
    });
    assert_eq!(
        engine.keys_scoped_to("login"),
        vec!["login_email".to_string(), "login_verified".to_string()]
    );
}
