use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use formflow_engine::{
    ButtonState, EngineConfig, FlowState, FormSession, RecordingSurface, Transition,
    VisibilitySnapshot,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use super::{load_form, print_json, read_json};

#[derive(Args, Debug, Clone)]
pub struct SimulateArgs {
    /// Form definition JSON
    #[arg(value_name = "FORM")]
    pub form: PathBuf,
    /// JSON array of steps to replay
    #[arg(long = "script", value_name = "steps.json")]
    pub script: PathBuf,
}

/// One scripted user or collaborator action.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum Step {
    Set { name: String, value: Value },
    SetMany { values: Map<String, Value> },
    Input { field: String, value: Value },
    Sign { field: String },
    Flow { field: String, state: FlowState },
    Next,
    Previous,
    Goto { page: usize },
}

#[derive(Debug, Serialize)]
struct TraceEntry {
    index: usize,
    step: Step,
    #[serde(skip_serializing_if = "Option::is_none")]
    transition: Option<Transition>,
    page_index: usize,
    buttons: ButtonState,
}

#[derive(Debug, Serialize)]
struct SimulationReport {
    form: String,
    trace: Vec<TraceEntry>,
    #[serde(rename = "final")]
    final_state: VisibilitySnapshot,
}

pub fn run(args: SimulateArgs, config: &EngineConfig) -> Result<()> {
    let form = load_form(&args.form)?;
    let steps: Vec<Step> = read_json(&args.script, "script")?;
    let (session, surface) = FormSession::recording(config);
    session.load(&form);

    let trace: Vec<TraceEntry> = steps
        .into_iter()
        .enumerate()
        .map(|(index, step)| {
            let transition = apply(&session, &surface, &step);
            debug!(index, ?transition, "replayed step");
            TraceEntry {
                index,
                step,
                transition,
                page_index: session.page_index(),
                buttons: session.buttons(),
            }
        })
        .collect();

    print_json(&SimulationReport {
        form: form.id,
        trace,
        final_state: session.visibility_snapshot(),
    })
}

fn apply(session: &FormSession, surface: &RecordingSurface, step: &Step) -> Option<Transition> {
    match step {
        Step::Set { name, value } => {
            session.set_variable(name.as_str(), value.clone());
            None
        }
        Step::SetMany { values } => {
            session.set_variables(values.clone());
            None
        }
        Step::Input { field, value } => {
            surface.fill(field, value.clone());
            session.field_input(field.as_str(), value.clone());
            None
        }
        Step::Sign { field } => {
            surface.sign(field);
            None
        }
        Step::Flow { field, state } => {
            session.set_flow_state(field, state.clone());
            None
        }
        Step::Next => Some(session.next()),
        Step::Previous => Some(session.previous()),
        Step::Goto { page } => Some(session.go_to_page(*page)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_every_step_kind() {
        let steps: Vec<Step> = serde_json::from_value(json!([
            { "step": "set", "name": "tier", "value": "pro" },
            { "step": "set_many", "values": { "a": 1, "b": true } },
            { "step": "input", "field": "email", "value": "a@b.c" },
            { "step": "sign", "field": "sig" },
            { "step": "flow", "field": "login", "state": { "state": "login_complete" } },
            { "step": "next" },
            { "step": "previous" },
            { "step": "goto", "page": 2 }
        ]))
        .expect("steps");
        assert_eq!(steps.len(), 8);
        assert!(matches!(steps[4], Step::Flow { .. }));
        assert!(matches!(steps[7], Step::Goto { page: 2 }));
    }
}
