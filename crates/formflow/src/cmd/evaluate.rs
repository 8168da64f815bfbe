use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use formflow_engine::{EngineConfig, FormSession};
use serde_json::{Map, Value};
use tracing::debug;

use super::{load_form, print_json, read_json};

#[derive(Args, Debug, Clone)]
pub struct EvaluateArgs {
    /// Form definition JSON
    #[arg(value_name = "FORM")]
    pub form: PathBuf,
    /// JSON object of variables merged into the store before evaluation
    #[arg(long = "vars", value_name = "vars.json")]
    pub vars: Option<PathBuf>,
}

pub fn run(args: EvaluateArgs, config: &EngineConfig) -> Result<()> {
    let form = load_form(&args.form)?;
    let (session, _surface) = FormSession::recording(config);
    session.load(&form);

    if let Some(path) = &args.vars {
        let vars: Map<String, Value> = read_json(path, "variables")?;
        debug!(count = vars.len(), "merging variables");
        session.set_variables(vars);
    }

    print_json(&session.visibility_snapshot())
}
