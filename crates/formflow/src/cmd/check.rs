use std::path::PathBuf;

use anyhow::{Result, bail};
use clap::Args;
use formflow_engine::{DependencyReport, EngineConfig, FormSession};
use serde::Serialize;

use super::{load_form, print_json};

#[derive(Args, Debug, Clone)]
pub struct CheckArgs {
    /// Form definition JSON
    #[arg(value_name = "FORM")]
    pub form: PathBuf,
    /// Emit the report as JSON
    #[arg(long = "json", default_value_t = false)]
    pub json: bool,
}

#[derive(Debug, Serialize)]
struct CheckReport {
    form: String,
    field_conditions: usize,
    page_conditions: usize,
    button_conditions: usize,
    #[serde(flatten)]
    dependencies: DependencyReport,
}

pub fn run(args: CheckArgs, config: &EngineConfig) -> Result<()> {
    let form = load_form(&args.form)?;
    let (session, _surface) = FormSession::recording(config);
    session.load(&form);

    let conditions = session.export_conditions();
    let report = CheckReport {
        form: form.id.clone(),
        field_conditions: conditions.field_conditions.len(),
        page_conditions: conditions.page_conditions.len(),
        button_conditions: conditions.button_conditions.len(),
        dependencies: session.validate(),
    };

    if args.json {
        print_json(&report)?;
    } else {
        for issue in &report.dependencies.errors {
            let severity = if issue.is_fatal() { "error" } else { "warning" };
            println!("{severity}: {issue}");
        }
        println!(
            "{}: {} field condition(s), {} page group(s), {} button rule(s)",
            report.form, report.field_conditions, report.page_conditions, report.button_conditions
        );
    }

    let cycles = report.dependencies.cycles().count();
    if cycles > 0 {
        bail!("{}: {cycles} field(s) in circular dependencies", report.form);
    }
    Ok(())
}
