use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use formflow_engine::{EngineConfig, FormSession};

use super::{load_form, print_json};

#[derive(Args, Debug, Clone)]
pub struct ExportArgs {
    /// Form definition JSON
    #[arg(value_name = "FORM")]
    pub form: PathBuf,
    /// Write the conditions to a file instead of stdout
    #[arg(long = "out", value_name = "conditions.json")]
    pub out: Option<PathBuf>,
}

pub fn run(args: ExportArgs, config: &EngineConfig) -> Result<()> {
    let form = load_form(&args.form)?;
    let (session, _surface) = FormSession::recording(config);
    session.load(&form);
    let conditions = session.export_conditions();

    match &args.out {
        Some(path) => {
            let rendered =
                serde_json::to_string_pretty(&conditions).context("failed to render JSON")?;
            fs::write(path, rendered)
                .with_context(|| format!("failed to write {}", path.display()))?;
            println!("wrote {}", path.display());
            Ok(())
        }
        None => print_json(&conditions),
    }
}
