use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use formflow_spec::FormDefinition;
use serde::Serialize;
use serde::de::DeserializeOwned;

pub mod check;
pub mod evaluate;
pub mod export;
pub mod schema;
pub mod simulate;

pub(crate) fn load_form(path: &Path) -> Result<FormDefinition> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read form {}", path.display()))?;
    FormDefinition::from_json(&raw)
        .with_context(|| format!("invalid form definition {}", path.display()))
}

pub(crate) fn read_json<T: DeserializeOwned>(path: &Path, what: &str) -> Result<T> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read {what} {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("invalid {what} {}", path.display()))
}

pub(crate) fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let rendered = serde_json::to_string_pretty(value).context("failed to render JSON")?;
    println!("{rendered}");
    Ok(())
}
