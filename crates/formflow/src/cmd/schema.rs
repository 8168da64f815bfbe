use anyhow::Result;
use clap::{Args, ValueEnum};
use formflow_spec::{ConditionsConfig, FormDefinition};

use super::print_json;

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SchemaKind {
    #[default]
    Form,
    Conditions,
}

#[derive(Args, Debug, Clone)]
pub struct SchemaArgs {
    /// Document to describe
    #[arg(long = "kind", value_enum, default_value_t = SchemaKind::Form)]
    pub kind: SchemaKind,
}

pub fn run(args: SchemaArgs) -> Result<()> {
    let schema = match args.kind {
        SchemaKind::Form => schemars::schema_for!(FormDefinition),
        SchemaKind::Conditions => schemars::schema_for!(ConditionsConfig),
    };
    print_json(&schema)
}
