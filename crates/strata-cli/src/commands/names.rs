//! `names`: preview the naming variants for a feature name.

use anyhow::{Context, Result};
use clap::Args;

use super::Session;
use crate::output;

#[derive(Args)]
pub struct NamesArgs {
    /// Feature base name in any casing
    pub name: String,

    /// Print as JSON
    #[arg(long)]
    pub json: bool,
}

pub fn execute(args: &NamesArgs, session: &Session) -> Result<u8> {
    let variants = session
        .config
        .naming_engine()
        .derive(&args.name)
        .with_context(|| format!("Cannot derive names from '{}'", args.name))?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&variants)?);
    } else {
        output::print_names(&variants);
    }
    Ok(0)
}
