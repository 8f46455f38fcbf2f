use anyhow::Result;
use bstr::BString;
use clap::Args;

use super::open_repo;
use crate::Cli;

#[derive(Args)]
pub struct AddArgs {
    /// Paths relative to the top of the work tree
    #[arg(required = true)]
    paths: Vec<String>,
}

pub fn run(args: &AddArgs, cli: &Cli) -> Result<i32> {
    let repo = open_repo(cli)?;
    let paths: Vec<BString> = args.paths.iter().map(|p| BString::from(p.as_str())).collect();
    repo.stage(&paths)?;
    Ok(0)
}
