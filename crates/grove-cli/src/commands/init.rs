use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use grove_repository::{InitOptions, Repository};

use crate::Cli;

#[derive(Args)]
pub struct InitArgs {
    /// Create a bare repository
    #[arg(long)]
    bare: bool,

    /// Name of the branch HEAD points at
    #[arg(short = 'b', long = "initial-branch")]
    initial_branch: Option<String>,

    /// Where to create the repository
    #[arg(default_value = ".")]
    directory: PathBuf,
}

pub fn run(args: &InitArgs, _cli: &Cli) -> Result<i32> {
    let options = InitOptions {
        bare: args.bare,
        initial_branch: args.initial_branch.clone(),
    };
    let repo = Repository::init(&args.directory, &options)?;
    println!("Initialized grove repository in {}", repo.git_dir().display());
    Ok(0)
}
