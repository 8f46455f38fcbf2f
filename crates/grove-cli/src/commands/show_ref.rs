use std::io::{self, Write};

use anyhow::Result;
use clap::Args;

use super::open_repo;
use crate::Cli;

#[derive(Args)]
pub struct ShowRefArgs {
    /// Also show HEAD
    #[arg(long)]
    head: bool,

    /// Only show refs under this prefix
    #[arg(long, default_value = "refs/")]
    prefix: String,
}

pub fn run(args: &ShowRefArgs, cli: &Cli) -> Result<i32> {
    let repo = open_repo(cli)?;
    let stdout = io::stdout();
    let mut out = stdout.lock();

    if args.head {
        if let Some(head) = repo.head_commit()? {
            writeln!(out, "{} HEAD", head)?;
        }
    }
    let refs = repo.refs().list(&args.prefix)?;
    for (name, id) in &refs {
        writeln!(out, "{} {}", id, name)?;
    }
    Ok(if refs.is_empty() { 1 } else { 0 })
}
