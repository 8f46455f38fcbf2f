use anyhow::Result;
use clap::Args;

use super::open_repo;
use crate::Cli;

#[derive(Args)]
pub struct MergeBaseArgs {
    /// Exit 0 if the first commit is an ancestor of the second, 1 otherwise
    #[arg(long)]
    is_ancestor: bool,

    first: String,

    second: String,
}

pub fn run(args: &MergeBaseArgs, cli: &Cli) -> Result<i32> {
    let repo = open_repo(cli)?;
    let a = repo.resolve_revision(&args.first)?;
    let b = repo.resolve_revision(&args.second)?;

    if args.is_ancestor {
        let yes = grove_revwalk::is_ancestor(repo.odb(), &a, &b)?;
        return Ok(if yes { 0 } else { 1 });
    }
    match grove_revwalk::merge_base(repo.odb(), &a, &b)? {
        Some(base) => {
            println!("{}", base);
            Ok(0)
        }
        None => Ok(1),
    }
}
