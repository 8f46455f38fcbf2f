use anyhow::Result;
use clap::Args;
use grove_ref::RefName;
use grove_repository::{checkout_commit, CheckoutTarget, RepoError};
use grove_worktree::{CheckoutOptions, SyncError};

use super::open_repo;
use crate::Cli;

#[derive(Args)]
pub struct CheckoutArgs {
    /// Discard local changes to paths the checkout touches
    #[arg(short = 'f', long)]
    force: bool,

    /// Branch name, or any revision to detach HEAD at
    target: String,
}

pub fn run(args: &CheckoutArgs, cli: &Cli) -> Result<i32> {
    let repo = open_repo(cli)?;

    let branch = RefName::new(format!("refs/heads/{}", args.target))
        .ok()
        .filter(|b| matches!(repo.refs().try_resolve(b), Ok(Some(_))));
    let target = match branch {
        Some(branch) => CheckoutTarget::Branch(branch),
        None => CheckoutTarget::Detached(repo.resolve_revision(&args.target)?),
    };

    let options = CheckoutOptions {
        force: args.force,
        ..Default::default()
    };
    match checkout_commit(&repo, target.clone(), options) {
        Ok(report) => {
            match target {
                CheckoutTarget::Branch(name) => {
                    println!("Switched to branch '{}'", name.short_name())
                }
                CheckoutTarget::Detached(id) => println!("HEAD is now at {}", id.short(7)),
            }
            tracing::debug!(written = report.written, deleted = report.deleted, "checkout done");
            Ok(0)
        }
        Err(RepoError::Sync(SyncError::DirtyWorkingTree { conflicts })) => {
            eprintln!("error: your local changes would be overwritten by checkout:");
            for conflict in &conflicts {
                eprintln!("\t{}", conflict);
            }
            eprintln!("Aborting");
            Ok(1)
        }
        Err(e) => Err(e.into()),
    }
}
