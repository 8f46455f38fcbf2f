use anyhow::Result;
use clap::Args;
use grove_utils::CancellationToken;

use super::open_repo;
use crate::Cli;

#[derive(Args)]
pub struct RepackArgs {
    /// Do not print a summary
    #[arg(short = 'q', long)]
    quiet: bool,
}

pub fn run(args: &RepackArgs, cli: &Cli) -> Result<i32> {
    let repo = open_repo(cli)?;
    let report = repo.repack(&CancellationToken::new())?;
    if !args.quiet {
        match &report.pack {
            Some(pack) => println!(
                "packed {} objects ({} deltas) into {}, removed {} loose",
                report.objects,
                report.deltas,
                pack.display(),
                report.removed_loose
            ),
            None => println!("nothing to pack"),
        }
    }
    Ok(0)
}
