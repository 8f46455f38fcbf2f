use anyhow::Result;
use clap::Args;

use super::open_repo;
use crate::Cli;

#[derive(Args)]
pub struct PackRefsArgs {}

pub fn run(_args: &PackRefsArgs, cli: &Cli) -> Result<i32> {
    let repo = open_repo(cli)?;
    let packed = repo.pack_refs()?;
    tracing::debug!(packed, "packed refs");
    Ok(0)
}
