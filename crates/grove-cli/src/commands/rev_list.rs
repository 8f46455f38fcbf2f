use std::io::{self, Write};

use anyhow::Result;
use clap::Args;
use grove_revwalk::{RevWalk, SortOrder, WalkOptions};

use super::open_repo;
use crate::Cli;

#[derive(Args)]
pub struct RevListArgs {
    /// Exclude commits reachable from these
    #[arg(long = "not", value_name = "commit")]
    not: Vec<String>,

    /// Show no parent before all of its children
    #[arg(long = "topo-order")]
    topo_order: bool,

    /// Stop after this many commits
    #[arg(short = 'n', long = "max-count")]
    max_count: Option<usize>,

    /// Starting commits
    #[arg(required = true)]
    commits: Vec<String>,
}

pub fn run(args: &RevListArgs, cli: &Cli) -> Result<i32> {
    let repo = open_repo(cli)?;
    let mut walk = RevWalk::new(repo.odb());
    walk.set_options(WalkOptions {
        order: if args.topo_order {
            SortOrder::Topological
        } else {
            SortOrder::Chronological
        },
        max_count: args.max_count,
        ..Default::default()
    });

    for rev in &args.commits {
        walk.push(repo.resolve_revision(rev)?)?;
    }
    for rev in &args.not {
        walk.hide(repo.resolve_revision(rev)?)?;
    }

    let stdout = io::stdout();
    let mut out = stdout.lock();
    for oid in walk {
        writeln!(out, "{}", oid?)?;
    }
    Ok(0)
}
