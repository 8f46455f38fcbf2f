use std::io::{self, Write};

use anyhow::Result;
use clap::Args;
use grove_diff::{ChangeKind, DiffOptions};
use grove_hash::ObjectId;
use grove_object::ObjectKind;
use grove_odb::ObjectSource;
use grove_repository::Repository;

use super::open_repo;
use crate::Cli;

#[derive(Args)]
pub struct DiffTreeArgs {
    /// Detect renames
    #[arg(short = 'M')]
    renames: bool,

    old: String,

    new: String,
}

/// A commit's tree, or the tree itself.
fn tree_of(repo: &Repository, rev: &str) -> Result<ObjectId> {
    let oid = repo.resolve_revision(rev)?;
    let (peeled, kind) = repo.odb().peel(&oid)?;
    if kind == ObjectKind::Tree {
        Ok(peeled)
    } else {
        Ok(repo.commit_tree(&peeled)?)
    }
}

pub fn run(args: &DiffTreeArgs, cli: &Cli) -> Result<i32> {
    let repo = open_repo(cli)?;
    let old = tree_of(&repo, &args.old)?;
    let new = tree_of(&repo, &args.new)?;
    let options = DiffOptions {
        renames: args.renames,
        ..Default::default()
    };
    let changes = grove_diff::diff_trees(repo.odb(), Some(&old), Some(&new), &options)?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    for change in &changes {
        let (old_mode, old_id) = change
            .old
            .map(|(m, id)| (m.to_octal(), id))
            .unwrap_or_else(|| ("0".into(), ObjectId::NULL));
        let (new_mode, new_id) = change
            .new
            .map(|(m, id)| (m.to_octal(), id))
            .unwrap_or_else(|| ("0".into(), ObjectId::NULL));
        write!(
            out,
            ":{:0>6} {:0>6} {} {} ",
            old_mode, new_mode, old_id, new_id
        )?;
        match &change.kind {
            ChangeKind::Renamed { from, score } => {
                write!(out, "R{:03}\t", score)?;
                out.write_all(from)?;
                out.write_all(b"\t")?;
            }
            _ => write!(out, "{}\t", change.status())?,
        }
        out.write_all(&change.path)?;
        writeln!(out)?;
    }
    Ok(0)
}
