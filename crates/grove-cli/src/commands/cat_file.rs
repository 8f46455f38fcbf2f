use std::io::{self, Write};

use anyhow::{bail, Result};
use clap::Args;
use grove_object::{Object, ObjectKind};

use super::open_repo;
use crate::Cli;

#[derive(Args)]
pub struct CatFileArgs {
    /// Show the object kind
    #[arg(short = 't', group = "mode")]
    kind: bool,

    /// Show the object size
    #[arg(short = 's', group = "mode")]
    size: bool,

    /// Pretty-print the object content
    #[arg(short = 'p', group = "mode")]
    pretty: bool,

    /// Object id or revision
    object: String,
}

pub fn run(args: &CatFileArgs, cli: &Cli) -> Result<i32> {
    let repo = open_repo(cli)?;
    let oid = repo.resolve_revision(&args.object)?;
    let stdout = io::stdout();
    let mut out = stdout.lock();

    if args.kind || args.size {
        let (kind, size) = repo.odb().header(&oid)?;
        if args.kind {
            writeln!(out, "{}", kind.as_str())?;
        } else {
            writeln!(out, "{}", size)?;
        }
        return Ok(0);
    }
    if !args.pretty {
        bail!("one of -t, -s or -p is required");
    }

    let (kind, payload) = repo.odb().get_raw(&oid)?;
    if kind != ObjectKind::Tree {
        out.write_all(&payload)?;
        return Ok(0);
    }
    if let Object::Tree(tree) = Object::parse(kind, &payload)? {
        for entry in tree.iter() {
            let entry_kind = if entry.mode.is_tree() { "tree" } else { "blob" };
            write!(out, "{:0>6} {} {}\t", entry.mode.to_octal(), entry_kind, entry.oid)?;
            out.write_all(&entry.name)?;
            writeln!(out)?;
        }
    }
    Ok(0)
}
