use std::io::{self, Read, Write};
use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use grove_object::ObjectKind;

use super::open_repo;
use crate::Cli;

#[derive(Args)]
pub struct HashObjectArgs {
    /// Actually write the object into the object database
    #[arg(short = 'w')]
    write: bool,

    /// Object kind (default: blob)
    #[arg(short = 't', default_value = "blob")]
    kind: String,

    /// Read the object from stdin
    #[arg(long)]
    stdin: bool,

    /// Files to hash
    #[arg(value_name = "file")]
    files: Vec<PathBuf>,
}

pub fn run(args: &HashObjectArgs, cli: &Cli) -> Result<i32> {
    let kind = ObjectKind::from_bytes(args.kind.as_bytes())?;
    // A repository is only needed when writing.
    let repo = if args.write { Some(open_repo(cli)?) } else { None };
    let stdout = io::stdout();
    let mut out = stdout.lock();

    let mut inputs = Vec::new();
    if args.stdin {
        let mut data = Vec::new();
        io::stdin().read_to_end(&mut data)?;
        inputs.push(data);
    }
    for file in &args.files {
        inputs.push(std::fs::read(file)?);
    }

    for data in inputs {
        let oid = match &repo {
            Some(repo) => repo.odb().put(kind, &data)?,
            None => grove_object::compute_id(kind, &data)?,
        };
        writeln!(out, "{}", oid)?;
    }
    Ok(0)
}
