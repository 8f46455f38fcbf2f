use anyhow::Result;
use clap::Args;
use grove_ref::{RefName, Reference};

use super::open_repo;
use crate::Cli;

#[derive(Args)]
pub struct SymbolicRefArgs {
    /// Symbolic ref to read or write, usually HEAD
    name: String,

    /// Ref to point it at; omit to print the current target
    target: Option<String>,
}

pub fn run(args: &SymbolicRefArgs, cli: &Cli) -> Result<i32> {
    let repo = open_repo(cli)?;
    let name = RefName::new(args.name.as_str())?;
    match &args.target {
        Some(target) => {
            repo.refs().set_symbolic(&name, &RefName::new(target.as_str())?)?;
            Ok(0)
        }
        None => match repo.refs().read(&name)? {
            Some(Reference::Symbolic(target)) => {
                println!("{}", target);
                Ok(0)
            }
            _ => {
                eprintln!("fatal: ref {} is not a symbolic ref", name);
                Ok(128)
            }
        },
    }
}
