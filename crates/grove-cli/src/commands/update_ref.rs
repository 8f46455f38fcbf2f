use anyhow::Result;
use clap::Args;
use grove_hash::ObjectId;
use grove_ref::{Expected, RefName, RefUpdate, RejectReason, UpdateOutcome};

use super::open_repo;
use crate::Cli;

#[derive(Args)]
pub struct UpdateRefArgs {
    /// Allow a move that is not a fast-forward
    #[arg(long)]
    force: bool,

    /// Reference name
    name: String,

    /// New value
    new_value: String,

    /// Expected current value; the null id means the ref must not exist
    old_value: Option<String>,
}

pub fn run(args: &UpdateRefArgs, cli: &Cli) -> Result<i32> {
    let repo = open_repo(cli)?;
    let name = RefName::new(args.name.as_str())?;
    let new = repo.resolve_revision(&args.new_value)?;

    let expected = match &args.old_value {
        None => Expected::Any,
        Some(old) => {
            let old = ObjectId::from_hex(old)?;
            if old.is_null() {
                Expected::Missing
            } else {
                Expected::Value(old)
            }
        }
    };
    let update = RefUpdate::new(name.clone(), new).expect(expected).force(args.force);
    match repo.update_ref(&update)? {
        UpdateOutcome::Rejected(reason) => {
            eprintln!("error: cannot update {}: {}", name, describe(&reason));
            Ok(1)
        }
        _ => Ok(0),
    }
}

fn describe(reason: &RejectReason) -> String {
    let show = |id: &Option<ObjectId>| id.map_or_else(|| "nothing".to_owned(), |id| id.to_string());
    match reason {
        RejectReason::NonFastForward => "not a fast-forward".to_owned(),
        RejectReason::Stale { expected, actual } => {
            format!("expected {}, found {}", show(expected), show(actual))
        }
    }
}
