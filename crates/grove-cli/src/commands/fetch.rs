use anyhow::{Context, Result};
use clap::Args;
use grove_protocol::{FetchOptions, RefSpec};
use grove_ref::UpdateOutcome;
use grove_transport::{connect, RemoteUrl};

use super::open_repo;
use crate::Cli;

#[derive(Args)]
pub struct FetchArgs {
    /// Repository to fetch from: a path, `file://` or `git://` URL
    url: String,

    /// Refspecs; defaults to `+refs/heads/*:refs/remotes/<remote>/*`
    refspecs: Vec<String>,

    /// Name used for the default remote-tracking namespace
    #[arg(long, default_value = "origin")]
    remote: String,

    /// Do not create local tags for fetched annotated tags
    #[arg(long)]
    no_tags: bool,

    /// Program to run on the other side for local URLs
    #[arg(long)]
    upload_pack: Option<String>,
}

pub fn run(args: &FetchArgs, cli: &Cli) -> Result<i32> {
    let repo = open_repo(cli)?;
    let url = RemoteUrl::parse(&args.url)?;

    let refspecs = args
        .refspecs
        .iter()
        .map(|s| s.parse::<RefSpec>())
        .collect::<Result<Vec<_>, _>>()?;
    let options = FetchOptions {
        remote: args.remote.clone(),
        refspecs,
        follow_tags: !args.no_tags,
        ..Default::default()
    };

    let program = match &args.upload_pack {
        Some(program) => program.clone(),
        None => {
            let exe = std::env::current_exe().context("cannot locate the grove executable")?;
            format!("{} upload-pack", exe.display())
        }
    };

    let mut transport = connect(&url, &program)?;
    let result = grove_protocol::fetch(&repo, &mut *transport, &options)?;
    transport.close()?;

    if let Some(pack) = &result.pack {
        eprintln!("received {} objects", pack.objects);
    }
    for update in &result.updates {
        let line = match update.outcome {
            UpdateOutcome::NoChange => continue,
            UpdateOutcome::Created => format!(
                " * [new]        {} -> {}",
                update.remote.short_name(),
                update.local.short_name()
            ),
            UpdateOutcome::FastForward | UpdateOutcome::Forced => {
                let old = update.old.map_or_else(String::new, |id| id.short(7));
                let sep = if update.outcome == UpdateOutcome::Forced { "..." } else { ".." };
                let flag = if update.outcome == UpdateOutcome::Forced { '+' } else { ' ' };
                format!(
                    " {} {}{}{}  {} -> {}",
                    flag,
                    old,
                    sep,
                    update.new.short(7),
                    update.remote.short_name(),
                    update.local.short_name()
                )
            }
            UpdateOutcome::Rejected(_) => format!(
                " ! [rejected]   {} -> {}",
                update.remote.short_name(),
                update.local.short_name()
            ),
        };
        println!("{}", line);
    }

    Ok(if result.rejected().next().is_some() { 1 } else { 0 })
}
