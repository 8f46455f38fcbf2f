use std::io;
use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use grove_protocol::UploadPack;
use grove_repository::Repository;
use grove_transport::StreamTransport;

#[derive(Args)]
pub struct UploadPackArgs {
    /// Repository to serve
    git_dir: PathBuf,
}

pub fn run(args: &UploadPackArgs) -> Result<i32> {
    let repo = Repository::open(&args.git_dir)?;
    let mut transport = StreamTransport::new(io::stdin(), io::stdout());
    let report = UploadPack::new(&repo).serve(&mut transport)?;
    tracing::debug!(objects = report.objects, "upload-pack done");
    Ok(0)
}
