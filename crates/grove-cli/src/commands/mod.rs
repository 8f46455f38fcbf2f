pub mod add;
pub mod cat_file;
pub mod checkout;
pub mod diff_tree;
pub mod fetch;
pub mod hash_object;
pub mod init;
pub mod merge_base;
pub mod pack_refs;
pub mod repack;
pub mod rev_list;
pub mod show_ref;
pub mod symbolic_ref;
pub mod update_ref;
pub mod upload_pack;
pub mod write_tree;

use anyhow::Result;
use clap::Subcommand;
use grove_repository::Repository;

use crate::Cli;

#[derive(Subcommand)]
pub enum Commands {
    /// Create an empty repository or reinitialize an existing one
    Init(init::InitArgs),
    /// Compute an object id and optionally store the object
    HashObject(hash_object::HashObjectArgs),
    /// Show the kind, size or content of an object
    CatFile(cat_file::CatFileArgs),
    /// List commits reachable from some commits but not others
    RevList(rev_list::RevListArgs),
    /// Find the best common ancestor of two commits
    MergeBase(merge_base::MergeBaseArgs),
    /// Compare the trees of two commits or trees
    DiffTree(diff_tree::DiffTreeArgs),
    /// Update a ref, optionally checking its current value
    UpdateRef(update_ref::UpdateRefArgs),
    /// Point a ref at another ref
    SymbolicRef(symbolic_ref::SymbolicRefArgs),
    /// List refs and the objects they name
    ShowRef(show_ref::ShowRefArgs),
    /// Switch the work tree, index and HEAD to a branch or commit
    Checkout(checkout::CheckoutArgs),
    /// Stage file contents in the index
    Add(add::AddArgs),
    /// Write the index as a tree
    WriteTree(write_tree::WriteTreeArgs),
    /// Pack all loose objects
    Repack(repack::RepackArgs),
    /// Move loose refs into packed-refs
    PackRefs(pack_refs::PackRefsArgs),
    /// Download objects and refs from another repository
    Fetch(fetch::FetchArgs),
    /// Serve a fetch over stdin and stdout
    UploadPack(upload_pack::UploadPackArgs),
}

pub fn open_repo(cli: &Cli) -> Result<Repository> {
    let repo = match &cli.git_dir {
        Some(git_dir) => Repository::open(git_dir)?,
        None => Repository::open(".")?,
    };
    Ok(repo)
}

pub fn run(cli: Cli) -> Result<i32> {
    match &cli.command {
        Commands::Init(args) => init::run(args, &cli),
        Commands::HashObject(args) => hash_object::run(args, &cli),
        Commands::CatFile(args) => cat_file::run(args, &cli),
        Commands::RevList(args) => rev_list::run(args, &cli),
        Commands::MergeBase(args) => merge_base::run(args, &cli),
        Commands::DiffTree(args) => diff_tree::run(args, &cli),
        Commands::UpdateRef(args) => update_ref::run(args, &cli),
        Commands::SymbolicRef(args) => symbolic_ref::run(args, &cli),
        Commands::ShowRef(args) => show_ref::run(args, &cli),
        Commands::Checkout(args) => checkout::run(args, &cli),
        Commands::Add(args) => add::run(args, &cli),
        Commands::WriteTree(args) => write_tree::run(args, &cli),
        Commands::Repack(args) => repack::run(args, &cli),
        Commands::PackRefs(args) => pack_refs::run(args, &cli),
        Commands::Fetch(args) => fetch::run(args, &cli),
        Commands::UploadPack(args) => upload_pack::run(args),
    }
}
