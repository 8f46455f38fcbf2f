use grove_hash::ObjectId;
use grove_ref::RefName;
use grove_worktree::{Checkout, CheckoutOptions, CheckoutReport};

use crate::{RepoError, Repository};

/// What `HEAD` should name after a checkout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckoutTarget {
    /// Check out the branch tip and attach `HEAD` to the branch.
    Branch(RefName),
    /// Check out a commit with `HEAD` detached at it.
    Detached(ObjectId),
}

/// Synchronize the work tree and index with `target`, then move `HEAD`.
///
/// `HEAD` is only moved once the work tree and index are fully updated;
/// a refused, failed or cancelled checkout leaves it where it was.
pub fn checkout_commit(
    repo: &Repository,
    target: CheckoutTarget,
    options: CheckoutOptions,
) -> Result<CheckoutReport, RepoError> {
    let work_tree = repo.require_work_tree()?;
    let commit = match &target {
        CheckoutTarget::Branch(name) => repo.refs().resolve(name)?,
        CheckoutTarget::Detached(id) => *id,
    };
    let tree = repo.commit_tree(&commit)?;

    let caps = repo.fs_capabilities();
    let mut index = repo.load_index()?;
    let report = Checkout::new(repo.odb(), work_tree, &caps)
        .with_index_path(repo.index_path())
        .with_options(options)
        .sync(&mut index, &tree)?;

    let head = RefName::head();
    match &target {
        CheckoutTarget::Branch(name) => repo.refs().set_symbolic(&head, name)?,
        CheckoutTarget::Detached(id) => repo.refs().set_detached(&head, id)?,
    }
    tracing::info!(target = ?target, %commit, "checked out");
    Ok(report)
}
