use std::fs;

use bstr::{BString, ByteSlice};
use grove_hash::ObjectId;
use grove_object::{Commit, EntryMode, Object, ObjectKind, Tag, Tree, TreeEntry};
use grove_odb::ObjectSource;
use grove_ref::{RefName, RefUpdate, Reference, UpdateOutcome};
use grove_repository::{checkout_commit, CheckoutTarget, ErrorKind, InitOptions, RepoError, Repository};
use grove_utils::{CancellationToken, Signature, Time};
use grove_worktree::{CheckoutOptions, FsCapabilities};

fn init() -> (tempfile::TempDir, Repository) {
    let dir = tempfile::tempdir().unwrap();
    let repo = Repository::init(dir.path(), &InitOptions::default()).unwrap();
    (dir, repo)
}

fn name(s: &str) -> RefName {
    RefName::new(s).unwrap()
}

/// A flat tree of `name -> content` regular files.
fn tree(repo: &Repository, files: &[(&str, &str)]) -> ObjectId {
    let entries = files
        .iter()
        .map(|(path, content)| {
            let blob = repo.odb().put(ObjectKind::Blob, content.as_bytes()).unwrap();
            TreeEntry::new(EntryMode::Regular, *path, blob)
        })
        .collect();
    repo.odb().put_object(&Object::Tree(Tree { entries })).unwrap()
}

fn commit(repo: &Repository, tree: ObjectId, parents: &[ObjectId], time: i64) -> ObjectId {
    let who = Signature::new("Alice", "alice@example.com", Time::new(time, 0));
    let commit = Commit {
        tree,
        parents: parents.to_vec(),
        author: who.clone(),
        committer: who,
        extra_headers: Vec::new(),
        message: "change\n".into(),
    };
    repo.odb().put_object(&Object::Commit(commit)).unwrap()
}

fn set_branch(repo: &Repository, branch: &str, id: ObjectId) {
    let outcome = repo.update_ref(&RefUpdate::new(name(branch), id).force(true)).unwrap();
    assert!(!outcome.is_rejected());
}

#[test]
fn init_writes_layout_head_and_config() {
    let (dir, repo) = init();
    let git = dir.path().join(".git");
    for sub in ["objects/info", "objects/pack", "refs/heads", "refs/tags"] {
        assert!(git.join(sub).is_dir(), "{sub}");
    }
    assert_eq!(fs::read_to_string(git.join("HEAD")).unwrap(), "ref: refs/heads/main\n");
    assert_eq!(repo.config().get_string("core.repositoryformatversion").unwrap().as_deref(), Some("0"));
    assert_eq!(repo.config().get_bool("core.bare").unwrap(), Some(false));
    assert_eq!(repo.config().get_bool("core.logallrefupdates").unwrap(), Some(false));
    assert_eq!(repo.work_tree(), Some(dir.path()));
    assert_eq!(repo.head_commit().unwrap(), None);
    assert_eq!(repo.head_branch().unwrap(), Some(name("refs/heads/main")));
}

#[test]
fn bare_init_with_initial_branch() {
    let dir = tempfile::tempdir().unwrap();
    let options = InitOptions {
        bare: true,
        initial_branch: Some("trunk".into()),
    };
    let repo = Repository::init(dir.path(), &options).unwrap();
    assert!(repo.is_bare());
    assert_eq!(repo.git_dir(), dir.path());
    assert_eq!(fs::read_to_string(dir.path().join("HEAD")).unwrap(), "ref: refs/heads/trunk\n");

    let err = repo.require_work_tree().unwrap_err();
    assert!(matches!(err, RepoError::NoWorkTree));
    assert_eq!(err.kind(), ErrorKind::Invalid);
}

#[test]
fn invalid_initial_branch_is_refused() {
    let dir = tempfile::tempdir().unwrap();
    let options = InitOptions {
        bare: false,
        initial_branch: Some("bad..name".into()),
    };
    assert!(Repository::init(dir.path(), &options).is_err());
    assert!(!dir.path().join(".git").join("HEAD").exists());
}

#[test]
fn open_accepts_work_tree_and_git_dir() {
    let (dir, repo) = init();
    let from_work = Repository::open(dir.path()).unwrap();
    let from_git = Repository::open(dir.path().join(".git")).unwrap();
    assert_eq!(from_work.git_dir(), repo.git_dir());
    assert_eq!(from_git.git_dir(), repo.git_dir());
    assert_eq!(from_git.work_tree(), Some(dir.path()));
}

#[test]
fn open_rejects_other_directories() {
    let dir = tempfile::tempdir().unwrap();
    let err = Repository::open(dir.path()).unwrap_err();
    assert!(matches!(err, RepoError::NotARepository(_)));
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[test]
fn reinit_keeps_existing_state() {
    let (dir, repo) = init();
    let c = commit(&repo, tree(&repo, &[("a", "1")]), &[], 1);
    set_branch(&repo, "refs/heads/main", c);

    let again = Repository::init(dir.path(), &InitOptions::default()).unwrap();
    assert_eq!(again.head_commit().unwrap(), Some(c));
}

#[test]
fn configuration_drives_capabilities() {
    let (dir, repo) = init();
    let mut config = repo.config().clone();
    config.set("core.filemode", "false").unwrap();
    config.write_to(repo.git_dir().join("config")).unwrap();

    let reopened = Repository::open(dir.path()).unwrap();
    assert!(!reopened.core().filemode);
    assert!(!reopened.fs_capabilities().supports_executable());
}

#[test]
fn staged_files_become_a_tree() {
    let (dir, repo) = init();
    fs::create_dir_all(dir.path().join("src")).unwrap();
    fs::write(dir.path().join("README"), "hello\n").unwrap();
    fs::write(dir.path().join("src/lib.rs"), "fn main() {}\n").unwrap();

    let paths: Vec<BString> = vec!["README".into(), "src/lib.rs".into()];
    repo.stage(&paths).unwrap();
    assert_eq!(repo.load_index().unwrap().len(), 2);

    let root = repo.write_tree().unwrap();
    let c = commit(&repo, root, &[], 10);
    assert_eq!(repo.commit_tree(&c).unwrap(), root);
    assert_eq!(
        repo.blob_at(&c, b"src/lib.rs".as_bstr()).unwrap().as_deref(),
        Some(&b"fn main() {}\n"[..])
    );
    assert_eq!(repo.blob_at(&c, b"src".as_bstr()).unwrap(), None);
    assert_eq!(repo.blob_at(&c, b"missing".as_bstr()).unwrap(), None);
    assert_eq!(repo.blob_at(&c, b"README/x".as_bstr()).unwrap(), None);
}

#[test]
fn commit_tree_rejects_non_commits() {
    let (_dir, repo) = init();
    let t = tree(&repo, &[("a", "1")]);
    let err = repo.commit_tree(&t).unwrap_err();
    assert!(matches!(err, RepoError::NotACommit(id) if id == t));
}

#[test]
fn revisions_resolve_by_id_ref_and_short_name() {
    let (_dir, repo) = init();
    let c = commit(&repo, tree(&repo, &[("a", "1")]), &[], 1);
    set_branch(&repo, "refs/heads/main", c);
    set_branch(&repo, "refs/tags/v1", c);

    for spec in ["HEAD", "main", "refs/heads/main", "heads/main", "v1"] {
        assert_eq!(repo.resolve_revision(spec).unwrap(), c, "{spec}");
    }
    assert_eq!(repo.resolve_revision(&c.to_hex()).unwrap(), c);

    let unknown = repo.resolve_revision("nope").unwrap_err();
    assert!(matches!(unknown, RepoError::UnknownRevision(_)));
    let absent = ObjectId::new([9; 20]).to_hex();
    assert!(repo.resolve_revision(&absent).is_err());
}

#[test]
fn checked_update_turns_rejection_into_error() {
    let (_dir, repo) = init();
    let t = tree(&repo, &[("a", "1")]);
    let first = commit(&repo, t, &[], 1);
    let second = commit(&repo, t, &[first], 2);
    let main = name("refs/heads/main");

    assert_eq!(repo.update_ref(&RefUpdate::new(main.clone(), second)).unwrap(), UpdateOutcome::Created);
    let err = repo
        .update_ref_checked(&RefUpdate::new(main.clone(), first))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::RefRejected);
    assert!(err.is_recoverable());
    assert_eq!(repo.refs().resolve(&main).unwrap(), second);
}

#[test]
fn tags_at_sees_through_annotated_tags() {
    let (_dir, repo) = init();
    let c = commit(&repo, tree(&repo, &[("a", "1")]), &[], 1);
    let annotated = repo
        .odb()
        .put_object(&Object::Tag(Tag {
            target: c,
            target_kind: ObjectKind::Commit,
            name: "v2".into(),
            tagger: None,
            message: "release\n".into(),
        }))
        .unwrap();
    set_branch(&repo, "refs/tags/v1", c);
    set_branch(&repo, "refs/tags/v2", annotated);

    assert_eq!(repo.tags_at(&c).unwrap(), vec![name("refs/tags/v1"), name("refs/tags/v2")]);
    assert_eq!(repo.commit_tree(&annotated).unwrap(), repo.commit_tree(&c).unwrap());
}

#[test]
fn checkout_switches_branches_and_moves_head() {
    let (dir, repo) = init();
    let one = commit(&repo, tree(&repo, &[("a.txt", "one\n")]), &[], 1);
    let two = commit(&repo, tree(&repo, &[("a.txt", "two\n"), ("b.txt", "new\n")]), &[one], 2);
    set_branch(&repo, "refs/heads/main", one);
    set_branch(&repo, "refs/heads/feature", two);

    checkout_commit(&repo, CheckoutTarget::Branch(name("refs/heads/main")), CheckoutOptions::default())
        .unwrap();
    assert_eq!(fs::read_to_string(dir.path().join("a.txt")).unwrap(), "one\n");

    let report = checkout_commit(
        &repo,
        CheckoutTarget::Branch(name("refs/heads/feature")),
        CheckoutOptions::default(),
    )
    .unwrap();
    assert_eq!(report.written, 2);
    assert_eq!(fs::read_to_string(dir.path().join("b.txt")).unwrap(), "new\n");
    assert_eq!(repo.head_branch().unwrap(), Some(name("refs/heads/feature")));

    checkout_commit(&repo, CheckoutTarget::Detached(one), CheckoutOptions::default()).unwrap();
    assert!(!dir.path().join("b.txt").exists());
    assert_eq!(repo.refs().read(&RefName::head()).unwrap(), Some(Reference::Direct(one)));
    assert_eq!(repo.refs().resolve(&name("refs/heads/feature")).unwrap(), two);
}

#[test]
fn refused_checkout_leaves_head_alone() {
    let (dir, repo) = init();
    let one = commit(&repo, tree(&repo, &[("a.txt", "one\n")]), &[], 1);
    let two = commit(&repo, tree(&repo, &[("a.txt", "two\n")]), &[one], 2);
    set_branch(&repo, "refs/heads/main", one);
    set_branch(&repo, "refs/heads/feature", two);
    checkout_commit(&repo, CheckoutTarget::Branch(name("refs/heads/main")), CheckoutOptions::default())
        .unwrap();

    fs::write(dir.path().join("a.txt"), "local edit\n").unwrap();
    let err = checkout_commit(
        &repo,
        CheckoutTarget::Branch(name("refs/heads/feature")),
        CheckoutOptions::default(),
    )
    .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DirtyWorkingTree);
    assert_eq!(repo.head_branch().unwrap(), Some(name("refs/heads/main")));
    assert_eq!(fs::read_to_string(dir.path().join("a.txt")).unwrap(), "local edit\n");

    let cancel = CancellationToken::new();
    cancel.cancel();
    let err = checkout_commit(
        &repo,
        CheckoutTarget::Branch(name("refs/heads/feature")),
        CheckoutOptions { force: true, cancel },
    )
    .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Cancelled);
    assert_eq!(repo.head_branch().unwrap(), Some(name("refs/heads/main")));
}

#[test]
fn repack_and_pack_refs_keep_everything_readable() {
    let (_dir, repo) = init();
    let t = tree(&repo, &[("a", "1"), ("b", "2")]);
    let c = commit(&repo, t, &[], 1);
    set_branch(&repo, "refs/heads/main", c);
    set_branch(&repo, "refs/tags/v1", c);

    let report = repo.repack(&CancellationToken::new()).unwrap();
    assert_eq!(report.objects, 4);
    assert!(repo.odb().iter_loose().unwrap().is_empty());
    assert_eq!(repo.odb().commit(&c).unwrap().tree, t);

    assert_eq!(repo.pack_refs().unwrap(), 2);
    assert_eq!(repo.head_commit().unwrap(), Some(c));
    assert_eq!(repo.resolve_revision("v1").unwrap(), c);
}
