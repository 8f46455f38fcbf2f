mod common;

use common::*;
use tempfile::TempDir;

const NULL_ID: &str = "0000000000000000000000000000000000000000";

#[test]
fn init_creates_layout() {
    let dir = TempDir::new().unwrap();
    let out = ok(dir.path(), &["init", "-b", "trunk"]);
    assert!(out.starts_with("Initialized grove repository in"));

    let git_dir = dir.path().join(".git");
    assert!(git_dir.join("objects").is_dir());
    assert!(git_dir.join("refs/heads").is_dir());
    assert_eq!(
        std::fs::read_to_string(git_dir.join("HEAD")).unwrap(),
        "ref: refs/heads/trunk\n"
    );
    assert_eq!(ok(dir.path(), &["symbolic-ref", "HEAD"]), "refs/heads/trunk");

    // no refs yet
    assert_eq!(grove(dir.path(), &["show-ref"]).exit_code, 1);
}

#[test]
fn hash_object_and_cat_file() {
    let dir = TempDir::new().unwrap();
    init(dir.path());
    std::fs::write(dir.path().join("hello.txt"), "hello\n").unwrap();

    let dry = ok(dir.path(), &["hash-object", "hello.txt"]);
    assert_eq!(dry, "ce013625030ba8dba906f756967f9e9ca394464a");
    assert_eq!(grove(dir.path(), &["cat-file", "-t", &dry]).exit_code, 128);

    let id = ok(dir.path(), &["hash-object", "-w", "hello.txt"]);
    assert_eq!(id, dry);
    assert_eq!(ok(dir.path(), &["cat-file", "-t", &id]), "blob");
    assert_eq!(ok(dir.path(), &["cat-file", "-s", &id]), "6");
    assert_eq!(ok(dir.path(), &["cat-file", "-p", &id]), "hello");
}

#[test]
fn unknown_object_is_fatal() {
    let dir = TempDir::new().unwrap();
    init(dir.path());
    let result = grove(dir.path(), &["cat-file", "-p", "1234567890123456789012345678901234567890"]);
    assert_eq!(result.exit_code, 128);
    assert!(result.stderr.starts_with("fatal:"), "{}", result.stderr);
}

#[test]
fn stage_write_tree_and_list() {
    let dir = TempDir::new().unwrap();
    init(dir.path());
    let c1 = commit(dir.path(), &[("a.txt", "a\n"), ("sub/b.txt", "b\n")], None, 1_700_000_000);

    let tree = ok(dir.path(), &["write-tree"]);
    let listing = ok(dir.path(), &["cat-file", "-p", &tree]);
    let lines: Vec<&str> = listing.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].starts_with("100644 blob "), "{}", lines[0]);
    assert!(lines[0].ends_with("\ta.txt"));
    assert!(lines[1].starts_with("040000 tree "), "{}", lines[1]);
    assert!(lines[1].ends_with("\tsub"));

    assert_eq!(ok(dir.path(), &["cat-file", "-t", &c1]), "commit");
    ok(dir.path(), &["update-ref", "refs/heads/main", &c1, NULL_ID]);
    assert_eq!(ok(dir.path(), &["show-ref"]), format!("{} refs/heads/main", c1));
    assert_eq!(
        ok(dir.path(), &["show-ref", "--head"]),
        format!("{} HEAD\n{} refs/heads/main", c1, c1)
    );
}

#[test]
fn update_ref_compare_and_swap() {
    let dir = TempDir::new().unwrap();
    init(dir.path());
    let c1 = commit(dir.path(), &[("f", "1\n")], None, 1_700_000_000);
    let c2 = commit(dir.path(), &[("f", "2\n")], Some(&c1), 1_700_000_100);
    let other = commit(dir.path(), &[("f", "x\n")], None, 1_700_000_200);

    ok(dir.path(), &["update-ref", "refs/heads/main", &c1, NULL_ID]);
    // creating again is stale
    let again = grove(dir.path(), &["update-ref", "refs/heads/main", &c2, NULL_ID]);
    assert_eq!(again.exit_code, 1);
    assert!(again.stderr.contains("expected nothing"), "{}", again.stderr);

    ok(dir.path(), &["update-ref", "refs/heads/main", &c2, &c1]);

    // wrong old value
    assert_eq!(grove(dir.path(), &["update-ref", "refs/heads/main", &c1, &c1]).exit_code, 1);

    // unrelated history needs --force
    let rewind = grove(dir.path(), &["update-ref", "refs/heads/main", &other]);
    assert_eq!(rewind.exit_code, 1);
    assert!(rewind.stderr.contains("not a fast-forward"), "{}", rewind.stderr);
    ok(dir.path(), &["update-ref", "--force", "refs/heads/main", &other]);
    assert_eq!(ok(dir.path(), &["rev-list", "main"]), other);
}

#[test]
fn history_queries() {
    let dir = TempDir::new().unwrap();
    init(dir.path());
    let base = commit(dir.path(), &[("f", "base\n")], None, 1_700_000_000);
    let left = commit(dir.path(), &[("f", "left\n")], Some(&base), 1_700_000_100);
    let right = commit(dir.path(), &[("g", "right\n")], Some(&base), 1_700_000_200);
    ok(dir.path(), &["update-ref", "refs/heads/main", &left]);
    ok(dir.path(), &["update-ref", "refs/heads/topic", &right]);

    assert_eq!(ok(dir.path(), &["rev-list", "main"]), format!("{}\n{}", left, base));
    assert_eq!(ok(dir.path(), &["rev-list", "topic", "--not", "main"]), right);
    assert_eq!(ok(dir.path(), &["rev-list", "-n", "1", "main"]), left);

    assert_eq!(ok(dir.path(), &["merge-base", "main", "topic"]), base);
    assert_eq!(grove(dir.path(), &["merge-base", "--is-ancestor", &base, "main"]).exit_code, 0);
    assert_eq!(grove(dir.path(), &["merge-base", "--is-ancestor", "main", "topic"]).exit_code, 1);

    // Commits share one index, so topic's tree still carries f from main.
    assert_eq!(
        statuses(&ok(dir.path(), &["diff-tree", "main", "topic"])),
        vec![('A', "g".to_owned())]
    );
    assert_eq!(
        statuses(&ok(dir.path(), &["diff-tree", &base, "topic"])),
        vec![('M', "f".to_owned()), ('A', "g".to_owned())]
    );
}

fn statuses(diff: &str) -> Vec<(char, String)> {
    diff.lines()
        .map(|l| {
            let (meta, path) = l.split_once('\t').unwrap();
            (meta.chars().last().unwrap(), path.to_owned())
        })
        .collect()
}

#[test]
fn checkout_switches_branches() {
    let dir = TempDir::new().unwrap();
    init(dir.path());
    let c1 = commit(dir.path(), &[("f", "one\n")], None, 1_700_000_000);
    ok(dir.path(), &["update-ref", "refs/heads/main", &c1]);
    let c2 = commit(dir.path(), &[("f", "two\n"), ("new.txt", "new\n")], Some(&c1), 1_700_000_100);
    ok(dir.path(), &["update-ref", "refs/heads/next", &c2]);

    ok(dir.path(), &["checkout", "main"]);
    assert_eq!(std::fs::read_to_string(dir.path().join("f")).unwrap(), "one\n");
    assert!(!dir.path().join("new.txt").exists());

    ok(dir.path(), &["checkout", "next"]);
    assert_eq!(ok(dir.path(), &["symbolic-ref", "HEAD"]), "refs/heads/next");
    assert_eq!(std::fs::read_to_string(dir.path().join("new.txt")).unwrap(), "new\n");

    ok(dir.path(), &["checkout", &c1]);
    assert_eq!(grove(dir.path(), &["symbolic-ref", "HEAD"]).exit_code, 128);
    let listing = ok(dir.path(), &["show-ref", "--head", "--prefix", "refs/heads/main"]);
    assert_eq!(listing.lines().next(), Some(format!("{} HEAD", c1).as_str()));
}

#[test]
fn checkout_refuses_to_clobber_local_edits() {
    let dir = TempDir::new().unwrap();
    init(dir.path());
    let c1 = commit(dir.path(), &[("f", "one\n")], None, 1_700_000_000);
    ok(dir.path(), &["update-ref", "refs/heads/main", &c1]);
    let c2 = commit(dir.path(), &[("f", "two\n")], Some(&c1), 1_700_000_100);
    ok(dir.path(), &["update-ref", "refs/heads/next", &c2]);
    ok(dir.path(), &["checkout", "main"]);

    std::fs::write(dir.path().join("f"), "edited\n").unwrap();
    let refused = grove(dir.path(), &["checkout", "next"]);
    assert_eq!(refused.exit_code, 1);
    assert!(refused.stderr.contains("\tf"), "{}", refused.stderr);
    assert_eq!(std::fs::read_to_string(dir.path().join("f")).unwrap(), "edited\n");
    assert_eq!(ok(dir.path(), &["symbolic-ref", "HEAD"]), "refs/heads/main");

    ok(dir.path(), &["checkout", "--force", "next"]);
    assert_eq!(std::fs::read_to_string(dir.path().join("f")).unwrap(), "two\n");
}

#[test]
fn repack_and_pack_refs_keep_everything_readable() {
    let dir = TempDir::new().unwrap();
    init(dir.path());
    let c1 = commit(dir.path(), &[("f", "one\n")], None, 1_700_000_000);
    ok(dir.path(), &["update-ref", "refs/heads/main", &c1]);

    let summary = ok(dir.path(), &["repack"]);
    assert!(summary.starts_with("packed 3 objects"), "{}", summary);
    assert_eq!(ok(dir.path(), &["repack"]), "nothing to pack");

    ok(dir.path(), &["pack-refs"]);
    assert!(dir.path().join(".git/packed-refs").is_file());
    assert!(!dir.path().join(".git/refs/heads/main").exists());
    assert_eq!(ok(dir.path(), &["show-ref"]), format!("{} refs/heads/main", c1));
    assert_eq!(ok(dir.path(), &["cat-file", "-t", &c1]), "commit");
}

#[test]
fn fetch_over_upload_pack() {
    let upstream = TempDir::new().unwrap();
    init(upstream.path());
    let c1 = commit(upstream.path(), &[("f", "one\n")], None, 1_700_000_000);
    let c2 = commit(upstream.path(), &[("f", "two\n")], Some(&c1), 1_700_000_100);
    ok(upstream.path(), &["update-ref", "refs/heads/main", &c2]);

    let local = TempDir::new().unwrap();
    init(local.path());
    let url = upstream.path().to_str().unwrap();

    let first = ok(local.path(), &["fetch", url]);
    assert!(first.contains("[new]"), "{}", first);
    assert_eq!(
        ok(local.path(), &["show-ref"]),
        format!("{} refs/remotes/origin/main", c2)
    );
    assert_eq!(ok(local.path(), &["rev-list", "origin/main"]), format!("{}\n{}", c2, c1));

    // up to date
    assert_eq!(ok(local.path(), &["fetch", url]), "");

    let c3 = commit(upstream.path(), &[("f", "three\n")], Some(&c2), 1_700_000_200);
    ok(upstream.path(), &["update-ref", "refs/heads/main", &c3]);
    let second = ok(local.path(), &["fetch", url, "--remote", "origin"]);
    assert!(second.contains(&format!("{}..{}", &c2[..7], &c3[..7])), "{}", second);
    assert_eq!(ok(local.path(), &["merge-base", "origin/main", &c2]), c2);
}

#[test]
fn fetch_from_missing_repository_fails() {
    let local = TempDir::new().unwrap();
    init(local.path());
    let missing = local.path().join("nowhere");
    let result = grove(local.path(), &["fetch", missing.to_str().unwrap()]);
    assert_ne!(result.exit_code, 0);
    assert_eq!(grove(local.path(), &["show-ref"]).exit_code, 1);
}
