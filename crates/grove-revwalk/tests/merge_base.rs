mod common;

use common::Graph;
use grove_ref::Ancestry;
use grove_revwalk::{is_ancestor, merge_base, CommitAncestry};

#[test]
fn fork_meets_at_shared_parent() {
    let g = Graph::new();
    let root = g.commit(1, &[], "root");
    let shared = g.commit(2, &[root], "shared");
    let a = g.commit(3, &[shared], "a");
    let b = g.commit(4, &[shared], "b");
    assert_eq!(merge_base(&g.odb, &a, &b).unwrap(), Some(shared));
    assert_eq!(merge_base(&g.odb, &b, &a).unwrap(), Some(shared));
}

#[test]
fn same_commit_is_its_own_base() {
    let g = Graph::new();
    let c = g.commit(1, &[], "c");
    assert_eq!(merge_base(&g.odb, &c, &c).unwrap(), Some(c));
}

#[test]
fn ancestor_is_the_base() {
    let g = Graph::new();
    let a = g.commit(1, &[], "a");
    let mid = g.commit(2, &[a], "mid");
    let b = g.commit(3, &[mid], "b");
    assert_eq!(merge_base(&g.odb, &a, &b).unwrap(), Some(a));
    assert_eq!(merge_base(&g.odb, &b, &a).unwrap(), Some(a));
}

#[test]
fn unrelated_histories_have_no_base() {
    let g = Graph::new();
    let a = g.commit(1, &[], "a");
    let b = g.commit(2, &[], "b");
    assert_eq!(merge_base(&g.odb, &a, &b).unwrap(), None);
}

#[test]
fn shared_ancestor_wins_under_clock_skew() {
    let g = Graph::new();
    // Parents are newer than their children on every edge.
    let root = g.commit(900, &[], "root");
    let shared = g.commit(500, &[root], "shared");
    let a = g.commit(10, &[shared], "a");
    let b1 = g.commit(30, &[shared], "b1");
    let b = g.commit(20, &[b1], "b");
    assert_eq!(merge_base(&g.odb, &a, &b).unwrap(), Some(shared));
    assert_eq!(merge_base(&g.odb, &b, &a).unwrap(), Some(shared));
}

#[test]
fn long_branch_still_meets_nearest_ancestor() {
    let g = Graph::new();
    let root = g.commit(1, &[], "root");
    let shared = g.commit(2, &[root], "shared");
    let a = g.commit(100, &[shared], "a");
    let mut b = shared;
    for i in 0..20 {
        b = g.commit(3 + i, &[b], &format!("b{i}"));
    }
    assert_eq!(merge_base(&g.odb, &a, &b).unwrap(), Some(shared));
}

#[test]
fn ancestry_ignores_timestamps() {
    let g = Graph::new();
    let old = g.commit(1000, &[], "old");
    let new = g.commit(1, &[old], "new");
    let other = g.commit(5, &[], "other");
    assert!(is_ancestor(&g.odb, &old, &new).unwrap());
    assert!(is_ancestor(&g.odb, &new, &new).unwrap());
    assert!(!is_ancestor(&g.odb, &new, &old).unwrap());
    assert!(!is_ancestor(&g.odb, &other, &new).unwrap());

    let oracle = CommitAncestry::new(&g.odb);
    assert!(oracle.is_ancestor(&old, &new).unwrap());
    assert!(!oracle.is_ancestor(&other, &new).unwrap());
}
