mod common;

use common::{Graph, Recording};
use grove_hash::ObjectId;
use grove_object::ObjectKind;
use grove_revwalk::{RevWalk, RevWalkError, SortOrder, WalkFlags, WalkOptions};

fn run(walk: RevWalk<'_>) -> Vec<ObjectId> {
    walk.collect::<Result<Vec<_>, _>>().unwrap()
}

fn chain(g: &Graph, times: &[i64]) -> Vec<ObjectId> {
    let mut out: Vec<ObjectId> = Vec::new();
    for (i, t) in times.iter().enumerate() {
        let parents: Vec<ObjectId> = out.last().copied().into_iter().collect();
        out.push(g.commit(*t, &parents, &format!("c{i}")));
    }
    out
}

#[test]
fn single_commit_yields_itself() {
    let g = Graph::new();
    let c = g.commit(1000, &[], "only");
    let mut walk = RevWalk::new(&g.odb);
    walk.push(c).unwrap();
    assert_eq!(run(walk), vec![c]);
}

#[test]
fn linear_history_newest_first() {
    let g = Graph::new();
    let c = chain(&g, &[100, 200, 300]);
    let mut walk = RevWalk::new(&g.odb);
    walk.push(c[2]).unwrap();
    assert_eq!(run(walk), vec![c[2], c[1], c[0]]);
}

#[test]
fn equal_times_keep_children_before_parents() {
    let g = Graph::new();
    let c = chain(&g, &[500, 500, 500, 500]);
    let mut walk = RevWalk::new(&g.odb);
    walk.push(c[3]).unwrap();
    assert_eq!(run(walk), vec![c[3], c[2], c[1], c[0]]);
}

#[test]
fn hidden_commit_excludes_its_ancestors() {
    let g = Graph::new();
    let c = chain(&g, &[1, 2, 3, 4]);
    let mut walk = RevWalk::new(&g.odb);
    walk.push(c[3]).unwrap();
    walk.hide(c[1]).unwrap();
    assert_eq!(run(walk), vec![c[3], c[2]]);
}

#[test]
fn walk_stops_once_frontier_is_uninteresting() {
    let g = Graph::new();
    let c = chain(&g, &[1, 2, 3, 4, 5, 6, 7, 8, 9, 10]);
    let source = Recording::new(&g.odb);
    let mut walk = RevWalk::new(&source);
    walk.push(c[9]).unwrap();
    walk.hide(c[7]).unwrap();
    let out = walk.collect::<Result<Vec<_>, _>>().unwrap();
    assert_eq!(out, vec![c[9], c[8]]);
    for deep in &c[..7] {
        assert!(!source.was_read(deep));
    }
}

#[test]
fn merge_history_and_first_parent() {
    let g = Graph::new();
    let root = g.commit(1, &[], "root");
    let a = g.commit(2, &[root], "a");
    let b = g.commit(3, &[root], "b");
    let m = g.commit(4, &[a, b], "merge");

    let mut walk = RevWalk::new(&g.odb);
    walk.push(m).unwrap();
    assert_eq!(run(walk), vec![m, b, a, root]);

    let mut walk = RevWalk::new(&g.odb);
    walk.set_options(WalkOptions {
        first_parent: true,
        ..Default::default()
    });
    walk.push(m).unwrap();
    assert_eq!(run(walk), vec![m, a, root]);
}

#[test]
fn range_excludes_other_side_of_merge() {
    let g = Graph::new();
    let root = g.commit(1, &[], "root");
    let a = g.commit(2, &[root], "a");
    let b = g.commit(3, &[root], "b");
    let m = g.commit(4, &[a, b], "merge");

    let mut walk = RevWalk::new(&g.odb);
    walk.push(m).unwrap();
    walk.hide(b).unwrap();
    assert_eq!(run(walk), vec![m, a]);
}

/// `p` is a parent of `b` but carries a newer timestamp.
fn skewed(g: &Graph) -> [ObjectId; 4] {
    let p = g.commit(60, &[], "p");
    let a = g.commit(50, &[p], "a");
    let b = g.commit(40, &[p], "b");
    let m = g.commit(100, &[a, b], "m");
    [m, a, b, p]
}

#[test]
fn chronological_follows_timestamps_under_skew() {
    let g = Graph::new();
    let [m, a, b, p] = skewed(&g);
    let mut walk = RevWalk::new(&g.odb);
    walk.push(m).unwrap();
    assert_eq!(run(walk), vec![m, a, p, b]);
}

#[test]
fn topological_never_emits_parent_before_child() {
    let g = Graph::new();
    let [m, a, b, p] = skewed(&g);
    let mut walk = RevWalk::new(&g.odb);
    walk.set_options(WalkOptions {
        order: SortOrder::Topological,
        ..Default::default()
    });
    walk.push(m).unwrap();
    assert_eq!(run(walk), vec![m, a, b, p]);
}

#[test]
fn reverse_is_oldest_first() {
    let g = Graph::new();
    let c = chain(&g, &[10, 20, 30]);
    let mut walk = RevWalk::new(&g.odb);
    walk.set_options(WalkOptions {
        order: SortOrder::Reverse,
        ..Default::default()
    });
    walk.push(c[2]).unwrap();
    assert_eq!(run(walk), vec![c[0], c[1], c[2]]);
}

#[test]
fn skip_and_max_count() {
    let g = Graph::new();
    let c = chain(&g, &[1, 2, 3, 4, 5]);
    let mut walk = RevWalk::new(&g.odb);
    walk.set_options(WalkOptions {
        skip: 1,
        max_count: Some(2),
        ..Default::default()
    });
    walk.push(c[4]).unwrap();
    assert_eq!(run(walk), vec![c[3], c[2]]);
}

#[test]
fn time_author_and_message_filters() {
    let g = Graph::new();
    let tree = g.tree(&[]);
    let c1 = g.commit_with(tree, 100, &[], "alice", "fix parser");
    let c2 = g.commit_with(tree, 200, &[c1], "bob", "add feature");
    let c3 = g.commit_with(tree, 300, &[c2], "alice", "fix docs");

    let filtered = |options: WalkOptions| {
        let mut walk = RevWalk::new(&g.odb);
        walk.set_options(options);
        walk.push(c3).unwrap();
        run(walk)
    };
    assert_eq!(
        filtered(WalkOptions {
            since: Some(150),
            until: Some(250),
            ..Default::default()
        }),
        vec![c2]
    );
    assert_eq!(
        filtered(WalkOptions {
            author: Some("alice".into()),
            ..Default::default()
        }),
        vec![c3, c1]
    );
    assert_eq!(
        filtered(WalkOptions {
            grep: Some("fix".into()),
            author: Some("alice@".into()),
            ..Default::default()
        }),
        vec![c3, c1]
    );
}

#[test]
fn annotated_tags_are_peeled() {
    let g = Graph::new();
    let c = chain(&g, &[1, 2]);
    let tag = g.tag(c[1], ObjectKind::Commit, "v1");
    let mut walk = RevWalk::new(&g.odb);
    walk.push(tag).unwrap();
    assert_eq!(run(walk), vec![c[1], c[0]]);
}

#[test]
fn non_commit_start_is_rejected() {
    let g = Graph::new();
    let blob = g.blob("data");
    let mut walk = RevWalk::new(&g.odb);
    assert!(matches!(walk.push(blob), Err(RevWalkError::NotACommit(id)) if id == blob));
}

#[test]
fn flags_track_emission() {
    let g = Graph::new();
    let c = chain(&g, &[1, 2, 3]);
    let mut walk = RevWalk::new(&g.odb);
    walk.push(c[2]).unwrap();
    walk.hide(c[0]).unwrap();
    let first = walk.next().unwrap().unwrap();
    assert_eq!(first, c[2]);
    assert!(walk.flags(&c[2]).contains(WalkFlags::SEEN | WalkFlags::ADDED));
    assert!(walk.flags(&c[0]).contains(WalkFlags::UNINTERESTING));
    assert!(!walk.flags(&c[1]).contains(WalkFlags::ADDED));
}
