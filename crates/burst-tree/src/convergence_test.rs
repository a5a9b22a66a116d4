//! Multi-replica convergence scenarios.
//!
//! Each test drives two in-memory replicas through interleaved
//! operations and merges, then checks what converged and what the
//! documented trim race deliberately leaves behind.

use burst_substrate::{MemoryStore, ReplicaId};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::cell::Cell;
use std::rc::Rc;

use crate::{check_tree, BubbleTree, Item, MaxLevel, Shape};

fn pair(max_level: u32) -> (BubbleTree<MemoryStore>, BubbleTree<MemoryStore>) {
    let a = BubbleTree::seed(
        MemoryStore::new(ReplicaId(0)),
        MaxLevel::new(max_level),
        7,
    );
    let mut b = BubbleTree::attach(
        MemoryStore::new(ReplicaId(1)),
        a.root().id(),
        MaxLevel::new(max_level),
        11,
    );
    b.merge_from(&a);
    (a, b)
}

fn sync(a: &mut BubbleTree<MemoryStore>, b: &mut BubbleTree<MemoryStore>) {
    a.merge_from(b);
    b.merge_from(a);
}

fn root_slots(tree: &BubbleTree<MemoryStore>) -> [Item; 4] {
    match tree.shape(tree.root()).unwrap() {
        Shape::Branch(four) => four.items(tree.store()).unwrap(),
        other => panic!("root holds {other:?}"),
    }
}

#[test]
fn joining_replica_receives_the_seeded_tree() {
    let (a, b) = pair(4);
    assert!(a.converged_with(&b));
    assert_eq!(b.circles().len(), 4);
    for (_, circle) in b.circles() {
        assert!(crate::Color::ALL.contains(&circle.color(b.store()).unwrap()));
    }
}

#[test]
fn edits_flow_both_ways() {
    let (mut a, mut b) = pair(4);
    let slots = root_slots(&a);

    a.pop(slots[0]);
    sync(&mut a, &mut b);
    let Shape::Branch(four) = b.shape(slots[0]).unwrap() else {
        panic!("subdivision did not replicate");
    };

    let children = four.items(b.store()).unwrap();
    b.pop(children[0]);
    sync(&mut a, &mut b);
    assert!(matches!(a.shape(children[0]).unwrap(), Shape::Branch(_)));
    assert!(a.converged_with(&b));
}

#[test]
fn concurrent_pops_of_distinct_slots_merge_cleanly() {
    let (mut a, mut b) = pair(4);
    let slots = root_slots(&a);

    a.pop(slots[0]);
    b.pop(slots[1]);
    sync(&mut a, &mut b);

    assert!(a.converged_with(&b));
    for tree in [&a, &b] {
        assert!(matches!(tree.shape(slots[0]).unwrap(), Shape::Branch(_)));
        assert!(matches!(tree.shape(slots[1]).unwrap(), Shape::Branch(_)));
        assert_eq!(check_tree(tree), Vec::new());
    }
}

#[test]
fn concurrent_pops_of_the_same_slot_pick_one_winner() {
    let (mut a, mut b) = pair(4);
    let slots = root_slots(&a);

    a.pop(slots[0]);
    b.pop(slots[0]);
    sync(&mut a, &mut b);

    assert!(a.converged_with(&b));
    let Shape::Branch(winner_a) = a.shape(slots[0]).unwrap() else {
        panic!("expected a subdivision");
    };
    let Shape::Branch(winner_b) = b.shape(slots[0]).unwrap() else {
        panic!("expected a subdivision");
    };
    // One replica's subdivision won wholesale; the loser's nodes are
    // unreachable garbage on both sides.
    assert_eq!(winner_a.id(), winner_b.id());
    assert_eq!(check_tree(&a), Vec::new());
    assert_eq!(check_tree(&b), Vec::new());
}

#[test]
fn merged_remote_pop_makes_the_local_pop_a_noop() {
    let (mut a, mut b) = pair(1);
    let slots = root_slots(&a);

    a.pop(slots[0]);
    b.merge_from(&a);
    assert_eq!(b.shape(slots[0]).unwrap(), Shape::Empty);

    let before = b.store().ops();
    b.pop(slots[0]);
    assert_eq!(b.store().ops(), before);
    assert!(a.converged_with(&b));
}

#[test]
fn merged_changes_notify_subscribers() {
    let (mut a, mut b) = pair(4);
    let slots = root_slots(&a);

    let hits = Rc::new(Cell::new(0));
    let hook = hits.clone();
    b.subscribe(b.root(), Box::new(move || hook.set(hook.get() + 1)));

    a.pop(slots[0]);
    b.merge_from(&a);
    assert_eq!(hits.get(), 1);

    // Merging again brings nothing new and stays silent.
    b.merge_from(&a);
    assert_eq!(hits.get(), 1);
}

/// The documented trim race: two replicas concurrently empty the last
/// two slots of one subdivision. Each one's emptiness check sees only
/// its own pop, so neither collapses, and after merging the subdivision
/// is empty-but-uncollapsed on both sides. This is deliberate;
/// `reconcile` is the explicit way out.
#[test]
fn racing_trims_leave_the_branch_uncollapsed() {
    let (mut a, mut b) = pair(2);
    let slots = root_slots(&a);

    a.pop(slots[0]);
    sync(&mut a, &mut b);
    let Shape::Branch(four) = a.shape(slots[0]).unwrap() else {
        panic!("expected a subdivision");
    };
    let children = four.items(a.store()).unwrap();

    // Empty the first two slots with everyone in sync; siblings keep
    // the subdivision alive.
    a.pop(children[0]);
    a.pop(children[1]);
    sync(&mut a, &mut b);
    assert!(matches!(a.shape(slots[0]).unwrap(), Shape::Branch(_)));

    // Now the race: each replica pops one of the two survivors without
    // seeing the other's pop.
    a.pop(children[2]);
    b.pop(children[3]);
    sync(&mut a, &mut b);

    assert!(a.converged_with(&b));
    for tree in [&a, &b] {
        for child in children {
            assert_eq!(tree.shape(child).unwrap(), Shape::Empty);
        }
        // All four slots are empty, yet the subdivision survived.
        assert!(matches!(tree.shape(slots[0]).unwrap(), Shape::Branch(_)));
        assert!(tree.is_empty(slots[0]));
    }

    // The opt-in sweep collapses what the race stranded.
    a.reconcile();
    sync(&mut a, &mut b);
    assert_eq!(a.shape(slots[0]).unwrap(), Shape::Empty);
    assert_eq!(b.shape(slots[0]).unwrap(), Shape::Empty);
    assert!(a.converged_with(&b));
}

#[test]
fn interleaved_random_sessions_converge() {
    let (mut a, mut b) = pair(3);
    let mut rng = StdRng::seed_from_u64(99);

    for round in 0..60 {
        let on_a = rng.gen_bool(0.5);
        let tree = if on_a { &mut a } else { &mut b };
        let circles = tree.circles();
        if circles.is_empty() {
            tree.hydrate();
        } else {
            let (item, _) = circles[rng.gen_range(0..circles.len())];
            tree.pop(item);
        }
        if round % 7 == 0 {
            sync(&mut a, &mut b);
        }
    }

    sync(&mut a, &mut b);
    assert!(a.converged_with(&b));
    assert_eq!(check_tree(&a), Vec::new());
    assert_eq!(check_tree(&b), Vec::new());
}
