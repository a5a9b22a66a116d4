//! Structural invariant checks.
//!
//! The public operations cannot produce any of these defects; the
//! checks exist for tests and the simulation harness.

use burst_substrate::{FieldStore, NodeId};

use crate::{BubbleTree, Item, SchemaError, Shape};

/// A structural defect found while walking the tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Violation {
    /// A circle sits deeper than the configured bound allows.
    LeafTooDeep {
        item: NodeId,
        level: u32,
        bound: u32,
    },
    /// A child item's level is not its parent's plus one.
    BadLevelStep {
        parent: NodeId,
        child: NodeId,
        parent_level: u32,
        child_level: u32,
    },
    /// A reachable node failed to decode.
    Undecodable { error: SchemaError },
}

/// Walk the tree and report every violation found.
pub fn check_tree<S: FieldStore>(tree: &BubbleTree<S>) -> Vec<Violation> {
    let mut violations = Vec::new();
    check_item(tree, tree.root(), &mut violations);
    violations
}

fn check_item<S: FieldStore>(tree: &BubbleTree<S>, item: Item, out: &mut Vec<Violation>) {
    let level = match tree.level(item) {
        Ok(level) => level,
        Err(error) => {
            out.push(Violation::Undecodable { error });
            return;
        }
    };
    match tree.shape(item) {
        Ok(Shape::Empty) => {}
        Ok(Shape::Circle(_)) => {
            // Seed circles sit at level 1 even when the bound is 0.
            let bound = tree.max_level().get().max(1);
            if level > bound {
                out.push(Violation::LeafTooDeep {
                    item: item.id(),
                    level,
                    bound,
                });
            }
        }
        Ok(Shape::Branch(four)) => match four.items(tree.store()) {
            Ok(children) => {
                for child in children {
                    match child.level(tree.store()) {
                        Ok(child_level) if child_level != level + 1 => {
                            out.push(Violation::BadLevelStep {
                                parent: item.id(),
                                child: child.id(),
                                parent_level: level,
                                child_level,
                            });
                        }
                        _ => {}
                    }
                    check_item(tree, child, out);
                }
            }
            Err(error) => out.push(Violation::Undecodable { error }),
        },
        Err(error) => out.push(Violation::Undecodable { error }),
    }
}
