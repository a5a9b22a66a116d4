//! Burst bubble tree
//!
//! The collaborative quad-tree state machine behind the bubble-pop
//! demo: a strictly alternating tree of positions and occupants, where
//! every position holds a circle, a four-way subdivision, or nothing.
//! Popping a circle subdivides it or, at the depth bound, empties its
//! position and collapses empty subdivisions upward; an emptied tree
//! can be re-hydrated in place ("again again").
//!
//! Replication rides on `burst-substrate`: every structural mutation is
//! a single last-writer-wins field write, so replicas apply each
//! other's edits in any order and converge. The one deliberate
//! exception is the trim race described on [`BubbleTree::trim`].
//!
//! # Example
//!
//! ```
//! use burst_substrate::{MemoryStore, ReplicaId};
//! use burst_tree::{BubbleTree, MaxLevel, Shape};
//!
//! let mut tree = BubbleTree::seed(MemoryStore::new(ReplicaId(0)), MaxLevel::DEFAULT, 42);
//! let Ok(Shape::Branch(four)) = tree.shape(tree.root()) else {
//!     unreachable!()
//! };
//! let [first, ..] = four.items(tree.store()).unwrap();
//! tree.pop(first);
//! assert!(matches!(tree.shape(first), Ok(Shape::Branch(_))));
//! ```

mod color;
mod config;
mod invariant;
mod node;
mod tree;

#[cfg(test)]
mod convergence_test;

pub use color::Color;
pub use config::MaxLevel;
pub use invariant::{check_tree, Violation};
pub use node::{Circle, FourCircles, Item, SchemaError, Shape};
pub use tree::BubbleTree;
