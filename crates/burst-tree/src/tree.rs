//! The bubble tree state machine.
//!
//! Operations are synchronous and complete before returning; every
//! structural mutation reduces to independent single-field writes so
//! concurrent replicas can interleave them safely. An operation aimed
//! at a position a remote edit already changed degrades to a silent
//! no-op.

use burst_substrate::{FieldStore, MemoryStore, NodeId, Observer, SubscriptionId, Value};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, trace};

use crate::node::{new_four, LEVEL, SHAPE};
use crate::{Circle, Item, MaxLevel, SchemaError, Shape};

/// One replica's view of the shared bubble tree.
pub struct BubbleTree<S = MemoryStore> {
    store: S,
    root: Item,
    max_level: MaxLevel,
    rng: StdRng,
}

impl<S: FieldStore> BubbleTree<S> {
    /// Build the canonical initial state: a level-0 root subdivided
    /// into four level-1 circles.
    pub fn seed(mut store: S, max_level: MaxLevel, rng_seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(rng_seed);
        let root = store.create();
        store.write(root, LEVEL, Value::U64(0));
        let four = new_four(&mut store, &mut rng, 1);
        store.write(root, SHAPE, Value::Node(four.id()));
        store.flush();
        Self {
            store,
            root: Item(root),
            max_level,
            rng,
        }
    }

    /// Attach to a tree seeded elsewhere. The joining replica learns
    /// the root id out of band and receives state by merge.
    pub fn attach(store: S, root: NodeId, max_level: MaxLevel, rng_seed: u64) -> Self {
        Self {
            store,
            root: Item(root),
            max_level,
            rng: StdRng::seed_from_u64(rng_seed),
        }
    }

    /// The root position.
    pub fn root(&self) -> Item {
        self.root
    }

    /// Configured depth bound.
    pub fn max_level(&self) -> MaxLevel {
        self.max_level
    }

    /// Read access to the underlying store, for observers re-reading
    /// current state.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Decode an item's occupant.
    pub fn shape(&self, item: Item) -> Result<Shape, SchemaError> {
        item.shape(&self.store)
    }

    /// An item's depth.
    pub fn level(&self, item: Item) -> Result<u32, SchemaError> {
        item.level(&self.store)
    }

    /// Pop the circle at `item`.
    ///
    /// Below the depth bound the circle subdivides into four fresh
    /// circles one level down; at the bound the position empties and
    /// empty subdivisions collapse upward. Popping a position that no
    /// longer holds a circle does nothing.
    pub fn pop(&mut self, item: Item) {
        match item.shape(&self.store) {
            Ok(Shape::Circle(_)) => {}
            Ok(_) => {
                trace!(item = %item.id(), "pop on a non-circle position, dropped");
                return;
            }
            Err(e) => {
                debug!(item = %item.id(), error = %e, "pop on undecodable position, dropped");
                return;
            }
        }
        let level = match item.level(&self.store) {
            Ok(level) => level,
            Err(e) => {
                debug!(item = %item.id(), error = %e, "pop on unleveled position, dropped");
                return;
            }
        };
        if level >= self.max_level.get() {
            self.store.write(item.id(), SHAPE, Value::Absent);
            if let Some(parent) = self.parent_item(item) {
                self.collapse_upward(parent);
            }
        } else {
            let four = new_four(&mut self.store, &mut self.rng, level + 1);
            self.store.write(item.id(), SHAPE, Value::Node(four.id()));
        }
        self.store.flush();
    }

    /// Collapse empty subdivisions upward starting at `item`.
    ///
    /// Pure cleanup: removes dangling empty subdivisions, never creates
    /// nodes, and does nothing on an already-collapsed position. The
    /// emptiness test reads only this replica, so two replicas that
    /// concurrently empty the last two slots of one subdivision can
    /// both leave it uncollapsed after merging; see
    /// [`BubbleTree::reconcile`].
    pub fn trim(&mut self, item: Item) {
        self.collapse_upward(item);
        self.store.flush();
    }

    fn collapse_upward(&mut self, start: Item) {
        let mut current = Some(start);
        while let Some(item) = current {
            match item.shape(&self.store) {
                Ok(Shape::Branch(_)) if self.is_empty(item) => {}
                _ => break,
            }
            self.store.write(item.id(), SHAPE, Value::Absent);
            current = self.parent_item(item);
        }
    }

    /// Whether `item` holds nothing, recursively: an empty position, or
    /// a subdivision whose four children are all empty.
    pub fn is_empty(&self, item: Item) -> bool {
        match item.shape(&self.store) {
            Ok(Shape::Empty) => true,
            Ok(Shape::Circle(_)) => false,
            Ok(Shape::Branch(four)) => match four.items(&self.store) {
                Ok(items) => items.into_iter().all(|child| self.is_empty(child)),
                // Never collapse what cannot be read.
                Err(_) => false,
            },
            Err(_) => false,
        }
    }

    /// Whether the whole tree is empty, i.e. "again again" applies.
    pub fn can_hydrate(&self) -> bool {
        self.is_empty(self.root)
    }

    /// Repopulate an emptied tree with four fresh level-1 circles,
    /// resetting the game without recreating the session. Does nothing
    /// while any circle remains.
    pub fn hydrate(&mut self) {
        if !self.can_hydrate() {
            debug!("hydrate dropped: tree still holds circles");
            return;
        }
        let four = new_four(&mut self.store, &mut self.rng, 1);
        self.store.write(self.root.id(), SHAPE, Value::Node(four.id()));
        self.store.flush();
    }

    /// Opt-in cleanup sweep collapsing every all-empty subdivision,
    /// bottom up.
    ///
    /// Not called by any core operation: the default behavior after a
    /// racing `trim` is to leave merged-empty subdivisions uncollapsed.
    /// Callers that want eventual collapse run this after merging.
    pub fn reconcile(&mut self) {
        self.reconcile_item(self.root);
        self.store.flush();
    }

    fn reconcile_item(&mut self, item: Item) {
        if let Ok(Shape::Branch(four)) = item.shape(&self.store) {
            if let Ok(children) = four.items(&self.store) {
                for child in children {
                    self.reconcile_item(child);
                }
            }
            if self.is_empty(item) {
                self.store.write(item.id(), SHAPE, Value::Absent);
            }
        }
    }

    /// The item owning the subdivision `item` sits in, if any.
    fn parent_item(&self, item: Item) -> Option<Item> {
        // item <- slotN of a subdivision <- shape of the owning item.
        let slot_site = self.store.parent(item.id())?;
        let shape_site = self.store.parent(slot_site.node)?;
        Some(Item(shape_site.node))
    }

    /// Register an observer fired once per operation that changes
    /// `item` or anything below it.
    pub fn subscribe(&mut self, item: Item, observer: Observer) -> SubscriptionId {
        self.store.subscribe(item.id(), observer)
    }

    /// Drop a change subscription.
    pub fn unsubscribe(&mut self, id: SubscriptionId) {
        self.store.unsubscribe(id);
    }

    /// Every item reachable from the root, depth first.
    pub fn items(&self) -> Vec<Item> {
        let mut out = Vec::new();
        let mut stack = vec![self.root];
        while let Some(item) = stack.pop() {
            out.push(item);
            if let Ok(Shape::Branch(four)) = item.shape(&self.store) {
                if let Ok(children) = four.items(&self.store) {
                    stack.extend(children);
                }
            }
        }
        out
    }

    /// Every currently visible circle, with the position holding it.
    pub fn circles(&self) -> Vec<(Item, Circle)> {
        self.items()
            .into_iter()
            .filter_map(|item| match item.shape(&self.store) {
                Ok(Shape::Circle(circle)) => Some((item, circle)),
                _ => None,
            })
            .collect()
    }
}

impl BubbleTree<MemoryStore> {
    /// Merge another replica's state into this one, last-writer-wins
    /// per field, and deliver notifications for whatever changed.
    /// Returns the number of fields updated.
    pub fn merge_from(&mut self, other: &BubbleTree<MemoryStore>) -> usize {
        let updated = self.store.merge(other.store());
        self.store.flush();
        updated
    }

    /// Whether this replica's state is identical to another's.
    pub fn converged_with(&self, other: &BubbleTree<MemoryStore>) -> bool {
        self.store.converged_with(other.store())
    }
}

impl<S: FieldStore> std::fmt::Debug for BubbleTree<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BubbleTree")
            .field("root", &self.root)
            .field("max_level", &self.max_level)
            .finish()
    }
}
