//! The replicated field store: capability trait and in-memory replica.

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::Serialize;
use tracing::{debug, trace};

use crate::{FieldId, LwwField, NodeId, ReplicaId, Site, Stamp, Value};

/// Callback fired when a subscribed node, or anything below it, changed.
///
/// Carries no payload; observers re-read current state.
pub type Observer = Box<dyn FnMut()>;

/// Handle for removing a change subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// A single replicated field write, as replicas exchange them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Op {
    /// The field being written.
    pub site: Site,
    /// The new value.
    pub value: Value,
    /// Resolution stamp.
    pub stamp: Stamp,
}

/// The capabilities the tree layer may assume from its replication
/// substrate: node construction, per-field read/write, parent lookup,
/// and change subscription. There is no cross-field transaction; every
/// write stands alone.
pub trait FieldStore {
    /// Create a fresh node with a stable, globally unique identity.
    fn create(&mut self) -> NodeId;

    /// Read one field. `None` if the field was never written here.
    fn read(&self, node: NodeId, field: FieldId) -> Option<&Value>;

    /// Write one field. Applied locally at once; delivered to other
    /// replicas as an independent, idempotent operation.
    fn write(&mut self, node: NodeId, field: FieldId, value: Value);

    /// Where `node` is referenced from, if known. Lookup-only: the
    /// relation never owns the parent and may be stale for subtrees a
    /// newer write already detached.
    fn parent(&self, node: NodeId) -> Option<Site>;

    /// Register an observer fired when `node` or its subtree changes.
    fn subscribe(&mut self, node: NodeId, observer: Observer) -> SubscriptionId;

    /// Drop a subscription. Unknown ids are ignored.
    fn unsubscribe(&mut self, id: SubscriptionId);

    /// Deliver pending change notifications. Called once per logical
    /// operation, before that operation's caller observes completion.
    fn flush(&mut self);
}

/// In-memory replica of the field store.
///
/// Each replica holds an independent copy; replicas converge by
/// exchanging field writes and resolving conflicts last-writer-wins per
/// field (see [`LwwField`]).
pub struct MemoryStore {
    replica: ReplicaId,
    clock: u64,
    next_seq: u64,
    fields: BTreeMap<Site, LwwField>,
    parents: HashMap<NodeId, Site>,
    dirty: HashSet<NodeId>,
    observers: HashMap<SubscriptionId, (NodeId, Observer)>,
    next_sub: u64,
}

impl MemoryStore {
    /// Create an empty replica.
    pub fn new(replica: ReplicaId) -> Self {
        Self {
            replica,
            clock: 0,
            next_seq: 0,
            fields: BTreeMap::new(),
            parents: HashMap::new(),
            dirty: HashSet::new(),
            observers: HashMap::new(),
            next_sub: 0,
        }
    }

    /// The replica this store belongs to.
    pub fn replica(&self) -> ReplicaId {
        self.replica
    }

    /// Number of fields ever written.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Check if nothing was written yet.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Snapshot the full state as replayable ops, in address order.
    pub fn ops(&self) -> Vec<Op> {
        self.fields
            .iter()
            .map(|(site, field)| Op {
                site: *site,
                value: field.value.clone(),
                stamp: field.stamp,
            })
            .collect()
    }

    /// Apply one remote op. Atomic for its field, idempotent, safe in
    /// any order. Returns true if the field changed.
    pub fn apply(&mut self, op: Op) -> bool {
        self.clock = self.clock.max(op.stamp.clock);
        let updated = match self.fields.get_mut(&op.site) {
            Some(field) => field.merge(op.value.clone(), op.stamp),
            None => {
                self.fields
                    .insert(op.site, LwwField::new(op.value.clone(), op.stamp));
                true
            }
        };
        if updated {
            trace!(site = %op.site, "applied remote write");
            if let Value::Node(child) = op.value {
                self.parents.insert(child, op.site);
            }
            self.dirty.insert(op.site.node);
        }
        updated
    }

    /// Merge another replica's full state into this one, last-writer-wins
    /// per field. Returns the number of fields updated.
    ///
    /// Notifications for merged changes are delivered on the next
    /// [`FieldStore::flush`].
    pub fn merge(&mut self, other: &MemoryStore) -> usize {
        let mut updated = 0;
        for op in other.ops() {
            if self.apply(op) {
                updated += 1;
            }
        }
        debug!(from = %other.replica, updated, "merged replica state");
        updated
    }

    /// Check whether two replicas hold identical state, stamps included.
    pub fn converged_with(&self, other: &MemoryStore) -> bool {
        self.fields == other.fields
    }

    fn next_stamp(&mut self) -> Stamp {
        self.clock += 1;
        Stamp::new(self.clock, self.replica)
    }

    /// The nodes on `node`'s parent chain, itself included.
    fn lineage(&self, node: NodeId) -> Vec<NodeId> {
        let mut out = vec![node];
        let mut current = node;
        while let Some(site) = self.parents.get(&current) {
            // A malformed remote write could close a reference cycle.
            if out.contains(&site.node) {
                break;
            }
            out.push(site.node);
            current = site.node;
        }
        out
    }
}

impl FieldStore for MemoryStore {
    fn create(&mut self) -> NodeId {
        let id = NodeId {
            replica: self.replica,
            seq: self.next_seq,
        };
        self.next_seq += 1;
        id
    }

    fn read(&self, node: NodeId, field: FieldId) -> Option<&Value> {
        self.fields.get(&Site { node, field }).map(|f| &f.value)
    }

    fn write(&mut self, node: NodeId, field: FieldId, value: Value) {
        let stamp = self.next_stamp();
        let site = Site { node, field };
        trace!(%site, "local write");
        if let Value::Node(child) = &value {
            self.parents.insert(*child, site);
        }
        // A fresh local stamp is strictly newer than anything this
        // store has seen, so the write always wins locally.
        self.fields.insert(site, LwwField::new(value, stamp));
        self.dirty.insert(node);
    }

    fn parent(&self, node: NodeId) -> Option<Site> {
        self.parents.get(&node).copied()
    }

    fn subscribe(&mut self, node: NodeId, observer: Observer) -> SubscriptionId {
        let id = SubscriptionId(self.next_sub);
        self.next_sub += 1;
        self.observers.insert(id, (node, observer));
        id
    }

    fn unsubscribe(&mut self, id: SubscriptionId) {
        self.observers.remove(&id);
    }

    fn flush(&mut self) {
        if self.dirty.is_empty() {
            return;
        }
        let mut affected = HashSet::new();
        for node in std::mem::take(&mut self.dirty) {
            affected.extend(self.lineage(node));
        }
        for (node, observer) in self.observers.values_mut() {
            if affected.contains(node) {
                observer();
            }
        }
    }
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("replica", &self.replica)
            .field("clock", &self.clock)
            .field("fields", &self.fields.len())
            .field("observers", &self.observers.len())
            .finish()
    }
}
