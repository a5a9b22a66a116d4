//! Burst replicated field store
//!
//! The substrate beneath the bubble tree: nodes are flat bags of fields,
//! every field is a last-writer-wins register, and replicas converge by
//! exchanging individual field writes.
//!
//! # Design
//!
//! A node is nothing but an identity; structure comes from fields that
//! hold references to other nodes. Writes are atomic per field and carry
//! a Lamport stamp. There is deliberately no cross-field transaction, so
//! multi-field operations built on this store must be safe to interleave
//! field by field.
//!
//! # Conflict Resolution
//!
//! Stamps order by Lamport clock with the writing replica as tiebreak.
//! When replicas merge, the field write with the highest stamp wins.

mod id;
mod lww;
mod store;
mod value;

pub use id::{FieldId, NodeId, ReplicaId, Site};
pub use lww::{LwwField, Stamp};
pub use store::{FieldStore, MemoryStore, Observer, Op, SubscriptionId};
pub use value::Value;
