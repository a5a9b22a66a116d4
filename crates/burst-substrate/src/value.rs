//! Field payloads.

use serde::Serialize;

use crate::NodeId;

/// What one field of a node can hold.
///
/// `Node` references are how tree structure is expressed; the store
/// watches them to maintain its parent index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Value {
    /// No occupant.
    Absent,
    /// Scalar payload (levels, kind tags, palette discriminants).
    U64(u64),
    /// Reference to another node.
    Node(NodeId),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ReplicaId;

    #[test]
    fn values_compare_by_payload() {
        let id = NodeId {
            replica: ReplicaId(0),
            seq: 1,
        };
        assert_eq!(Value::Node(id), Value::Node(id));
        assert_ne!(Value::U64(1), Value::U64(2));
        assert_ne!(Value::Absent, Value::U64(0));
    }
}
