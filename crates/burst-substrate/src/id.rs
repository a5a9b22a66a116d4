//! Node and field addressing.

use serde::{Deserialize, Serialize};

/// Identifies one replica of the shared tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ReplicaId(pub u16);

impl std::fmt::Display for ReplicaId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "r{}", self.0)
    }
}

/// Identity of a substrate node.
///
/// Assigned at creation and immutable. Sequence numbers are scoped to
/// the creating replica, so ids never collide across replicas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId {
    /// Replica that created the node.
    pub replica: ReplicaId,
    /// Creation sequence number within that replica.
    pub seq: u64,
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.replica, self.seq)
    }
}

/// Names a field within a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct FieldId(pub &'static str);

impl std::fmt::Display for FieldId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.0)
    }
}

/// A field position: the (node, field) pair a value occupies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Site {
    /// The node the field belongs to.
    pub node: NodeId,
    /// The field within that node.
    pub field: FieldId,
}

impl std::fmt::Display for Site {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.node, self.field)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_id_display() {
        let id = NodeId {
            replica: ReplicaId(3),
            seq: 17,
        };
        assert_eq!(id.to_string(), "r3:17");
    }

    #[test]
    fn site_display() {
        let site = Site {
            node: NodeId {
                replica: ReplicaId(0),
                seq: 2,
            },
            field: FieldId("shape"),
        };
        assert_eq!(site.to_string(), "r0:2.shape");
    }

    #[test]
    fn node_ids_order_by_replica_then_seq() {
        let a = NodeId {
            replica: ReplicaId(0),
            seq: 9,
        };
        let b = NodeId {
            replica: ReplicaId(1),
            seq: 0,
        };
        assert!(a < b);
    }
}
