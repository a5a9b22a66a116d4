//! Typed views over substrate nodes.
//!
//! Items are positions; circles and four-circle subdivisions are
//! occupants. An item keeps its identity while its occupant changes
//! from circle to subdivision to nothing, which is what lets every
//! structural mutation be a single `shape` write.

use burst_substrate::{FieldId, FieldStore, NodeId, Value};
use thiserror::Error;

use crate::Color;

pub(crate) const LEVEL: FieldId = FieldId("level");
pub(crate) const SHAPE: FieldId = FieldId("shape");
pub(crate) const KIND: FieldId = FieldId("kind");
pub(crate) const COLOR: FieldId = FieldId("color");
pub(crate) const SLOTS: [FieldId; 4] = [
    FieldId("slot1"),
    FieldId("slot2"),
    FieldId("slot3"),
    FieldId("slot4"),
];

pub(crate) const KIND_CIRCLE: u64 = 1;
pub(crate) const KIND_FOUR: u64 = 2;

/// A stored node does not decode as the schema expects.
///
/// Only reachable through writes this crate never produces; operations
/// treat it as "the node is gone" and drop the mutation.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum SchemaError {
    /// An expected field was never written.
    #[error("node {node} is missing field {field}")]
    MissingField { node: NodeId, field: FieldId },
    /// A field holds a payload of the wrong kind.
    #[error("node {node} field {field} holds an unexpected payload")]
    WrongKind { node: NodeId, field: FieldId },
}

/// A position in the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Item(pub(crate) NodeId);

/// A poppable circle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Circle(pub(crate) NodeId);

/// A 2x2 subdivision holding four child items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FourCircles(pub(crate) NodeId);

/// What currently occupies an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    /// Nothing; the position was popped or collapsed.
    Empty,
    /// A visible circle.
    Circle(Circle),
    /// A subdivided quadrant.
    Branch(FourCircles),
}

fn read_u64<S: FieldStore>(store: &S, node: NodeId, field: FieldId) -> Result<u64, SchemaError> {
    match store.read(node, field) {
        Some(Value::U64(n)) => Ok(*n),
        Some(_) => Err(SchemaError::WrongKind { node, field }),
        None => Err(SchemaError::MissingField { node, field }),
    }
}

fn read_node<S: FieldStore>(store: &S, node: NodeId, field: FieldId) -> Result<NodeId, SchemaError> {
    match store.read(node, field) {
        Some(Value::Node(id)) => Ok(*id),
        Some(_) => Err(SchemaError::WrongKind { node, field }),
        None => Err(SchemaError::MissingField { node, field }),
    }
}

impl Item {
    /// Substrate identity of this position.
    pub fn id(self) -> NodeId {
        self.0
    }

    /// Depth of this position, set at creation from the parent's level
    /// plus one. The root item is level 0.
    pub fn level<S: FieldStore>(self, store: &S) -> Result<u32, SchemaError> {
        let n = read_u64(store, self.0, LEVEL)?;
        u32::try_from(n).map_err(|_| SchemaError::WrongKind {
            node: self.0,
            field: LEVEL,
        })
    }

    /// Decode the current occupant.
    ///
    /// A never-written `shape` reads as empty: with per-field delivery
    /// a position can be seen before its occupant write arrives.
    pub fn shape<S: FieldStore>(self, store: &S) -> Result<Shape, SchemaError> {
        let occupant = match store.read(self.0, SHAPE) {
            None | Some(Value::Absent) => return Ok(Shape::Empty),
            Some(Value::Node(id)) => *id,
            Some(_) => {
                return Err(SchemaError::WrongKind {
                    node: self.0,
                    field: SHAPE,
                })
            }
        };
        match read_u64(store, occupant, KIND)? {
            KIND_CIRCLE => Ok(Shape::Circle(Circle(occupant))),
            KIND_FOUR => Ok(Shape::Branch(FourCircles(occupant))),
            _ => Err(SchemaError::WrongKind {
                node: occupant,
                field: KIND,
            }),
        }
    }
}

impl Circle {
    /// Stable identity, fresh per created circle. Rendering layers use
    /// it for list reconciliation.
    pub fn id(self) -> NodeId {
        self.0
    }

    /// This circle's palette color.
    pub fn color<S: FieldStore>(self, store: &S) -> Result<Color, SchemaError> {
        let n = read_u64(store, self.0, COLOR)?;
        Color::from_u64(n).ok_or(SchemaError::WrongKind {
            node: self.0,
            field: COLOR,
        })
    }
}

impl FourCircles {
    /// Substrate identity of this subdivision.
    pub fn id(self) -> NodeId {
        self.0
    }

    /// All four child items. Slots are written at creation and never
    /// rewritten, so a decodable subdivision always has all four.
    pub fn items<S: FieldStore>(self, store: &S) -> Result<[Item; 4], SchemaError> {
        let mut out = [Item(self.0); 4];
        for (slot, field) in out.iter_mut().zip(SLOTS) {
            *slot = Item(read_node(store, self.0, field)?);
        }
        Ok(out)
    }
}

/// Create a fresh circle occupant with a random palette color.
pub(crate) fn new_circle<S: FieldStore, R: rand::Rng>(store: &mut S, rng: &mut R) -> Circle {
    let id = store.create();
    store.write(id, KIND, Value::U64(KIND_CIRCLE));
    store.write(id, COLOR, Value::U64(Color::random(rng).to_u64()));
    Circle(id)
}

/// Create a subdivision of four fresh circle items at `level`, each
/// colored independently.
pub(crate) fn new_four<S: FieldStore, R: rand::Rng>(
    store: &mut S,
    rng: &mut R,
    level: u32,
) -> FourCircles {
    let four = store.create();
    store.write(four, KIND, Value::U64(KIND_FOUR));
    for field in SLOTS {
        let circle = new_circle(store, rng);
        let item = store.create();
        store.write(item, LEVEL, Value::U64(u64::from(level)));
        store.write(item, SHAPE, Value::Node(circle.0));
        store.write(four, field, Value::Node(item.0));
    }
    FourCircles(four)
}

#[cfg(test)]
mod tests {
    use super::*;
    use burst_substrate::{MemoryStore, ReplicaId};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn fresh_subdivision_decodes() {
        let mut store = MemoryStore::new(ReplicaId(0));
        let mut rng = StdRng::seed_from_u64(3);
        let four = new_four(&mut store, &mut rng, 2);

        let items = four.items(&store).unwrap();
        for item in items {
            assert_eq!(item.level(&store).unwrap(), 2);
            let Shape::Circle(circle) = item.shape(&store).unwrap() else {
                panic!("expected a circle");
            };
            assert!(Color::ALL.contains(&circle.color(&store).unwrap()));
        }
    }

    #[test]
    fn circle_identities_are_distinct() {
        let mut store = MemoryStore::new(ReplicaId(0));
        let mut rng = StdRng::seed_from_u64(3);
        let four = new_four(&mut store, &mut rng, 1);
        let items = four.items(&store).unwrap();
        let mut ids = std::collections::HashSet::new();
        for item in items {
            let Shape::Circle(circle) = item.shape(&store).unwrap() else {
                panic!("expected a circle");
            };
            assert!(ids.insert(circle.id()));
        }
    }

    #[test]
    fn unwritten_shape_reads_as_empty() {
        let mut store = MemoryStore::new(ReplicaId(0));
        let item = Item(store.create());
        assert_eq!(item.shape(&store).unwrap(), Shape::Empty);
    }

    #[test]
    fn absent_shape_reads_as_empty() {
        let mut store = MemoryStore::new(ReplicaId(0));
        let id = store.create();
        store.write(id, SHAPE, Value::Absent);
        assert_eq!(Item(id).shape(&store).unwrap(), Shape::Empty);
    }

    #[test]
    fn occupant_without_kind_is_a_schema_error() {
        let mut store = MemoryStore::new(ReplicaId(0));
        let item = store.create();
        let occupant = store.create();
        store.write(item, SHAPE, Value::Node(occupant));
        assert_eq!(
            Item(item).shape(&store),
            Err(SchemaError::MissingField {
                node: occupant,
                field: KIND
            })
        );
    }

    #[test]
    fn scalar_shape_is_a_schema_error() {
        let mut store = MemoryStore::new(ReplicaId(0));
        let id = store.create();
        store.write(id, SHAPE, Value::U64(7));
        assert_eq!(
            Item(id).shape(&store),
            Err(SchemaError::WrongKind {
                node: id,
                field: SHAPE
            })
        );
    }

    #[test]
    fn missing_slot_is_a_schema_error() {
        let mut store = MemoryStore::new(ReplicaId(0));
        let four = store.create();
        store.write(four, KIND, Value::U64(KIND_FOUR));
        assert!(FourCircles(four).items(&store).is_err());
    }

    #[test]
    fn out_of_palette_color_is_a_schema_error() {
        let mut store = MemoryStore::new(ReplicaId(0));
        let id = store.create();
        store.write(id, KIND, Value::U64(KIND_CIRCLE));
        store.write(id, COLOR, Value::U64(99));
        assert_eq!(
            Circle(id).color(&store),
            Err(SchemaError::WrongKind {
                node: id,
                field: COLOR
            })
        );
    }
}
