// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Entity graph - step-id keyed arena of pre-parsed IFC entities
//!
//! Attributes are stored by name, matching the instance/aggregate attribute
//! access the geometry kernel consumes. The arena is passed by reference
//! through the call graph; its lifetime is one import/export pass.

use crate::error::{Error, Result};
use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use std::fmt;

/// Integer instance identifier of an entity in a parsed STEP/IFC file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StepId(pub u32);

impl fmt::Display for StepId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Entity kinds the kernel dispatches on
///
/// A closed set: the IFC schema version in use fixes the subtype universe,
/// so dispatch is a pattern match, not a class hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    CartesianPoint,
    Direction,
    Axis2Placement,
    Line,
    Circle,
    TrimmedCurve,
    Polyline,
    CompositeCurve,
    ArbitraryClosedProfile,
    RectangleProfile,
    CircleProfile,
    ExtrudedAreaSolid,
    SweptAreaSolid,
    BooleanResult,
    OpeningElement,
    Wall,
    AdvancedBrep,
    AdvancedFace,
    Unknown,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CartesianPoint => "CartesianPoint",
            Self::Direction => "Direction",
            Self::Axis2Placement => "Axis2Placement",
            Self::Line => "Line",
            Self::Circle => "Circle",
            Self::TrimmedCurve => "TrimmedCurve",
            Self::Polyline => "Polyline",
            Self::CompositeCurve => "CompositeCurve",
            Self::ArbitraryClosedProfile => "ArbitraryClosedProfile",
            Self::RectangleProfile => "RectangleProfile",
            Self::CircleProfile => "CircleProfile",
            Self::ExtrudedAreaSolid => "ExtrudedAreaSolid",
            Self::SweptAreaSolid => "SweptAreaSolid",
            Self::BooleanResult => "BooleanResult",
            Self::OpeningElement => "OpeningElement",
            Self::Wall => "Wall",
            Self::AdvancedBrep => "AdvancedBrep",
            Self::AdvancedFace => "AdvancedFace",
            Self::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Attribute value of an entity
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    /// Entity reference
    EntityRef(StepId),
    /// String value
    String(String),
    /// Integer value
    Integer(i64),
    /// Float value
    Float(f64),
    /// Enum value
    Enum(String),
    /// List of values
    List(Vec<AttributeValue>),
    /// Null/undefined
    Null,
}

impl AttributeValue {
    /// Get entity reference if this is a reference
    pub fn as_entity_ref(&self) -> Option<StepId> {
        match self {
            Self::EntityRef(id) => Some(*id),
            _ => None,
        }
    }

    /// Get float value, promoting integers
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(f) => Some(*f),
            Self::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Get integer value
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Get string value
    pub fn as_string(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Get enum value
    pub fn as_enum(&self) -> Option<&str> {
        match self {
            Self::Enum(e) => Some(e),
            _ => None,
        }
    }

    /// Get list of values
    pub fn as_list(&self) -> Option<&[AttributeValue]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    /// Check if value is null
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

/// A single pre-parsed entity with named attributes
#[derive(Debug, Clone)]
pub struct Entity {
    pub id: StepId,
    pub kind: EntityKind,
    attributes: SmallVec<[(String, AttributeValue); 6]>,
}

impl Entity {
    /// Create a new entity with no attributes
    pub fn new(id: StepId, kind: EntityKind) -> Self {
        Self {
            id,
            kind,
            attributes: SmallVec::new(),
        }
    }

    /// Builder-style attribute setter
    pub fn with(mut self, name: &str, value: AttributeValue) -> Self {
        self.set(name, value);
        self
    }

    /// Set an attribute, replacing any existing value of the same name
    pub fn set(&mut self, name: &str, value: AttributeValue) {
        if let Some(slot) = self.attributes.iter_mut().find(|(n, _)| n == name) {
            slot.1 = value;
        } else {
            self.attributes.push((name.to_string(), value));
        }
    }

    /// Get a raw attribute by name
    pub fn attribute(&self, name: &str) -> Option<&AttributeValue> {
        self.attributes
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    /// Get an instance (entity reference) attribute
    pub fn instance_attribute(&self, name: &str) -> Option<StepId> {
        self.attribute(name).and_then(|v| v.as_entity_ref())
    }

    /// Get an aggregate (list) attribute
    pub fn aggregate_attribute(&self, name: &str) -> Option<&[AttributeValue]> {
        self.attribute(name).and_then(|v| v.as_list())
    }

    /// Get a real attribute, in file units (unscaled)
    pub fn real_attribute(&self, name: &str) -> Option<f64> {
        self.attribute(name).and_then(|v| v.as_float())
    }

    /// Get an enum attribute
    pub fn enum_attribute(&self, name: &str) -> Option<&str> {
        self.attribute(name).and_then(|v| v.as_enum())
    }

    /// Required instance attribute
    pub fn require_instance(&self, name: &str) -> Result<StepId> {
        self.instance_attribute(name)
            .ok_or_else(|| Error::missing(self.id, name))
    }

    /// Required aggregate attribute
    pub fn require_aggregate(&self, name: &str) -> Result<&[AttributeValue]> {
        self.aggregate_attribute(name)
            .ok_or_else(|| Error::missing(self.id, name))
    }

    /// Required real attribute, in file units (unscaled)
    pub fn require_real(&self, name: &str) -> Result<f64> {
        self.real_attribute(name)
            .ok_or_else(|| Error::missing(self.id, name))
    }
}

/// Arena of entities keyed by step-id
///
/// One arena per import/export pass. Single-writer, many-reader within a
/// pass; never shared across passes.
#[derive(Debug, Default)]
pub struct EntityArena {
    entities: FxHashMap<u32, Entity>,
    next_id: u32,
}

impl EntityArena {
    /// Create an empty arena
    pub fn new() -> Self {
        Self {
            entities: FxHashMap::default(),
            next_id: 1,
        }
    }

    /// Insert an entity, returning its id
    pub fn insert(&mut self, entity: Entity) -> StepId {
        let id = entity.id;
        self.next_id = self.next_id.max(id.0 + 1);
        self.entities.insert(id.0, entity);
        id
    }

    /// Allocate a fresh, unused step-id
    pub fn fresh_id(&mut self) -> StepId {
        let id = StepId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Look up an entity by id
    pub fn get(&self, id: StepId) -> Option<&Entity> {
        self.entities.get(&id.0)
    }

    /// Look up an entity, erroring on a dangling reference
    pub fn require(&self, id: StepId) -> Result<&Entity> {
        self.get(id).ok_or(Error::UnknownEntity(id))
    }

    /// Resolve an attribute value to the referenced entity
    pub fn resolve(&self, value: &AttributeValue) -> Option<&Entity> {
        value.as_entity_ref().and_then(|id| self.get(id))
    }

    /// Deep-copy an entity under a fresh identity
    ///
    /// The clone carries the source's kind and attributes but a new step-id.
    /// Ownership of the clone transfers to the caller via the returned id.
    pub fn clone_with_new_id(&mut self, source: StepId) -> Result<StepId> {
        let mut clone = self.require(source)?.clone();
        let id = self.fresh_id();
        clone.id = id;
        self.entities.insert(id.0, clone);
        Ok(id)
    }

    /// Number of entities in the arena
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Check if the arena is empty
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Iterate over all entities
    pub fn iter(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_named_attribute_access() {
        let entity = Entity::new(StepId(7), EntityKind::CartesianPoint).with(
            "Coordinates",
            AttributeValue::List(vec![
                AttributeValue::Float(1.0),
                AttributeValue::Float(2.0),
                AttributeValue::Integer(3),
            ]),
        );

        let coords = entity.aggregate_attribute("Coordinates").unwrap();
        assert_eq!(coords.len(), 3);
        assert_eq!(coords[2].as_float(), Some(3.0));
        assert!(entity.attribute("Nope").is_none());
    }

    #[test]
    fn test_require_missing_attribute() {
        let entity = Entity::new(StepId(3), EntityKind::Line);
        let err = entity.require_instance("Pnt").unwrap_err();
        assert!(matches!(err, Error::MissingAttribute { .. }));
    }

    #[test]
    fn test_clone_with_new_id() {
        let mut arena = EntityArena::new();
        let original = arena.insert(
            Entity::new(StepId(10), EntityKind::OpeningElement)
                .with("Depth", AttributeValue::Float(0.3)),
        );

        let clone_id = arena.clone_with_new_id(original).unwrap();
        assert_ne!(clone_id, original);

        let clone = arena.get(clone_id).unwrap();
        assert_eq!(clone.kind, EntityKind::OpeningElement);
        assert_eq!(clone.real_attribute("Depth"), Some(0.3));
        // Original untouched
        assert_eq!(arena.get(original).unwrap().id, original);
    }

    #[test]
    fn test_fresh_id_never_collides() {
        let mut arena = EntityArena::new();
        arena.insert(Entity::new(StepId(100), EntityKind::Wall));
        let id = arena.fresh_id();
        assert!(id.0 > 100);
        assert!(arena.get(id).is_none());
    }
}
