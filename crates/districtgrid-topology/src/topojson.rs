//! TopoJSON model.
//!
//! Only what the merge path needs is typed: polygonal geometries, their arc
//! references, ids and properties. Other geometry types are kept as
//! placeholders so collection positions stay stable.

use std::collections::BTreeMap;
use std::fmt;

use serde::de::{self, SeqAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::error::{TopologyError, TopologyResult};

pub type Properties = Map<String, Value>;

/// A planar position. Extra dimensions in the source are ignored.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Position(pub f64, pub f64);

impl Serialize for Position {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        [self.0, self.1].serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Position {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct PositionVisitor;

        impl<'de> Visitor<'de> for PositionVisitor {
            type Value = Position;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a position array with at least two numbers")
            }

            fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Position, A::Error> {
                let x: f64 = seq
                    .next_element()?
                    .ok_or_else(|| de::Error::invalid_length(0, &self))?;
                let y: f64 = seq
                    .next_element()?
                    .ok_or_else(|| de::Error::invalid_length(1, &self))?;
                while seq.next_element::<de::IgnoredAny>()?.is_some() {}
                Ok(Position(x, y))
            }
        }

        deserializer.deserialize_seq(PositionVisitor)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Transform {
    pub scale: [f64; 2],
    pub translate: [f64; 2],
}

/// Arc references for one polygon: a list of rings, each a list of arc
/// indices where `~i` (negative) means arc `i` reversed.
pub type PolygonArcs = Vec<Vec<i64>>;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum Geometry {
    Polygon {
        arcs: PolygonArcs,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<Value>,
        #[serde(default)]
        properties: Properties,
    },
    MultiPolygon {
        arcs: Vec<PolygonArcs>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<Value>,
        #[serde(default)]
        properties: Properties,
    },
    GeometryCollection {
        geometries: Vec<Geometry>,
        #[serde(default)]
        properties: Properties,
    },
    #[serde(other)]
    Other,
}

impl Geometry {
    pub fn properties(&self) -> Option<&Properties> {
        match self {
            Geometry::Polygon { properties, .. }
            | Geometry::MultiPolygon { properties, .. }
            | Geometry::GeometryCollection { properties, .. } => Some(properties),
            Geometry::Other => None,
        }
    }

    /// Numeric geometry id, when the source assigned one.
    pub fn numeric_id(&self) -> Option<u32> {
        match self {
            Geometry::Polygon { id, .. } | Geometry::MultiPolygon { id, .. } => {
                id.as_ref().and_then(Value::as_u64).and_then(|v| u32::try_from(v).ok())
            }
            _ => None,
        }
    }

    pub fn is_polygonal(&self) -> bool {
        matches!(self, Geometry::Polygon { .. } | Geometry::MultiPolygon { .. })
    }

    /// Every polygon in this geometry, as arc references.
    pub fn polygons(&self) -> Vec<&PolygonArcs> {
        match self {
            Geometry::Polygon { arcs, .. } => vec![arcs],
            Geometry::MultiPolygon { arcs, .. } => arcs.iter().collect(),
            _ => Vec::new(),
        }
    }

    /// Property value rendered as a grouping key.
    pub fn property_key(&self, name: &str) -> Option<String> {
        self.properties()?.get(name).and_then(value_key)
    }
}

/// Render a property value as a grouping key; strings are used verbatim.
pub fn value_key(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Topology {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bbox: Option<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transform: Option<Transform>,
    pub arcs: Vec<Vec<Position>>,
    pub objects: BTreeMap<String, Geometry>,
}

impl Topology {
    /// Parse TopoJSON and convert arcs to absolute coordinates.
    pub fn from_slice(bytes: &[u8]) -> TopologyResult<Self> {
        let topology: Topology = serde_json::from_slice(bytes)?;
        Ok(topology.into_absolute())
    }

    /// Delta-decode quantized arcs and apply the transform.
    ///
    /// Deltas are summed in quantized space before scaling so that shared
    /// arc endpoints decode to bit-identical coordinates.
    pub fn into_absolute(mut self) -> Self {
        let Some(transform) = self.transform.take() else {
            return self;
        };
        let [sx, sy] = transform.scale;
        let [tx, ty] = transform.translate;
        for arc in &mut self.arcs {
            let (mut x, mut y) = (0.0, 0.0);
            for position in arc.iter_mut() {
                x += position.0;
                y += position.1;
                *position = Position(x * sx + tx, y * sy + ty);
            }
        }
        self
    }

    /// Geometries of a named collection.
    pub fn collection(&self, name: &str) -> TopologyResult<&[Geometry]> {
        match self.objects.get(name) {
            Some(Geometry::GeometryCollection { geometries, .. }) => Ok(geometries),
            Some(_) => Err(TopologyError::NotACollection(name.to_string())),
            None => Err(TopologyError::MissingObject(name.to_string())),
        }
    }

    /// Absolute positions of an arc reference, reversed for `~i`.
    pub fn arc_positions(&self, arc: i64) -> TopologyResult<Vec<Position>> {
        let index = arc_index(arc);
        let positions = self
            .arcs
            .get(index)
            .ok_or(TopologyError::ArcOutOfRange(arc))?;
        let mut points = positions.clone();
        if arc < 0 {
            points.reverse();
        }
        Ok(points)
    }
}

/// Underlying arc index for a possibly reversed reference.
pub fn arc_index(arc: i64) -> usize {
    if arc < 0 { !arc as usize } else { arc as usize }
}
