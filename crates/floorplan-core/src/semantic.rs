//! Semantic layout model types.
//!
//! These types describe detected layout components after input parsing and
//! before any stage of the compiler has run.
//!
//! # Pipeline Position
//!
//! ```text
//! Detections (JSON)
//!     ↓ floorplan-parser
//! Semantic Components (these types)
//!     ↓ flow graph builder
//! Layout Model (components, connections, sections)
//!     ↓ orientation / properties
//! Resolved Layout Model
//!     ↓ document builder
//! Intermediate Document
//!     ↓ mapping engine
//! Target Object Graph
//! ```

use std::{collections::BTreeMap, fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    geometry::{Point, Size},
    identifier::Id,
    units::Dimension,
};

/// The kind of a layout component.
///
/// Variants are declared in canonical order; the derived [`Ord`] follows it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ComponentKind {
    #[serde(alias = "source")]
    Source,
    #[serde(alias = "conveyor")]
    Conveyor,
    #[serde(alias = "machine")]
    Machine,
    #[serde(alias = "diverter")]
    Diverter,
    #[serde(alias = "sink")]
    Sink,
}

impl ComponentKind {
    /// All kinds in canonical order.
    pub const ALL: [ComponentKind; 5] = [
        Self::Source,
        Self::Conveyor,
        Self::Machine,
        Self::Diverter,
        Self::Sink,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Source => "Source",
            Self::Conveyor => "Conveyor",
            Self::Machine => "Machine",
            Self::Diverter => "Diverter",
            Self::Sink => "Sink",
        }
    }

    /// Infers a kind from the identifier prefix used by the upstream detector.
    ///
    /// # Examples
    ///
    /// ```
    /// # use floorplan_core::semantic::ComponentKind;
    /// assert_eq!(ComponentKind::from_prefix('L'), Some(ComponentKind::Source));
    /// assert_eq!(ComponentKind::from_prefix('u'), Some(ComponentKind::Sink));
    /// assert_eq!(ComponentKind::from_prefix('X'), None);
    /// ```
    pub fn from_prefix(prefix: char) -> Option<Self> {
        match prefix.to_ascii_uppercase() {
            'L' => Some(Self::Source),
            'C' => Some(Self::Conveyor),
            'M' => Some(Self::Machine),
            'D' => Some(Self::Diverter),
            'U' => Some(Self::Sink),
            _ => None,
        }
    }
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Error returned when a string names no known [`ComponentKind`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown component kind `{0}`")]
pub struct UnknownKindError(pub String);

impl FromStr for ComponentKind {
    type Err = UnknownKindError;

    /// Parses a kind name case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "source" => Ok(Self::Source),
            "conveyor" => Ok(Self::Conveyor),
            "machine" => Ok(Self::Machine),
            "diverter" => Ok(Self::Diverter),
            "sink" => Ok(Self::Sink),
            _ => Err(UnknownKindError(s.to_string())),
        }
    }
}

/// One of the four cardinal orientations a component may take.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum Orientation {
    Deg0,
    Deg90,
    Deg180,
    Deg270,
}

impl Orientation {
    /// Returns the orientation as an integer degree value.
    pub fn degrees(self) -> u16 {
        match self {
            Self::Deg0 => 0,
            Self::Deg90 => 90,
            Self::Deg180 => 180,
            Self::Deg270 => 270,
        }
    }
}

impl fmt::Display for Orientation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}°", self.degrees())
    }
}

/// Error returned for a degree value outside {0, 90, 180, 270}.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid orientation {0}, expected one of 0, 90, 180, 270")]
pub struct InvalidOrientationError(pub i64);

impl TryFrom<i64> for Orientation {
    type Error = InvalidOrientationError;

    fn try_from(degrees: i64) -> Result<Self, Self::Error> {
        match degrees {
            0 => Ok(Self::Deg0),
            90 => Ok(Self::Deg90),
            180 => Ok(Self::Deg180),
            270 => Ok(Self::Deg270),
            other => Err(InvalidOrientationError(other)),
        }
    }
}

impl From<Orientation> for i64 {
    fn from(orientation: Orientation) -> Self {
        i64::from(orientation.degrees())
    }
}

/// Canonical name of a component property.
///
/// Variants are declared alphabetically by their canonical name so that
/// ordered maps keyed by `PropertyName` iterate in name order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyName {
    Capacity,
    Interval,
    Length,
    Mtbf,
    Mttr,
    ProcessingTime,
    Speed,
    Width,
}

impl PropertyName {
    /// Normalizes a raw extracted key to a property name.
    ///
    /// Matching ignores case, surrounding whitespace, and `_`/`-` separators.
    ///
    /// # Examples
    ///
    /// ```
    /// # use floorplan_core::semantic::PropertyName;
    /// assert_eq!(PropertyName::normalize("Proc time"), Some(PropertyName::ProcessingTime));
    /// assert_eq!(PropertyName::normalize("Conveyor speed"), Some(PropertyName::Speed));
    /// assert_eq!(PropertyName::normalize("colour"), None);
    /// ```
    pub fn normalize(raw: &str) -> Option<Self> {
        let key = raw
            .trim()
            .to_ascii_lowercase()
            .replace(['_', '-'], " ")
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ");
        let name = match key.as_str() {
            "speed" | "conveyor speed" => Self::Speed,
            "proc time" | "processing time" | "process time" | "cycle time" => {
                Self::ProcessingTime
            }
            "interval" | "arrival interval" => Self::Interval,
            "length" => Self::Length,
            "width" => Self::Width,
            "mttr" => Self::Mttr,
            "mtbf" => Self::Mtbf,
            "capacity" => Self::Capacity,
            _ => return None,
        };
        Some(name)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Capacity => "capacity",
            Self::Interval => "interval",
            Self::Length => "length",
            Self::Mtbf => "mtbf",
            Self::Mttr => "mttr",
            Self::ProcessingTime => "processing_time",
            Self::Speed => "speed",
            Self::Width => "width",
        }
    }

    /// Returns the physical dimension values of this property are measured in.
    pub fn dimension(self) -> Dimension {
        match self {
            Self::Length | Self::Width => Dimension::Length,
            Self::Interval | Self::ProcessingTime | Self::Mttr | Self::Mtbf => Dimension::Time,
            Self::Speed => Dimension::Speed,
            Self::Capacity => Dimension::Count,
        }
    }
}

impl fmt::Display for PropertyName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A detected layout component.
///
/// `position` is the top-left corner of the detected bounding box and
/// `dimensions` its extent, both in image units. `properties` hold values
/// already normalized to canonical units.
#[derive(Debug, Clone, PartialEq)]
pub struct Component {
    id: Id,
    kind: ComponentKind,
    position: Point,
    dimensions: Size,
    label: Option<String>,
    properties: BTreeMap<PropertyName, f64>,
}

impl Component {
    pub fn new(id: Id, kind: ComponentKind, position: Point, dimensions: Size) -> Self {
        Self {
            id,
            kind,
            position,
            dimensions,
            label: None,
            properties: BTreeMap::new(),
        }
    }

    /// Returns a copy of this component carrying the given label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Returns a copy of this component with its property map replaced.
    pub fn with_properties(mut self, properties: BTreeMap<PropertyName, f64>) -> Self {
        self.properties = properties;
        self
    }

    pub fn id(&self) -> Id {
        self.id
    }

    pub fn kind(&self) -> ComponentKind {
        self.kind
    }

    pub fn position(&self) -> Point {
        self.position
    }

    pub fn dimensions(&self) -> Size {
        self.dimensions
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn properties(&self) -> &BTreeMap<PropertyName, f64> {
        &self.properties
    }

    /// Returns the value of a single normalized property, if present.
    pub fn property(&self, name: PropertyName) -> Option<f64> {
        self.properties.get(&name).copied()
    }
}
