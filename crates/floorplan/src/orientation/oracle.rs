//! The orientation oracle capability and its request type.

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use floorplan_core::{geometry::Bounds, identifier::Id};
use floorplan_parser::{ParseError, RawJudgments};

/// Failure of a single oracle call.
///
/// The engine retries these; they never escape resolution.
#[derive(Debug, Error)]
pub enum OracleError {
    #[error("oracle unavailable: {0}")]
    Unavailable(String),

    #[error("oracle returned an unreadable payload: {0}")]
    Payload(#[from] ParseError),
}

/// Bounding box of a section in image units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RegionBounds {
    x: f64,
    y: f64,
    width: f64,
    height: f64,
}

impl RegionBounds {
    pub fn x(&self) -> f64 {
        self.x
    }

    pub fn y(&self) -> f64 {
        self.y
    }

    pub fn width(&self) -> f64 {
        self.width
    }

    pub fn height(&self) -> f64 {
        self.height
    }
}

impl From<Bounds> for RegionBounds {
    fn from(bounds: Bounds) -> Self {
        Self {
            x: bounds.min_x(),
            y: bounds.min_y(),
            width: bounds.width(),
            height: bounds.height(),
        }
    }
}

/// The part of the source image an oracle should look at.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageRegion {
    bounds: Option<RegionBounds>,
    image: Option<String>,
}

impl ImageRegion {
    pub fn new(bounds: Option<Bounds>, image: Option<String>) -> Self {
        Self {
            bounds: bounds.map(RegionBounds::from),
            image,
        }
    }

    pub fn bounds(&self) -> Option<RegionBounds> {
        self.bounds
    }

    /// Reference to the source image, if the caller supplied one.
    pub fn image(&self) -> Option<&str> {
        self.image.as_deref()
    }
}

/// A request for orientation judgments on one section.
///
/// Serializes as `{section, components, pending, region}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrientationRequest {
    section: usize,
    components: Vec<Id>,
    pending: Vec<Id>,
    region: ImageRegion,
}

impl OrientationRequest {
    pub fn new(section: usize, components: Vec<Id>, pending: Vec<Id>, region: ImageRegion) -> Self {
        Self {
            section,
            components,
            pending,
            region,
        }
    }

    pub fn section(&self) -> usize {
        self.section
    }

    /// Every component of the section, in flow order.
    pub fn components(&self) -> &[Id] {
        &self.components
    }

    /// Components of the section still lacking an orientation.
    pub fn pending(&self) -> &[Id] {
        &self.pending
    }

    pub fn region(&self) -> &ImageRegion {
        &self.region
    }
}

/// A source of per-component orientation judgments.
///
/// Responses may be partial; ids the oracle cannot judge are simply left out
/// or marked unresolved.
#[async_trait]
pub trait OrientationOracle: Send + Sync {
    /// Judges the components of one section.
    ///
    /// # Errors
    ///
    /// Returns [`OracleError`] when the oracle cannot be reached or its
    /// answer cannot be read. The engine retries failed calls.
    async fn judge(&self, request: &OrientationRequest) -> Result<RawJudgments, OracleError>;
}

/// An oracle answering from a fixed set of judgments.
///
/// Each call returns the stored judgments for the requested section's
/// components. Used to replay recorded judgments and in tests.
#[derive(Debug, Clone, Default)]
pub struct StaticOracle {
    judgments: RawJudgments,
}

impl StaticOracle {
    pub fn new(judgments: RawJudgments) -> Self {
        Self { judgments }
    }
}

#[async_trait]
impl OrientationOracle for StaticOracle {
    async fn judge(&self, request: &OrientationRequest) -> Result<RawJudgments, OracleError> {
        Ok(request
            .components()
            .iter()
            .filter_map(|id| {
                let key = id.to_string();
                self.judgments
                    .get(&key)
                    .cloned()
                    .map(|judgment| (key, judgment))
            })
            .collect())
    }
}
