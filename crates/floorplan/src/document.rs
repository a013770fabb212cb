//! The versioned intermediate document.
//!
//! An [`IntermediateDocument`] is the canonical, engine-neutral description of
//! a compiled layout: the resources in use, one layout object per component,
//! absolute placements, and the ordered connection list. It is the last
//! artifact produced before mapping and is persisted so later failures can be
//! diagnosed without recompiling.
//!
//! Building is a pure function of the layout model and the document
//! configuration; the same model always serializes to byte-identical JSON.

use std::{
    collections::{BTreeMap, HashSet},
    fs,
    path::Path,
};

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use floorplan_core::{
    geometry::{Bounds, Point},
    identifier::Id,
    semantic::{Component, ComponentKind, PropertyName},
};

use crate::{
    config::{Calibration, DocumentConfig},
    error::{DocumentError, FloorplanError, GraphError, OrientationError},
    model::LayoutModel,
};

/// Schema identifier written to and required from every document.
pub const SCHEMA_VERSION: &str = "floorplan-cmsd/1";

/// Decimal places kept for coordinates and dimensions.
const PRECISION: u32 = 4;

/// A component kind in use, with the number of objects of that kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    kind: ComponentKind,
    count: usize,
}

impl Resource {
    pub fn kind(&self) -> ComponentKind {
        self.kind
    }

    pub fn count(&self) -> usize {
        self.count
    }
}

/// One component as it appears in the document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutObject {
    id: String,
    #[serde(rename = "type")]
    kind: String,
    label: Option<String>,
    width: f64,
    height: f64,
    orientation: i64,
    #[serde(default)]
    properties: BTreeMap<PropertyName, f64>,
}

impl LayoutObject {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The component kind name, as written in the document.
    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn width(&self) -> f64 {
        self.width
    }

    pub fn height(&self) -> f64 {
        self.height
    }

    /// Orientation in degrees, as written in the document.
    pub fn orientation(&self) -> i64 {
        self.orientation
    }

    pub fn properties(&self) -> &BTreeMap<PropertyName, f64> {
        &self.properties
    }
}

/// Absolute position and rotation of one layout object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Placement {
    object_id: String,
    x: f64,
    y: f64,
    rotation: i64,
}

impl Placement {
    pub fn object_id(&self) -> &str {
        &self.object_id
    }

    pub fn x(&self) -> f64 {
        self.x
    }

    pub fn y(&self) -> f64 {
        self.y
    }

    pub fn rotation(&self) -> i64 {
        self.rotation
    }
}

/// A directed flow connection, positioned within its section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentConnection {
    from: String,
    to: String,
    section: usize,
    sequence_index: usize,
}

impl DocumentConnection {
    pub fn from(&self) -> &str {
        &self.from
    }

    pub fn to(&self) -> &str {
        &self.to
    }

    pub fn section(&self) -> usize {
        self.section
    }

    pub fn sequence_index(&self) -> usize {
        self.sequence_index
    }
}

/// The canonical description of a compiled layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntermediateDocument {
    schema_version: String,
    resources: Vec<Resource>,
    layout_objects: Vec<LayoutObject>,
    placements: Vec<Placement>,
    connections: Vec<DocumentConnection>,
}

#[derive(Deserialize)]
struct VersionProbe {
    schema_version: String,
}

impl IntermediateDocument {
    pub fn schema_version(&self) -> &str {
        &self.schema_version
    }

    pub fn resources(&self) -> &[Resource] {
        &self.resources
    }

    pub fn layout_objects(&self) -> &[LayoutObject] {
        &self.layout_objects
    }

    pub fn placements(&self) -> &[Placement] {
        &self.placements
    }

    pub fn connections(&self) -> &[DocumentConnection] {
        &self.connections
    }

    pub fn object(&self, id: &str) -> Option<&LayoutObject> {
        self.layout_objects.iter().find(|object| object.id == id)
    }

    pub fn placement(&self, id: &str) -> Option<&Placement> {
        self.placements.iter().find(|placement| placement.object_id == id)
    }

    /// Checks that every placement and connection endpoint names an object.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::DanglingReference`] for the first reference
    /// that does not resolve.
    pub fn check_references(&self) -> Result<(), GraphError> {
        let ids: HashSet<&str> = self.layout_objects.iter().map(|o| o.id.as_str()).collect();
        let dangling = |object: &str, context: &'static str| GraphError::DanglingReference {
            object: object.to_string(),
            context,
        };

        for placement in &self.placements {
            if !ids.contains(placement.object_id.as_str()) {
                return Err(dangling(&placement.object_id, "placement"));
            }
        }
        for connection in &self.connections {
            for endpoint in [&connection.from, &connection.to] {
                if !ids.contains(endpoint.as_str()) {
                    return Err(dangling(endpoint, "connection"));
                }
            }
        }
        Ok(())
    }

    /// Serializes the document as pretty-printed JSON ending in a newline.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError::Json`] if serialization fails.
    pub fn to_json(&self) -> Result<String, DocumentError> {
        let mut json = serde_json::to_string_pretty(self)?;
        json.push('\n');
        Ok(json)
    }

    /// Writes the document to `path`.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError`] if serialization or writing fails.
    pub fn write_to(&self, path: impl AsRef<Path>) -> Result<(), DocumentError> {
        let path = path.as_ref();
        fs::write(path, self.to_json()?)?;
        info!(path:? = path; "Intermediate document written");
        Ok(())
    }

    /// Reads a document back from JSON.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError::UnsupportedVersion`] when the document was
    /// written for another schema, or [`DocumentError::Json`] when it cannot
    /// be read.
    pub fn from_json(json: &str) -> Result<Self, DocumentError> {
        let probe: VersionProbe = serde_json::from_str(json)?;
        if probe.schema_version != SCHEMA_VERSION {
            return Err(DocumentError::UnsupportedVersion {
                found: probe.schema_version,
                expected: SCHEMA_VERSION,
            });
        }
        Ok(serde_json::from_str(json)?)
    }
}

/// Builds intermediate documents from resolved layout models.
#[derive(Debug, Clone, Default)]
pub struct DocumentBuilder {
    config: DocumentConfig,
}

impl DocumentBuilder {
    pub fn new(config: &DocumentConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    /// Builds the document for a model with orientations and properties.
    ///
    /// # Errors
    ///
    /// - [`OrientationError::MissingAssignment`] for a component without an
    ///   orientation.
    /// - [`GraphError::ConnectionOutsideSection`] for a connection no section
    ///   walked.
    /// - [`GraphError::DanglingReference`] if a reference fails to resolve.
    /// - [`DocumentError::InvalidSetting`] for a negative margin or a scale
    ///   that is not finite and positive.
    pub fn build(&self, model: &LayoutModel) -> Result<IntermediateDocument, FloorplanError> {
        info!(components = model.component_count(); "Building intermediate document");
        self.config.validate()?;

        let ordered = Self::object_order(model);
        let origin = Self::origin(model);
        let scale = self.scale(&ordered)?;

        let mut layout_objects = Vec::with_capacity(ordered.len());
        let mut placements = Vec::with_capacity(ordered.len());
        for component in &ordered {
            let degrees = model
                .orientation(component.id())
                .map(i64::from)
                .ok_or(OrientationError::MissingAssignment(component.id()))?;
            layout_objects.push(Self::layout_object(component, degrees, scale));
            placements.push(self.placement(component, origin, scale, degrees));
        }

        let document = IntermediateDocument {
            schema_version: SCHEMA_VERSION.to_string(),
            resources: Self::resources(&ordered),
            layout_objects,
            placements,
            connections: Self::connections(model)?,
        };
        document.check_references()?;

        info!(
            objects = document.layout_objects.len(),
            connections = document.connections.len(),
            resources = document.resources.len();
            "Intermediate document built"
        );
        Ok(document)
    }

    /// Components by first appearance along sections, then by ascending id.
    fn object_order(model: &LayoutModel) -> Vec<&Component> {
        let mut seen = HashSet::new();
        let mut ordered: Vec<&Component> = model
            .sections()
            .iter()
            .flat_map(|section| section.components())
            .filter(|id| seen.insert(**id))
            .filter_map(|id| model.component(*id))
            .collect();

        let mut rest: Vec<&Component> = model
            .components()
            .filter(|component| !seen.contains(&component.id()))
            .collect();
        rest.sort_by_key(|component| component.id());
        ordered.extend(rest);
        ordered
    }

    /// Factor from image units to model units.
    fn scale(&self, ordered: &[&Component]) -> Result<f64, DocumentError> {
        if self.config.calibration() == Calibration::Fixed {
            return Ok(self.config.scale());
        }

        let Some((component, property, pixels_per_meter)) =
            ordered.iter().find_map(|c| Self::pixels_per_meter(c))
        else {
            warn!(
                scale = self.config.scale();
                "No length or width reference found, using the configured scale"
            );
            return Ok(self.config.scale());
        };

        info!(
            reference:% = component,
            property:% = property,
            pixels_per_meter;
            "Calibrated image scale"
        );
        let scale = 1.0 / pixels_per_meter;
        if scale.is_finite() && scale > 0.0 {
            Ok(scale)
        } else {
            Err(DocumentError::InvalidSetting {
                setting: "calibration",
                value: pixels_per_meter,
            })
        }
    }

    /// Pixel extent over measured meters of a component's length or width.
    ///
    /// The length runs along the longer side of the box and the width along
    /// the shorter one.
    fn pixels_per_meter(component: &Component) -> Option<(Id, PropertyName, f64)> {
        let size = component.dimensions();
        [
            (PropertyName::Length, size.width().max(size.height())),
            (PropertyName::Width, size.width().min(size.height())),
        ]
        .into_iter()
        .find_map(|(property, pixels)| {
            let meters = component.property(property)?;
            (meters > 0.0 && pixels > 0.0)
                .then(|| (component.id(), property, pixels / meters))
        })
    }

    /// Top-left corner of the bounds around all components.
    fn origin(model: &LayoutModel) -> Point {
        let ids: Vec<Id> = model.components().map(Component::id).collect();
        model
            .bounds_of(&ids)
            .map(Bounds::min_point)
            .unwrap_or_default()
    }

    fn layout_object(component: &Component, orientation: i64, scale: f64) -> LayoutObject {
        let dimensions = component.dimensions().scale(scale).round_to(PRECISION);
        LayoutObject {
            id: component.id().to_string(),
            kind: component.kind().to_string(),
            label: component.label().map(str::to_string),
            width: dimensions.width(),
            height: dimensions.height(),
            orientation,
            properties: component.properties().clone(),
        }
    }

    fn placement(
        &self,
        component: &Component,
        origin: Point,
        scale: f64,
        rotation: i64,
    ) -> Placement {
        let margin = self.config.margin();
        let position = component
            .position()
            .sub_point(origin)
            .scale(scale)
            .add_point(Point::new(margin, margin))
            .round_to(PRECISION);
        debug!(
            component:% = component.id(),
            x = position.x(),
            y = position.y();
            "Placed component"
        );
        Placement {
            object_id: component.id().to_string(),
            x: position.x(),
            y: position.y(),
            rotation,
        }
    }

    fn resources(objects: &[&Component]) -> Vec<Resource> {
        let mut counts: BTreeMap<ComponentKind, usize> = BTreeMap::new();
        for component in objects {
            *counts.entry(component.kind()).or_default() += 1;
        }
        counts
            .into_iter()
            .map(|(kind, count)| Resource { kind, count })
            .collect()
    }

    fn connections(model: &LayoutModel) -> Result<Vec<DocumentConnection>, GraphError> {
        let mut connections = model
            .connections()
            .iter()
            .map(|connection| match (connection.section(), connection.sequence_index()) {
                (Some(section), Some(sequence_index)) => Ok(DocumentConnection {
                    from: connection.from().to_string(),
                    to: connection.to().to_string(),
                    section,
                    sequence_index,
                }),
                _ => Err(GraphError::ConnectionOutsideSection {
                    from: connection.from().to_string(),
                    to: connection.to().to_string(),
                }),
            })
            .collect::<Result<Vec<_>, _>>()?;
        connections.sort_by_key(|c| (c.section, c.sequence_index));
        Ok(connections)
    }
}

#[cfg(test)]
mod tests {
    use float_cmp::approx_eq;

    use floorplan_core::{geometry::Size, semantic::Orientation};

    use super::*;
    use crate::model::{Connection, Section};

    fn component(id: &str, x: f64, y: f64) -> Component {
        let kind = id
            .chars()
            .next()
            .and_then(ComponentKind::from_prefix)
            .expect("test ids use known prefixes");
        Component::new(Id::new(id), kind, Point::new(x, y), Size::new(4.0, 2.0))
    }

    fn linear_model() -> LayoutModel {
        let ids = [Id::new("L1"), Id::new("C1"), Id::new("U1")];
        LayoutModel::new(
            vec![
                component("U1", 20.0, 0.0),
                component("L1", 0.0, 0.0),
                component("C1", 10.0, 0.0),
            ],
            vec![
                Connection::new(ids[1], ids[2]).in_section(0, 1),
                Connection::new(ids[0], ids[1]).in_section(0, 0),
            ],
            vec![Section::new(0, ids[0], 0, ids.to_vec())],
        )
        .with_orientations(ids.iter().map(|id| (*id, Orientation::Deg0)).collect())
    }

    #[test]
    fn test_linear_document() {
        let document = DocumentBuilder::default().build(&linear_model()).unwrap();

        assert_eq!(document.schema_version(), SCHEMA_VERSION);
        let resources: Vec<_> = document
            .resources()
            .iter()
            .map(|r| (r.kind(), r.count()))
            .collect();
        assert_eq!(
            resources,
            vec![
                (ComponentKind::Source, 1),
                (ComponentKind::Conveyor, 1),
                (ComponentKind::Sink, 1)
            ]
        );

        let ids: Vec<_> = document.layout_objects().iter().map(|o| o.id()).collect();
        assert_eq!(ids, vec!["L1", "C1", "U1"]);

        let xs: Vec<_> = document.placements().iter().map(|p| p.x()).collect();
        assert_eq!(xs, vec![0.0, 10.0, 20.0]);
        assert!(document.placements().iter().all(|p| p.y() == 0.0 && p.rotation() == 0));

        let connections: Vec<_> = document
            .connections()
            .iter()
            .map(|c| (c.from(), c.to(), c.sequence_index()))
            .collect();
        assert_eq!(connections, vec![("L1", "C1", 0), ("C1", "U1", 1)]);
    }

    #[test]
    fn test_placements_are_shifted_scaled_and_rounded() {
        let ids = [Id::new("L1"), Id::new("U1")];
        let model = LayoutModel::new(
            vec![component("L1", -5.0, 12.5), component("U1", 5.123456, 2.5)],
            vec![Connection::new(ids[0], ids[1]).in_section(0, 0)],
            vec![Section::new(0, ids[0], 0, ids.to_vec())],
        )
        .with_orientations(
            [(ids[0], Orientation::Deg90), (ids[1], Orientation::Deg270)]
                .into_iter()
                .collect(),
        );

        let document = DocumentBuilder::new(&DocumentConfig::new(1.0, 0.5))
            .build(&model)
            .unwrap();

        let source = document.placement("L1").unwrap();
        assert!(approx_eq!(f64, source.x(), 1.0));
        assert!(approx_eq!(f64, source.y(), 6.0));
        assert_eq!(source.rotation(), 90);

        let sink = document.placement("U1").unwrap();
        assert!(approx_eq!(f64, sink.x(), 6.0617));
        assert!(approx_eq!(f64, sink.y(), 1.0));

        let object = document.object("U1").unwrap();
        assert!(approx_eq!(f64, object.width(), 2.0));
        assert_eq!(object.orientation(), 270);
    }

    fn calibrated_model(conveyor_properties: BTreeMap<PropertyName, f64>) -> LayoutModel {
        let ids = [Id::new("L1"), Id::new("C1"), Id::new("U1")];
        let conveyor = Component::new(
            ids[1],
            ComponentKind::Conveyor,
            Point::new(640.0, 100.0),
            Size::new(640.0, 40.0),
        )
        .with_properties(conveyor_properties);
        LayoutModel::new(
            vec![
                component("L1", 0.0, 100.0),
                conveyor,
                component("U1", 1600.0, 420.0),
            ],
            vec![
                Connection::new(ids[0], ids[1]).in_section(0, 0),
                Connection::new(ids[1], ids[2]).in_section(0, 1),
            ],
            vec![Section::new(0, ids[0], 0, ids.to_vec())],
        )
        .with_orientations(ids.iter().map(|id| (*id, Orientation::Deg0)).collect())
    }

    #[test]
    fn test_reference_calibration_converts_pixels_to_meters() {
        // A 640 px conveyor measured at 2 m gives 320 px/m.
        let model = calibrated_model(BTreeMap::from([
            (PropertyName::Length, 2.0),
            (PropertyName::Speed, 0.5),
        ]));
        let config = DocumentConfig::new(0.0, 1.0)
            .with_calibration(Calibration::Reference);

        let document = DocumentBuilder::new(&config).build(&model).unwrap();

        let placements: Vec<_> = document
            .placements()
            .iter()
            .map(|p| (p.object_id(), p.x(), p.y()))
            .collect();
        assert_eq!(
            placements,
            vec![("L1", 0.0, 0.0), ("C1", 2.0, 0.0), ("U1", 5.0, 1.0)]
        );

        let conveyor = document.object("C1").unwrap();
        assert!(approx_eq!(f64, conveyor.width(), 2.0));
        assert!(approx_eq!(f64, conveyor.height(), 0.125));
        assert_eq!(conveyor.properties().get(&PropertyName::Length), Some(&2.0));
    }

    #[test]
    fn test_width_reference_uses_the_shorter_side() {
        let model = calibrated_model(BTreeMap::from([(PropertyName::Width, 0.5)]));
        let config = DocumentConfig::new(0.0, 1.0)
            .with_calibration(Calibration::Reference);

        let document = DocumentBuilder::new(&config).build(&model).unwrap();

        // 40 px over 0.5 m is 80 px/m.
        assert_eq!(document.placement("C1").unwrap().x(), 8.0);
        assert_eq!(document.placement("U1").unwrap().y(), 4.0);
    }

    #[test]
    fn test_calibration_falls_back_to_configured_scale() {
        let model = calibrated_model(BTreeMap::new());
        let config = DocumentConfig::new(1.0, 0.5)
            .with_calibration(Calibration::Reference);

        let document = DocumentBuilder::new(&config).build(&model).unwrap();

        assert_eq!(document.placement("C1").unwrap().x(), 321.0);
        assert_eq!(document.placement("U1").unwrap().y(), 161.0);
    }

    #[test]
    fn test_invalid_settings_are_rejected() {
        let configs = [
            DocumentConfig::new(-5.0, 1.0),
            DocumentConfig::new(0.0, -1.0),
        ];
        for config in configs {
            let err = DocumentBuilder::new(&config)
                .build(&linear_model())
                .unwrap_err();

            assert!(matches!(
                err,
                FloorplanError::Document(DocumentError::InvalidSetting { .. })
            ));
        }
    }

    #[test]
    fn test_missing_orientation_fails() {
        let model = linear_model();
        let mut orientations = model.orientations().clone();
        orientations.remove(&Id::new("C1"));

        let err = DocumentBuilder::default()
            .build(&model.with_orientations(orientations))
            .unwrap_err();

        assert!(matches!(
            err,
            FloorplanError::Orientation(OrientationError::MissingAssignment(id)) if id == Id::new("C1")
        ));
    }

    #[test]
    fn test_connection_outside_section_fails() {
        let ids = [Id::new("L1"), Id::new("U1")];
        let model = LayoutModel::new(
            vec![component("L1", 0.0, 0.0), component("U1", 10.0, 0.0)],
            vec![Connection::new(ids[0], ids[1])],
            Vec::new(),
        )
        .with_orientations(ids.iter().map(|id| (*id, Orientation::Deg0)).collect());

        let err = DocumentBuilder::default().build(&model).unwrap_err();
        assert!(matches!(
            err,
            FloorplanError::Graph(GraphError::ConnectionOutsideSection { .. })
        ));
    }

    #[test]
    fn test_json_is_stable_and_versioned() {
        let builder = DocumentBuilder::default();
        let first = builder.build(&linear_model()).unwrap().to_json().unwrap();
        let second = builder.build(&linear_model()).unwrap().to_json().unwrap();

        assert_eq!(first, second);
        assert!(first.ends_with("}\n"));
        assert!(first.contains("\"type\": \"Conveyor\""));

        let restored = IntermediateDocument::from_json(&first).unwrap();
        assert_eq!(restored.to_json().unwrap(), first);
    }

    #[test]
    fn test_unsupported_version_is_rejected() {
        let json = document_json_with_version("floorplan-cmsd/2");

        let err = IntermediateDocument::from_json(&json).unwrap_err();
        assert!(matches!(
            err,
            DocumentError::UnsupportedVersion { ref found, .. } if found == "floorplan-cmsd/2"
        ));
    }

    fn document_json_with_version(version: &str) -> String {
        let json = DocumentBuilder::default()
            .build(&linear_model())
            .unwrap()
            .to_json()
            .unwrap();
        json.replace(SCHEMA_VERSION, version)
    }

    #[test]
    fn test_dangling_reference_detected() {
        let mut document = DocumentBuilder::default().build(&linear_model()).unwrap();
        document.connections.push(DocumentConnection {
            from: "U1".to_string(),
            to: "X9".to_string(),
            section: 0,
            sequence_index: 2,
        });

        assert_eq!(
            document.check_references(),
            Err(GraphError::DanglingReference {
                object: "X9".to_string(),
                context: "connection",
            })
        );
    }
}
