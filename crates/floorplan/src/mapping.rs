//! Translation of intermediate documents into target object graphs.
//!
//! The [`MappingEngine`] resolves each layout object to a configured target
//! template, derives a sanitized object name and path, converts placement and
//! rotation into a transform, and renames properties to the target's
//! attribute names. Every document connection becomes a connector between
//! the resolved object paths.

use std::{
    collections::{BTreeMap, HashMap, HashSet},
    fs,
    path::Path,
    str::FromStr,
};

use log::{debug, info, trace};
use serde::Serialize;
use serde_json::Value;

use floorplan_core::semantic::{ComponentKind, Orientation};

use crate::{
    config::{MappingConfig, NameCase, NamingConfig},
    document::{IntermediateDocument, LayoutObject},
    error::{DocumentError, MappingError},
};

/// Rotation matrix about the z axis, row-major.
pub type RotationMatrix = [[i32; 3]; 3];

fn rotation_matrix(orientation: Orientation) -> RotationMatrix {
    match orientation {
        Orientation::Deg0 => [[1, 0, 0], [0, 1, 0], [0, 0, 1]],
        Orientation::Deg90 => [[0, -1, 0], [1, 0, 0], [0, 0, 1]],
        Orientation::Deg180 => [[-1, 0, 0], [0, -1, 0], [0, 0, 1]],
        Orientation::Deg270 => [[0, 1, 0], [-1, 0, 0], [0, 0, 1]],
    }
}

/// Position and rotation of a target object.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Transform {
    position: [f64; 3],
    rotation: RotationMatrix,
    degrees: u16,
}

impl Transform {
    pub fn position(&self) -> [f64; 3] {
        self.position
    }

    pub fn rotation(&self) -> RotationMatrix {
        self.rotation
    }

    pub fn degrees(&self) -> u16 {
        self.degrees
    }
}

/// One object to instantiate in the target model.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TargetObject {
    template: String,
    path: String,
    name: String,
    transform: Transform,
    properties: BTreeMap<String, Value>,
}

impl TargetObject {
    pub fn template(&self) -> &str {
        &self.template
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn transform(&self) -> &Transform {
        &self.transform
    }

    /// Target attribute values, keyed by attribute name.
    pub fn properties(&self) -> &BTreeMap<String, Value> {
        &self.properties
    }
}

/// A directed link between two target objects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Connector {
    template: String,
    from: String,
    to: String,
}

impl Connector {
    pub fn template(&self) -> &str {
        &self.template
    }

    /// Path of the upstream object.
    pub fn from(&self) -> &str {
        &self.from
    }

    /// Path of the downstream object.
    pub fn to(&self) -> &str {
        &self.to
    }
}

/// Everything the execution collaborator needs to build the model.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TargetObjectGraph {
    objects: Vec<TargetObject>,
    connectors: Vec<Connector>,
}

impl TargetObjectGraph {
    pub fn objects(&self) -> &[TargetObject] {
        &self.objects
    }

    pub fn connectors(&self) -> &[Connector] {
        &self.connectors
    }

    /// Serializes the graph as pretty-printed JSON ending in a newline.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError::Json`] if serialization fails.
    pub fn to_json(&self) -> Result<String, DocumentError> {
        let mut json = serde_json::to_string_pretty(self)?;
        json.push('\n');
        Ok(json)
    }

    /// Writes the graph to `path`.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError`] if serialization or writing fails.
    pub fn write_to(&self, path: impl AsRef<Path>) -> Result<(), DocumentError> {
        let path = path.as_ref();
        fs::write(path, self.to_json()?)?;
        info!(path:? = path; "Target object graph written");
        Ok(())
    }
}

/// Turns ids into names the target engine accepts.
struct NameSanitizer<'a> {
    config: &'a NamingConfig,
    taken: HashSet<String>,
}

impl<'a> NameSanitizer<'a> {
    fn new(config: &'a NamingConfig) -> Self {
        Self {
            config,
            taken: HashSet::new(),
        }
    }

    fn sanitize(&self, raw: &str) -> String {
        if raw.is_empty() {
            return "unnamed".to_string();
        }

        let cased = match self.config.case() {
            NameCase::Preserve => raw.to_string(),
            NameCase::Upper => raw.to_uppercase(),
            NameCase::Lower => raw.to_lowercase(),
        };
        let invalid = self.config.invalid_chars();
        let mut name: String = cased
            .chars()
            .map(|c| {
                if invalid.contains(c) {
                    self.config.replacement()
                } else {
                    c
                }
            })
            .take(self.config.max_length().max(1))
            .collect();

        if name.starts_with(|c: char| c.is_ascii_digit()) {
            name.insert_str(0, self.config.digit_prefix());
        }
        name
    }

    /// Sanitizes `raw`, appending `_2`, `_3`, ... until the name is unused.
    fn unique(&mut self, raw: &str) -> String {
        let base = self.sanitize(raw);
        let mut name = base.clone();
        let mut counter = 2;
        while self.taken.contains(&name) {
            name = format!("{base}_{counter}");
            counter += 1;
        }
        self.taken.insert(name.clone());
        name
    }
}

/// Translates intermediate documents using a static mapping table.
#[derive(Debug, Clone, Default)]
pub struct MappingEngine {
    config: MappingConfig,
}

impl MappingEngine {
    pub fn new(config: &MappingConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    /// Maps a document onto target objects and connectors.
    ///
    /// # Errors
    ///
    /// - [`MappingError::UnknownKind`] for a `type` that names no kind.
    /// - [`MappingError::UnknownTemplate`] for a kind with no template entry.
    /// - [`MappingError::InvalidOrientation`] for a rotation outside
    ///   0/90/180/270.
    /// - [`MappingError::MissingPlacement`] for an object without placement.
    /// - [`MappingError::BrokenConnector`] for a connection whose endpoint is
    ///   not an object.
    pub fn map(&self, document: &IntermediateDocument) -> Result<TargetObjectGraph, MappingError> {
        info!(
            objects = document.layout_objects().len(),
            connections = document.connections().len(),
            frame = self.config.model_frame();
            "Mapping document"
        );

        let mut names = NameSanitizer::new(self.config.naming());
        let mut paths: HashMap<&str, String> = HashMap::new();
        let mut objects = Vec::with_capacity(document.layout_objects().len());

        for object in document.layout_objects() {
            let target = self.map_object(document, object, &mut names)?;
            paths.insert(object.id(), target.path.clone());
            objects.push(target);
        }

        let connectors = document
            .connections()
            .iter()
            .map(|connection| {
                let resolve = |endpoint: &str| {
                    paths.get(endpoint).cloned().ok_or_else(|| MappingError::BrokenConnector {
                        from: connection.from().to_string(),
                        to: connection.to().to_string(),
                        missing: endpoint.to_string(),
                    })
                };
                Ok(Connector {
                    template: self.config.connector().to_string(),
                    from: resolve(connection.from())?,
                    to: resolve(connection.to())?,
                })
            })
            .collect::<Result<Vec<_>, MappingError>>()?;

        info!(objects = objects.len(), connectors = connectors.len(); "Document mapped");
        Ok(TargetObjectGraph {
            objects,
            connectors,
        })
    }

    fn map_object(
        &self,
        document: &IntermediateDocument,
        object: &LayoutObject,
        names: &mut NameSanitizer<'_>,
    ) -> Result<TargetObject, MappingError> {
        let kind =
            ComponentKind::from_str(object.kind()).map_err(|_| MappingError::UnknownKind {
                object: object.id().to_string(),
                kind: object.kind().to_string(),
            })?;
        let template = self
            .config
            .template(kind)
            .ok_or(MappingError::UnknownTemplate(kind))?;

        let invalid_orientation = |degrees: i64| MappingError::InvalidOrientation {
            object: object.id().to_string(),
            degrees,
        };
        Orientation::try_from(object.orientation())
            .map_err(|_| invalid_orientation(object.orientation()))?;

        let placement = document
            .placement(object.id())
            .ok_or_else(|| MappingError::MissingPlacement(object.id().to_string()))?;
        let rotation = Orientation::try_from(placement.rotation())
            .map_err(|_| invalid_orientation(placement.rotation()))?;

        let name = names.unique(object.id());
        let path = template
            .path()
            .replace("{frame}", self.config.model_frame())
            .replace("{name}", &name)
            .replace("{id}", object.id())
            .replace("{kind}", kind.as_str());

        let mut properties = BTreeMap::from([("name".to_string(), Value::from(name.clone()))]);
        for (&property, &value) in object.properties() {
            properties.insert(template.attribute(property).to_string(), Value::from(value));
        }

        trace!(
            object = object.id(),
            path = path.as_str(),
            template = template.template();
            "Mapped object"
        );
        debug!(object = object.id(), rotation:% = rotation; "Object transform");

        Ok(TargetObject {
            template: template.template().to_string(),
            path,
            name,
            transform: Transform {
                position: [placement.x(), placement.y(), 0.0],
                rotation: rotation_matrix(rotation),
                degrees: rotation.degrees(),
            },
            properties,
        })
    }
}
