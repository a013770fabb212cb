//! Detection documents produced by the upstream layout detector.
//!
//! A detection document lists components with their bounding boxes and the
//! raw connection hypotheses between them:
//!
//! ```json
//! {
//!   "components": [
//!     { "id": "L1", "position": { "x": 0, "y": 0 }, "dimensions": { "width": 5, "height": 5 } },
//!     { "id": "C1", "kind": "Conveyor", "position": { "x": 10, "y": 0 },
//!       "dimensions": { "width": 8, "height": 2 }, "label": "infeed" }
//!   ],
//!   "connections": [ { "from": "L1", "to": "C1" } ]
//! }
//! ```

use log::debug;
use serde::Deserialize;

use floorplan_core::{
    geometry::{Point, Size},
    identifier::Id,
    semantic::{Component, ComponentKind},
};

use crate::{
    error::{Diagnostic, DiagnosticCollector, ErrorCode, ParseError},
    json::{locate_or_anchor, locate_string, syntax_diagnostic},
    span::Span,
};

/// A directed connection hypothesis between two detected components.
///
/// Endpoints are kept as written; they may name a component id or a
/// component label and are resolved by the flow graph builder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionHypothesis {
    from: String,
    to: String,
}

impl ConnectionHypothesis {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }

    pub fn from(&self) -> &str {
        &self.from
    }

    pub fn to(&self) -> &str {
        &self.to
    }
}

/// Validated detections: typed components plus raw connection hypotheses.
#[derive(Debug, Clone, Default)]
pub struct Detections {
    components: Vec<Component>,
    connections: Vec<ConnectionHypothesis>,
}

impl Detections {
    pub fn new(components: Vec<Component>, connections: Vec<ConnectionHypothesis>) -> Self {
        Self {
            components,
            connections,
        }
    }

    pub fn components(&self) -> &[Component] {
        &self.components
    }

    pub fn connections(&self) -> &[ConnectionHypothesis] {
        &self.connections
    }
}

#[derive(Debug, Deserialize)]
struct RawDocument {
    #[serde(default)]
    components: Vec<RawComponent>,
    #[serde(default)]
    connections: Vec<RawConnection>,
}

#[derive(Debug, Deserialize)]
struct RawComponent {
    id: String,
    #[serde(default, alias = "type")]
    kind: Option<String>,
    position: RawPoint,
    #[serde(alias = "size")]
    dimensions: RawSize,
    #[serde(default)]
    label: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawPoint {
    x: f64,
    y: f64,
}

#[derive(Debug, Deserialize)]
struct RawSize {
    #[serde(alias = "w")]
    width: f64,
    #[serde(alias = "h")]
    height: f64,
}

#[derive(Debug, Deserialize)]
struct RawConnection {
    from: String,
    to: String,
}

/// Parses a detection document.
///
/// Content problems in every component are collected before failing, so a
/// single call reports all unknown kinds, empty ids and invalid geometry.
///
/// # Errors
///
/// Returns a [`ParseError`] with:
/// - E001 when the text is not JSON or lacks required fields
/// - E100 for an unknown `kind`
/// - E101 when `kind` is absent and the id prefix maps to no kind
/// - E102 for non-finite coordinates or non-positive dimensions
/// - E103 for an empty component id
pub fn parse_detections(source: &str) -> Result<Detections, ParseError> {
    let raw: RawDocument = serde_json::from_str(source)
        .map_err(|err| syntax_diagnostic(source, 0, &err, "detection document"))?;

    let mut collector = DiagnosticCollector::new();
    let mut components = Vec::with_capacity(raw.components.len());

    // Component objects appear in document order after the "components" key.
    let mut cursor = locate_string(source, "components", 0).map_or(0, |span| span.end());

    for raw_component in raw.components {
        let object_start = cursor;
        let id_span = locate_or_anchor(source, &raw_component.id, object_start);
        cursor = id_span.end().max(cursor);

        if let Some(component) =
            validate_component(source, raw_component, object_start, id_span, &mut collector)
        {
            components.push(component);
        }
    }

    collector.finish()?;

    let connections: Vec<_> = raw
        .connections
        .into_iter()
        .map(|c| ConnectionHypothesis::new(c.from.trim(), c.to.trim()))
        .collect();

    debug!(
        components = components.len(),
        connections = connections.len();
        "Parsed detections"
    );

    Ok(Detections::new(components, connections))
}

fn validate_component(
    source: &str,
    raw: RawComponent,
    object_start: usize,
    id_span: Span,
    collector: &mut DiagnosticCollector,
) -> Option<Component> {
    let id = raw.id.trim();
    if id.is_empty() {
        collector.emit(
            Diagnostic::error("component id must not be empty")
                .with_code(ErrorCode::E103)
                .with_label(id_span, "empty id"),
        );
        return None;
    }

    let kind = resolve_kind(source, id, raw.kind.as_deref(), object_start, id_span, collector);

    let position = Point::new(raw.position.x, raw.position.y);
    let position_ok = position.is_finite();
    if !position_ok {
        collector.emit(geometry_diagnostic(
            source,
            id,
            "position",
            "coordinates must be finite numbers",
            object_start,
            id_span,
        ));
    }

    let dimensions = Size::new(raw.dimensions.width, raw.dimensions.height);
    let dimensions_ok = dimensions.is_positive();
    if !dimensions_ok {
        collector.emit(geometry_diagnostic(
            source,
            id,
            "dimensions",
            "width and height must be positive numbers",
            object_start,
            id_span,
        ));
    }

    let kind = kind?;
    if !(position_ok && dimensions_ok) {
        return None;
    }

    let component = Component::new(Id::new(id), kind, position, dimensions);
    match raw.label.as_deref().map(str::trim) {
        Some(label) if !label.is_empty() => Some(component.with_label(label)),
        _ => Some(component),
    }
}

fn resolve_kind(
    source: &str,
    id: &str,
    kind: Option<&str>,
    object_start: usize,
    id_span: Span,
    collector: &mut DiagnosticCollector,
) -> Option<ComponentKind> {
    match kind {
        Some(name) => match name.parse::<ComponentKind>() {
            Ok(kind) => Some(kind),
            Err(err) => {
                let kind_span = locate_near(source, name, object_start, id_span);
                collector.emit(
                    Diagnostic::error(format!("{err} for component `{id}`"))
                        .with_code(ErrorCode::E100)
                        .with_label(kind_span, "unknown kind")
                        .with_secondary_label(id_span, "in this component")
                        .with_help("expected one of Source, Conveyor, Machine, Diverter, Sink"),
                );
                None
            }
        },
        None => {
            let inferred = Id::new(id).prefix().and_then(ComponentKind::from_prefix);
            if inferred.is_none() {
                collector.emit(
                    Diagnostic::error(format!("cannot infer the kind of component `{id}`"))
                        .with_code(ErrorCode::E101)
                        .with_label(id_span, "no kind and an unrecognized id prefix")
                        .with_help(
                            "add a \"kind\" field, or use one of the id prefixes L, C, M, D, U",
                        ),
                );
            }
            inferred
        }
    }
}

fn geometry_diagnostic(
    source: &str,
    id: &str,
    field: &str,
    reason: &str,
    object_start: usize,
    id_span: Span,
) -> Diagnostic {
    let alias = if field == "dimensions" { "size" } else { field };
    let field_span = locate_string(source, field, id_span.start())
        .or_else(|| locate_string(source, alias, id_span.start()))
        .unwrap_or_else(|| locate_near(source, field, object_start, id_span));

    Diagnostic::error(format!("component `{id}` has invalid {field}"))
        .with_code(ErrorCode::E102)
        .with_label(field_span, reason)
        .with_secondary_label(id_span, "in this component")
}

/// Locates a value of the current component object.
///
/// Fields usually follow the id, so the search starts there and falls back to
/// the start of the object.
fn locate_near(source: &str, value: &str, object_start: usize, id_span: Span) -> Span {
    locate_string(source, value, id_span.start())
        .or_else(|| locate_string(source, value, object_start))
        .unwrap_or(id_span)
}
