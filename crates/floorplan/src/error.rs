//! Error types for Floorplan operations.
//!
//! Each pipeline stage has its own error enum; [`FloorplanError`] wraps them
//! all for callers that drive the full compilation.

use std::{
    io,
    path::{Path, PathBuf},
};

use thiserror::Error;

use floorplan_core::{
    identifier::Id,
    semantic::{ComponentKind, PropertyName},
};
use floorplan_parser::ParseError;

fn join_ids(ids: &[Id]) -> String {
    ids.iter()
        .map(|id| format!("`{id}`"))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Structural problems in the component graph.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    #[error("component `{0}` is defined multiple times")]
    DuplicateComponent(Id),

    #[error("connection `{from}` -> `{to}` references unknown component `{endpoint}`")]
    UnknownEndpoint {
        endpoint: String,
        from: String,
        to: String,
    },

    #[error("connection endpoint `{endpoint}` matches several component labels: {}", join_ids(.candidates))]
    AmbiguousEndpoint { endpoint: String, candidates: Vec<Id> },

    #[error("component `{0}` is connected to itself")]
    SelfLoop(Id),

    #[error("connection `{from}` -> `{to}` is defined multiple times")]
    DuplicateConnection { from: Id, to: Id },

    #[error("{kind} `{id}` has {degree} {direction} connections, at most one is allowed")]
    IllegalBranching {
        id: Id,
        kind: ComponentKind,
        direction: &'static str,
        degree: usize,
    },

    #[error("source `{0}` has an incoming connection")]
    SourceHasIncoming(Id),

    #[error("sink `{0}` has an outgoing connection")]
    SinkHasOutgoing(Id),

    #[error("unexpected cycle through components {}", join_ids(.components))]
    Cycle { components: Vec<Id> },

    #[error("connection `{from}` -> `{to}` does not belong to any section")]
    ConnectionOutsideSection { from: String, to: String },

    #[error("{context} references unknown layout object `{object}`")]
    DanglingReference { object: String, context: &'static str },
}

/// Failures of orientation resolution.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrientationError {
    #[error("orientation resolution stalled, unresolved components: {}", join_ids(.unresolved))]
    Stalled { unresolved: Vec<Id> },

    #[error(
        "orientation resolution reached the limit of {iterations} iterations, unresolved components: {}",
        join_ids(.unresolved)
    )]
    IterationCapReached { iterations: usize, unresolved: Vec<Id> },

    #[error("component `{0}` has no orientation")]
    MissingAssignment(Id),
}

impl OrientationError {
    /// Returns the components left without an orientation.
    pub fn unresolved(&self) -> &[Id] {
        match self {
            Self::Stalled { unresolved } | Self::IterationCapReached { unresolved, .. } => {
                unresolved
            }
            Self::MissingAssignment(id) => std::slice::from_ref(id),
        }
    }
}

/// Missing or malformed component properties.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PropertyValidationError {
    #[error("component `{id}` is missing required property `{property}`")]
    Missing { id: Id, property: PropertyName },

    #[error("component `{id}` has malformed property `{property}`: {reason}")]
    Malformed {
        id: Id,
        property: PropertyName,
        reason: String,
    },
}

/// Serialization and schema problems of persisted artifacts.
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("document setting `{setting}` is invalid: {value}")]
    InvalidSetting { setting: &'static str, value: f64 },

    #[error("unsupported document schema `{found}`, expected `{expected}`")]
    UnsupportedVersion { found: String, expected: &'static str },

    #[error("document serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("document I/O failed: {0}")]
    Io(#[from] io::Error),
}

/// Failures while translating a document into a target object graph.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MappingError {
    #[error("layout object `{object}` has unknown type `{kind}`")]
    UnknownKind { object: String, kind: String },

    #[error("no template is configured for kind {0}")]
    UnknownTemplate(ComponentKind),

    #[error("layout object `{object}` has invalid orientation {degrees}")]
    InvalidOrientation { object: String, degrees: i64 },

    #[error("layout object `{0}` has no placement")]
    MissingPlacement(String),

    #[error("connector `{from}` -> `{to}` references unknown object `{missing}`")]
    BrokenConnector {
        from: String,
        to: String,
        missing: String,
    },
}

/// Failures reported by, or while reaching, the execution collaborator.
///
/// Every variant carries the path of the persisted intermediate document so
/// the run can be diagnosed without recompiling.
#[derive(Debug, Error)]
pub enum AutomationError {
    #[error("automation collaborator is unreachable: {reason} (document: {})", .document.display())]
    Unreachable { document: PathBuf, reason: String },

    #[error("automation collaborator timed out after {timeout_ms} ms (document: {})", .document.display())]
    TimedOut { document: PathBuf, timeout_ms: u64 },

    #[error("automation collaborator reported failure (document: {})", .document.display())]
    Failed {
        document: PathBuf,
        log: Option<String>,
    },
}

impl AutomationError {
    /// Returns the path of the intermediate document of the failed run.
    pub fn document(&self) -> &Path {
        match self {
            Self::Unreachable { document, .. }
            | Self::TimedOut { document, .. }
            | Self::Failed { document, .. } => document,
        }
    }
}

/// The main error type for Floorplan operations.
///
/// # Diagnostic Variants
///
/// The `Parse` variant keeps the input text next to its diagnostics so the
/// reported spans can be rendered against it.
#[derive(Debug, Error)]
pub enum FloorplanError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("{err}")]
    Parse { err: ParseError, src: String },

    #[error("Graph error: {0}")]
    Graph(#[from] GraphError),

    #[error("Orientation error: {0}")]
    Orientation(#[from] OrientationError),

    #[error("Property error: {0}")]
    Property(#[from] PropertyValidationError),

    #[error("Document error: {0}")]
    Document(#[from] DocumentError),

    #[error("Mapping error: {0}")]
    Mapping(#[from] MappingError),

    #[error("Automation error: {0}")]
    Automation(#[from] AutomationError),

    #[error("compilation cancelled")]
    Cancelled,
}

impl FloorplanError {
    /// Create a new `Parse` error with the associated source text.
    pub fn new_parse_error(err: ParseError, src: impl Into<String>) -> Self {
        Self::Parse {
            err,
            src: src.into(),
        }
    }
}
