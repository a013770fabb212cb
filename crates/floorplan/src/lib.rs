//! Floorplan - compiles detected factory layouts into simulation models.
//!
//! Detected components and flow connections go in; a validated, versioned
//! intermediate document and a target object graph for a simulation engine
//! come out. The pipeline runs strictly forward:
//!
//! ```text
//! Detections
//!     ↓ structure     (flow graph + sections)
//! LayoutModel
//!     ↓ orientation   (section-scoped oracle judgments)
//!     ↓ properties    (units normalized, required fields enforced)
//!     ↓ document
//! IntermediateDocument
//!     ↓ mapping
//! TargetObjectGraph
//!     ↓ handoff       (external execution)
//! ```
//!
//! Every stage validates its input and returns a new value; nothing is
//! mutated in place.

pub mod config;
pub mod document;
pub mod handoff;
pub mod mapping;
pub mod model;
pub mod orientation;
pub mod properties;
pub mod structure;

mod error;

pub use floorplan_core::{geometry, identifier, semantic, units};
pub use floorplan_parser::{Detections, ExtractedProperties, RawJudgments};

pub use error::{
    AutomationError, DocumentError, FloorplanError, GraphError, MappingError, OrientationError,
    PropertyValidationError,
};

use std::{
    fs,
    path::{Path, PathBuf},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use log::{debug, info, trace};

use config::AppConfig;
use document::{DocumentBuilder, IntermediateDocument};
use handoff::{Automation, ExecutionReport, HandoffError};
use mapping::{MappingEngine, TargetObjectGraph};
use model::LayoutModel;
use orientation::{OrientationEngine, OrientationOracle, ResolutionReport};
use properties::PropertyAssociator;
use structure::FlowGraphBuilder;

/// File name of the persisted intermediate document.
pub const DOCUMENT_FILE: &str = "document.json";

/// File name of the persisted target object graph.
pub const TARGET_FILE: &str = "target.json";

/// Shared flag requesting that a compilation stop at the next stage boundary.
///
/// Clones observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    fn check(&self, stage: &str) -> Result<(), FloorplanError> {
        if self.is_cancelled() {
            info!(stage; "Compilation cancelled");
            return Err(FloorplanError::Cancelled);
        }
        trace!(stage; "Stage boundary");
        Ok(())
    }
}

/// Everything a compilation run consumes besides configuration.
#[derive(Debug, Clone)]
pub struct CompileInput {
    detections: Detections,
    properties: ExtractedProperties,
    image: Option<String>,
}

impl CompileInput {
    pub fn new(detections: Detections) -> Self {
        Self {
            detections,
            properties: ExtractedProperties::default(),
            image: None,
        }
    }

    pub fn with_properties(mut self, properties: ExtractedProperties) -> Self {
        self.properties = properties;
        self
    }

    /// Sets the source image reference forwarded to the orientation oracle.
    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.image = Some(image.into());
        self
    }

    pub fn detections(&self) -> &Detections {
        &self.detections
    }

    pub fn properties(&self) -> &ExtractedProperties {
        &self.properties
    }

    pub fn image(&self) -> Option<&str> {
        self.image.as_deref()
    }
}

/// Results of a full compilation run.
#[derive(Debug, Clone)]
pub struct Compilation {
    model: LayoutModel,
    report: ResolutionReport,
    document: IntermediateDocument,
    target: TargetObjectGraph,
}

impl Compilation {
    /// The final layout model, with orientations and properties.
    pub fn model(&self) -> &LayoutModel {
        &self.model
    }

    pub fn report(&self) -> &ResolutionReport {
        &self.report
    }

    pub fn document(&self) -> &IntermediateDocument {
        &self.document
    }

    pub fn target(&self) -> &TargetObjectGraph {
        &self.target
    }
}

/// Runs the layout-to-model pipeline, stage by stage or end to end.
///
/// # Examples
///
/// ```rust,no_run
/// use floorplan::{CancelFlag, CompileInput, LayoutCompiler, config::AppConfig};
/// use floorplan::orientation::StaticOracle;
///
/// # async fn run() -> Result<(), floorplan::FloorplanError> {
/// let compiler = LayoutCompiler::new(AppConfig::default());
///
/// let source = std::fs::read_to_string("detections.json")?;
/// let detections = compiler.parse_detections(&source)?;
///
/// let oracle = StaticOracle::default();
/// let compilation = compiler
///     .compile(&CompileInput::new(detections), &oracle, &CancelFlag::new())
///     .await?;
///
/// println!("{}", compilation.document().to_json()?);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct LayoutCompiler {
    config: AppConfig,
}

impl LayoutCompiler {
    /// Create a new compiler with the given configuration.
    pub fn new(config: AppConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Parse a detection document.
    ///
    /// # Errors
    ///
    /// Returns [`FloorplanError::Parse`] carrying the diagnostics and the
    /// source text.
    pub fn parse_detections(&self, source: &str) -> Result<Detections, FloorplanError> {
        info!("Parsing detections");
        trace!(source; "Detection source");
        floorplan_parser::parse_detections(source)
            .map_err(|err| FloorplanError::new_parse_error(err, source))
    }

    /// Parse a property extraction document.
    ///
    /// # Errors
    ///
    /// Returns [`FloorplanError::Parse`] carrying the diagnostics and the
    /// source text.
    pub fn parse_properties(&self, source: &str) -> Result<ExtractedProperties, FloorplanError> {
        info!("Parsing extracted properties");
        floorplan_parser::parse_properties(source)
            .map_err(|err| FloorplanError::new_parse_error(err, source))
    }

    /// Build and validate the flow graph, and decompose it into sections.
    ///
    /// # Errors
    ///
    /// Returns [`FloorplanError::Graph`] for structural problems.
    pub fn build_graph(&self, detections: &Detections) -> Result<LayoutModel, FloorplanError> {
        Ok(FlowGraphBuilder::new(self.config.graph()).build(detections)?)
    }

    /// Resolve an orientation for every component.
    ///
    /// # Errors
    ///
    /// Returns [`FloorplanError::Orientation`] when resolution stalls or
    /// runs out of iterations.
    pub async fn resolve_orientations(
        &self,
        model: &LayoutModel,
        oracle: &dyn OrientationOracle,
        image: Option<&str>,
    ) -> Result<(LayoutModel, ResolutionReport), FloorplanError> {
        Ok(OrientationEngine::new(self.config.orientation())
            .resolve(model, oracle, image)
            .await?)
    }

    /// Attach validated properties to every component.
    ///
    /// # Errors
    ///
    /// Returns [`FloorplanError::Property`] for missing or malformed
    /// properties, or [`FloorplanError::Orientation`] when orientations are
    /// incomplete.
    pub fn associate_properties(
        &self,
        model: &LayoutModel,
        properties: &ExtractedProperties,
    ) -> Result<LayoutModel, FloorplanError> {
        PropertyAssociator::new(self.config.properties()).associate(model, properties)
    }

    /// Build the intermediate document.
    ///
    /// # Errors
    ///
    /// Returns an error when the document settings are invalid or the
    /// consistency pass fails.
    pub fn build_document(
        &self,
        model: &LayoutModel,
    ) -> Result<IntermediateDocument, FloorplanError> {
        DocumentBuilder::new(self.config.document()).build(model)
    }

    /// Map the intermediate document onto the target object graph.
    ///
    /// # Errors
    ///
    /// Returns [`FloorplanError::Mapping`] for unknown kinds or templates,
    /// invalid orientations and broken connectors.
    pub fn map_document(
        &self,
        document: &IntermediateDocument,
    ) -> Result<TargetObjectGraph, FloorplanError> {
        Ok(MappingEngine::new(self.config.mapping()).map(document)?)
    }

    /// Run every stage up to and including mapping.
    ///
    /// `cancel` is checked at every stage boundary.
    ///
    /// # Errors
    ///
    /// Returns the first stage error, or [`FloorplanError::Cancelled`].
    pub async fn compile(
        &self,
        input: &CompileInput,
        oracle: &dyn OrientationOracle,
        cancel: &CancelFlag,
    ) -> Result<Compilation, FloorplanError> {
        let (model, report, document) = self.compile_document(input, oracle, cancel).await?;

        cancel.check("mapping")?;
        let target = self.map_document(&document)?;

        info!(objects = target.objects().len(); "Compilation finished");
        Ok(Compilation {
            model,
            report,
            document,
            target,
        })
    }

    /// Like [`LayoutCompiler::compile`], persisting artifacts into `dir`.
    ///
    /// [`DOCUMENT_FILE`] is written before mapping starts, so a mapping
    /// failure still leaves the document behind. [`TARGET_FILE`] is written
    /// after mapping succeeds.
    ///
    /// # Errors
    ///
    /// Returns the first stage error, I/O and serialization failures, or
    /// [`FloorplanError::Cancelled`].
    pub async fn compile_to_dir(
        &self,
        input: &CompileInput,
        oracle: &dyn OrientationOracle,
        cancel: &CancelFlag,
        dir: &Path,
    ) -> Result<Compilation, FloorplanError> {
        let (model, report, document) = self.compile_document(input, oracle, cancel).await?;

        fs::create_dir_all(dir)?;
        document.write_to(dir.join(DOCUMENT_FILE))?;

        cancel.check("mapping")?;
        let target = self.map_document(&document)?;
        target.write_to(dir.join(TARGET_FILE))?;

        info!(dir:? = dir; "Compilation artifacts written");
        Ok(Compilation {
            model,
            report,
            document,
            target,
        })
    }

    /// Hand a target object graph to the execution collaborator.
    ///
    /// `document` is the path of the persisted intermediate document; it is
    /// carried by every resulting error.
    ///
    /// # Errors
    ///
    /// Returns [`FloorplanError::Automation`] when the collaborator is
    /// unreachable, times out, or reports failure. Nothing is retried.
    pub async fn execute(
        &self,
        target: &TargetObjectGraph,
        destination: &Path,
        document: &Path,
        automation: &dyn Automation,
    ) -> Result<ExecutionReport, FloorplanError> {
        info!(destination:? = destination; "Handing off target graph");
        let document = PathBuf::from(document);

        let report = automation
            .execute(target, destination)
            .await
            .map_err(|err| match err {
                HandoffError::Unreachable(reason) => AutomationError::Unreachable {
                    document: document.clone(),
                    reason,
                },
                HandoffError::TimedOut(timeout) => AutomationError::TimedOut {
                    document: document.clone(),
                    timeout_ms: timeout.as_millis() as u64,
                },
            })?;

        if !report.success() {
            return Err(AutomationError::Failed {
                document,
                log: report.log().map(str::to_string),
            }
            .into());
        }
        debug!(log = report.log().unwrap_or_default(); "Automation report");
        Ok(report)
    }

    async fn compile_document(
        &self,
        input: &CompileInput,
        oracle: &dyn OrientationOracle,
        cancel: &CancelFlag,
    ) -> Result<(LayoutModel, ResolutionReport, IntermediateDocument), FloorplanError> {
        cancel.check("structure")?;
        let model = self.build_graph(input.detections())?;

        cancel.check("orientation")?;
        let (model, report) = self
            .resolve_orientations(&model, oracle, input.image())
            .await?;

        cancel.check("properties")?;
        let model = self.associate_properties(&model, input.properties())?;

        cancel.check("document")?;
        let document = self.build_document(&model)?;

        Ok((model, report, document))
    }
}
