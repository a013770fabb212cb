//! Configuration types for the Floorplan compiler.
//!
//! Every type implements [`serde::Deserialize`] and every field has a default,
//! so a configuration file only needs to name what it changes.
//!
//! # Overview
//!
//! - [`AppConfig`] - Top-level configuration combining every stage's settings.
//! - [`GraphConfig`] - Topology class accepted by the flow graph builder.
//! - [`OrientationConfig`] - Iteration cap and oracle retry policy.
//! - [`PropertiesConfig`] - Accepted value ranges of extracted properties.
//! - [`DocumentConfig`] - Placement margin, scale and calibration.
//! - [`MappingConfig`] - Templates, object paths, attribute names and naming rules.
//! - [`AutomationConfig`] - External execution command.
//!
//! # Example
//!
//! ```
//! # use floorplan::config::{AppConfig, Topology};
//! let config = AppConfig::default();
//! assert_eq!(config.graph().topology(), Topology::Linear);
//! assert_eq!(config.orientation().max_iterations(), 10);
//! ```

use std::{collections::BTreeMap, time::Duration};

use serde::Deserialize;

use floorplan_core::semantic::{ComponentKind, PropertyName};

use crate::error::DocumentError;

/// Top-level configuration combining every stage's settings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    graph: GraphConfig,

    #[serde(default)]
    orientation: OrientationConfig,

    #[serde(default)]
    properties: PropertiesConfig,

    #[serde(default)]
    document: DocumentConfig,

    #[serde(default)]
    mapping: MappingConfig,

    #[serde(default)]
    automation: AutomationConfig,
}

impl AppConfig {
    pub fn graph(&self) -> &GraphConfig {
        &self.graph
    }

    pub fn orientation(&self) -> &OrientationConfig {
        &self.orientation
    }

    pub fn properties(&self) -> &PropertiesConfig {
        &self.properties
    }

    pub fn document(&self) -> &DocumentConfig {
        &self.document
    }

    pub fn mapping(&self) -> &MappingConfig {
        &self.mapping
    }

    pub fn automation(&self) -> &AutomationConfig {
        &self.automation
    }

    pub fn with_graph(mut self, graph: GraphConfig) -> Self {
        self.graph = graph;
        self
    }

    pub fn with_orientation(mut self, orientation: OrientationConfig) -> Self {
        self.orientation = orientation;
        self
    }

    pub fn with_properties(mut self, properties: PropertiesConfig) -> Self {
        self.properties = properties;
        self
    }

    pub fn with_document(mut self, document: DocumentConfig) -> Self {
        self.document = document;
        self
    }

    pub fn with_mapping(mut self, mapping: MappingConfig) -> Self {
        self.mapping = mapping;
        self
    }

    pub fn with_automation(mut self, automation: AutomationConfig) -> Self {
        self.automation = automation;
        self
    }
}

/// Topology class of a layout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Topology {
    /// Material flows from sources to sinks without returning; cycles are errors.
    #[default]
    Linear,
    /// Material may circulate; cycles are accepted.
    Looped,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GraphConfig {
    #[serde(default)]
    topology: Topology,
}

impl GraphConfig {
    pub fn new(topology: Topology) -> Self {
        Self { topology }
    }

    pub fn topology(&self) -> Topology {
        self.topology
    }
}

/// Iteration cap and oracle retry policy of orientation resolution.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OrientationConfig {
    /// Maximum number of passes over the unresolved sections.
    max_iterations: usize,

    /// Timeout of a single oracle call, in milliseconds.
    attempt_timeout_ms: u64,

    /// Number of oracle calls per section and pass before giving up.
    max_attempts: u32,

    /// Delay before the first retry, in milliseconds; doubles on each retry.
    backoff_base_ms: u64,

    /// Upper bound of the retry delay, in milliseconds.
    backoff_max_ms: u64,

    /// Kinds the oracle is never asked about; they are assigned 0°.
    unjudged_kinds: Vec<ComponentKind>,
}

impl Default for OrientationConfig {
    fn default() -> Self {
        Self {
            max_iterations: 10,
            attempt_timeout_ms: 30_000,
            max_attempts: 3,
            backoff_base_ms: 500,
            backoff_max_ms: 8_000,
            unjudged_kinds: Vec::new(),
        }
    }
}

impl OrientationConfig {
    pub fn max_iterations(&self) -> usize {
        self.max_iterations
    }

    pub fn attempt_timeout(&self) -> Duration {
        Duration::from_millis(self.attempt_timeout_ms)
    }

    /// Returns the number of attempts per section, never less than one.
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms)
    }

    pub fn backoff_max(&self) -> Duration {
        Duration::from_millis(self.backoff_max_ms)
    }

    pub fn unjudged_kinds(&self) -> &[ComponentKind] {
        &self.unjudged_kinds
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_backoff(mut self, base: Duration, max: Duration) -> Self {
        self.backoff_base_ms = base.as_millis() as u64;
        self.backoff_max_ms = max.as_millis() as u64;
        self
    }

    pub fn with_unjudged_kinds(mut self, kinds: Vec<ComponentKind>) -> Self {
        self.unjudged_kinds = kinds;
        self
    }
}

/// How image coordinates are converted to model units.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Calibration {
    /// Multiply by the configured `scale`.
    #[default]
    Fixed,
    /// Derive pixels per meter from the first component with a measured
    /// length or width; use `scale` when no component has one.
    Reference,
}

/// Placement settings of the intermediate document.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DocumentConfig {
    /// Coordinate the smallest x/y across all components is shifted to.
    margin: f64,

    /// Factor converting image units to model units.
    scale: f64,

    calibration: Calibration,
}

impl Default for DocumentConfig {
    fn default() -> Self {
        Self {
            margin: 0.0,
            scale: 1.0,
            calibration: Calibration::Fixed,
        }
    }
}

impl DocumentConfig {
    pub fn new(margin: f64, scale: f64) -> Self {
        Self {
            margin,
            scale,
            ..Self::default()
        }
    }

    pub fn margin(&self) -> f64 {
        self.margin
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn calibration(&self) -> Calibration {
        self.calibration
    }

    pub fn with_calibration(mut self, calibration: Calibration) -> Self {
        self.calibration = calibration;
        self
    }

    /// Checks that placements stay non-negative and dimensions positive.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError::InvalidSetting`] for a negative or non-finite
    /// margin, or a scale that is not a finite positive number.
    pub fn validate(&self) -> Result<(), DocumentError> {
        if !self.margin.is_finite() || self.margin < 0.0 {
            return Err(DocumentError::InvalidSetting {
                setting: "margin",
                value: self.margin,
            });
        }
        if !self.scale.is_finite() || self.scale <= 0.0 {
            return Err(DocumentError::InvalidSetting {
                setting: "scale",
                value: self.scale,
            });
        }
        Ok(())
    }
}

/// Inclusive bounds a property value must fall within, in canonical units.
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ValueRange {
    min: Option<f64>,
    max: Option<f64>,
}

impl ValueRange {
    pub fn new(min: Option<f64>, max: Option<f64>) -> Self {
        Self { min, max }
    }

    pub fn min(&self) -> Option<f64> {
        self.min
    }

    pub fn max(&self) -> Option<f64> {
        self.max
    }

    pub fn contains(&self, value: f64) -> bool {
        self.min.is_none_or(|min| value >= min) && self.max.is_none_or(|max| value <= max)
    }
}

/// Validation settings for extracted properties.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PropertiesConfig {
    ranges: BTreeMap<PropertyName, ValueRange>,
}

impl PropertiesConfig {
    /// Returns the accepted range of a property, if one is configured.
    pub fn range(&self, property: PropertyName) -> Option<ValueRange> {
        self.ranges.get(&property).copied()
    }

    pub fn with_range(mut self, property: PropertyName, range: ValueRange) -> Self {
        self.ranges.insert(property, range);
        self
    }
}

/// Letter case applied to sanitized object names.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NameCase {
    #[default]
    Preserve,
    Upper,
    Lower,
}

/// Rules turning component ids and labels into target object names.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NamingConfig {
    invalid_chars: String,
    replacement: char,
    max_length: usize,
    digit_prefix: String,
    case: NameCase,
}

impl Default for NamingConfig {
    fn default() -> Self {
        Self {
            invalid_chars: " -./\\:;,()[]{}<>\"'".to_string(),
            replacement: '_',
            max_length: 32,
            digit_prefix: "obj_".to_string(),
            case: NameCase::Preserve,
        }
    }
}

impl NamingConfig {
    pub fn invalid_chars(&self) -> &str {
        &self.invalid_chars
    }

    pub fn replacement(&self) -> char {
        self.replacement
    }

    pub fn max_length(&self) -> usize {
        self.max_length
    }

    pub fn digit_prefix(&self) -> &str {
        &self.digit_prefix
    }

    pub fn case(&self) -> NameCase {
        self.case
    }

    pub fn with_max_length(mut self, max_length: usize) -> Self {
        self.max_length = max_length;
        self
    }

    pub fn with_case(mut self, case: NameCase) -> Self {
        self.case = case;
        self
    }
}

/// Target template and naming of one component kind.
#[derive(Debug, Clone, Deserialize)]
pub struct TemplateConfig {
    template: String,

    #[serde(default = "default_path")]
    path: String,

    #[serde(default)]
    attributes: BTreeMap<PropertyName, String>,
}

fn default_path() -> String {
    "{frame}.{name}".to_string()
}

impl TemplateConfig {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
            path: default_path(),
            attributes: BTreeMap::new(),
        }
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    pub fn with_attribute(mut self, property: PropertyName, attribute: impl Into<String>) -> Self {
        self.attributes.insert(property, attribute.into());
        self
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    /// Returns the object path pattern with `{frame}`, `{name}`, `{id}` and
    /// `{kind}` placeholders.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Returns the target attribute name of a property, falling back to the
    /// canonical property name.
    pub fn attribute(&self, property: PropertyName) -> &str {
        self.attributes
            .get(&property)
            .map_or(property.as_str(), String::as_str)
    }
}

/// Static mapping table from document objects to target objects.
///
/// A `templates` table given in a configuration file replaces the built-in
/// table entirely.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MappingConfig {
    model_frame: String,
    connector: String,
    naming: NamingConfig,
    templates: BTreeMap<ComponentKind, TemplateConfig>,
}

impl Default for MappingConfig {
    fn default() -> Self {
        use PropertyName as P;

        let templates = BTreeMap::from([
            (
                ComponentKind::Source,
                TemplateConfig::new(".MaterialFlow.Source").with_attribute(P::Interval, "Interval"),
            ),
            (
                ComponentKind::Conveyor,
                TemplateConfig::new(".MaterialFlow.Line")
                    .with_attribute(P::Length, "Length")
                    .with_attribute(P::Speed, "Speed")
                    .with_attribute(P::Width, "Width"),
            ),
            (
                ComponentKind::Machine,
                TemplateConfig::new(".MaterialFlow.SingleProc")
                    .with_attribute(P::ProcessingTime, "ProcTime")
                    .with_attribute(P::Capacity, "Capacity")
                    .with_attribute(P::Mttr, "MTTR")
                    .with_attribute(P::Mtbf, "MTBF"),
            ),
            (
                ComponentKind::Diverter,
                TemplateConfig::new(".MaterialFlow.FlowControl")
                    .with_attribute(P::Speed, "Speed")
                    .with_attribute(P::Length, "Length")
                    .with_attribute(P::Width, "Width"),
            ),
            (
                ComponentKind::Sink,
                TemplateConfig::new(".MaterialFlow.Drain"),
            ),
        ]);

        Self {
            model_frame: ".Models.Frame".to_string(),
            connector: ".MaterialFlow.Connector".to_string(),
            naming: NamingConfig::default(),
            templates,
        }
    }
}

impl MappingConfig {
    pub fn model_frame(&self) -> &str {
        &self.model_frame
    }

    /// Returns the template instantiated for every connector.
    pub fn connector(&self) -> &str {
        &self.connector
    }

    pub fn naming(&self) -> &NamingConfig {
        &self.naming
    }

    /// Returns the template entry of a kind, if one is configured.
    pub fn template(&self, kind: ComponentKind) -> Option<&TemplateConfig> {
        self.templates.get(&kind)
    }

    pub fn with_model_frame(mut self, frame: impl Into<String>) -> Self {
        self.model_frame = frame.into();
        self
    }

    pub fn with_template(mut self, kind: ComponentKind, template: TemplateConfig) -> Self {
        self.templates.insert(kind, template);
        self
    }

    pub fn without_template(mut self, kind: ComponentKind) -> Self {
        self.templates.remove(&kind);
        self
    }
}

/// External execution command.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AutomationConfig {
    /// Program receiving the target graph path and destination as arguments.
    command: Option<String>,

    /// Extra arguments placed before the target graph path.
    args: Vec<String>,

    timeout_ms: u64,
}

impl Default for AutomationConfig {
    fn default() -> Self {
        Self {
            command: None,
            args: Vec::new(),
            timeout_ms: 300_000,
        }
    }
}

impl AutomationConfig {
    pub fn new(command: impl Into<String>, args: Vec<String>, timeout: Duration) -> Self {
        Self {
            command: Some(command.into()),
            args,
            timeout_ms: timeout.as_millis() as u64,
        }
    }

    pub fn command(&self) -> Option<&str> {
        self.command.as_deref()
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}
