//! Property extraction payloads.
//!
//! The text-extraction collaborator reports layout-wide properties and
//! per-component properties as raw text keyed by the text it read:
//!
//! ```json
//! {
//!   "general_properties": { "Conveyor speed": "1.0 m/s" },
//!   "component_properties": {
//!     "M1": { "Proc time": "8 sec", "MTTR": "1440 sec" },
//!     "C1": { "length": "2.5m" }
//!   }
//! }
//! ```
//!
//! Keys and values are kept verbatim here; normalization happens when the
//! properties are associated with components.

use std::collections::BTreeMap;

use log::debug;
use serde_json::{Map, Value};

use crate::{
    error::{Diagnostic, DiagnosticCollector, ErrorCode, ParseError},
    json::{locate_or_anchor, syntax_diagnostic},
    span::Span,
};

/// Raw key/value property text.
pub type PropertyText = BTreeMap<String, String>;

/// Raw properties reported by the text-extraction collaborator.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractedProperties {
    general: PropertyText,
    components: BTreeMap<String, PropertyText>,
}

impl ExtractedProperties {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a layout-wide property.
    pub fn with_general(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.general.insert(key.into(), value.into());
        self
    }

    /// Adds a property for a single component.
    pub fn with_component(
        mut self,
        id: impl Into<String>,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.components
            .entry(id.into())
            .or_default()
            .insert(key.into(), value.into());
        self
    }

    pub fn general(&self) -> &PropertyText {
        &self.general
    }

    /// Returns the raw properties reported for one component.
    pub fn component(&self, id: &str) -> Option<&PropertyText> {
        self.components.get(id)
    }

    pub fn components(&self) -> &BTreeMap<String, PropertyText> {
        &self.components
    }
}

/// Parses a property extraction payload.
///
/// Missing sections are treated as empty. Numeric values are accepted and
/// kept as their textual form.
///
/// # Errors
///
/// Returns a [`ParseError`] with E001 for malformed JSON and E200 for every
/// section or value with the wrong structure.
pub fn parse_properties(source: &str) -> Result<ExtractedProperties, ParseError> {
    let value: Value = serde_json::from_str(source)
        .map_err(|err| syntax_diagnostic(source, 0, &err, "property payload"))?;

    let Value::Object(root) = value else {
        return Err(Diagnostic::error("property payload must be a JSON object")
            .with_code(ErrorCode::E200)
            .with_label(Span::new(0..source.len()), "not an object")
            .into());
    };

    let mut collector = DiagnosticCollector::new();
    let mut properties = ExtractedProperties::new();

    if let Some(general) = section(source, &root, "general_properties", &mut collector) {
        properties.general = text_entries(source, general, "general_properties", &mut collector);
    }

    if let Some(components) = section(source, &root, "component_properties", &mut collector) {
        for (id, entries) in components {
            match entries {
                Value::Object(entries) => {
                    let text = text_entries(source, entries, id, &mut collector);
                    properties.components.insert(id.trim().to_string(), text);
                }
                _ => collector.emit(structure_diagnostic(
                    source,
                    id,
                    format!("properties of component `{id}` must be an object"),
                )),
            }
        }
    }

    for key in root.keys() {
        if key != "general_properties" && key != "component_properties" {
            collector.emit(
                Diagnostic::warning(format!("ignored property section `{key}`"))
                    .with_label(locate_or_anchor(source, key, 0), "unknown section"),
            );
        }
    }

    collector.finish()?;

    debug!(
        general = properties.general.len(),
        components = properties.components.len();
        "Parsed extracted properties"
    );

    Ok(properties)
}

fn section<'a>(
    source: &str,
    root: &'a Map<String, Value>,
    name: &str,
    collector: &mut DiagnosticCollector,
) -> Option<&'a Map<String, Value>> {
    match root.get(name) {
        None | Some(Value::Null) => None,
        Some(Value::Object(map)) => Some(map),
        Some(_) => {
            collector.emit(structure_diagnostic(
                source,
                name,
                format!("`{name}` must be an object"),
            ));
            None
        }
    }
}

fn text_entries(
    source: &str,
    entries: &Map<String, Value>,
    owner: &str,
    collector: &mut DiagnosticCollector,
) -> PropertyText {
    let mut text = PropertyText::new();
    for (key, value) in entries {
        match value {
            Value::String(s) => {
                text.insert(key.clone(), s.clone());
            }
            Value::Number(n) => {
                text.insert(key.clone(), n.to_string());
            }
            _ => collector.emit(structure_diagnostic(
                source,
                key,
                format!("property `{key}` of `{owner}` must be a string or a number"),
            )),
        }
    }
    text
}

fn structure_diagnostic(source: &str, key: &str, message: String) -> Diagnostic {
    Diagnostic::error(message)
        .with_code(ErrorCode::E200)
        .with_label(locate_or_anchor(source, key, 0), "invalid structure")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Severity;

    #[test]
    fn test_parse_full_payload() {
        let source = r#"{
            "general_properties": { "Conveyor speed": "1.0 m/s" },
            "component_properties": {
                "M1": { "Proc time": "8 sec", "MTTR": 1440 },
                "C1": { "length": "2.5m" }
            }
        }"#;

        let properties = parse_properties(source).unwrap();

        assert_eq!(
            properties.general().get("Conveyor speed").map(String::as_str),
            Some("1.0 m/s")
        );
        let m1 = properties.component("M1").unwrap();
        assert_eq!(m1.get("Proc time").map(String::as_str), Some("8 sec"));
        assert_eq!(m1.get("MTTR").map(String::as_str), Some("1440"));
        assert!(properties.component("C2").is_none());
    }

    #[test]
    fn test_missing_sections_are_empty() {
        let properties = parse_properties("{}").unwrap();
        assert_eq!(properties, ExtractedProperties::new());
    }

    #[test]
    fn test_builder_matches_parsed() {
        let parsed = parse_properties(
            r#"{
                "general_properties": {"speed": "1 m/s"},
                "component_properties": {"C1": {"length": "2m"}}
            }"#,
        )
        .unwrap();
        let built = ExtractedProperties::new()
            .with_general("speed", "1 m/s")
            .with_component("C1", "length", "2m");

        assert_eq!(parsed, built);
    }

    #[test]
    fn test_invalid_structure_collects_errors() {
        let source = r#"{
            "general_properties": [1, 2],
            "component_properties": { "M1": "8 sec", "C1": { "length": [2.5] } }
        }"#;

        let err = parse_properties(source).unwrap_err();

        assert_eq!(err.diagnostics().len(), 3);
        assert!(
            err.diagnostics()
                .iter()
                .all(|d| d.code() == Some(ErrorCode::E200))
        );
    }

    #[test]
    fn test_unknown_sections_only_warn() {
        let properties = parse_properties(r#"{"notes": "scanned", "general_properties": {}}"#);
        assert_eq!(properties.unwrap(), ExtractedProperties::new());

        // Warnings travel with errors so the whole payload is reported at once.
        let err =
            parse_properties(r#"{"notes": "scanned", "general_properties": [1]}"#).unwrap_err();
        let severities: Vec<_> = err.diagnostics().iter().map(|d| d.severity()).collect();
        assert_eq!(severities, vec![Severity::Error, Severity::Warning]);
    }

    #[test]
    fn test_non_object_root() {
        let err = parse_properties("[]").unwrap_err();
        assert_eq!(err.diagnostics()[0].code(), Some(ErrorCode::E200));
    }
}
