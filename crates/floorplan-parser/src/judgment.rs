//! Orientation judgment payloads returned by an oracle.
//!
//! A payload maps component ids to degree values:
//!
//! ```json
//! { "C1": 0, "M1": 90, "C2": "unresolved", "C3": null }
//! ```
//!
//! Collaborators often wrap the JSON object in prose; when the text is not
//! valid JSON the outermost `{ ... }` block is extracted and parsed instead.

use std::collections::BTreeMap;

use log::{debug, trace};
use serde_json::Value;

use crate::{
    error::{Diagnostic, ErrorCode, ParseError},
    json::syntax_diagnostic,
    span::Span,
};

/// A single raw judgment for one component.
///
/// Degree values are not checked here; the resolution engine decides which
/// values it accepts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawJudgment {
    /// An integer degree value.
    Degrees(i64),
    /// The oracle explicitly declined to judge this component.
    Unresolved,
    /// A value that is not a degree at all, kept verbatim for reporting.
    Invalid(String),
}

impl From<&Value> for RawJudgment {
    fn from(value: &Value) -> Self {
        match value {
            Value::Null => Self::Unresolved,
            Value::Number(n) => match n.as_i64() {
                Some(degrees) => Self::Degrees(degrees),
                None => match n.as_f64() {
                    Some(f) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => {
                        Self::Degrees(f as i64)
                    }
                    _ => Self::Invalid(n.to_string()),
                },
            },
            Value::String(s) => {
                let text = s.trim();
                if text.is_empty() || text.eq_ignore_ascii_case("unresolved") {
                    Self::Unresolved
                } else {
                    text.trim_end_matches('°')
                        .trim()
                        .parse::<i64>()
                        .map_or_else(|_| Self::Invalid(text.to_string()), Self::Degrees)
                }
            }
            other => Self::Invalid(other.to_string()),
        }
    }
}

/// Raw judgments keyed by component id, in ascending id order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawJudgments(BTreeMap<String, RawJudgment>);

impl RawJudgments {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a judgment, replacing any previous one for the same id.
    pub fn with(mut self, id: impl Into<String>, judgment: RawJudgment) -> Self {
        self.0.insert(id.into(), judgment);
        self
    }

    pub fn get(&self, id: &str) -> Option<&RawJudgment> {
        self.0.get(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &RawJudgment)> {
        self.0.iter().map(|(id, judgment)| (id.as_str(), judgment))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, RawJudgment)> for RawJudgments {
    fn from_iter<T: IntoIterator<Item = (String, RawJudgment)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Parses an oracle judgment payload.
///
/// # Errors
///
/// - E002 when no `{ ... }` block can be found, or the payload is not an object
/// - E001 when the extracted block is not valid JSON
pub fn parse_judgments(text: &str) -> Result<RawJudgments, ParseError> {
    let (value, base) = match serde_json::from_str::<Value>(text) {
        Ok(value) => (value, 0),
        Err(_) => {
            let block = extract_object_block(text).ok_or_else(|| {
                Diagnostic::error("no JSON object found in oracle response")
                    .with_code(ErrorCode::E002)
                    .with_label(Span::new(0..text.len()), "expected a `{ ... }` block")
            })?;
            trace!(start = block.start(), end = block.end(); "Extracted judgment block");
            let slice = &text[block.start()..block.end()];
            let value = serde_json::from_str::<Value>(slice)
                .map_err(|err| syntax_diagnostic(text, block.start(), &err, "oracle response"))?;
            (value, block.start())
        }
    };

    let Value::Object(map) = value else {
        return Err(Diagnostic::error("oracle response must be a JSON object")
            .with_code(ErrorCode::E002)
            .with_label(Span::new(base..text.len()), "not an object")
            .into());
    };

    let judgments: RawJudgments = map
        .iter()
        .map(|(id, value)| (id.trim().to_string(), RawJudgment::from(value)))
        .collect();

    debug!(judgments = judgments.len(); "Parsed oracle judgments");

    Ok(judgments)
}

/// Returns the span from the first `{` to the last `}` in `text`.
fn extract_object_block(text: &str) -> Option<Span> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| Span::new(start..end + 1))
}
