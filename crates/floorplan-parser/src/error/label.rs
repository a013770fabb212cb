//! Labeled source spans for diagnostic messages.

use crate::span::Span;

/// A message attached to a span of the input text.
///
/// A diagnostic usually has one primary label marking the offending value,
/// and may carry secondary labels pointing at related values, for example
/// the component a bad dimension belongs to:
///
/// ```text
/// error[E102]: component `C1` has invalid dimensions
///    |
///  3 |     { "id": "C1", "kind": "Conveyor",
///    |             ---- in this component
///  4 |       "dimensions": { "width": 0, "height": 5 } },
///    |       ^^^^^^^^^^^^ width must be a positive number
/// ```
#[derive(Debug, Clone)]
pub struct Label {
    span: Span,
    message: String,
    is_primary: bool,
}

impl Label {
    /// Create a new primary label.
    pub fn primary(span: Span, message: impl Into<String>) -> Self {
        Self {
            span,
            message: message.into(),
            is_primary: true,
        }
    }

    /// Create a new secondary label.
    pub fn secondary(span: Span, message: impl Into<String>) -> Self {
        Self {
            span,
            message: message.into(),
            is_primary: false,
        }
    }

    /// Get the span this label applies to.
    pub fn span(&self) -> Span {
        self.span
    }

    /// Get the label message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Check if this is a primary label.
    pub fn is_primary(&self) -> bool {
        self.is_primary
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primary_label() {
        let label = Label::primary(Span::new(10..14), "unknown kind");

        assert_eq!(label.span(), Span::new(10..14));
        assert_eq!(label.message(), "unknown kind");
        assert!(label.is_primary());
    }

    #[test]
    fn test_secondary_label() {
        let label = Label::secondary(Span::new(5..9), "first defined here");

        assert_eq!(label.span().start(), 5);
        assert!(!label.is_primary());
    }
}
