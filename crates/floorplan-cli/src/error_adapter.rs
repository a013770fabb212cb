//! Error adapter for converting FloorplanError to miette diagnostics.
//!
//! This module provides the bridge between the library's standard error types
//! and miette's rich diagnostic formatting used in the CLI.
//!
//! # Multi-Error Support
//!
//! When a [`floorplan_parser::ParseError`] contains multiple diagnostics, each
//! diagnostic is rendered independently against the input it came from.

use std::fmt;

use miette::{Diagnostic as MietteDiagnostic, LabeledSpan, SourceSpan};

use floorplan::{AutomationError, DocumentError, FloorplanError};
use floorplan_parser::error::Diagnostic;

/// Adapter for a single input diagnostic.
pub struct DiagnosticAdapter<'a> {
    diag: &'a Diagnostic,
    /// Input text the diagnostic's spans point into
    src: &'a str,
}

impl<'a> DiagnosticAdapter<'a> {
    pub fn new(diag: &'a Diagnostic, src: &'a str) -> Self {
        Self { diag, src }
    }
}

impl fmt::Debug for DiagnosticAdapter<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DiagnosticAdapter")
            .field("diag", &self.diag)
            .finish()
    }
}

impl fmt::Display for DiagnosticAdapter<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.diag.message())
    }
}

impl std::error::Error for DiagnosticAdapter<'_> {}

impl MietteDiagnostic for DiagnosticAdapter<'_> {
    fn code<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        self.diag
            .code()
            .map(|c| Box::new(c) as Box<dyn fmt::Display>)
    }

    fn help<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        self.diag
            .help()
            .map(|h| Box::new(h) as Box<dyn fmt::Display>)
    }

    fn source_code(&self) -> Option<&dyn miette::SourceCode> {
        Some(&self.src as &dyn miette::SourceCode)
    }

    fn labels(&self) -> Option<Box<dyn Iterator<Item = LabeledSpan> + '_>> {
        let labels = self.diag.labels();
        if labels.is_empty() {
            return None;
        }

        Some(Box::new(labels.iter().map(|label| {
            let span = span_to_miette(label.span());
            let message = Some(label.message().to_string());
            if label.is_primary() {
                LabeledSpan::new_primary_with_span(message, span)
            } else {
                LabeledSpan::new_with_span(message, span)
            }
        })))
    }
}

/// Adapter for the stage errors of [`FloorplanError`].
///
/// These carry no source spans; they are reported with a
/// `floorplan::<stage>` code and, where useful, a hint.
pub struct ErrorAdapter<'a>(pub &'a FloorplanError);

impl fmt::Debug for ErrorAdapter<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.0, f)
    }
}

impl fmt::Display for ErrorAdapter<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl std::error::Error for ErrorAdapter<'_> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.0.source()
    }
}

impl MietteDiagnostic for ErrorAdapter<'_> {
    fn code<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        let code = match &self.0 {
            FloorplanError::Io(_) => "floorplan::io",
            FloorplanError::Parse { .. } => return None,
            FloorplanError::Graph(_) => "floorplan::graph",
            FloorplanError::Orientation(_) => "floorplan::orientation",
            FloorplanError::Property(_) => "floorplan::property",
            FloorplanError::Document(_) => "floorplan::document",
            FloorplanError::Mapping(_) => "floorplan::mapping",
            FloorplanError::Automation(_) => "floorplan::automation",
            FloorplanError::Cancelled => "floorplan::cancelled",
        };
        Some(Box::new(code))
    }

    fn help<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        let help = match &self.0 {
            FloorplanError::Orientation(_) => {
                "record judgments for the listed components, or raise `orientation.max_iterations`"
                    .to_string()
            }
            FloorplanError::Document(DocumentError::InvalidSetting { setting, .. }) => format!(
                "set `document.{setting}` in the configuration; margins must not be \
                 negative and scales must be positive"
            ),
            FloorplanError::Automation(AutomationError::Failed {
                document,
                log: Some(log),
            }) => format!(
                "collaborator log:\n{log}\nthe intermediate document is kept at {}",
                document.display()
            ),
            FloorplanError::Automation(err) => format!(
                "the intermediate document is kept at {}",
                err.document().display()
            ),
            _ => return None,
        };
        Some(Box::new(help))
    }

    fn source_code(&self) -> Option<&dyn miette::SourceCode> {
        None
    }

    fn labels(&self) -> Option<Box<dyn Iterator<Item = LabeledSpan> + '_>> {
        None
    }
}

/// A reportable error that can be rendered by miette.
#[derive(Debug)]
pub enum Reportable<'a> {
    /// A rich diagnostic with source location information.
    Diagnostic(DiagnosticAdapter<'a>),
    /// A simple error without source location.
    Error(ErrorAdapter<'a>),
}

impl fmt::Display for Reportable<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reportable::Diagnostic(d) => fmt::Display::fmt(d, f),
            Reportable::Error(e) => fmt::Display::fmt(e, f),
        }
    }
}

impl std::error::Error for Reportable<'_> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Reportable::Diagnostic(_) => None,
            Reportable::Error(e) => e.source(),
        }
    }
}

impl MietteDiagnostic for Reportable<'_> {
    fn code<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        match self {
            Reportable::Diagnostic(d) => d.code(),
            Reportable::Error(e) => e.code(),
        }
    }

    fn help<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        match self {
            Reportable::Diagnostic(d) => d.help(),
            Reportable::Error(e) => e.help(),
        }
    }

    fn source_code(&self) -> Option<&dyn miette::SourceCode> {
        match self {
            Reportable::Diagnostic(d) => d.source_code(),
            Reportable::Error(e) => e.source_code(),
        }
    }

    fn labels(&self) -> Option<Box<dyn Iterator<Item = LabeledSpan> + '_>> {
        match self {
            Reportable::Diagnostic(d) => d.labels(),
            Reportable::Error(e) => e.labels(),
        }
    }
}

fn span_to_miette(span: floorplan_parser::Span) -> SourceSpan {
    SourceSpan::new(span.start().into(), span.len())
}

/// Convert a [`FloorplanError`] into a list of reportable errors.
///
/// For [`FloorplanError::Parse`], this returns one [`Reportable`] for
/// each diagnostic in the error. For other error variants, this returns a
/// single [`Reportable`].
pub fn to_reportables(err: &FloorplanError) -> Vec<Reportable<'_>> {
    match err {
        FloorplanError::Parse {
            err: parse_err,
            src,
        } => parse_err
            .diagnostics()
            .iter()
            .map(|d| Reportable::Diagnostic(DiagnosticAdapter::new(d, src)))
            .collect(),
        _ => vec![Reportable::Error(ErrorAdapter(err))],
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use floorplan::{GraphError, identifier::Id};
    use floorplan_parser::{ParseError, Span, error::ErrorCode};

    use super::*;

    #[test]
    fn test_single_diagnostic() {
        let diag = Diagnostic::error("unknown component kind `Robot`")
            .with_code(ErrorCode::E100)
            .with_label(Span::new(0..5), "here")
            .with_help("expected one of Source, Conveyor, Machine, Diverter, Sink");
        let err = FloorplanError::new_parse_error(ParseError::from(diag), "Robot");

        let reportables = to_reportables(&err);
        assert_eq!(reportables.len(), 1);

        match &reportables[0] {
            Reportable::Diagnostic(d) => {
                assert_eq!(d.to_string(), "unknown component kind `Robot`");
                assert_eq!(d.code().unwrap().to_string(), "E100");
            }
            Reportable::Error(_) => panic!("Expected Diagnostic"),
        }
    }

    #[test]
    fn test_multiple_diagnostics() {
        let parse_err = ParseError::new(vec![
            Diagnostic::error("first error")
                .with_code(ErrorCode::E102)
                .with_label(Span::new(0..5), "first"),
            Diagnostic::error("second error")
                .with_code(ErrorCode::E103)
                .with_label(Span::new(10..15), "second"),
        ]);
        let err = FloorplanError::new_parse_error(parse_err, "source code here...");

        let reportables = to_reportables(&err);

        assert_eq!(reportables.len(), 2);
        assert_eq!(reportables[0].to_string(), "first error");
        assert_eq!(reportables[1].to_string(), "second error");
    }

    #[test]
    fn test_stage_error_has_code() {
        let err = FloorplanError::Graph(GraphError::SelfLoop(Id::new("C1")));

        let reportables = to_reportables(&err);

        assert_eq!(reportables.len(), 1);
        match &reportables[0] {
            Reportable::Error(e) => {
                assert_eq!(
                    e.to_string(),
                    "Graph error: component `C1` is connected to itself"
                );
                assert_eq!(e.code().unwrap().to_string(), "floorplan::graph");
                assert!(e.help().is_none());
            }
            Reportable::Diagnostic(_) => panic!("Expected Error"),
        }
    }

    #[test]
    fn test_automation_failure_help_points_at_document() {
        let err = FloorplanError::Automation(AutomationError::Failed {
            document: PathBuf::from("out/document.json"),
            log: Some("license missing".to_string()),
        });

        let reportables = to_reportables(&err);
        let help = reportables[0].help().unwrap().to_string();

        assert!(help.contains("license missing"));
        assert!(help.contains("out/document.json"));
    }

    #[test]
    fn test_invalid_setting_help_names_the_key() {
        let err = FloorplanError::Document(DocumentError::InvalidSetting {
            setting: "scale",
            value: -1.0,
        });

        let reportables = to_reportables(&err);

        let reportable = &reportables[0];
        assert_eq!(
            reportable.code().unwrap().to_string(),
            "floorplan::document"
        );
        let help = reportable.help().unwrap().to_string();
        assert!(help.contains("`document.scale`"));
    }

    #[test]
    fn test_primary_flag_on_labels() {
        let diag = Diagnostic::error("component defined twice")
            .with_label(Span::new(0..5), "duplicate")
            .with_secondary_label(Span::new(10..15), "first defined here");

        let adapter = DiagnosticAdapter::new(&diag, "some source code");

        let labels: Vec<_> = adapter.labels().unwrap().collect();
        assert_eq!(labels.len(), 2);
        assert!(labels[0].primary());
        assert!(!labels[1].primary());
        assert_eq!(labels[1].label(), Some("first defined here"));
    }
}
