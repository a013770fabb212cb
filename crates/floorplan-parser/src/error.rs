//! Error and diagnostic system for boundary input parsing.
//!
//! Every problem found in a detection document, property payload or oracle
//! response is reported as a [`Diagnostic`] carrying an [`ErrorCode`], a
//! [`Severity`] and one or more labeled byte spans into the input text.
//! Problems found while scanning a whole document are accumulated and
//! returned together in a [`ParseError`].
//!
//! # Example
//!
//! ```
//! # use floorplan_parser::error::{Diagnostic, ErrorCode};
//! # use floorplan_parser::Span;
//!
//! let diag = Diagnostic::error("unknown component kind `Robot`")
//!     .with_code(ErrorCode::E100)
//!     .with_label(Span::new(42..49), "unknown kind")
//!     .with_help("expected one of Source, Conveyor, Machine, Diverter, Sink");
//! ```

mod collector;
mod diagnostic;
mod error_code;
mod label;
mod parse_error;
mod severity;

pub(crate) use collector::DiagnosticCollector;

pub use diagnostic::Diagnostic;
pub use error_code::ErrorCode;
pub use label::Label;
pub use parse_error::ParseError;
pub use severity::Severity;
