//! Error codes for the Floorplan input diagnostics.
//!
//! Error codes are organized by input kind:
//! - `E0xx` - Syntax errors shared by every JSON payload
//! - `E1xx` - Detection document content errors
//! - `E2xx` - Property payload content errors

use std::fmt;

/// Error codes for categorizing diagnostic errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    // =========================================================================
    // Syntax Errors (E0xx)
    // =========================================================================
    /// Malformed JSON.
    ///
    /// The payload is not valid JSON, or its JSON does not have the expected
    /// document structure.
    E001,

    /// Malformed payload extraction.
    ///
    /// A response wrapped in prose contained no `{ ... }` block, or the
    /// extracted block was not a JSON object.
    E002,

    // =========================================================================
    // Detection Errors (E1xx)
    // =========================================================================
    /// Unknown component kind.
    ///
    /// The `kind` field names none of Source, Conveyor, Machine, Diverter, Sink.
    E100,

    /// Uninferable component kind.
    ///
    /// The `kind` field is absent and the id prefix maps to no kind.
    E101,

    /// Invalid geometry.
    ///
    /// A position coordinate is not finite, or a dimension is not a finite
    /// positive number.
    E102,

    /// Empty component id.
    E103,

    // =========================================================================
    // Property Errors (E2xx)
    // =========================================================================
    /// Invalid property structure.
    ///
    /// A property section is not an object, or a property value is neither
    /// a string nor a number.
    E200,
}

impl ErrorCode {
    /// Returns the numeric code as a string (e.g., "E001").
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::E001 => "E001",
            ErrorCode::E002 => "E002",
            ErrorCode::E100 => "E100",
            ErrorCode::E101 => "E101",
            ErrorCode::E102 => "E102",
            ErrorCode::E103 => "E103",
            ErrorCode::E200 => "E200",
        }
    }

    /// Returns a short description of this error code.
    pub fn description(&self) -> &'static str {
        match self {
            ErrorCode::E001 => "malformed JSON",
            ErrorCode::E002 => "malformed payload extraction",
            ErrorCode::E100 => "unknown component kind",
            ErrorCode::E101 => "uninferable component kind",
            ErrorCode::E102 => "invalid geometry",
            ErrorCode::E103 => "empty component id",
            ErrorCode::E200 => "invalid property structure",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
