//! # Floorplan Parser
//!
//! Boundary input parsing for the Floorplan layout compiler. This crate turns
//! the structured payloads delivered by upstream collaborators into typed
//! values:
//!
//! - [`parse_detections`] - detection documents (components and connection hypotheses)
//! - [`parse_properties`] - text-extraction payloads (raw property text)
//! - [`parse_judgments`] - orientation oracle responses
//! - [`parse_quantity`] - measured values such as `2.5 m` or `8 sec`
//!
//! Problems are reported as [`error::Diagnostic`]s carrying error codes and
//! byte spans into the input text.
//!
//! ## Usage
//!
//! ```
//! # use floorplan_parser::{parse_detections, ParseError};
//!
//! fn main() -> Result<(), ParseError> {
//!     let source = r#"{
//!         "components": [
//!             { "id": "L1", "position": { "x": 0, "y": 0 }, "dimensions": { "width": 4, "height": 4 } },
//!             { "id": "U1", "position": { "x": 20, "y": 0 }, "dimensions": { "width": 4, "height": 4 } }
//!         ],
//!         "connections": [ { "from": "L1", "to": "U1" } ]
//!     }"#;
//!
//!     let detections = parse_detections(source)?;
//!     assert_eq!(detections.components().len(), 2);
//!     Ok(())
//! }
//! ```

mod detection;
pub mod error;
mod json;
mod judgment;
mod properties;
mod quantity;
mod span;

pub use detection::{ConnectionHypothesis, Detections, parse_detections};
pub use error::ParseError;
pub use judgment::{RawJudgment, RawJudgments, parse_judgments};
pub use properties::{ExtractedProperties, PropertyText, parse_properties};
pub use quantity::{QuantityError, parse_quantity};
pub use span::Span;
