//! Floorplan Core Types and Definitions
//!
//! This crate provides the foundational types shared by every stage of the
//! Floorplan layout compiler. It includes:
//!
//! - **Identifiers**: Efficient string-interned component identifiers ([`identifier::Id`])
//! - **Geometry**: Points, sizes and bounding boxes in layout units ([`geometry`] module)
//! - **Semantic**: Component kinds, orientations and components ([`semantic`] module)
//! - **Units**: Physical quantities and their canonical units ([`units`] module)

pub mod geometry;
pub mod identifier;
pub mod semantic;
pub mod units;
