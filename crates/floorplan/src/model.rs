//! The layout model shared by every compiler stage.
//!
//! A [`LayoutModel`] is produced by the flow graph builder and passed forward
//! through the pipeline. Stages never mutate a model they receive; they
//! return a new one with their results attached.

use std::collections::BTreeMap;

use indexmap::IndexMap;

use floorplan_core::{
    geometry::Bounds,
    identifier::Id,
    semantic::{Component, Orientation},
};

/// A directed connection between two components.
///
/// `section` and `sequence_index` are stamped by section decomposition;
/// they stay `None` for connections not reachable from any source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Connection {
    from: Id,
    to: Id,
    section: Option<usize>,
    sequence_index: Option<usize>,
}

impl Connection {
    pub fn new(from: Id, to: Id) -> Self {
        Self {
            from,
            to,
            section: None,
            sequence_index: None,
        }
    }

    /// Returns this connection placed at `sequence_index` within `section`.
    pub fn in_section(mut self, section: usize, sequence_index: usize) -> Self {
        self.section = Some(section);
        self.sequence_index = Some(sequence_index);
        self
    }

    pub fn from(&self) -> Id {
        self.from
    }

    pub fn to(&self) -> Id {
        self.to
    }

    pub fn section(&self) -> Option<usize> {
        self.section
    }

    pub fn sequence_index(&self) -> Option<usize> {
        self.sequence_index
    }
}

/// One traversable path of the flow graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    index: usize,
    origin: Id,
    branch: usize,
    components: Vec<Id>,
}

impl Section {
    pub fn new(index: usize, origin: Id, branch: usize, components: Vec<Id>) -> Self {
        Self {
            index,
            origin,
            branch,
            components,
        }
    }

    /// Position of this section in the model's section order.
    pub fn index(&self) -> usize {
        self.index
    }

    /// The source or diverter this section starts at.
    pub fn origin(&self) -> Id {
        self.origin
    }

    /// Branch number at the origin; always 0 for sections starting at a source.
    pub fn branch(&self) -> usize {
        self.branch
    }

    /// Component ids in flow order.
    pub fn components(&self) -> &[Id] {
        &self.components
    }

    pub fn contains(&self, id: Id) -> bool {
        self.components.contains(&id)
    }
}

/// Aggregate root of one compilation run.
#[derive(Debug, Clone, Default)]
pub struct LayoutModel {
    components: IndexMap<Id, Component>,
    connections: Vec<Connection>,
    sections: Vec<Section>,
    orientations: BTreeMap<Id, Orientation>,
}

impl LayoutModel {
    /// Assembles a model from parts.
    ///
    /// Components keep their given order; later duplicates replace earlier
    /// ones. No structural validation happens here.
    pub fn new(
        components: Vec<Component>,
        connections: Vec<Connection>,
        sections: Vec<Section>,
    ) -> Self {
        Self {
            components: components.into_iter().map(|c| (c.id(), c)).collect(),
            connections,
            sections,
            orientations: BTreeMap::new(),
        }
    }

    /// Returns a copy of this model carrying the given orientations.
    pub fn with_orientations(mut self, orientations: BTreeMap<Id, Orientation>) -> Self {
        self.orientations = orientations;
        self
    }

    /// Returns a copy of this model with its components replaced.
    pub fn with_components(mut self, components: Vec<Component>) -> Self {
        self.components = components.into_iter().map(|c| (c.id(), c)).collect();
        self
    }

    /// Returns components in detection order.
    pub fn components(&self) -> impl Iterator<Item = &Component> {
        self.components.values()
    }

    pub fn component(&self, id: Id) -> Option<&Component> {
        self.components.get(&id)
    }

    pub fn contains(&self, id: Id) -> bool {
        self.components.contains_key(&id)
    }

    pub fn component_count(&self) -> usize {
        self.components.len()
    }

    pub fn connections(&self) -> &[Connection] {
        &self.connections
    }

    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    pub fn orientations(&self) -> &BTreeMap<Id, Orientation> {
        &self.orientations
    }

    pub fn orientation(&self, id: Id) -> Option<Orientation> {
        self.orientations.get(&id).copied()
    }

    /// Returns the ids of components that belong to no section, ascending.
    pub fn unsectioned_components(&self) -> Vec<Id> {
        let mut ids: Vec<_> = self
            .components
            .keys()
            .copied()
            .filter(|id| !self.sections.iter().any(|s| s.contains(*id)))
            .collect();
        ids.sort();
        ids
    }

    /// Returns the bounding box of the given components in image units.
    pub fn bounds_of(&self, ids: &[Id]) -> Option<Bounds> {
        ids.iter()
            .filter_map(|id| self.components.get(id))
            .map(|c| Bounds::new_from_top_left(c.position(), c.dimensions()))
            .reduce(|acc, b| acc.merge(&b))
    }
}
