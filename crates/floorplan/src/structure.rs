//! Flow graph construction and section decomposition.
//!
//! The builder turns validated detections into a [`LayoutModel`] skeleton:
//!
//! 1. **Components** are registered; duplicate ids are rejected.
//! 2. **Connections** are resolved (by id, then by unique label) and checked
//!    for self-loops, duplicates, illegal degrees and cycles.
//! 3. **Sections** are walked from every source, splitting at diverters and
//!    sinks, and every walked connection is stamped with its section and
//!    sequence index.

use std::collections::{BTreeSet, HashMap, HashSet};

use log::{debug, info, trace};
use petgraph::{
    Direction,
    algo::tarjan_scc,
    graph::{DiGraph, NodeIndex},
    visit::EdgeRef,
};

use floorplan_core::{
    identifier::Id,
    semantic::{Component, ComponentKind},
};
use floorplan_parser::Detections;

use crate::{
    config::{GraphConfig, Topology},
    error::GraphError,
    model::{Connection, LayoutModel, Section},
};

/// Builds the flow graph of a layout and decomposes it into sections.
#[derive(Debug, Clone, Default)]
pub struct FlowGraphBuilder {
    topology: Topology,
}

/// A section before ordering: its origin, branch and walked connections.
struct SectionWalk {
    origin: Id,
    branch: usize,
    components: Vec<Id>,
    connections: Vec<usize>,
}

/// Directed graph over component ids; edge weights index `connections`.
struct FlowGraph<'a> {
    graph: DiGraph<Id, usize>,
    nodes: HashMap<Id, NodeIndex>,
    components: &'a [Component],
    kinds: HashMap<Id, ComponentKind>,
}

impl FlowGraph<'_> {
    fn kind(&self, id: Id) -> Option<ComponentKind> {
        self.kinds.get(&id).copied()
    }

    /// Outgoing `(target, connection index)` pairs ordered by ascending target id.
    fn successors(&self, id: Id) -> Vec<(Id, usize)> {
        let Some(&node) = self.nodes.get(&id) else {
            return Vec::new();
        };
        let mut successors: Vec<_> = self
            .graph
            .edges_directed(node, Direction::Outgoing)
            .map(|edge| (self.graph[edge.target()], *edge.weight()))
            .collect();
        successors.sort_by(|a, b| a.0.cmp(&b.0));
        successors
    }

    fn degree(&self, id: Id, direction: Direction) -> usize {
        self.nodes
            .get(&id)
            .map_or(0, |&node| self.graph.edges_directed(node, direction).count())
    }
}

impl FlowGraphBuilder {
    pub fn new(config: &GraphConfig) -> Self {
        Self {
            topology: config.topology(),
        }
    }

    /// Builds a validated layout model from detections.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError`] for duplicate components, unresolved or
    /// ambiguous endpoints, self-loops, duplicate connections, illegal
    /// degrees, and cycles in a linear topology. All connection checks run
    /// before any section is built.
    pub fn build(&self, detections: &Detections) -> Result<LayoutModel, GraphError> {
        info!(
            components = detections.components().len(),
            connections = detections.connections().len(),
            topology:? = self.topology;
            "Building flow graph"
        );

        let flow = Self::register_components(detections.components())?;
        let (flow, connections) = Self::connect(flow, detections)?;
        Self::check_degrees(&flow)?;
        if self.topology == Topology::Linear {
            Self::check_acyclic(&flow)?;
        }

        let walks = self.decompose(&flow);
        let (sections, connections) = Self::stamp_sections(walks, connections);

        info!(
            components = flow.components.len(),
            connections = connections.len(),
            sections = sections.len();
            "Flow graph built"
        );

        Ok(LayoutModel::new(
            flow.components.to_vec(),
            connections,
            sections,
        ))
    }

    fn register_components(components: &[Component]) -> Result<FlowGraph<'_>, GraphError> {
        let mut graph = DiGraph::new();
        let mut nodes = HashMap::with_capacity(components.len());
        let mut kinds = HashMap::with_capacity(components.len());

        for component in components {
            let id = component.id();
            if nodes.contains_key(&id) {
                return Err(GraphError::DuplicateComponent(id));
            }
            nodes.insert(id, graph.add_node(id));
            kinds.insert(id, component.kind());
        }

        Ok(FlowGraph {
            graph,
            nodes,
            components,
            kinds,
        })
    }

    fn connect<'a>(
        mut flow: FlowGraph<'a>,
        detections: &Detections,
    ) -> Result<(FlowGraph<'a>, Vec<Connection>), GraphError> {
        let mut labels: HashMap<&str, Vec<Id>> = HashMap::new();
        for component in flow.components {
            if let Some(label) = component.label() {
                labels.entry(label).or_default().push(component.id());
            }
        }

        let resolve = |endpoint: &str, from: &str, to: &str| -> Result<Id, GraphError> {
            let id = Id::new(endpoint);
            if flow.kinds.contains_key(&id) {
                return Ok(id);
            }
            match labels.get(endpoint).map(Vec::as_slice) {
                Some([only]) => Ok(*only),
                Some(candidates) => {
                    let mut candidates = candidates.to_vec();
                    candidates.sort();
                    Err(GraphError::AmbiguousEndpoint {
                        endpoint: endpoint.to_string(),
                        candidates,
                    })
                }
                None => Err(GraphError::UnknownEndpoint {
                    endpoint: endpoint.to_string(),
                    from: from.to_string(),
                    to: to.to_string(),
                }),
            }
        };

        let mut seen = HashSet::new();
        let mut connections = Vec::with_capacity(detections.connections().len());
        let mut edges = Vec::with_capacity(detections.connections().len());

        for hypothesis in detections.connections() {
            let from = resolve(hypothesis.from(), hypothesis.from(), hypothesis.to())?;
            let to = resolve(hypothesis.to(), hypothesis.from(), hypothesis.to())?;

            if from == to {
                return Err(GraphError::SelfLoop(from));
            }
            if !seen.insert((from, to)) {
                return Err(GraphError::DuplicateConnection { from, to });
            }

            trace!(from:% = from, to:% = to; "Resolved connection");
            edges.push((from, to, connections.len()));
            connections.push(Connection::new(from, to));
        }

        for (from, to, index) in edges {
            flow.graph
                .add_edge(flow.nodes[&from], flow.nodes[&to], index);
        }

        Ok((flow, connections))
    }

    fn check_degrees(flow: &FlowGraph<'_>) -> Result<(), GraphError> {
        for component in flow.components {
            let id = component.id();
            let kind = component.kind();
            let incoming = flow.degree(id, Direction::Incoming);
            let outgoing = flow.degree(id, Direction::Outgoing);

            match kind {
                ComponentKind::Source if incoming > 0 => {
                    return Err(GraphError::SourceHasIncoming(id));
                }
                ComponentKind::Sink if outgoing > 0 => {
                    return Err(GraphError::SinkHasOutgoing(id));
                }
                _ => {}
            }

            if kind == ComponentKind::Diverter {
                continue;
            }
            if outgoing > 1 {
                return Err(GraphError::IllegalBranching {
                    id,
                    kind,
                    direction: "outgoing",
                    degree: outgoing,
                });
            }
            if incoming > 1 {
                return Err(GraphError::IllegalBranching {
                    id,
                    kind,
                    direction: "incoming",
                    degree: incoming,
                });
            }
        }
        Ok(())
    }

    /// Rejects any strongly connected component with more than one member.
    fn check_acyclic(flow: &FlowGraph<'_>) -> Result<(), GraphError> {
        let cycle = tarjan_scc(&flow.graph)
            .into_iter()
            .filter(|scc| scc.len() > 1)
            .map(|scc| {
                let mut ids: Vec<Id> = scc.into_iter().map(|n| flow.graph[n]).collect();
                ids.sort();
                ids
            })
            .min();

        match cycle {
            Some(components) => Err(GraphError::Cycle { components }),
            None => Ok(()),
        }
    }

    /// Walks every section reachable from a source.
    fn decompose(&self, flow: &FlowGraph<'_>) -> Vec<SectionWalk> {
        let mut sources: Vec<Id> = flow
            .components
            .iter()
            .filter(|c| c.kind() == ComponentKind::Source)
            .map(Component::id)
            .collect();
        sources.sort();

        let mut walks = Vec::new();
        let mut pending_diverters = Vec::new();
        let mut emitted_diverters = BTreeSet::new();

        for source in sources {
            let walk = self.walk(flow, source, 0, vec![source], None);
            pending_diverters.extend(Self::terminal_diverter(flow, &walk));
            walks.push(walk);
        }

        while let Some(diverter) = pending_diverters.pop() {
            if !emitted_diverters.insert(diverter) {
                continue;
            }
            for (branch, (target, connection)) in flow.successors(diverter).into_iter().enumerate()
            {
                let walk = self.walk(
                    flow,
                    diverter,
                    branch,
                    vec![diverter, target],
                    Some(connection),
                );
                pending_diverters.extend(Self::terminal_diverter(flow, &walk));
                walks.push(walk);
            }
        }

        walks.sort_by(|a, b| (a.origin, a.branch).cmp(&(b.origin, b.branch)));
        walks
    }

    /// Follows single-successor chains from the last component of `components`.
    fn walk(
        &self,
        flow: &FlowGraph<'_>,
        origin: Id,
        branch: usize,
        mut components: Vec<Id>,
        first_connection: Option<usize>,
    ) -> SectionWalk {
        let mut connections: Vec<usize> = first_connection.into_iter().collect();

        loop {
            let Some(&current) = components.last() else {
                break;
            };
            let at_start = components.len() == 1;
            match flow.kind(current) {
                Some(ComponentKind::Sink) => break,
                Some(ComponentKind::Diverter) if !at_start => break,
                _ => {}
            }

            let successors = flow.successors(current);
            let Some(&(next, connection)) = successors.first() else {
                break;
            };
            connections.push(connection);

            if self.topology == Topology::Looped && components.contains(&next) {
                trace!(section_origin:% = origin, component:% = next; "Section re-enters itself");
                break;
            }
            components.push(next);
        }

        debug!(
            origin:% = origin,
            branch,
            components = components.len();
            "Walked section"
        );

        SectionWalk {
            origin,
            branch,
            components,
            connections,
        }
    }

    /// Returns the diverter a section ends at, if any.
    fn terminal_diverter(flow: &FlowGraph<'_>, walk: &SectionWalk) -> Option<Id> {
        let last = *walk.components.last()?;
        (walk.components.len() > 1 && flow.kind(last) == Some(ComponentKind::Diverter))
            .then_some(last)
    }

    fn stamp_sections(
        walks: Vec<SectionWalk>,
        mut connections: Vec<Connection>,
    ) -> (Vec<Section>, Vec<Connection>) {
        let sections = walks
            .into_iter()
            .enumerate()
            .map(|(index, walk)| {
                for (sequence_index, &connection) in walk.connections.iter().enumerate() {
                    connections[connection] =
                        connections[connection].in_section(index, sequence_index);
                }
                Section::new(index, walk.origin, walk.branch, walk.components)
            })
            .collect();
        (sections, connections)
    }
}
