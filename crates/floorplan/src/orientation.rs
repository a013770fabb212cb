//! Section-scoped orientation resolution.
//!
//! The [`OrientationEngine`] assigns every component one of the four
//! orientations by asking an [`OrientationOracle`] about one section at a
//! time. Resolution runs as an explicit state machine:
//!
//! ```text
//! Initializing
//!     ↓
//! IteratingSections ←── Continue
//!     ↓                    ↑
//! Aggregating ─────────────┤
//!     ↓                    ↓
//! Complete              Stalled
//! ```
//!
//! Each pass requests judgments for every section that still has a component
//! without an orientation, then merges the answers first-writer-wins. The
//! run is complete when every component is assigned, and stalls when a full
//! pass assigns nothing new. An iteration cap bounds the number of passes.
//!
//! Oracle calls are the only external wait in the compiler. Every call runs
//! under a timeout with bounded, jittered exponential backoff between
//! attempts; a section whose attempts are exhausted is marked unresolved for
//! that pass and retried on the next one.

mod oracle;

pub use oracle::{
    ImageRegion, OracleError, OrientationOracle, OrientationRequest, RegionBounds, StaticOracle,
};

use std::{collections::BTreeMap, time::Duration};

use log::{debug, info, trace, warn};
use rand::Rng;
use serde::Serialize;

use floorplan_core::{identifier::Id, semantic::Orientation};
use floorplan_parser::{RawJudgment, RawJudgments};

use crate::{config::OrientationConfig, error::OrientationError, model::LayoutModel};

/// A judgment that disagreed with an orientation assigned earlier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OrientationConflict {
    component: Id,
    section: usize,
    kept: Orientation,
    rejected: Orientation,
}

impl OrientationConflict {
    pub fn component(&self) -> Id {
        self.component
    }

    /// The section whose judgment was rejected.
    pub fn section(&self) -> usize {
        self.section
    }

    pub fn kept(&self) -> Orientation {
        self.kept
    }

    pub fn rejected(&self) -> Orientation {
        self.rejected
    }
}

/// A judgment the engine refused to use.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RejectedJudgment {
    component: String,
    section: usize,
    reason: String,
}

impl RejectedJudgment {
    pub fn component(&self) -> &str {
        &self.component
    }

    pub fn section(&self) -> usize {
        self.section
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }
}

/// Summary of a successful resolution run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ResolutionReport {
    iterations: usize,
    conflicts: Vec<OrientationConflict>,
    rejected: Vec<RejectedJudgment>,
    unresolved_sections: Vec<Vec<usize>>,
}

impl ResolutionReport {
    /// Number of passes over the sections.
    pub fn iterations(&self) -> usize {
        self.iterations
    }

    pub fn conflicts(&self) -> &[OrientationConflict] {
        &self.conflicts
    }

    pub fn rejected(&self) -> &[RejectedJudgment] {
        &self.rejected
    }

    /// Sections whose oracle attempts were exhausted, one list per pass.
    pub fn unresolved_sections(&self) -> &[Vec<usize>] {
        &self.unresolved_sections
    }
}

/// States of a resolution run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ResolutionState {
    Initializing,
    IteratingSections,
    Aggregating,
    Continue,
    Complete,
    Stalled,
}

/// Mutable bookkeeping of one run.
#[derive(Default)]
struct Resolution {
    assignments: BTreeMap<Id, Orientation>,
    report: ResolutionReport,
    answers: Vec<(usize, RawJudgments)>,
    progress: usize,
}

impl Resolution {
    fn unassigned(&self, model: &LayoutModel) -> Vec<Id> {
        let mut ids: Vec<Id> = model
            .components()
            .map(|c| c.id())
            .filter(|id| !self.assignments.contains_key(id))
            .collect();
        ids.sort();
        ids
    }

    /// Merges one section's answers first-writer-wins.
    fn aggregate(&mut self, model: &LayoutModel, section: usize, judgments: &RawJudgments) {
        let Some(members) = model.sections().get(section) else {
            return;
        };

        for (key, judgment) in judgments.iter() {
            let id = Id::new(key);
            if !members.contains(id) {
                self.reject(key, section, "component is not part of the requested section");
                continue;
            }

            let orientation = match judgment {
                RawJudgment::Unresolved => {
                    trace!(component = key, section; "Oracle left component unresolved");
                    continue;
                }
                RawJudgment::Invalid(text) => {
                    self.reject(key, section, &format!("`{text}` is not a degree value"));
                    continue;
                }
                RawJudgment::Degrees(degrees) => match Orientation::try_from(*degrees) {
                    Ok(orientation) => orientation,
                    Err(err) => {
                        self.reject(key, section, &err.to_string());
                        continue;
                    }
                },
            };

            match self.assignments.get(&id) {
                Some(&kept) if kept != orientation => {
                    warn!(
                        component = key,
                        section,
                        kept:% = kept,
                        rejected:% = orientation;
                        "Conflicting orientation judgment ignored"
                    );
                    self.report.conflicts.push(OrientationConflict {
                        component: id,
                        section,
                        kept,
                        rejected: orientation,
                    });
                }
                Some(_) => {}
                None => {
                    debug!(
                        component = key,
                        section,
                        orientation:% = orientation;
                        "Orientation assigned"
                    );
                    self.assignments.insert(id, orientation);
                    self.progress += 1;
                }
            }
        }
    }

    fn reject(&mut self, component: &str, section: usize, reason: &str) {
        warn!(component, section, reason; "Orientation judgment rejected");
        self.report.rejected.push(RejectedJudgment {
            component: component.to_string(),
            section,
            reason: reason.to_string(),
        });
    }
}

/// Resolves component orientations section by section.
#[derive(Debug, Clone, Default)]
pub struct OrientationEngine {
    config: OrientationConfig,
}

impl OrientationEngine {
    pub fn new(config: &OrientationConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    /// Resolves an orientation for every component of `model`.
    ///
    /// `image` is forwarded to the oracle as the source image reference of
    /// every request.
    ///
    /// On success returns a copy of `model` carrying the orientations, and a
    /// report of the run.
    ///
    /// # Errors
    ///
    /// - [`OrientationError::Stalled`] when a pass assigns nothing new while
    ///   components are still unassigned, including components outside every
    ///   section.
    /// - [`OrientationError::IterationCapReached`] when the configured number
    ///   of passes runs out first.
    pub async fn resolve(
        &self,
        model: &LayoutModel,
        oracle: &dyn OrientationOracle,
        image: Option<&str>,
    ) -> Result<(LayoutModel, ResolutionReport), OrientationError> {
        let mut run = Resolution::default();
        let mut state = ResolutionState::Initializing;

        loop {
            trace!(state:? = state, iteration = run.report.iterations; "Orientation state");
            state = match state {
                ResolutionState::Initializing => {
                    info!(
                        components = model.component_count(),
                        sections = model.sections().len();
                        "Resolving orientations"
                    );
                    self.seed_unjudged(model, &mut run);
                    ResolutionState::IteratingSections
                }
                ResolutionState::IteratingSections => {
                    run.report.iterations += 1;
                    self.iterate_sections(model, oracle, image, &mut run).await;
                    ResolutionState::Aggregating
                }
                ResolutionState::Aggregating => {
                    run.progress = 0;
                    for (section, judgments) in std::mem::take(&mut run.answers) {
                        run.aggregate(model, section, &judgments);
                    }

                    let unassigned = run.unassigned(model);
                    if unassigned.is_empty() {
                        ResolutionState::Complete
                    } else if run.progress == 0 {
                        ResolutionState::Stalled
                    } else if run.report.iterations >= self.config.max_iterations() {
                        warn!(
                            iterations = run.report.iterations,
                            unresolved = unassigned.len();
                            "Orientation iteration limit reached"
                        );
                        return Err(OrientationError::IterationCapReached {
                            iterations: run.report.iterations,
                            unresolved: unassigned,
                        });
                    } else {
                        ResolutionState::Continue
                    }
                }
                ResolutionState::Continue => {
                    debug!(
                        iteration = run.report.iterations,
                        assigned = run.assignments.len();
                        "Orientation pass made progress"
                    );
                    ResolutionState::IteratingSections
                }
                ResolutionState::Complete => {
                    info!(
                        iterations = run.report.iterations,
                        conflicts = run.report.conflicts.len();
                        "Orientations resolved"
                    );
                    let resolved = model.clone().with_orientations(run.assignments);
                    return Ok((resolved, run.report));
                }
                ResolutionState::Stalled => {
                    let unresolved = run.unassigned(model);
                    warn!(
                        iteration = run.report.iterations,
                        unresolved = unresolved.len();
                        "Orientation resolution stalled"
                    );
                    return Err(OrientationError::Stalled { unresolved });
                }
            };
        }
    }

    /// Assigns 0° to components of kinds the oracle is never asked about.
    fn seed_unjudged(&self, model: &LayoutModel, run: &mut Resolution) {
        let kinds = self.config.unjudged_kinds();
        if kinds.is_empty() {
            return;
        }
        for component in model.components() {
            if kinds.contains(&component.kind()) {
                trace!(component:% = component.id(); "Seeding unjudged component");
                run.assignments.insert(component.id(), Orientation::Deg0);
            }
        }
    }

    async fn iterate_sections(
        &self,
        model: &LayoutModel,
        oracle: &dyn OrientationOracle,
        image: Option<&str>,
        run: &mut Resolution,
    ) {
        let mut unresolved_sections = Vec::new();

        for section in model.sections() {
            let pending: Vec<Id> = section
                .components()
                .iter()
                .copied()
                .filter(|id| !run.assignments.contains_key(id))
                .collect();
            if pending.is_empty() {
                continue;
            }

            let request = OrientationRequest::new(
                section.index(),
                section.components().to_vec(),
                pending,
                ImageRegion::new(
                    model.bounds_of(section.components()),
                    image.map(str::to_string),
                ),
            );

            match self.request_with_retry(oracle, &request).await {
                Some(judgments) => run.answers.push((section.index(), judgments)),
                None => {
                    warn!(section = section.index(); "Section left unresolved for this pass");
                    unresolved_sections.push(section.index());
                }
            }
        }

        run.report.unresolved_sections.push(unresolved_sections);
    }

    /// Calls the oracle under a timeout, retrying with backoff.
    ///
    /// Returns `None` once every attempt has failed.
    async fn request_with_retry(
        &self,
        oracle: &dyn OrientationOracle,
        request: &OrientationRequest,
    ) -> Option<RawJudgments> {
        let attempts = self.config.max_attempts();

        for attempt in 0..attempts {
            if attempt > 0 {
                let delay = self.backoff(attempt - 1);
                debug!(
                    section = request.section(),
                    attempt,
                    delay_ms = delay.as_millis() as u64;
                    "Retrying oracle"
                );
                tokio::time::sleep(delay).await;
            }

            match tokio::time::timeout(self.config.attempt_timeout(), oracle.judge(request)).await
            {
                Ok(Ok(judgments)) => {
                    debug!(
                        section = request.section(),
                        judgments = judgments.len();
                        "Oracle answered"
                    );
                    return Some(judgments);
                }
                Ok(Err(err)) => {
                    warn!(
                        section = request.section(),
                        attempt,
                        error:% = err;
                        "Oracle call failed"
                    );
                }
                Err(_) => {
                    warn!(
                        section = request.section(),
                        attempt,
                        timeout_ms = self.config.attempt_timeout().as_millis() as u64;
                        "Oracle call timed out"
                    );
                }
            }
        }

        None
    }

    /// Delay before retry number `retry` (0-based).
    ///
    /// Doubles from the base delay up to the configured maximum. The upper
    /// half of the delay is randomized.
    fn backoff(&self, retry: u32) -> Duration {
        let base = self.config.backoff_base().as_millis() as u64;
        let max = self.config.backoff_max().as_millis() as u64;

        let capped_ms = base.saturating_mul(1u64 << retry.min(10)).min(max);
        let half = capped_ms / 2;
        let jitter = rand::rng().random_range(0..=capped_ms - half);

        Duration::from_millis(half + jitter)
    }
}

#[cfg(test)]
mod tests {
    use std::{
        collections::VecDeque,
        sync::{
            Mutex,
            atomic::{AtomicUsize, Ordering},
        },
    };

    use async_trait::async_trait;

    use floorplan_core::{
        geometry::{Point, Size},
        semantic::{Component, ComponentKind},
    };
    use floorplan_parser::{ConnectionHypothesis, Detections};

    use super::*;
    use crate::{config::GraphConfig, structure::FlowGraphBuilder};

    fn model(ids: &[&str], edges: &[(&str, &str)]) -> LayoutModel {
        let components = ids
            .iter()
            .enumerate()
            .map(|(i, id)| {
                let kind = id
                    .chars()
                    .next()
                    .and_then(ComponentKind::from_prefix)
                    .expect("test ids use known prefixes");
                Component::new(
                    Id::new(id),
                    kind,
                    Point::new(i as f64 * 10.0, 0.0),
                    Size::new(4.0, 2.0),
                )
            })
            .collect();
        let connections = edges
            .iter()
            .map(|(from, to)| ConnectionHypothesis::new(*from, *to))
            .collect();
        FlowGraphBuilder::new(&GraphConfig::default())
            .build(&Detections::new(components, connections))
            .expect("test layouts are valid")
    }

    fn judgments(entries: &[(&str, i64)]) -> RawJudgments {
        entries
            .iter()
            .map(|(id, degrees)| (id.to_string(), RawJudgment::Degrees(*degrees)))
            .collect()
    }

    fn fast_config() -> OrientationConfig {
        OrientationConfig::default()
            .with_attempt_timeout(Duration::from_secs(1))
            .with_backoff(Duration::from_millis(10), Duration::from_millis(40))
    }

    /// Replies with scripted answers in call order, recording every request.
    #[derive(Default)]
    struct ScriptedOracle {
        answers: Mutex<VecDeque<Result<RawJudgments, OracleError>>>,
        requests: Mutex<Vec<OrientationRequest>>,
    }

    impl ScriptedOracle {
        fn new(answers: Vec<Result<RawJudgments, OracleError>>) -> Self {
            Self {
                answers: Mutex::new(answers.into()),
                requests: Mutex::default(),
            }
        }

        fn requests(&self) -> Vec<OrientationRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl OrientationOracle for ScriptedOracle {
        async fn judge(&self, request: &OrientationRequest) -> Result<RawJudgments, OracleError> {
            self.requests.lock().unwrap().push(request.clone());
            self.answers
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(RawJudgments::new()))
        }
    }

    /// Never answers within any reasonable timeout.
    #[derive(Default)]
    struct SlowOracle {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl OrientationOracle for SlowOracle {
        async fn judge(&self, _request: &OrientationRequest) -> Result<RawJudgments, OracleError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(RawJudgments::new())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_linear_layout_resolves_in_one_pass() {
        let model = model(&["L1", "C1", "U1"], &[("L1", "C1"), ("C1", "U1")]);
        let oracle = StaticOracle::new(judgments(&[("L1", 0), ("C1", 0), ("U1", 0)]));

        let (resolved, report) = OrientationEngine::new(&fast_config())
            .resolve(&model, &oracle, None)
            .await
            .unwrap();

        assert_eq!(report.iterations(), 1);
        assert!(report.conflicts().is_empty());
        assert_eq!(resolved.orientations().len(), 3);
        assert!(
            resolved
                .orientations()
                .values()
                .all(|o| *o == Orientation::Deg0)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_shared_diverter_first_writer_wins() {
        let model = model(
            &["L1", "D1", "C2", "C3", "U1", "U2"],
            &[
                ("L1", "D1"),
                ("D1", "C2"),
                ("D1", "C3"),
                ("C2", "U1"),
                ("C3", "U2"),
            ],
        );
        // Sections: [D1 C2 U1], [D1 C3 U2], [L1 D1]
        let oracle = ScriptedOracle::new(vec![
            Ok(judgments(&[("D1", 90), ("C2", 0), ("U1", 0)])),
            Ok(judgments(&[("D1", 180), ("C3", 90), ("U2", 90)])),
            Ok(judgments(&[("L1", 0), ("D1", 90)])),
        ]);

        let (resolved, report) = OrientationEngine::new(&fast_config())
            .resolve(&model, &oracle, None)
            .await
            .unwrap();

        assert_eq!(resolved.orientation(Id::new("D1")), Some(Orientation::Deg90));
        assert_eq!(
            report.conflicts(),
            &[OrientationConflict {
                component: Id::new("D1"),
                section: 1,
                kept: Orientation::Deg90,
                rejected: Orientation::Deg180,
            }]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_partial_answers_continue_with_pending_components() {
        let model = model(&["L1", "C1", "U1"], &[("L1", "C1"), ("C1", "U1")]);
        let oracle = ScriptedOracle::new(vec![
            Ok(judgments(&[("L1", 0), ("U1", 0)]).with("C1", RawJudgment::Unresolved)),
            Ok(judgments(&[("C1", 270)])),
        ]);

        let (resolved, report) = OrientationEngine::new(&fast_config())
            .resolve(&model, &oracle, Some("plan.png"))
            .await
            .unwrap();

        assert_eq!(report.iterations(), 2);
        assert_eq!(resolved.orientation(Id::new("C1")), Some(Orientation::Deg270));

        let requests = oracle.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[1].pending(), &[Id::new("C1")]);
        assert_eq!(requests[1].region().image(), Some("plan.png"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_and_foreign_judgments_are_rejected() {
        let model = model(
            &["L1", "C1", "U1", "L2", "U2"],
            &[("L1", "C1"), ("C1", "U1"), ("L2", "U2")],
        );
        // Sections: [L1 C1 U1], [L2 U2]
        let oracle = ScriptedOracle::new(vec![
            Ok(judgments(&[("L1", 0), ("C1", 45), ("U1", 0), ("U2", 90)])
                .with("C9", RawJudgment::Degrees(0))),
            Ok(judgments(&[("L2", 0), ("U2", 0)])),
            Ok(judgments(&[("C1", 90)]).with("L1", RawJudgment::Invalid("north".to_string()))),
        ]);

        let (resolved, report) = OrientationEngine::new(&fast_config())
            .resolve(&model, &oracle, None)
            .await
            .unwrap();

        assert_eq!(resolved.orientation(Id::new("C1")), Some(Orientation::Deg90));
        assert_eq!(resolved.orientation(Id::new("U2")), Some(Orientation::Deg0));

        let rejected: Vec<_> = report
            .rejected()
            .iter()
            .map(|r| (r.component(), r.section()))
            .collect();
        assert_eq!(rejected, vec![("C1", 0), ("C9", 0), ("U2", 0), ("L1", 0)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unreachable_component_stalls() {
        let model = model(&["L1", "U1", "C9"], &[("L1", "U1")]);
        let oracle = StaticOracle::new(judgments(&[("L1", 0), ("U1", 0), ("C9", 0)]));

        let err = OrientationEngine::new(&fast_config())
            .resolve(&model, &oracle, None)
            .await
            .unwrap_err();

        assert_eq!(
            err,
            OrientationError::Stalled {
                unresolved: vec![Id::new("C9")]
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_iteration_cap() {
        let model = model(&["L1", "C1", "U1"], &[("L1", "C1"), ("C1", "U1")]);
        let oracle = ScriptedOracle::new(vec![
            Ok(judgments(&[("L1", 0)])),
            Ok(judgments(&[("C1", 0)])),
            Ok(judgments(&[("U1", 0)])),
        ]);

        let err = OrientationEngine::new(&fast_config().with_max_iterations(2))
            .resolve(&model, &oracle, None)
            .await
            .unwrap_err();

        assert_eq!(
            err,
            OrientationError::IterationCapReached {
                iterations: 2,
                unresolved: vec![Id::new("U1")]
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_calls_are_retried() {
        let model = model(&["L1", "U1"], &[("L1", "U1")]);
        let oracle = ScriptedOracle::new(vec![
            Err(OracleError::Unavailable("connection refused".to_string())),
            Err(OracleError::Unavailable("connection refused".to_string())),
            Ok(judgments(&[("L1", 0), ("U1", 180)])),
        ]);

        let (resolved, report) = OrientationEngine::new(&fast_config())
            .resolve(&model, &oracle, None)
            .await
            .unwrap();

        assert_eq!(oracle.requests().len(), 3);
        assert_eq!(report.iterations(), 1);
        assert_eq!(report.unresolved_sections(), &[Vec::<usize>::new()]);
        assert_eq!(resolved.orientation(Id::new("U1")), Some(Orientation::Deg180));
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_section_is_retried_next_pass() {
        let model = model(&["L1", "U1", "L2", "U2"], &[("L1", "U1"), ("L2", "U2")]);
        // Sections: [L1 U1], [L2 U2]
        let oracle = ScriptedOracle::new(vec![
            Err(OracleError::Unavailable("busy".to_string())),
            Err(OracleError::Unavailable("busy".to_string())),
            Err(OracleError::Unavailable("busy".to_string())),
            Ok(judgments(&[("L2", 0), ("U2", 90)])),
            Ok(judgments(&[("L1", 180), ("U1", 0)])),
        ]);

        let (resolved, report) = OrientationEngine::new(&fast_config())
            .resolve(&model, &oracle, None)
            .await
            .unwrap();

        assert_eq!(report.iterations(), 2);
        assert_eq!(report.unresolved_sections(), &[vec![0usize], Vec::new()]);
        assert_eq!(resolved.orientation(Id::new("L1")), Some(Orientation::Deg180));
        assert_eq!(resolved.orientation(Id::new("U2")), Some(Orientation::Deg90));

        let sections: Vec<_> = oracle.requests().iter().map(|r| r.section()).collect();
        assert_eq!(sections, vec![0, 0, 0, 1, 0]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeouts_exhaust_attempts_and_stall() {
        let model = model(&["L1", "U1"], &[("L1", "U1")]);
        let oracle = SlowOracle::default();

        let err = OrientationEngine::new(&fast_config())
            .resolve(&model, &oracle, None)
            .await
            .unwrap_err();

        assert_eq!(oracle.calls.load(Ordering::SeqCst), 3);
        assert_eq!(err.unresolved(), &[Id::new("L1"), Id::new("U1")]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unjudged_kinds_are_seeded() {
        let model = model(&["L1", "C1", "U1"], &[("L1", "C1"), ("C1", "U1")]);
        let oracle = ScriptedOracle::new(vec![Ok(judgments(&[("C1", 90), ("L1", 180)]))]);
        let config =
            fast_config().with_unjudged_kinds(vec![ComponentKind::Source, ComponentKind::Sink]);

        let (resolved, report) = OrientationEngine::new(&config)
            .resolve(&model, &oracle, None)
            .await
            .unwrap();

        assert_eq!(oracle.requests()[0].pending(), &[Id::new("C1")]);
        assert_eq!(resolved.orientation(Id::new("L1")), Some(Orientation::Deg0));
        assert_eq!(report.conflicts().len(), 1);
    }

    #[test]
    fn test_backoff_is_bounded() {
        let engine = OrientationEngine::new(
            &OrientationConfig::default()
                .with_backoff(Duration::from_millis(100), Duration::from_millis(300)),
        );

        for retry in 0..20 {
            let delay = engine.backoff(retry);
            assert!(delay <= Duration::from_millis(300));
        }
        assert!(engine.backoff(0) >= Duration::from_millis(50));
        assert!(engine.backoff(5) >= Duration::from_millis(150));
    }
}
