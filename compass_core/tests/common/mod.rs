#![allow(dead_code)]
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use compass_core::configuration::{Configuration, ConfigurationBuilder};
use compass_core::io::media::MediaConstraints;
use compass_core::metabolic_model::expression::SampleExpression;
use compass_core::metabolic_model::metabolite::Metabolite;
use compass_core::metabolic_model::model::Model;
use compass_core::metabolic_model::reaction::ReactionBuilder;
use compass_core::optimize::problem::{Problem, ProblemOverlay};
use compass_core::optimize::solvers::clarabel::{ClarabelSettings, ClarabelSolver};
use compass_core::optimize::solvers::{LpSolver, SolverError, SolverFactory};
use compass_core::optimize::ProblemSolution;
use tracing_subscriber::EnvFilter;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Uptake of A (R1), A to B (R2), secretion of B (R3), a dead end on C (R4),
/// a blocked reaction (R5) and a reversible B to A conversion (R6)
pub fn toy_model() -> Model {
    let mut model = Model::new("toy", Some("1"));
    for id in ["A", "B", "C"] {
        model.add_metabolite(Metabolite::new(id)).unwrap();
    }
    for (id, metabolites, lb, ub) in [
        ("R1", vec![("A", 1.)], -1000., 1000.),
        ("R2", vec![("A", -1.), ("B", 1.)], 0., 1000.),
        ("R3", vec![("B", -1.)], 0., 1000.),
        ("R4", vec![("C", -1.)], 0., 1000.),
        ("R5", vec![("A", -1.)], 0., 0.),
        ("R6", vec![("B", -1.), ("A", 1.)], -1000., 1000.),
    ] {
        model
            .add_reaction(
                ReactionBuilder::default()
                    .id(id.to_string())
                    .metabolites(
                        metabolites
                            .into_iter()
                            .map(|(m, c)| (m.to_string(), c))
                            .collect(),
                    )
                    .lower_bound(lb)
                    .upper_bound(ub)
                    .build()
                    .unwrap(),
            )
            .unwrap();
    }
    model.set_gene_reaction_rule("R2", "(g2 and g3) or g4").unwrap();
    model.set_gene_reaction_rule("R3", "g5").unwrap();
    model.set_gene_reaction_rule("R6", "g6").unwrap();
    model
}

pub fn media() -> MediaConstraints {
    MediaConstraints::new("limited_uptake").with_bound("R1", 0., 10.)
}

pub fn config(processes: usize) -> Configuration {
    ConfigurationBuilder::default()
        .processes(processes)
        .build()
        .unwrap()
}

pub fn samples(count: usize) -> Vec<SampleExpression> {
    (0..count)
        .map(|i| {
            let level = i as f64;
            SampleExpression::new(
                format!("cell {i}"),
                [
                    ("g2".to_string(), level),
                    ("g3".to_string(), 2. * level),
                    ("g4".to_string(), 1.),
                    ("g5".to_string(), 10. - level),
                ]
                .into_iter()
                .collect(),
            )
            .unwrap()
        })
        .collect()
}

/// Clarabel wrapped to count solves, and to panic or refuse sessions on demand
#[derive(Clone, Default)]
pub struct Probe {
    pub solves: Arc<AtomicUsize>,
    /// Number of upcoming solves that panic
    pub panics: Arc<AtomicUsize>,
    /// New sessions fail to open while set
    pub refuse_sessions: Arc<AtomicBool>,
}

impl Probe {
    pub fn factory(&self) -> SolverFactory {
        let probe = self.clone();
        Arc::new(move || {
            if probe.refuse_sessions.load(Ordering::SeqCst) {
                return Err(SolverError::Backend("solver license unavailable".to_string()));
            }
            Ok(Box::new(ProbeSolver {
                inner: ClarabelSolver::new(ClarabelSettings {
                    max_iterations: 200,
                    time_limit: None,
                }),
                probe: probe.clone(),
            }) as Box<dyn LpSolver>)
        })
    }

    pub fn solves(&self) -> usize {
        self.solves.load(Ordering::SeqCst)
    }

    pub fn panic_next(&self, count: usize) {
        self.panics.store(count, Ordering::SeqCst);
    }

    pub fn refuse_sessions(&self, refuse: bool) {
        self.refuse_sessions.store(refuse, Ordering::SeqCst);
    }
}

struct ProbeSolver {
    inner: ClarabelSolver,
    probe: Probe,
}

impl LpSolver for ProbeSolver {
    fn name(&self) -> &'static str {
        "probe"
    }

    fn solve(
        &mut self,
        problem: &Problem,
        overlay: &ProblemOverlay,
    ) -> Result<ProblemSolution, SolverError> {
        self.probe.solves.fetch_add(1, Ordering::SeqCst);
        let crash = self
            .probe
            .panics
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if crash {
            panic!("injected solver crash");
        }
        self.inner.solve(problem, overlay)
    }
}
