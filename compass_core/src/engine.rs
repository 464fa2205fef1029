//! Entry point of a penalty run
//!
//! [`PenaltyEngine::new`] does all the work shared by every sample, and rejects unusable
//! setups before any sample is touched: it checks the configuration and model, builds
//! the base problem under the media, checks it is feasible, opens the cache for the
//! run's fingerprint and computes (or reloads) the reference fluxes.
use std::path::Path;

use rayon::{ThreadPool, ThreadPoolBuilder};
use thiserror::Error;
use tracing::{info, info_span};

use crate::cache::fingerprint::CacheFingerprint;
use crate::cache::{CacheError, CacheManifest, SampleCache};
use crate::configuration::{Configuration, ConfigurationError};
use crate::io::media::MediaConstraints;
use crate::io::selection::{ReactionSelection, SelectionError};
use crate::metabolic_model::expression::SampleExpression;
use crate::metabolic_model::model::{Model, ModelError};
use crate::optimize::network::{NetworkError, NetworkProblem};
use crate::optimize::solvers::{solver_factory, SolverError, SolverFactory};
use crate::optimize::OptimizationStatus;
use crate::orchestrator::{Orchestrator, RunReport};
use crate::penalty::ReferenceFluxes;

/// Shared, read-only state of a penalty run
pub struct PenaltyEngine {
    model: Model,
    media: MediaConstraints,
    config: Configuration,
    network: NetworkProblem,
    cache: SampleCache,
    reference: ReferenceFluxes,
    solver_factory: SolverFactory,
    pool: ThreadPool,
}

impl PenaltyEngine {
    /// Prepare a run, using the solver backend named in `config`
    pub fn new<P: AsRef<Path>>(
        model: Model,
        media: MediaConstraints,
        config: Configuration,
        cache_root: P,
    ) -> Result<Self, EngineError> {
        let factory = solver_factory(&config)?;
        Self::with_solver_factory(model, media, config, cache_root, factory)
    }

    /// Prepare a run with a caller supplied source of solver sessions
    pub fn with_solver_factory<P: AsRef<Path>>(
        model: Model,
        media: MediaConstraints,
        config: Configuration,
        cache_root: P,
        solver_factory: SolverFactory,
    ) -> Result<Self, EngineError> {
        let span = info_span!("prepare", media = %media.name);
        let _guard = span.enter();
        config.check()?;
        model.validate()?;
        let network = NetworkProblem::build(&model, &media)?;

        let mut solver = solver_factory()?;
        let feasibility = network.check_feasible(solver.as_mut())?;
        if !feasibility.is_optimal() {
            return Err(EngineError::InfeasibleBaseProblem(feasibility.status));
        }

        let pool = ThreadPoolBuilder::new()
            .num_threads(config.processes)
            .thread_name(|index| format!("compass-worker-{index}"))
            .build()?;

        let fingerprint = CacheFingerprint::compute(&model, &media, &config)?;
        let manifest = CacheManifest::new(fingerprint, &model, &media, &network);
        let cache = SampleCache::open(cache_root, manifest)?;

        let reference = match cache.load_reference_fluxes() {
            Some(reference) if reference.covers(&network) => reference,
            _ => {
                info!(
                    reactions = network.directions().len(),
                    "computing reference fluxes"
                );
                let reference =
                    pool.install(|| ReferenceFluxes::compute(&network, &solver_factory))?;
                cache.store_reference_fluxes(&reference)?;
                reference
            }
        };
        info!(
            fingerprint = %cache.fingerprint(),
            solver = solver.name(),
            "penalty engine ready"
        );
        Ok(PenaltyEngine {
            model,
            media,
            config,
            network,
            cache,
            reference,
            solver_factory,
            pool,
        })
    }

    /// Compute every reaction penalty of every sample not already in the cache
    pub fn run(&self, samples: &[SampleExpression]) -> Result<RunReport, EngineError> {
        Orchestrator::new(self).run(samples, None)
    }

    /// Like [`run`](Self::run), but samples listed in `selection` only compute their
    /// selected reactions
    pub fn run_selected(
        &self,
        samples: &[SampleExpression],
        selection: &ReactionSelection,
    ) -> Result<RunReport, EngineError> {
        selection.validate(self.cache.reactions())?;
        Orchestrator::new(self).run(samples, Some(selection))
    }

    pub fn model(&self) -> &Model {
        &self.model
    }

    pub fn media(&self) -> &MediaConstraints {
        &self.media
    }

    pub fn config(&self) -> &Configuration {
        &self.config
    }

    pub fn network(&self) -> &NetworkProblem {
        &self.network
    }

    pub fn cache(&self) -> &SampleCache {
        &self.cache
    }

    pub fn reference_fluxes(&self) -> &ReferenceFluxes {
        &self.reference
    }

    pub(crate) fn solver_factory(&self) -> &SolverFactory {
        &self.solver_factory
    }

    pub(crate) fn pool(&self) -> &ThreadPool {
        &self.pool
    }
}

/// Errors which stop a run
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("invalid configuration: {0}")]
    Configuration(#[from] ConfigurationError),
    #[error("invalid model: {0}")]
    Model(#[from] ModelError),
    #[error("unable to build network: {0}")]
    Network(#[from] NetworkError),
    #[error("invalid reaction selection: {0}")]
    Selection(#[from] SelectionError),
    #[error("solver error: {0}")]
    Solver(#[from] SolverError),
    #[error("cache error: {0}")]
    Cache(#[from] CacheError),
    #[error("unable to compute cache fingerprint: {0}")]
    Fingerprint(#[from] serde_json::Error),
    #[error("unable to start worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
    #[error("base problem has no steady state under the media (solver status {0:?})")]
    InfeasibleBaseProblem(OptimizationStatus),
    #[error("sample {0} appears more than once")]
    DuplicateSample(String),
    #[error("sample {0} finished without a result for every reaction")]
    IncompleteSample(String),
}
