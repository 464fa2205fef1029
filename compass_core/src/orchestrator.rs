//! Worker pool fanning samples out to the engine's threads
//!
//! The orchestrator runs on the calling thread inside a rayon scope. Each sample becomes
//! one task on the pool, so at most `processes` samples are solved at once. Tasks report
//! back over a channel; a task that panics counts as a dead worker, its claim is dropped
//! and the sample is handed out again, up to `max_sample_attempts` times.
use std::any::Any;
use std::collections::HashSet;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, Sender};

use indexmap::IndexMap;
use tracing::{debug, info, info_span, warn};

use crate::cache::ledger::Progress;
use crate::engine::{EngineError, PenaltyEngine};
use crate::io::matrix::PenaltyMatrix;
use crate::io::selection::ReactionSelection;
use crate::metabolic_model::expression::{ReactionWeights, SampleExpression};
use crate::penalty::SamplePenalties;

/// Lifecycle of a sample within a run
#[derive(Clone, Debug, PartialEq)]
pub enum SampleState {
    /// Waiting for a worker
    Pending,
    /// Picked up by a worker
    Assigned { attempt: u32 },
    /// `done` of `total` reaction penalties stored
    Solving { attempt: u32, done: usize, total: usize },
    /// All requested results are durable, `attempts` is 0 for samples already cached
    Complete { attempts: u32 },
    /// Gave up on the sample
    Failed { attempts: u32, reason: String },
}

/// Outcome of a run
#[derive(Clone, Debug)]
pub struct RunReport {
    /// Final state of every sample, in input order
    pub states: IndexMap<String, SampleState>,
    /// Samples whose results were already in the cache
    pub skipped: usize,
    /// Samples computed during this run
    pub processed: usize,
    pub failed: usize,
    pub matrix: PenaltyMatrix,
}

impl RunReport {
    pub fn state(&self, sample: &str) -> Option<&SampleState> {
        self.states.get(sample)
    }
}

enum WorkerEvent {
    Started { sample: usize, attempt: u32 },
    Progress { sample: usize, done: usize, total: usize },
    Finished { sample: usize, result: Result<(), String> },
    Died { sample: usize, attempt: u32, message: String },
}

/// Schedules the samples of one run onto the engine's pool
pub struct Orchestrator<'e> {
    engine: &'e PenaltyEngine,
}

impl<'e> Orchestrator<'e> {
    pub fn new(engine: &'e PenaltyEngine) -> Self {
        Orchestrator { engine }
    }

    /// Process every sample that is not already complete, then assemble the matrix
    pub fn run(
        &self,
        samples: &[SampleExpression],
        selection: Option<&ReactionSelection>,
    ) -> Result<RunReport, EngineError> {
        let mut seen = HashSet::new();
        if let Some(duplicate) = samples.iter().find(|s| !seen.insert(s.id.as_str())) {
            return Err(EngineError::DuplicateSample(duplicate.id.clone()));
        }
        if let Some(selection) = selection {
            for sample in selection.samples().filter(|id| !seen.contains(id)) {
                warn!(sample, "selected sample is not part of the run");
            }
        }

        let network = self.engine.network();
        let cache = self.engine.cache();
        let targets: Vec<Option<Vec<usize>>> = samples
            .iter()
            .map(|sample| {
                selection
                    .and_then(|selection| selection.reactions_for(&sample.id))
                    .map(|reactions| {
                        reactions
                            .iter()
                            .filter_map(|id| network.direction_index(id))
                            .collect()
                    })
            })
            .collect();

        let mut states = IndexMap::new();
        let mut attempts = vec![0u32; samples.len()];
        let mut pending = Vec::new();
        let mut skipped = 0;
        for (index, sample) in samples.iter().enumerate() {
            if self.is_done(sample, targets[index].as_deref())? {
                states.insert(sample.id.clone(), SampleState::Complete { attempts: 0 });
                skipped += 1;
                continue;
            }
            if cache.progress(&sample.id) == Progress::InProgress {
                info!(sample = %sample.id, "sample was interrupted, computing it again");
                cache.discard_claim(&sample.id)?;
            }
            states.insert(sample.id.clone(), SampleState::Pending);
            pending.push(index);
        }
        info!(
            total = samples.len(),
            skipped,
            pending = pending.len(),
            "starting penalty run"
        );

        let mut processed = 0;
        let mut failed = 0;
        let max_attempts = self.engine.config().max_sample_attempts;
        if !pending.is_empty() {
            self.engine.pool().in_place_scope(|scope| {
                let (sender, receiver) = mpsc::channel();
                let mut outstanding = 0usize;
                for index in pending {
                    attempts[index] = 1;
                    self.spawn(scope, index, &samples[index], targets[index].as_deref(), 1, sender.clone());
                    outstanding += 1;
                }
                while outstanding > 0 {
                    let Ok(event) = receiver.recv() else { break };
                    match event {
                        WorkerEvent::Started { sample, attempt } => {
                            states[sample] = SampleState::Assigned { attempt };
                        }
                        WorkerEvent::Progress { sample, done, total } => {
                            states[sample] = SampleState::Solving {
                                attempt: attempts[sample],
                                done,
                                total,
                            };
                        }
                        WorkerEvent::Finished { sample, result } => {
                            outstanding -= 1;
                            states[sample] = match result {
                                Ok(()) => {
                                    processed += 1;
                                    SampleState::Complete {
                                        attempts: attempts[sample],
                                    }
                                }
                                Err(reason) => {
                                    let id = &samples[sample].id;
                                    warn!(sample = %id, %reason, "sample failed");
                                    if let Err(err) = cache.discard_claim(id) {
                                        warn!(sample = %id, %err, "unable to discard claim");
                                    }
                                    failed += 1;
                                    SampleState::Failed {
                                        attempts: attempts[sample],
                                        reason,
                                    }
                                }
                            };
                        }
                        WorkerEvent::Died {
                            sample,
                            attempt,
                            message,
                        } => {
                            outstanding -= 1;
                            let id = &samples[sample].id;
                            warn!(sample = %id, attempt, %message, "worker died");
                            if let Err(err) = cache.discard_claim(id) {
                                warn!(sample = %id, %err, "unable to discard claim");
                            }
                            if attempt < max_attempts {
                                attempts[sample] = attempt + 1;
                                states[sample] = SampleState::Pending;
                                self.spawn(
                                    scope,
                                    sample,
                                    &samples[sample],
                                    targets[sample].as_deref(),
                                    attempt + 1,
                                    sender.clone(),
                                );
                                outstanding += 1;
                            } else {
                                failed += 1;
                                states[sample] = SampleState::Failed {
                                    attempts: attempt,
                                    reason: format!("worker died: {message}"),
                                };
                            }
                        }
                    }
                }
            });
        }

        let mut matrix = PenaltyMatrix::new(cache.reactions().iter().cloned().collect());
        for (sample, state) in samples.iter().zip(states.values()) {
            match state {
                SampleState::Failed { .. } => matrix.push_failed_sample(&sample.id),
                _ => matrix.push_sample(
                    &sample.id,
                    &cache.load(&sample.id)?.unwrap_or_default(),
                ),
            }
        }
        info!(skipped, processed, failed, "penalty run finished");
        Ok(RunReport {
            states,
            skipped,
            processed,
            failed,
            matrix,
        })
    }

    /// Whether nothing is left to compute for a sample
    fn is_done(&self, sample: &SampleExpression, targets: Option<&[usize]>) -> Result<bool, EngineError> {
        let cache = self.engine.cache();
        match targets {
            None => Ok(cache.has(&sample.id)),
            Some(targets) => {
                let stored = cache.load(&sample.id)?.unwrap_or_default();
                let directions = self.engine.network().directions();
                Ok(targets
                    .iter()
                    .all(|index| stored.contains_key(&directions[*index].id)))
            }
        }
    }

    fn spawn<'s>(
        &'s self,
        scope: &rayon::Scope<'s>,
        index: usize,
        sample: &'s SampleExpression,
        targets: Option<&'s [usize]>,
        attempt: u32,
        sender: Sender<WorkerEvent>,
    ) {
        scope.spawn(move |_| {
            let _ = sender.send(WorkerEvent::Started {
                sample: index,
                attempt,
            });
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                process_sample(self.engine, sample, targets, &mut |done, total| {
                    let _ = sender.send(WorkerEvent::Progress {
                        sample: index,
                        done,
                        total,
                    });
                })
            }));
            let event = match outcome {
                Ok(result) => WorkerEvent::Finished {
                    sample: index,
                    result: result.map_err(|err| err.to_string()),
                },
                Err(payload) => WorkerEvent::Died {
                    sample: index,
                    attempt,
                    message: panic_message(payload.as_ref()),
                },
            };
            let _ = sender.send(event);
        });
    }
}

/// Compute and store the missing penalties of one sample
///
/// Runs on a pool thread with its own solver session. Reactions already stored are reused
/// for selected samples, and for all samples when `reuse_partial_results` is set.
fn process_sample(
    engine: &PenaltyEngine,
    sample: &SampleExpression,
    targets: Option<&[usize]>,
    progress: &mut dyn FnMut(usize, usize),
) -> Result<(), EngineError> {
    let span = info_span!("sample", id = %sample.id);
    let _guard = span.enter();
    let cache = engine.cache();
    let network = engine.network();
    cache.mark_in_progress(&sample.id)?;

    let stored = if targets.is_some() || engine.config().reuse_partial_results {
        cache.load(&sample.id)?.unwrap_or_default()
    } else {
        IndexMap::new()
    };
    let directions = network.directions();
    let pending: Vec<usize> = match targets {
        Some(targets) => targets.to_vec(),
        None => (0..directions.len()).collect(),
    }
    .into_iter()
    .filter(|index| !stored.contains_key(&directions[*index].id))
    .collect();

    let mut solver = (engine.solver_factory())()?;
    let weights = ReactionWeights::from_expression(engine.model(), sample, engine.config());
    let penalties = SamplePenalties::new(network, &weights, engine.config());
    let total = pending.len();
    progress(0, total);
    for (done, index) in pending.into_iter().enumerate() {
        let direction = &directions[index];
        let reference = engine.reference_fluxes().get(&direction.id);
        let result = penalties.penalty(solver.as_mut(), index, reference)?;
        cache.store(&sample.id, &direction.id, &result)?;
        progress(done + 1, total);
    }

    if cache.mark_complete(&sample.id)? {
        debug!(reactions = total, "sample complete");
    } else if targets.is_some() {
        cache.discard_claim(&sample.id)?;
    } else {
        return Err(EngineError::IncompleteSample(sample.id.clone()));
    }
    Ok(())
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
