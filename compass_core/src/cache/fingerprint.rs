//! Cache fingerprints
//!
//! A fingerprint is a sha256 over everything that can change a penalty: the model
//! (identity, bounds, stoichiometry, GPRs), the media, and the result affecting solver
//! settings. Concurrency and retry settings are left out.
use std::fmt::{Display, Formatter};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::configuration::{Configuration, Solver};
use crate::io::media::MediaConstraints;
use crate::metabolic_model::model::Model;
use crate::utils::hashing::sha256_hex;

/// Bumped whenever the on-disk layout or penalty formulation changes
pub(crate) const CACHE_FORMAT_VERSION: u32 = 1;

/// Deterministic key for a (model, media, solver configuration) combination
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CacheFingerprint(String);

impl CacheFingerprint {
    pub fn compute(
        model: &Model,
        media: &MediaConstraints,
        config: &Configuration,
    ) -> Result<Self, serde_json::Error> {
        let hash = sha256_hex(&[
            &CACHE_FORMAT_VERSION,
            &ModelIdentity::from(model),
            media,
            &SolverIdentity::from(config),
        ])?;
        Ok(CacheFingerprint(hash))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether a directory name could be a fingerprint
    pub(crate) fn looks_like(name: &str) -> bool {
        name.len() == 64 && name.bytes().all(|b| b.is_ascii_hexdigit())
    }
}

impl Display for CacheFingerprint {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Serialize)]
struct ModelIdentity<'m> {
    id: Option<&'m str>,
    version: Option<&'m str>,
    reactions: Vec<ReactionIdentity<'m>>,
}

#[derive(Serialize)]
struct ReactionIdentity<'m> {
    id: &'m str,
    lower_bound: f64,
    upper_bound: f64,
    metabolites: &'m IndexMap<String, f64>,
    gpr: Option<String>,
}

impl<'m> From<&'m Model> for ModelIdentity<'m> {
    fn from(model: &'m Model) -> Self {
        ModelIdentity {
            id: model.id.as_deref(),
            version: model.version.as_deref(),
            reactions: model
                .reactions
                .values()
                .map(|reaction| ReactionIdentity {
                    id: &reaction.id,
                    lower_bound: reaction.lower_bound,
                    upper_bound: reaction.upper_bound,
                    metabolites: &reaction.metabolites,
                    gpr: reaction.gpr.as_ref().map(|gpr| gpr.to_string_id()),
                })
                .collect(),
        }
    }
}

#[derive(Serialize)]
struct SolverIdentity {
    solver: Solver,
    tolerance: f64,
    optimality_fraction: f64,
    default_weight: f64,
    missing_gene_value: Option<f64>,
    time_limit: Option<f64>,
    max_iterations: u32,
}

impl From<&Configuration> for SolverIdentity {
    fn from(config: &Configuration) -> Self {
        SolverIdentity {
            solver: config.solver,
            tolerance: config.tolerance,
            optimality_fraction: config.optimality_fraction,
            default_weight: config.default_weight,
            missing_gene_value: config.missing_gene_value,
            time_limit: config.time_limit,
            max_iterations: config.max_iterations,
        }
    }
}
