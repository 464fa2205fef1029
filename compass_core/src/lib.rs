//! Core rust implementation of the Compass reaction penalty engine.
//!
//! Given a metabolic model, a media definition and per-cell gene expression,
//! the engine scores every reaction in every cell by the flux cost the cell
//! has to pay to keep that reaction near its maximal flux. See
//! [`engine::PenaltyEngine`] for the entry point.

pub mod cache;
pub mod configuration;
pub mod engine;
pub mod io;
pub mod metabolic_model;
pub mod optimize;
pub mod orchestrator;
pub mod penalty;
mod utils;
