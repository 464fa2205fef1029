//! Module providing the Model struct for representing a metabolic model.

pub mod expression;
pub mod gene;
pub mod metabolite;
pub mod model;
pub mod reaction;
