//! Module for reading and writing the files around a penalty run
//!
//! GPR rules are parsed at model build time, media and reaction selections are read
//! before a run, and the penalty matrix is written after it.
pub mod gpr_parse;
pub mod matrix;
pub mod media;
pub mod selection;
