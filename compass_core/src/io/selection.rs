//! Per-sample reaction selections
//!
//! A selection file has one line per sample, `sample,reaction1,reaction2,...`, naming
//! the directional reactions to compute for that sample. Samples without a line are
//! computed in full; a line naming no reactions is rejected.
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use indexmap::{IndexMap, IndexSet};
use thiserror::Error;

/// Reactions requested for each listed sample
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ReactionSelection {
    samples: IndexMap<String, Vec<String>>,
}

impl ReactionSelection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add reactions to a sample's selection, repeated reactions are kept once
    pub fn select<I, S>(&mut self, sample: &str, reactions: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let selected = self.samples.entry(sample.to_string()).or_default();
        for reaction in reactions {
            let reaction = reaction.into();
            if !selected.contains(&reaction) {
                selected.push(reaction);
            }
        }
    }

    /// Parse the `sample,reaction,...` line format
    pub fn parse<R: BufRead>(reader: R) -> Result<Self, SelectionError> {
        let mut selection = ReactionSelection::new();
        for (number, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let mut fields = line.split(',').map(str::trim);
            let sample = fields.next().unwrap_or_default();
            if sample.is_empty() {
                return Err(SelectionError::MissingSample(number + 1));
            }
            selection.select(sample, fields.filter(|field| !field.is_empty()));
        }
        Ok(selection)
    }

    pub fn read_file<P: AsRef<Path>>(path: P) -> Result<Self, SelectionError> {
        Self::parse(BufReader::new(File::open(path)?))
    }

    /// Selected reactions of a sample, `None` if the sample is not listed
    pub fn reactions_for(&self, sample: &str) -> Option<&[String]> {
        self.samples.get(sample).map(Vec::as_slice)
    }

    pub fn samples(&self) -> impl Iterator<Item = &str> {
        self.samples.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Check that every listed sample selects at least one reaction, and every selected
    /// reaction is one of `known`
    pub fn validate(&self, known: &IndexSet<String>) -> Result<(), SelectionError> {
        for (sample, reactions) in &self.samples {
            if reactions.is_empty() {
                return Err(SelectionError::NoReactions(sample.clone()));
            }
            if let Some(reaction) = reactions.iter().find(|r| !known.contains(*r)) {
                return Err(SelectionError::UnknownReaction {
                    sample: sample.clone(),
                    reaction: reaction.clone(),
                });
            }
        }
        Ok(())
    }
}

/// Errors reading or applying a reaction selection
#[derive(Error, Debug)]
pub enum SelectionError {
    #[error("selection for sample {sample} names unknown reaction {reaction}")]
    UnknownReaction { sample: String, reaction: String },
    #[error("selection line {0} has no sample")]
    MissingSample(usize),
    #[error("selection for sample {0} names no reactions")]
    NoReactions(String),
    #[error("unable to read selection: {0}")]
    UnableToRead(#[from] std::io::Error),
}
