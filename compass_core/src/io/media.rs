//! Media definitions, bound overrides applied to the model before any sample is solved
use std::fs;
use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::metabolic_model::model::Model;

/// Named set of bound overrides, usually on exchange and transport reactions
///
/// Serialized as
/// `{"name": "...", "bounds": {"<reaction>": {"lower_bound": x, "upper_bound": y}}}`
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MediaConstraints {
    /// Name of the media
    pub name: String,
    /// Reaction id to the bounds it takes in this media
    #[serde(default)]
    pub bounds: IndexMap<String, MediaBound>,
}

/// Replacement bounds for a single reaction
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct MediaBound {
    pub lower_bound: f64,
    pub upper_bound: f64,
}

impl MediaConstraints {
    /// Create a media with no overrides
    pub fn new(name: &str) -> Self {
        MediaConstraints {
            name: name.to_string(),
            bounds: IndexMap::new(),
        }
    }

    /// Add (or replace) the bounds for a reaction
    pub fn with_bound(mut self, reaction: &str, lower_bound: f64, upper_bound: f64) -> Self {
        self.set_bound(reaction, lower_bound, upper_bound);
        self
    }

    /// Set the bounds for a reaction
    pub fn set_bound(&mut self, reaction: &str, lower_bound: f64, upper_bound: f64) {
        self.bounds.insert(
            reaction.to_string(),
            MediaBound {
                lower_bound,
                upper_bound,
            },
        );
    }

    /// Parse a media from a JSON string
    pub fn from_json_str(data: &str) -> Result<Self, MediaError> {
        Ok(serde_json::from_str(data)?)
    }

    /// Read a media from a JSON file
    pub fn read_json<P: AsRef<Path>>(path: P) -> Result<Self, MediaError> {
        let data = fs::read_to_string(path)?;
        Self::from_json_str(&data)
    }

    /// Check that every override names a model reaction and has ordered bounds
    pub fn validate(&self, model: &Model) -> Result<(), MediaError> {
        for (reaction, bound) in &self.bounds {
            if !model.reactions.contains_key(reaction) {
                return Err(MediaError::UnknownReaction(reaction.clone()));
            }
            if bound.lower_bound.is_nan()
                || bound.upper_bound.is_nan()
                || bound.lower_bound > bound.upper_bound
            {
                return Err(MediaError::InvalidBounds {
                    reaction: reaction.clone(),
                    lower_bound: bound.lower_bound,
                    upper_bound: bound.upper_bound,
                });
            }
        }
        Ok(())
    }

    /// Bounds a reaction takes under this media, falling back to the given model bounds
    pub fn bounds_for(&self, reaction: &str, model_bounds: (f64, f64)) -> (f64, f64) {
        self.bounds
            .get(reaction)
            .map(|bound| (bound.lower_bound, bound.upper_bound))
            .unwrap_or(model_bounds)
    }
}

/// Errors for media that can't be applied to a model
#[derive(Error, Debug)]
pub enum MediaError {
    #[error("media references reaction {0}, which is not in the model")]
    UnknownReaction(String),
    #[error("media sets lower bound {lower_bound} above upper bound {upper_bound} for {reaction}")]
    InvalidBounds {
        reaction: String,
        lower_bound: f64,
        upper_bound: f64,
    },
    #[error("unable to read media file: {0}")]
    UnableToRead(#[from] std::io::Error),
    #[error("unable to parse media: {0}")]
    UnableToParse(#[from] serde_json::Error),
}
