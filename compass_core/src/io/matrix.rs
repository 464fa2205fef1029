//! The penalty matrix, reactions by samples, and its TSV output
use std::io::{self, Write};
use std::path::Path;

use indexmap::IndexMap;

use crate::penalty::PenaltyResult;
use crate::utils::files::write_atomic;

/// Text written for a sentinel (and for every cell of a failed sample)
pub const SENTINEL_TEXT: &str = "NA";

/// Penalties of every directional reaction (rows) in every sample (columns)
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PenaltyMatrix {
    reactions: Vec<String>,
    samples: Vec<String>,
    columns: Vec<Column>,
}

#[derive(Clone, Debug, PartialEq)]
enum Column {
    /// Cells in row order, `None` where nothing was computed
    Results(Vec<Option<PenaltyResult>>),
    Failed,
}

impl PenaltyMatrix {
    /// Empty matrix with the given row order
    pub fn new(reactions: Vec<String>) -> Self {
        PenaltyMatrix {
            reactions,
            samples: Vec::new(),
            columns: Vec::new(),
        }
    }

    /// Add a sample column, picking results by reaction id
    pub fn push_sample(&mut self, sample: &str, results: &IndexMap<String, PenaltyResult>) {
        let cells = self
            .reactions
            .iter()
            .map(|reaction| results.get(reaction).copied())
            .collect();
        self.samples.push(sample.to_string());
        self.columns.push(Column::Results(cells));
    }

    /// Add a column for a sample that could not be computed
    pub fn push_failed_sample(&mut self, sample: &str) {
        self.samples.push(sample.to_string());
        self.columns.push(Column::Failed);
    }

    pub fn reactions(&self) -> &[String] {
        &self.reactions
    }

    pub fn samples(&self) -> &[String] {
        &self.samples
    }

    /// Result of one cell, `None` if not computed or the sample failed
    pub fn get(&self, reaction: &str, sample: &str) -> Option<PenaltyResult> {
        let row = self.reactions.iter().position(|r| r == reaction)?;
        let column = self.samples.iter().position(|s| s == sample)?;
        match &self.columns[column] {
            Column::Results(cells) => cells[row],
            Column::Failed => None,
        }
    }

    /// Write as tab separated values, header `reaction\t<samples...>`
    pub fn write_tsv<W: Write>(&self, mut writer: W) -> io::Result<()> {
        write!(writer, "reaction")?;
        for sample in &self.samples {
            write!(writer, "\t{sample}")?;
        }
        writeln!(writer)?;
        for (row, reaction) in self.reactions.iter().enumerate() {
            write!(writer, "{reaction}")?;
            for column in &self.columns {
                match column {
                    Column::Results(cells) => match cells[row] {
                        Some(PenaltyResult::Penalty(value)) => write!(writer, "\t{value}")?,
                        Some(PenaltyResult::Unsolved(_)) => write!(writer, "\t{SENTINEL_TEXT}")?,
                        None => write!(writer, "\t")?,
                    },
                    Column::Failed => write!(writer, "\t{SENTINEL_TEXT}")?,
                }
            }
            writeln!(writer)?;
        }
        writer.flush()
    }

    /// Write the TSV to a file, replacing it atomically
    pub fn write_tsv_file<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        let mut content = Vec::new();
        self.write_tsv(&mut content)?;
        write_atomic(path.as_ref(), &content)
    }
}
