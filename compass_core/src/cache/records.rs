//! Append-only per-sample result logs
//!
//! One JSON record per line. A crash can leave the final line torn, so replay skips lines
//! that don't parse, and appends first terminate an unterminated final line.
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::penalty::PenaltyResult;

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub(crate) struct SampleRecord {
    pub sample: String,
    pub reaction: String,
    pub result: PenaltyResult,
}

#[derive(Serialize)]
struct SampleRecordRef<'a> {
    sample: &'a str,
    reaction: &'a str,
    result: &'a PenaltyResult,
}

/// Append one record and flush it to disk
pub(crate) fn append_record(
    path: &Path,
    sample: &str,
    reaction: &str,
    result: &PenaltyResult,
) -> io::Result<()> {
    let mut line = serde_json::to_vec(&SampleRecordRef {
        sample,
        reaction,
        result,
    })?;
    line.push(b'\n');
    let mut file = OpenOptions::new()
        .create(true)
        .read(true)
        .append(true)
        .open(path)?;
    if !ends_with_newline(&mut file)? {
        line.insert(0, b'\n');
    }
    file.write_all(&line)?;
    file.sync_data()?;
    Ok(())
}

fn ends_with_newline(file: &mut File) -> io::Result<bool> {
    if file.metadata()?.len() == 0 {
        return Ok(true);
    }
    file.seek(SeekFrom::End(-1))?;
    let mut last = [0u8; 1];
    file.read_exact(&mut last)?;
    Ok(last[0] == b'\n')
}

/// Parse every line of a log, unparsable lines come back as `Err(line_number)`
pub(crate) fn replay(content: &[u8]) -> impl Iterator<Item = Result<SampleRecord, usize>> + '_ {
    content
        .split(|b| *b == b'\n')
        .enumerate()
        .filter(|(_, line)| !line.iter().all(u8::is_ascii_whitespace))
        .map(|(number, line)| serde_json::from_slice(line).map_err(|_| number + 1))
}
