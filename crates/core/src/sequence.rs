//! Locality sequences as flat text files: one non-negative integer per line.

use crate::error::{Error, Result};
use crate::log::Logger;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Lines, Write};
use std::path::{Path, PathBuf};

/// Write one value per line, truncating or creating `path`.
pub fn write_sequence(path: &Path, values: &[u64]) -> Result<()> {
    let write_err = |source| Error::FileWrite {
        path: path.to_path_buf(),
        source,
    };

    let file = File::create(path).map_err(write_err)?;
    let mut writer = BufWriter::new(file);
    for value in values {
        writeln!(writer, "{}", value).map_err(write_err)?;
    }
    writer.flush().map_err(write_err)?;

    tracing::debug!(path = %path.display(), values = values.len(), "sequence written");
    Ok(())
}

/// Read a whole sequence into memory, reporting a running count to `log`.
pub fn read_sequence(path: &Path, log: &mut Logger) -> Result<Vec<u64>> {
    let label = format!("Reading \"{}\"", path.display());
    let mut values = Vec::new();
    for value in SequenceReader::open(path)? {
        values.push(value?);
        log.tick(&label, values.len());
    }
    log.done(&label);
    Ok(values)
}

/// Streams values from a sequence file without loading it.
///
/// Lines are trimmed; blank lines are skipped.
pub struct SequenceReader<R> {
    path: PathBuf,
    lines: Lines<R>,
    line: usize,
}

impl SequenceReader<BufReader<File>> {
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|source| Error::FileRead {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::new(path, BufReader::new(file)))
    }
}

impl<R: BufRead> SequenceReader<R> {
    /// Wrap any buffered reader; `path` is only used in error messages.
    pub fn new(path: &Path, reader: R) -> Self {
        Self {
            path: path.to_path_buf(),
            lines: reader.lines(),
            line: 0,
        }
    }
}

impl<R: BufRead> Iterator for SequenceReader<R> {
    type Item = Result<u64>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let line = match self.lines.next()? {
                Ok(line) => line,
                Err(source) => {
                    return Some(Err(Error::FileRead {
                        path: self.path.clone(),
                        source,
                    }))
                }
            };
            self.line += 1;

            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            return Some(trimmed.parse::<u64>().map_err(|_| Error::Parse {
                path: self.path.clone(),
                line: self.line,
                value: trimmed.to_string(),
            }));
        }
    }
}
