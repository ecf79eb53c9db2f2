//! # Line Parser
//!
//! Turns newline-delimited text into [`Record`]s: one label cell followed by
//! one or more numeric feature cells. Cells are separated either by a literal
//! tab ([`CellSeparator::Tab`]) or by runs of whitespace
//! ([`CellSeparator::Whitespace`]).
//!
//! Parsing stops at the first bad line. The returned [`ParseError`] carries the
//! 1-based line number and the raw line so the caller can report it.

use std::io::BufRead;

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CellSeparator {
    #[default]
    Tab,
    Whitespace,
}

impl CellSeparator {
    pub fn from_whitespace_flag(whitespace_cells: bool) -> Self {
        if whitespace_cells {
            CellSeparator::Whitespace
        } else {
            CellSeparator::Tab
        }
    }

    /// Suggestion pointing at the other separator mode.
    pub fn hint(&self) -> &'static str {
        match self {
            CellSeparator::Tab => {
                "Is the input perhaps separated by spaces instead of tabs? If so, try the -w flag"
            }
            CellSeparator::Whitespace => {
                "Is the input perhaps separated by tabs with spaces inside the cells? If so, try without the -w flag"
            }
        }
    }

    /// Splits a line into its label and the remaining cells.
    fn split<'a>(&self, line: &'a str) -> Option<(&'a str, Vec<&'a str>)> {
        match self {
            CellSeparator::Tab => {
                let (label, rest) = line.split_once('\t')?;
                Some((label, rest.split('\t').collect()))
            }
            CellSeparator::Whitespace => {
                let mut cells = line.split_whitespace();
                let label = cells.next()?;
                let rest: Vec<&str> = cells.collect();
                if rest.is_empty() {
                    return None;
                }
                Some((label, rest))
            }
        }
    }
}

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Failed to read input line {line_number} \"{line}\"")]
    MalformedLine {
        line_number: usize,
        line: String,
        separator: CellSeparator,
    },

    #[error(
        "Input line {line_number} has {found} feature values but the first record has {expected}"
    )]
    RaggedRecord {
        line_number: usize,
        expected: usize,
        found: usize,
    },

    #[error("Failed to read input: {0}")]
    Io(#[from] std::io::Error),
}

impl ParseError {
    pub fn line_number(&self) -> Option<usize> {
        match self {
            ParseError::MalformedLine { line_number, .. }
            | ParseError::RaggedRecord { line_number, .. } => Some(*line_number),
            ParseError::Io(_) => None,
        }
    }

    pub fn hint(&self) -> Option<&'static str> {
        match self {
            ParseError::MalformedLine { separator, .. } => Some(separator.hint()),
            _ => None,
        }
    }
}

/// One parsed input line.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub line_number: usize,
    pub label: String,
    pub features: Vec<f64>,
}

pub fn parse_line(
    line: &str,
    line_number: usize,
    separator: CellSeparator,
) -> Result<Record, ParseError> {
    let malformed = || ParseError::MalformedLine {
        line_number,
        line: line.to_string(),
        separator,
    };

    let (label, cells) = separator.split(line).ok_or_else(malformed)?;
    let features = cells
        .iter()
        .map(|cell| cell.trim().parse::<f64>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|_| malformed())?;

    Ok(Record {
        line_number,
        label: label.to_string(),
        features,
    })
}

/// Reads every line of `input`, failing on the first malformed one.
pub fn read_records<R: BufRead>(
    input: R,
    separator: CellSeparator,
) -> Result<Vec<Record>, ParseError> {
    let mut records = Vec::new();
    for (idx, line) in input.lines().enumerate() {
        let line = line?;
        records.push(parse_line(&line, idx + 1, separator)?);
    }
    log::debug!("parsed {} records", records.len());
    Ok(records)
}
