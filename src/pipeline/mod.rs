//! # Pipeline
//!
//! Parse → assemble → reduce → normalize → write, strictly in that order.
//! Nothing reaches the output sink until parsing, assembly and reduction have
//! all succeeded.

use std::io::{BufRead, Write};
use std::time::Instant;

use crate::dense::assemble;
use crate::dimred::{Reducer, Tsne, TsneConfig};
use crate::normalize::UnitScaler;
use crate::output::TsvWriter;
use crate::record::{read_records, CellSeparator};

#[derive(Debug, Clone, Default)]
pub struct PipelineConfig {
    pub separator: CellSeparator,
    pub tsne: TsneConfig,
}

/// Runs the pipeline with t-SNE as the reducer. Returns the number of lines
/// written.
pub fn run<R: BufRead, W: Write>(
    input: R,
    output: W,
    config: &PipelineConfig,
) -> anyhow::Result<usize> {
    run_with(input, output, config.separator, &Tsne::new(config.tsne.clone()))
}

pub fn run_with<R, W, D>(
    input: R,
    output: W,
    separator: CellSeparator,
    reducer: &D,
) -> anyhow::Result<usize>
where
    R: BufRead,
    W: Write,
    D: Reducer + ?Sized,
{
    let records = read_records(input, separator)?;
    let assembled = assemble(records)?;
    let (labels, matrix) = (assembled.labels, assembled.matrix);
    let n_obs = matrix.nrows();

    let start = Instant::now();
    let embedding = reducer.reduce(matrix)?;
    log::info!(
        "reduced {} records in {}ms",
        n_obs,
        start.elapsed().as_millis()
    );
    if embedding.nrows() != n_obs {
        anyhow::bail!(
            "Reducer returned {} rows for {} records",
            embedding.nrows(),
            n_obs
        );
    }

    let scaler = UnitScaler::fit(embedding.view())?;
    let mut writer = TsvWriter::new(output);
    let written = writer.write_records(&labels, scaler.points(embedding.view()))?;
    writer.finish()?;

    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{s, Array2};
    use std::io::Cursor;

    /// Keeps the first two feature columns.
    struct FirstTwoColumns;

    impl Reducer for FirstTwoColumns {
        fn reduce(&self, matrix: Array2<f64>) -> anyhow::Result<Array2<f64>> {
            Ok(matrix.slice(s![.., ..2]).to_owned())
        }
    }

    struct Failing;

    impl Reducer for Failing {
        fn reduce(&self, _matrix: Array2<f64>) -> anyhow::Result<Array2<f64>> {
            anyhow::bail!("diverged")
        }
    }

    fn run_to_string(input: &str, separator: CellSeparator) -> anyhow::Result<String> {
        let mut out = Vec::new();
        run_with(Cursor::new(input), &mut out, separator, &FirstTwoColumns)?;
        Ok(String::from_utf8(out)?)
    }

    #[test]
    fn test_labels_keep_input_order() {
        let out = run_to_string("z\t0\t4\na\t2\t0\nm\t1\t2\n", CellSeparator::Tab).unwrap();
        assert_eq!(out, "z\t0.0\t1.0\na\t1.0\t0.0\nm\t0.5\t0.5\n");
    }

    #[test]
    fn test_tab_and_whitespace_inputs_agree() {
        let tabbed = run_to_string("A\t1\t5\nB\t3\t7\nC\t2\t9\n", CellSeparator::Tab).unwrap();
        let spaced =
            run_to_string("A 1 5\nB  3 7\nC 2\t9\n", CellSeparator::Whitespace).unwrap();
        assert_eq!(tabbed, spaced);
    }

    #[test]
    fn test_wrong_separator_mode_writes_nothing() {
        let mut out = Vec::new();
        let err = run_with(
            Cursor::new("A\t1\t5\nB 3 7\n"),
            &mut out,
            CellSeparator::Tab,
            &FirstTwoColumns,
        )
        .unwrap_err();
        let parse_error = err.downcast_ref::<crate::record::ParseError>().unwrap();
        assert_eq!(parse_error.line_number(), Some(2));
        assert!(out.is_empty());
    }

    #[test]
    fn test_reducer_failure_writes_nothing() {
        let mut out = Vec::new();
        let err = run_with(
            Cursor::new("A\t1\t5\nB\t3\t7\n"),
            &mut out,
            CellSeparator::Tab,
            &Failing,
        )
        .unwrap_err();
        assert_eq!(err.to_string(), "diverged");
        assert!(out.is_empty());
    }

    #[test]
    fn test_ragged_input_writes_nothing() {
        let mut out = Vec::new();
        let err = run_with(
            Cursor::new("A\t1\t5\nB\t3\n"),
            &mut out,
            CellSeparator::Tab,
            &FirstTwoColumns,
        )
        .unwrap_err();
        assert!(err.downcast_ref::<crate::record::ParseError>().is_some());
        assert!(out.is_empty());
    }
}
