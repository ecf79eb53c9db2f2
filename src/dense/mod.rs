use ndarray::Array2;

use crate::record::{ParseError, Record};

/// Labels and feature matrix, aligned by row.
#[derive(Debug, Clone, PartialEq)]
pub struct Assembled {
    pub labels: Vec<String>,
    pub matrix: Array2<f64>,
}

impl Assembled {
    pub fn nrows(&self) -> usize {
        self.matrix.nrows()
    }

    pub fn ncols(&self) -> usize {
        self.matrix.ncols()
    }
}

/// Packs records row by row into a dense matrix.
///
/// Every record must have as many features as the first one; the first
/// mismatch is reported against its input line.
pub fn assemble(records: Vec<Record>) -> anyhow::Result<Assembled> {
    let n_obs = records.len();
    let n_dim = records.first().map_or(0, |r| r.features.len());

    let mut labels = Vec::with_capacity(n_obs);
    let mut values = Vec::with_capacity(n_obs * n_dim);
    for record in records {
        if record.features.len() != n_dim {
            return Err(ParseError::RaggedRecord {
                line_number: record.line_number,
                expected: n_dim,
                found: record.features.len(),
            }
            .into());
        }
        labels.push(record.label);
        values.extend(record.features);
    }

    let matrix = Array2::from_shape_vec((n_obs, n_dim), values)?;
    log::debug!("assembled {} x {} feature matrix", n_obs, n_dim);

    Ok(Assembled { labels, matrix })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn record(line_number: usize, label: &str, features: &[f64]) -> Record {
        Record {
            line_number,
            label: label.to_string(),
            features: features.to_vec(),
        }
    }

    #[test]
    fn test_assemble_preserves_row_order() {
        let assembled = assemble(vec![
            record(1, "A", &[1.0, 2.0]),
            record(2, "B", &[3.0, 4.0]),
            record(3, "C", &[5.0, 6.0]),
        ])
        .unwrap();

        assert_eq!(assembled.labels, vec!["A", "B", "C"]);
        assert_eq!(assembled.matrix, array![[1.0, 2.0], [3.0, 4.0], [5.0, 6.0]]);
        assert_eq!(assembled.nrows(), 3);
        assert_eq!(assembled.ncols(), 2);
    }

    #[test]
    fn test_assemble_rejects_ragged_rows() {
        let err = assemble(vec![
            record(1, "A", &[1.0, 2.0]),
            record(2, "B", &[3.0]),
        ])
        .unwrap_err();

        match err.downcast::<ParseError>().unwrap() {
            ParseError::RaggedRecord {
                line_number,
                expected,
                found,
            } => {
                assert_eq!(line_number, 2);
                assert_eq!(expected, 2);
                assert_eq!(found, 1);
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_assemble_empty() {
        let assembled = assemble(Vec::new()).unwrap();
        assert_eq!(assembled.nrows(), 0);
        assert!(assembled.labels.is_empty());
    }
}
