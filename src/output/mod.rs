use std::io::{BufWriter, Write};

use crate::utils::FloatOps;

/// Formats a coordinate with the shortest representation that round-trips,
/// keeping a decimal point on integral values (`1.0`, not `1`).
pub fn format_coordinate<T: FloatOps>(value: T) -> String {
    if value.is_nan() {
        "nan".to_string()
    } else if value.is_infinite() && value.is_sign_negative() {
        "-inf".to_string()
    } else if value.is_infinite() {
        "inf".to_string()
    } else {
        format!("{:?}", value)
    }
}

/// Writes `label<TAB>x<TAB>y` lines.
pub struct TsvWriter<W: Write> {
    inner: BufWriter<W>,
}

impl<W: Write> TsvWriter<W> {
    pub fn new(sink: W) -> Self {
        TsvWriter {
            inner: BufWriter::new(sink),
        }
    }

    pub fn write_record<T: FloatOps>(&mut self, label: &str, point: &[T]) -> std::io::Result<()> {
        self.inner.write_all(label.as_bytes())?;
        for &coordinate in point {
            write!(self.inner, "\t{}", format_coordinate(coordinate))?;
        }
        self.inner.write_all(b"\n")
    }

    /// Pairs labels with points by position; stops at the shorter of the two.
    pub fn write_records<T, L, P>(&mut self, labels: L, points: P) -> std::io::Result<usize>
    where
        T: FloatOps,
        L: IntoIterator,
        L::Item: AsRef<str>,
        P: IntoIterator<Item = Vec<T>>,
    {
        let mut written = 0;
        for (label, point) in labels.into_iter().zip(points) {
            self.write_record(label.as_ref(), &point)?;
            written += 1;
        }
        Ok(written)
    }

    pub fn finish(mut self) -> std::io::Result<W> {
        self.inner.flush()?;
        self.inner.into_inner().map_err(|e| e.into_error())
    }
}
