//! Per-variable CSV tables of region means.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use zonal_stats::AggregateRecord;

pub const HEADER: [&str; 4] = ["variable", "region", "mean", "year"];

/// One finished table row; the year is already a display string.
#[derive(Debug, Clone, PartialEq)]
pub struct TableRow {
    pub variable: String,
    pub region: String,
    pub mean: Option<f64>,
    pub year: String,
}

/// Round means, drop records without a year, and render the year as text.
///
/// Records with an undefined mean are kept.
pub fn finalize(records: Vec<AggregateRecord>, decimals: u32) -> Vec<TableRow> {
    records
        .into_iter()
        .filter_map(|record| {
            let year = record.year?;
            Some(TableRow {
                variable: record.variable,
                region: record.region,
                mean: record.mean.map(|m| round_to(m, decimals)),
                year: year.to_string(),
            })
        })
        .collect()
}

/// Round half to even at `decimals` places.
pub fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (value * factor).round_ties_even() / factor
}

/// Write `rows` to `path` with a header line, replacing any existing file.
pub fn write_table(path: &Path, rows: &[TableRow], missing_marker: &str) -> std::io::Result<()> {
    let mut out = BufWriter::new(File::create(path)?);
    writeln!(out, "{}", HEADER.join(","))?;
    for row in rows {
        let mean = match row.mean {
            Some(m) => format_number(m),
            None => missing_marker.to_string(),
        };
        writeln!(
            out,
            "{},{},{},{}",
            quote(&row.variable),
            quote(&row.region),
            quote(&mean),
            quote(&row.year)
        )?;
    }
    out.flush()
}

/// Shortest round-trip form, always with a fractional part.
fn format_number(value: f64) -> String {
    let s = value.to_string();
    if value.is_finite() && !s.contains('.') {
        format!("{}.0", s)
    } else {
        s
    }
}

/// RFC 4180 field quoting.
fn quote(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(region: &str, year: Option<i32>, mean: Option<f64>) -> AggregateRecord {
        AggregateRecord {
            variable: "tx".to_string(),
            region: region.to_string(),
            year,
            mean,
        }
    }

    #[test]
    fn test_round_to() {
        assert_eq!(round_to(12.345678, 4), 12.3457);
        assert_eq!(round_to(-0.00004, 4), -0.0);
        assert_eq!(round_to(2.5, 0), 2.0);
        assert_eq!(round_to(1.0, 4), 1.0);
    }

    #[test]
    fn test_finalize_drops_only_yearless() {
        let rows = finalize(
            vec![
                record("a", Some(1990), Some(1.234567)),
                record("b", Some(1990), None),
                record("c", None, Some(3.0)),
            ],
            4,
        );
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].mean, Some(1.2346));
        assert_eq!(rows[0].year, "1990");
        assert_eq!(rows[1].mean, None);
    }

    #[test]
    fn test_write_table_format() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tx-mean-y.csv");
        let rows = finalize(
            vec![
                record("mazowieckie", Some(1990), Some(10.0)),
                record("Kujawsko, \"Pomorskie\"", Some(1990), Some(0.123456)),
                record("małe", Some(1991), None),
            ],
            4,
        );
        write_table(&path, &rows, "NaN").unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "variable,region,mean,year");
        assert_eq!(lines[1], "tx,mazowieckie,10.0,1990");
        assert_eq!(lines[2], "tx,\"Kujawsko, \"\"Pomorskie\"\"\",0.1235,1990");
        assert_eq!(lines[3], "tx,małe,NaN,1991");
    }

    #[test]
    fn test_empty_table_has_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pd-mean-y.csv");
        write_table(&path, &[], "").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "variable,region,mean,year\n");
    }
}
