//! Dataset loading and column extraction.
//!
//! The input is a plain CSV: first column record id, last column the integer
//! sensitive attribute, every column in between a numeric QI attribute.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use tracing::info;

use crate::errors::{KpError, Result};
use crate::metrics::AttributeBounds;
use crate::types::{Group, SensitiveTable};

/// A loaded table: QI vectors, sensitive column, global bounds.
#[derive(Debug, Clone)]
pub struct Dataset {
    /// QI column names (id and sensitive columns excluded).
    pub columns: Vec<String>,
    /// id -> QI vector.
    pub records: Group,
    /// id -> sensitive value.
    pub sensitive: SensitiveTable,
    /// Per-attribute global min/max over the whole table.
    pub bounds: AttributeBounds,
}

/// Load a dataset from a CSV file.
pub fn load_dataset(path: &Path) -> Result<Dataset> {
    if !path.is_file() {
        return Err(KpError::Dataset(format!("{} not found", path.display())));
    }
    info!(path = %path.display(), "loading dataset");

    let file = File::open(path)?;
    let mut lines = BufReader::new(file).lines();

    let header = lines
        .next()
        .transpose()?
        .ok_or_else(|| KpError::Dataset("empty file".into()))?;
    let names: Vec<String> = header.split(',').map(|s| s.trim().to_string()).collect();
    if names.len() < 3 {
        return Err(KpError::Dataset(
            "need at least an id column, one QI column and a sensitive column".into(),
        ));
    }
    let columns: Vec<String> = names[1..names.len() - 1].to_vec();
    let width = columns.len();

    let mut records = Group::new();
    let mut sensitive = SensitiveTable::new();
    for (lineno, line) in lines.enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split(',').map(str::trim).collect();
        if fields.len() != names.len() {
            return Err(KpError::Dataset(format!(
                "row {}: expected {} fields, found {}",
                lineno + 2,
                names.len(),
                fields.len()
            )));
        }
        let id = fields[0].to_string();
        let qi: Vec<f64> = fields[1..=width]
            .iter()
            .map(|f| {
                f.parse::<f64>().map_err(|_| {
                    KpError::Dataset(format!("row {}: bad numeric value '{f}'", lineno + 2))
                })
            })
            .collect::<Result<_>>()?;
        let value: i64 = fields[width + 1].parse().map_err(|_| {
            KpError::Dataset(format!(
                "row {}: bad sensitive value '{}'",
                lineno + 2,
                fields[width + 1]
            ))
        })?;
        sensitive.insert(id.clone(), value);
        records.insert(id, qi);
    }

    if records.is_empty() {
        return Err(KpError::Dataset("no records in dataset".into()));
    }
    let bounds = table_bounds(&records, width);
    info!(
        records = records.len(),
        attributes = width,
        "loaded dataset"
    );
    Ok(Dataset {
        columns,
        records,
        sensitive,
        bounds,
    })
}

fn table_bounds(records: &Group, width: usize) -> AttributeBounds {
    let mut min = vec![f64::INFINITY; width];
    let mut max = vec![f64::NEG_INFINITY; width];
    for row in records.values() {
        for (i, &v) in row.iter().enumerate() {
            if v < min[i] {
                min[i] = v;
            }
            if v > max[i] {
                max[i] = v;
            }
        }
    }
    AttributeBounds { min, max }
}
