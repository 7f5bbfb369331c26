//! Anonymized-dataset serialization.
//!
//! One row per surviving record: the k-group's per-attribute `[min|max]`
//! envelope, the pattern word, the sensitive value and the group index.
//! Suppressed records get placeholder rows.

use std::fs::{create_dir_all, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::info;

use crate::errors::Result;
use crate::pipeline::AnonymizationResult;
use crate::types::group_envelope;

const ANONYMIZED_DIR: &str = "anonymized";
const PLACEHOLDER: &str = " - ";

/// Default output path: `anonymized/<stem>_anon.csv` next to the input.
pub fn output_path_for(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("dataset");
    input
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join(ANONYMIZED_DIR)
        .join(format!("{stem}_anon.csv"))
}

/// Write the anonymized table.
pub fn write_anonymized(
    path: &Path,
    qi_columns: &[String],
    result: &AnonymizationResult,
) -> Result<()> {
    if let Some(parent) = path.parent() {
        create_dir_all(parent)?;
    }
    let mut out = BufWriter::new(File::create(path)?);
    writeln!(out, "id,{},sax,as,group", qi_columns.join(","))?;

    for (index, group) in result.k_groups.iter().enumerate() {
        let (min, max) = group_envelope(group);
        let envelope: Vec<String> = min
            .iter()
            .zip(&max)
            .map(|(lo, hi)| format!("[{lo}|{hi}]"))
            .collect();
        let cells = envelope.join(",");
        for id in group.keys() {
            let pattern = result
                .patterns
                .get(id)
                .map(String::as_str)
                .unwrap_or(PLACEHOLDER);
            let value = result
                .sensitive
                .get(id)
                .map(|v| v.to_string())
                .unwrap_or_else(|| PLACEHOLDER.to_string());
            writeln!(out, "{id},{cells},{pattern},{value},Group: {index}")?;
        }
    }

    for group in &result.suppressed {
        for (id, series) in group {
            let blanks = vec![PLACEHOLDER; series.len() + 3].join(",");
            writeln!(out, "{id},{blanks}")?;
        }
    }

    info!(path = %path.display(), "saved anonymized dataset");
    Ok(())
}
