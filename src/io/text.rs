//! Plain-text array output.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::Context;
use ndarray::ArrayView2;

use crate::Result;

/// Write a 2-D array as whitespace-separated rows, values as `f32`.
pub fn write_text(path: &Path, ar: ArrayView2<'_, f64>) -> Result<()> {
    tracing::info!("writing text: {}", path.display());
    let file = File::create(path).with_context(|| format!("[io::text] Failed to create {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    for row in ar.outer_iter() {
        let line: Vec<String> = row.iter().map(|&v| (v as f32).to_string()).collect();
        writeln!(writer, "{}", line.join(" ")).context("[io::text] Failed to write row")?;
    }
    writer.flush().context("[io::text] Failed to flush output")?;
    Ok(())
}

/// `<stem>_<part><ext>` next to `path`, spaces in `part` replaced by `_`.
pub fn part_path(path: &Path, part: &str) -> PathBuf {
    let stem = path.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
    let ext = path.extension().map(|e| format!(".{}", e.to_string_lossy())).unwrap_or_default();
    path.with_file_name(format!("{stem}_{}{ext}", part.replace(' ', "_")))
}
