use std::{error::Error, fmt::Display, fs, path::Path};

use anyhow::Result;
use nalgebra::{DMatrix, DVector};

use crate::D;

/// Format a value as a C single-precision literal: scientific notation,
/// nine fractional digits, two-digit signed exponent, `f` suffix. The
/// generated file is compiled as C by the downstream encoder, so this
/// layout is a compatibility contract.
fn c_float(x: f32) -> String {
    let s = format!("{:.9e}", x);
    let (mantissa, exp) = s.split_once('e').unwrap();
    match exp.strip_prefix('-') {
        Some(digits) => format!("{}e-{:0>2}f", mantissa, digits),
        None => format!("{}e+{:0>2}f", mantissa, exp),
    }
}

/// Write the mean and the top `k` eigenvectors as C array constants.
///
/// `vectors` holds one eigenvector per column, sorted by descending
/// eigenvalue; row r of the emitted table is column r. Everything is
/// validated before the first byte is written, and the destination is
/// overwritten unconditionally.
pub fn write_eigen_source(
    path: &Path,
    mean: &DVector<f64>,
    vectors: &DMatrix<f64>,
    k: usize,
) -> Result<()> {
    if mean.len() != D {
        return Err(ExportError::MeanShape(mean.len()).into());
    }
    if vectors.shape() != (D, D) {
        return Err(ExportError::BasisShape(vectors.nrows(), vectors.ncols()).into());
    }
    if k < 1 || k > D {
        return Err(ExportError::ComponentCount(k).into());
    }

    let mut lines: Vec<String> = Vec::new();
    lines.push("#include \"nanostream.h\"".to_string());
    lines.push(String::new());
    lines.push("#include <stdint.h>".to_string());
    lines.push(String::new());

    lines.push(format!("const float nanostream_mean[{}] = {{", D));
    let mean_vals: Vec<String> = (0..D).map(|i| c_float(mean[i] as f32)).collect();
    lines.push(format!("  {}", mean_vals.join(", ")));
    lines.push("};".to_string());
    lines.push(String::new());

    lines.push(format!("const float nanostream_eigen_values[{}][{}] = {{", k, D));
    for r in 0..k {
        let row_vals: Vec<String> = (0..D).map(|c| c_float(vectors[(c, r)] as f32)).collect();
        lines.push(format!("  {{ {} }},", row_vals.join(", ")));
    }
    lines.push("};".to_string());
    lines.push(String::new());

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    fs::write(path, lines.join("\n"))?;
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ExportError {
    MeanShape(usize),
    BasisShape(usize, usize),
    ComponentCount(usize),
}

impl Display for ExportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExportError::MeanShape(len) => {
                write!(f, "mean must have length {}, got {}", D, len)
            }
            ExportError::BasisShape(rows, cols) => {
                write!(
                    f,
                    "eigen vectors must have shape ({}, {}), got ({}, {})",
                    D, D, rows, cols
                )
            }
            ExportError::ComponentCount(k) => {
                write!(f, "k must be in [1, {}], got {}", D, k)
            }
        }
    }
}

impl Error for ExportError {}
