use std::{error::Error, fmt::Display, path::{Path, PathBuf}};

use anyhow::Result;
use nalgebra::{DMatrix, DVector, SymmetricEigen};
use rand::{rngs::StdRng, SeedableRng};

use crate::{sampler, D};

/// Eigenvalue/eigenvector pairs of a covariance matrix, sorted by
/// descending eigenvalue. Column j of `vectors` is the unit eigenvector
/// paired with `values[j]`.
#[derive(Debug, Clone, PartialEq)]
pub struct EigenBasis {
    pub values: DVector<f64>,
    pub vectors: DMatrix<f64>,
}

/// Sample blocks from every PNG in `train_dir` and fit the eigen basis
/// of their covariance. The RNG is seeded once here; combined with the
/// sorted file enumeration this makes a run reproducible for a fixed
/// seed and file set.
pub fn fit(train_dir: &Path, n_per_image: i64, seed: u64) -> Result<(DVector<f64>, EigenBasis)> {
    let paths = sampler::list_pngs(train_dir)?;
    if paths.is_empty() {
        return Err(PcaError::NoInput(train_dir.to_path_buf()).into());
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut rows: Vec<Vec<f64>> = Vec::new();
    for path in &paths {
        // The raster only lives for its own sampling pass.
        let img = sampler::load_rgb(path)?;
        rows.extend(sampler::sample_blocks(&img, n_per_image, &mut rng));
    }

    let n = rows.len();
    let samples = DMatrix::from_row_iterator(n, D, rows.into_iter().flatten());
    estimate(&samples)
}

/// Mean and sorted eigen basis of a sample matrix with one flattened
/// block per row.
pub fn estimate(samples: &DMatrix<f64>) -> Result<(DVector<f64>, EigenBasis)> {
    let (mean, cov) = mean_and_covariance(samples)?;
    let basis = eigen_sorted(cov)?;
    Ok((mean, basis))
}

/// Column-wise mean and the unbiased sample covariance
/// (centered data)' * (centered data) / (n - 1).
pub fn mean_and_covariance(samples: &DMatrix<f64>) -> Result<(DVector<f64>, DMatrix<f64>)> {
    let n = samples.nrows();
    if n == 0 {
        return Err(PcaError::NoSamples.into());
    }
    if n < 2 {
        return Err(PcaError::InsufficientSamples(n).into());
    }

    let mean = samples.row_mean();
    let mut centered = samples.clone();
    for mut row in centered.row_iter_mut() {
        row -= &mean;
    }
    let cov = centered.transpose() * &centered / (n - 1) as f64;
    Ok((mean.transpose(), cov))
}

fn eigen_sorted(cov: DMatrix<f64>) -> Result<EigenBasis> {
    if cov.iter().any(|v| !v.is_finite()) {
        return Err(PcaError::NonFinite.into());
    }

    let d = cov.nrows();
    let eigen =
        SymmetricEigen::try_new(cov, f64::EPSILON, 10_000).ok_or(PcaError::NoConvergence)?;

    // Stable sort so tied eigenvalues keep the solver's relative order.
    let mut order: Vec<usize> = (0..d).collect();
    order.sort_by(|&a, &b| eigen.eigenvalues[b].total_cmp(&eigen.eigenvalues[a]));

    let values = DVector::from_fn(d, |i, _| eigen.eigenvalues[order[i]]);
    let vectors = DMatrix::from_fn(d, d, |i, j| eigen.eigenvectors[(i, order[j])]);
    Ok(EigenBasis { values, vectors })
}

#[derive(Debug, Clone, PartialEq)]
pub enum PcaError {
    NoInput(PathBuf),
    NoSamples,
    InsufficientSamples(usize),
    NonFinite,
    NoConvergence,
}

impl Display for PcaError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PcaError::NoInput(dir) => {
                write!(f, "no PNGs found in {}", dir.display())
            }
            PcaError::NoSamples => {
                write!(f, "no blocks were sampled; check image sizes and n_per_image")
            }
            PcaError::InsufficientSamples(n) => {
                write!(f, "need at least 2 samples to compute covariance, got {}", n)
            }
            PcaError::NonFinite => {
                write!(f, "covariance matrix contains non-finite values")
            }
            PcaError::NoConvergence => {
                write!(f, "symmetric eigendecomposition did not converge")
            }
        }
    }
}

impl Error for PcaError {}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    fn test_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("eigen_pca_{}_{}", name, std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn gradient_samples(n: usize, d: usize) -> DMatrix<f64> {
        DMatrix::from_fn(n, d, |i, j| ((i * 7 + j * 3) % 13) as f64 / 13.0)
    }

    #[test]
    fn test_mean_and_covariance_hand_computed() {
        let samples = DMatrix::from_row_slice(3, 2, &[
            1.0, 2.0,
            3.0, 4.0,
            5.0, 12.0,
        ]);

        let (mean, cov) = mean_and_covariance(&samples).unwrap();

        assert_eq!(mean, DVector::from_row_slice(&[3.0, 6.0]));
        let expected_cov = DMatrix::from_row_slice(2, 2, &[
            4.0, 10.0,
            10.0, 28.0,
        ]);
        assert_eq!(cov, expected_cov);
    }

    #[test]
    fn test_covariance_symmetric() {
        let samples = gradient_samples(10, 5);

        let (_, cov) = mean_and_covariance(&samples).unwrap();

        for i in 0..5 {
            for j in 0..5 {
                assert!((cov[(i, j)] - cov[(j, i)]).abs() < 1.0e-12);
            }
        }
    }

    #[test]
    fn test_estimate_no_samples() {
        let samples = DMatrix::<f64>::zeros(0, 4);

        let err: Option<PcaError> = estimate(&samples).err().map(|e| e.downcast().unwrap());
        assert_eq!(err, Some(PcaError::NoSamples));
    }

    #[test]
    fn test_estimate_insufficient_samples() {
        let samples = DMatrix::<f64>::zeros(1, 4);

        let err: Option<PcaError> = estimate(&samples).err().map(|e| e.downcast().unwrap());
        assert_eq!(err, Some(PcaError::InsufficientSamples(1)));
    }

    #[test]
    fn test_eigen_sorted_descending() {
        let samples = gradient_samples(20, 4);

        let (_, basis) = estimate(&samples).unwrap();

        for i in 0..3 {
            assert!(basis.values[i] >= basis.values[i + 1]);
        }
    }

    #[test]
    fn test_eigen_vectors_orthonormal() {
        let samples = gradient_samples(20, 4);

        let (_, basis) = estimate(&samples).unwrap();

        for i in 0..4 {
            for j in 0..4 {
                let dot = basis.vectors.column(i).dot(&basis.vectors.column(j));
                let expected = if i == j { 1.0 } else { 0.0 };
                assert!((dot - expected).abs() < 1.0e-6);
            }
        }
    }

    #[test]
    fn test_eigen_sorted_known_matrix() {
        let cov = DMatrix::from_row_slice(3, 3, &[
            1.0, 0.0, 0.0,
            0.0, 3.0, 0.0,
            0.0, 0.0, 2.0,
        ]);

        let basis = eigen_sorted(cov).unwrap();

        assert!((basis.values[0] - 3.0).abs() < 1.0e-9);
        assert!((basis.values[1] - 2.0).abs() < 1.0e-9);
        assert!((basis.values[2] - 1.0).abs() < 1.0e-9);
        // Eigenvectors of a diagonal matrix are axis aligned, up to sign.
        assert!((basis.vectors[(1, 0)].abs() - 1.0).abs() < 1.0e-9);
        assert!((basis.vectors[(2, 1)].abs() - 1.0).abs() < 1.0e-9);
        assert!((basis.vectors[(0, 2)].abs() - 1.0).abs() < 1.0e-9);
    }

    #[test]
    fn test_eigen_sorted_non_finite() {
        let mut cov = DMatrix::<f64>::zeros(3, 3);
        cov[(1, 1)] = f64::NAN;

        let err: Option<PcaError> = eigen_sorted(cov).err().map(|e| e.downcast().unwrap());
        assert_eq!(err, Some(PcaError::NonFinite));
    }

    #[test]
    fn test_fit_no_input() {
        let dir = test_dir("no_input");

        let err: Option<PcaError> = fit(&dir, 4, 0).err().map(|e| e.downcast().unwrap());
        assert_eq!(err, Some(PcaError::NoInput(dir.clone())));
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_fit_all_images_too_small() {
        let dir = test_dir("too_small");
        image::RgbImage::new(4, 4).save(dir.join("tiny.png")).unwrap();

        let err: Option<PcaError> = fit(&dir, 4, 0).err().map(|e| e.downcast().unwrap());
        assert_eq!(err, Some(PcaError::NoSamples));
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_fit_black_image_is_degenerate() {
        let dir = test_dir("black");
        image::RgbImage::new(16, 16).save(dir.join("black.png")).unwrap();

        let (mean, basis) = fit(&dir, 4, 42).unwrap();

        assert_eq!(mean.len(), D);
        assert!(mean.iter().all(|&v| v == 0.0));
        assert!(basis.values.iter().all(|&v| v.abs() < 1.0e-12));
        assert_eq!(basis.vectors.shape(), (D, D));
        fs::remove_dir_all(&dir).unwrap();
    }
}
