use std::{error::Error, fmt::Display, fs, path::{Path, PathBuf}};

use anyhow::{Context, Result};
use rand::{rngs::StdRng, Rng};

use crate::{BLOCK, CHANNELS, D};

/// A decoded raster normalized to [0, 1], interleaved row-major.
/// Held only while its own blocks are being sampled.
#[derive(Debug, Clone, PartialEq)]
pub struct Raster {
    pixels: Vec<f32>,
    height: usize,
    width: usize,
    channels: usize,
}

impl Raster {
    pub fn new(pixels: Vec<f32>, height: usize, width: usize, channels: usize) -> Result<Self> {
        if pixels.len() != height * width * channels {
            return Err(RasterError::SizeMismatch.into());
        }

        Ok(Self {
            pixels,
            height,
            width,
            channels,
        })
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn width(&self) -> usize {
        self.width
    }

    fn get_unchecked(&self, row: usize, col: usize, channel: usize) -> f32 {
        self.pixels[(row * self.width + col) * self.channels + channel]
    }

    /// Flatten the BLOCK x BLOCK window at (top, left) channel-major:
    /// all of channel 0, then channel 1, then channel 2.
    fn flatten_block(&self, top: usize, left: usize) -> Vec<f64> {
        let mut out = Vec::with_capacity(D);
        for channel in 0..self.channels {
            for row in top..top + BLOCK {
                for col in left..left + BLOCK {
                    out.push(self.get_unchecked(row, col, channel) as f64);
                }
            }
        }
        out
    }
}

/// List the PNG files in a training directory, sorted lexicographically
/// so that sampling is reproducible for a fixed seed and file set.
pub fn list_pngs(folder: &Path) -> Result<Vec<PathBuf>> {
    let entries = fs::read_dir(folder)
        .with_context(|| format!("could not read training directory {}", folder.display()))?;

    let mut paths: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.is_file()
                && path
                    .extension()
                    .and_then(|ext| ext.to_str())
                    .map(|ext| ext.eq_ignore_ascii_case("png"))
                    .unwrap_or(false)
        })
        .collect();
    paths.sort();
    Ok(paths)
}

/// Decode an image to RGB and normalize each channel byte to [0, 1].
pub fn load_rgb(path: &Path) -> Result<Raster> {
    let img = image::open(path)
        .with_context(|| format!("could not decode {}", path.display()))?
        .to_rgb8();
    let (width, height) = img.dimensions();
    let pixels = img.as_raw().iter().map(|&v| v as f32 / 255.0).collect();
    Raster::new(pixels, height as usize, width as usize, CHANNELS)
}

/// Draw `n_samples` blocks from the raster, uniformly over valid
/// top-left offsets. A raster that cannot hold a single block, has the
/// wrong channel count, or a non-positive request contributes nothing.
pub fn sample_blocks(img: &Raster, n_samples: i64, rng: &mut StdRng) -> Vec<Vec<f64>> {
    if img.channels != CHANNELS || img.height < BLOCK || img.width < BLOCK || n_samples <= 0 {
        return Vec::new();
    }

    let mut blocks = Vec::with_capacity(n_samples as usize);
    for _ in 0..n_samples {
        let top = rng.gen_range(0..=img.height - BLOCK);
        let left = rng.gen_range(0..=img.width - BLOCK);
        blocks.push(img.flatten_block(top, left));
    }
    blocks
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RasterError {
    SizeMismatch,
}

impl Display for RasterError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RasterError::SizeMismatch => {
                write!(f, "pixel buffer length does not match raster dimensions")
            }
        }
    }
}

impl Error for RasterError {}
