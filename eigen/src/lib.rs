pub mod export;
pub mod pca;
pub mod sampler;

/// Side length in pixels of a sampled block.
pub const BLOCK: usize = 8;

/// Colour channels per block.
pub const CHANNELS: usize = 3;

/// Length of a flattened block vector. Shared by the sampler, the
/// estimator and the exporter so the three stages can never disagree
/// on dimensions.
pub const D: usize = CHANNELS * BLOCK * BLOCK;
