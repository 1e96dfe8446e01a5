//! Vector index and metadata storage.
//!
//! An index position `i` always refers to metadata record `i`. The two
//! collections are built, persisted and loaded together.

mod flat;
mod persist;

pub use flat::FlatIndex;
pub use persist::{load_pair, save_pair, IndexFile, LoadedPair, INDEX_FORMAT_VERSION};

use serde::{Deserialize, Serialize};

/// Human-readable provenance of one index entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataRecord {
    /// Source document filename.
    pub filename: String,
    /// Chunk text that was embedded.
    pub text: String,
}

/// A nearest-neighbour match.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchHit {
    /// Insertion position in the index.
    pub position: usize,
    /// Squared Euclidean distance to the query.
    pub distance: f32,
}

/// Squared Euclidean distance. Both slices must have the same length.
pub fn l2_distance_squared(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}

/// Truncate or zero-pad `vector` to `dimension` entries.
///
/// Returns `true` when the vector had to be changed.
pub fn fit_dimension(vector: &mut Vec<f32>, dimension: usize) -> bool {
    if vector.len() == dimension {
        return false;
    }
    vector.resize(dimension, 0.0);
    true
}
