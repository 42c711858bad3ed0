//! Deterministic 2D embedding projection.
//!
//! Reduces high-dimensional chunk embeddings to 2D coordinates via
//! power-iteration PCA with deflation. The projection is fully
//! deterministic for a fixed (node set, embeddings, seed) triple: iteration
//! start vectors are derived from the configured seed with a blake3 XOF
//! instead of a thread-local RNG, so two runs on the same input always
//! produce identical coordinates.
//!
//! Coordinates are normalized per axis to [-1, 1] and are always finite.
//!
//! Input-size ceilings are enforced upstream by the service (truncation to
//! `max_nodes` happens before projection), not here.

use crate::error::{GraphServiceError, Result};
use ahash::AHashMap;
use chrono::{DateTime, Utc};
use rayon::prelude::*;

/// Power-iteration rounds per component
const MAX_ITERATIONS: usize = 75;
/// Convergence tolerance on the component delta
const TOLERANCE: f64 = 1e-7;

/// A completed projection, as stored in the cache.
#[derive(Debug, Clone)]
pub struct ProjectionResult {
    /// Final 2D coordinates per chunk id
    pub coords_by_id: AHashMap<String, [f64; 2]>,
    /// When this projection was computed
    pub computed_at: DateTime<Utc>,
}

/// Hash of a node-id set, independent of input order.
///
/// Together with the snapshot token this forms the projection cache key.
pub fn node_set_hash(ids: &[String]) -> [u8; 32] {
    let mut sorted: Vec<&str> = ids.iter().map(String::as_str).collect();
    sorted.sort_unstable();
    let mut hasher = blake3::Hasher::new();
    for id in sorted {
        hasher.update(id.as_bytes());
        hasher.update(&[0u8]);
    }
    *hasher.finalize().as_bytes()
}

/// Deterministic embedding-to-2D projector.
pub struct EmbeddingProjector {
    seed: u64,
}

impl EmbeddingProjector {
    /// Create a projector with the given seed.
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }

    /// Project embeddings to 2D coordinates keyed by chunk id.
    ///
    /// Deterministic for fixed inputs and seed. Fails with `Internal` if
    /// the embeddings are ragged (mixed dimensionality), since the source
    /// space is then undefined.
    pub fn project(&self, items: &[(String, Vec<f32>)]) -> Result<ProjectionResult> {
        let mut coords_by_id = AHashMap::with_capacity(items.len());

        if items.is_empty() {
            return Ok(ProjectionResult {
                coords_by_id,
                computed_at: Utc::now(),
            });
        }

        let dims = items[0].1.len();
        for (id, embedding) in items {
            if embedding.len() != dims {
                return Err(GraphServiceError::Internal(format!(
                    "ragged embeddings: chunk {} has {} dims, expected {}",
                    id,
                    embedding.len(),
                    dims
                )));
            }
        }

        if items.len() == 1 || dims == 0 {
            for (id, _) in items {
                coords_by_id.insert(id.clone(), [0.0, 0.0]);
            }
            return Ok(ProjectionResult {
                coords_by_id,
                computed_at: Utc::now(),
            });
        }

        // Center the data in f64
        let n = items.len();
        let mut mean = vec![0.0f64; dims];
        for (_, embedding) in items {
            for (acc, &v) in mean.iter_mut().zip(embedding.iter()) {
                *acc += v as f64;
            }
        }
        for acc in &mut mean {
            *acc /= n as f64;
        }
        let centered: Vec<Vec<f64>> = items
            .par_iter()
            .map(|(_, embedding)| {
                embedding
                    .iter()
                    .zip(mean.iter())
                    .map(|(&v, &m)| v as f64 - m)
                    .collect()
            })
            .collect();

        let components = self.top_components(&centered, 2);

        // Project onto the two components
        let mut raw: Vec<[f64; 2]> = centered
            .par_iter()
            .map(|row| {
                [
                    dot(row, &components[0]),
                    dot(row, &components[1]),
                ]
            })
            .collect();

        // Normalize each axis to [-1, 1]; degenerate axes collapse to 0
        for axis in 0..2 {
            let max_abs = raw
                .iter()
                .map(|c| c[axis].abs())
                .fold(0.0f64, f64::max);
            for c in &mut raw {
                c[axis] = if max_abs > f64::EPSILON && c[axis].is_finite() {
                    c[axis] / max_abs
                } else {
                    0.0
                };
            }
        }

        for ((id, _), coords) in items.iter().zip(raw.into_iter()) {
            coords_by_id.insert(id.clone(), coords);
        }

        Ok(ProjectionResult {
            coords_by_id,
            computed_at: Utc::now(),
        })
    }

    /// Top principal components via power iteration with deflation.
    ///
    /// Always returns exactly `count` vectors; degenerate directions (no
    /// remaining variance) come back as zero vectors, which downstream
    /// normalization maps to the 0 coordinate.
    fn top_components(&self, data: &[Vec<f64>], count: usize) -> Vec<Vec<f64>> {
        let dims = data[0].len();
        let mut residual: Vec<Vec<f64>> = data.to_vec();
        let mut components = Vec::with_capacity(count);

        for component_index in 0..count {
            let mut v = self.seeded_unit_vector(dims, component_index as u64);
            let mut converged_direction = vec![0.0f64; dims];

            for _ in 0..MAX_ITERATIONS {
                // u = X * v, then v' = X^T * u, without materializing X^T X
                let u: Vec<f64> = residual.par_iter().map(|row| dot(row, &v)).collect();

                let mut next = vec![0.0f64; dims];
                for (row, &ui) in residual.iter().zip(u.iter()) {
                    for (acc, &x) in next.iter_mut().zip(row.iter()) {
                        *acc += x * ui;
                    }
                }

                let norm = dot(&next, &next).sqrt();
                if norm < 1e-12 {
                    break;
                }
                for x in &mut next {
                    *x /= norm;
                }

                let delta: f64 = v
                    .iter()
                    .zip(next.iter())
                    .map(|(a, b)| (a - b).abs())
                    .sum();
                v = next;
                converged_direction.clone_from(&v);

                if delta < TOLERANCE {
                    break;
                }
            }

            // Deflate: remove this direction from the residual
            for row in &mut residual {
                let proj = dot(row, &converged_direction);
                for (x, &c) in row.iter_mut().zip(converged_direction.iter()) {
                    *x -= proj * c;
                }
            }

            components.push(converged_direction);
        }

        components
    }

    /// Seed-derived pseudo-random unit vector for iteration start.
    fn seeded_unit_vector(&self, dims: usize, component_index: u64) -> Vec<f64> {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&self.seed.to_le_bytes());
        hasher.update(&component_index.to_le_bytes());
        let mut reader = hasher.finalize_xof();

        let mut bytes = vec![0u8; dims * 8];
        reader.fill(&mut bytes);

        let mut v: Vec<f64> = bytes
            .chunks_exact(8)
            .map(|chunk| {
                let mut raw = [0u8; 8];
                raw.copy_from_slice(chunk);
                // 53 high bits -> uniform in [0, 1), shifted to [-0.5, 0.5)
                (u64::from_le_bytes(raw) >> 11) as f64 / (1u64 << 53) as f64 - 0.5
            })
            .collect();

        let norm = dot(&v, &v).sqrt();
        if norm > f64::EPSILON {
            for x in &mut v {
                *x /= norm;
            }
        } else if let Some(first) = v.first_mut() {
            *first = 1.0;
        }
        v
    }
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}
