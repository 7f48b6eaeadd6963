//! # Dipamkara — Distance kernels
//!
//! Pure functions over two equal-length `f64` slices. The engine's exhaustive
//! scan calls these in a tight loop; nothing here allocates except the two
//! normalizing metrics.
//!
//! Degenerate inputs never produce NaN: a zero-norm operand makes `cosine`
//! return `1.0` (maximum distance), and both normalizers map zero-norm /
//! zero-stddev input to the zero vector.

use crate::error::{DbError, Result};
use serde::{Deserialize, Serialize};

/// Named distance function, transmitted on the wire by its lowercase name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Cosine,
    Euclidean,
    EuclideanL2,
    EuclideanZScore,
    Chebyshev,
}

impl Metric {
    /// Parse a wire name. Unknown names are an error, never a default.
    pub fn parse(name: &str) -> Result<Self> {
        match name {
            "cosine" => Ok(Self::Cosine),
            "euclidean" => Ok(Self::Euclidean),
            "euclidean_l2" => Ok(Self::EuclideanL2),
            "euclidean_z_score" => Ok(Self::EuclideanZScore),
            "chebyshev" => Ok(Self::Chebyshev),
            other => Err(DbError::MetricNotSupported(other.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cosine => "cosine",
            Self::Euclidean => "euclidean",
            Self::EuclideanL2 => "euclidean_l2",
            Self::EuclideanZScore => "euclidean_z_score",
            Self::Chebyshev => "chebyshev",
        }
    }

    /// Distance between `a` and `b` under this metric.
    pub fn distance(&self, a: &[f64], b: &[f64]) -> f64 {
        match self {
            Self::Cosine => cosine(a, b),
            Self::Euclidean => euclidean(a, b),
            Self::EuclideanL2 => euclidean_l2(a, b),
            Self::EuclideanZScore => euclidean_z_score(a, b),
            Self::Chebyshev => chebyshev(a, b),
        }
    }
}

impl std::fmt::Display for Metric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Kernels
// ─────────────────────────────────────────────────────────────────────────────

/// Cosine distance `1 − (a·b)/(‖a‖·‖b‖)`, in `[0, 2]`.
///
/// Returns `1.0` when either operand has zero magnitude.
pub fn cosine(a: &[f64], b: &[f64]) -> f64 {
    let dot: f64 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = norm(a);
    let norm_b = norm(b);
    if norm_a == 0.0 || norm_b == 0.0 {
        return 1.0;
    }
    1.0 - dot / (norm_a * norm_b)
}

/// Euclidean (L2) distance `‖a − b‖₂`.
pub fn euclidean(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f64>()
        .sqrt()
}

/// Euclidean distance between the L2-normalized operands.
pub fn euclidean_l2(a: &[f64], b: &[f64]) -> f64 {
    euclidean(&l2_normalize(a), &l2_normalize(b))
}

/// Euclidean distance between the z-score-normalized operands.
pub fn euclidean_z_score(a: &[f64], b: &[f64]) -> f64 {
    euclidean(&z_score_normalize(a), &z_score_normalize(b))
}

/// Chebyshev (L∞) distance `max_i |a_i − b_i|`.
pub fn chebyshev(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y).abs())
        .fold(0.0, f64::max)
}

// ─────────────────────────────────────────────────────────────────────────────
// Normalizers
// ─────────────────────────────────────────────────────────────────────────────

fn norm(x: &[f64]) -> f64 {
    x.iter().map(|v| v * v).sum::<f64>().sqrt()
}

/// `x / ‖x‖`. A zero vector stays the zero vector.
pub fn l2_normalize(x: &[f64]) -> Vec<f64> {
    let n = norm(x);
    if n == 0.0 {
        return vec![0.0; x.len()];
    }
    x.iter().map(|v| v / n).collect()
}

/// `(x − mean(x)) / stddev(x)` with population stddev.
///
/// A constant vector (stddev 0) maps to the zero vector.
pub fn z_score_normalize(x: &[f64]) -> Vec<f64> {
    if x.is_empty() {
        return Vec::new();
    }
    let mean = x.iter().sum::<f64>() / x.len() as f64;
    let var = x.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / x.len() as f64;
    let std_dev = var.sqrt();
    if std_dev == 0.0 {
        return vec![0.0; x.len()];
    }
    x.iter().map(|v| (v - mean) / std_dev).collect()
}

// ─────────────────────────────────────────────────────────────────────────────
