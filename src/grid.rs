use ndarray::Array1;

use crate::args::OutputUnit;
use crate::error::{Result, SslError};

/// Ordered candidate angles for a steering-vector bank.
///
/// Carries `num_doa + 1` evenly spaced points over the configured range,
/// both ends inclusive. A winning candidate index in `[0, num_doa)` maps
/// to `angle(idx)`; the trailing point equals the range maximum and acts
/// as an upper reference bound only, never an addressable winner.
#[derive(Debug, Clone)]
pub struct DirectionGrid {
    angles: Array1<f64>,
}

impl DirectionGrid {
    pub fn new(num_doa: usize, min_doa: f64, max_doa: f64, unit: OutputUnit) -> Result<Self> {
        if num_doa == 0 {
            return Err(SslError::config("steering bank holds no directions"));
        }
        let (lo, hi) = match unit {
            OutputUnit::Radian => (min_doa.to_radians(), max_doa.to_radians()),
            OutputUnit::Angle => (min_doa, max_doa),
        };
        Ok(Self {
            angles: Array1::linspace(lo, hi, num_doa + 1),
        })
    }

    pub fn num_directions(&self) -> usize {
        self.angles.len() - 1
    }

    /// Angle of a winning candidate index. Valid for `idx < num_directions()`.
    pub fn angle(&self, idx: usize) -> f64 {
        self.angles[idx]
    }

    /// The non-addressable trailing grid point (== converted range maximum).
    pub fn upper_bound(&self) -> f64 {
        self.angles[self.angles.len() - 1]
    }
}
