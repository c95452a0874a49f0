use std::fmt;
use std::ops::Range;

use ndarray::{s, ArrayView2, ArrayView3};
use num_complex::Complex64;

use crate::error::{Result, SslError};
use crate::grid::DirectionGrid;
use crate::ssl::ml_doa;

/// Scheduling mode, resolved once from the configuration.
///
/// `--chunk-len <= 0` keeps the tool in offline mode (the default;
/// `--look-back` carries a default and is ignored). A positive chunk
/// length with a non-positive look-back is rejected outright instead of
/// silently falling back to offline processing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkMode {
    Offline,
    Online { chunk_len: usize, look_back: usize },
}

impl ChunkMode {
    pub fn resolve(chunk_len: i64, look_back: i64) -> Result<Self> {
        if chunk_len <= 0 {
            return Ok(ChunkMode::Offline);
        }
        if look_back <= 0 {
            return Err(SslError::config(format!(
                "--chunk-len {chunk_len} requires a positive --look-back, received {look_back}"
            )));
        }
        Ok(ChunkMode::Online {
            chunk_len: chunk_len as usize,
            look_back: look_back as usize,
        })
    }
}

/// Causal sliding windows over `total_frames`: one window per chunk
/// boundary t = 0, L, 2L, ..., spanning [max(t - B, 0), min(t + L, T)).
/// The final window may be shorter than L.
pub fn chunk_windows(total_frames: usize, chunk_len: usize, look_back: usize) -> Vec<Range<usize>> {
    let mut windows = Vec::new();
    let mut t = 0;
    while t < total_frames {
        windows.push(t.saturating_sub(look_back)..(t + chunk_len).min(total_frames));
        t += chunk_len;
    }
    windows
}

/// Per-utterance result: one angle offline, one angle per chunk online.
/// Renders at four decimals, space-separated, matching the output table
/// format.
#[derive(Debug, Clone, PartialEq)]
pub enum DoaEstimate {
    Single(f64),
    Track(Vec<f64>),
}

impl fmt::Display for DoaEstimate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DoaEstimate::Single(doa) => write!(f, "{doa:.4}"),
            DoaEstimate::Track(track) => {
                for (idx, doa) in track.iter().enumerate() {
                    if idx > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{doa:.4}")?;
                }
                Ok(())
            }
        }
    }
}

/// Run the localizer once (offline) or over each causal window (online)
/// and map winning indices to grid angles.
pub fn estimate_utterance(
    stft: ArrayView3<Complex64>,
    steer: ArrayView3<Complex64>,
    mask: Option<ArrayView2<f64>>,
    mode: ChunkMode,
    grid: &DirectionGrid,
    eps: f64,
) -> Result<DoaEstimate> {
    match mode {
        ChunkMode::Offline => {
            let idx = ml_doa(stft, steer, mask, eps)?;
            Ok(DoaEstimate::Single(grid.angle(idx)))
        }
        ChunkMode::Online {
            chunk_len,
            look_back,
        } => {
            let total_frames = stft.dim().1;
            let windows = chunk_windows(total_frames, chunk_len, look_back);
            if windows.is_empty() {
                return Err(SslError::numeric("utterance produced no analysis windows"));
            }
            let mut track = Vec::with_capacity(windows.len());
            for window in windows {
                let segment = stft.slice(s![.., window.clone(), ..]);
                let segment_mask = mask.map(|weights| weights.slice_move(s![window.clone(), ..]));
                let idx = ml_doa(segment, steer, segment_mask, eps)?;
                track.push(grid.angle(idx));
            }
            Ok(DoaEstimate::Track(track))
        }
    }
}

#[cfg(test)]
mod tests {
    use ndarray::Array3;
    use num_complex::Complex64;

    use super::{chunk_windows, estimate_utterance, ChunkMode, DoaEstimate};
    use crate::args::OutputUnit;
    use crate::error::SslError;
    use crate::grid::DirectionGrid;
    use crate::ssl::EPSILON;

    #[test]
    fn mode_resolution() {
        assert_eq!(ChunkMode::resolve(-1, 125).unwrap(), ChunkMode::Offline);
        assert_eq!(ChunkMode::resolve(0, 0).unwrap(), ChunkMode::Offline);
        assert_eq!(
            ChunkMode::resolve(64, 125).unwrap(),
            ChunkMode::Online {
                chunk_len: 64,
                look_back: 125
            }
        );
        let err = ChunkMode::resolve(64, 0).unwrap_err();
        assert!(matches!(err, SslError::Config(_)));
    }

    #[test]
    fn window_count_is_ceil_of_frames_over_chunk() {
        for (total, chunk, expected) in [(10, 3, 4), (9, 3, 3), (1, 5, 1), (0, 4, 0)] {
            assert_eq!(chunk_windows(total, chunk, 2).len(), expected);
        }
    }

    #[test]
    fn windows_stay_causal_and_in_bounds() {
        let total = 23;
        let windows = chunk_windows(total, 5, 7);
        for (idx, window) in windows.iter().enumerate() {
            let boundary = idx * 5;
            assert_eq!(window.start, boundary.saturating_sub(7));
            assert!(window.end <= total);
            assert!(window.end <= boundary + 5);
            assert!(window.start < window.end);
        }
    }

    #[test]
    fn final_window_may_be_short() {
        let windows = chunk_windows(10, 4, 2);
        assert_eq!(windows.last().unwrap().clone(), 6..10);
    }

    fn bank_and_segment(target: usize, frames: usize) -> (Array3<Complex64>, Array3<Complex64>) {
        let bank = Array3::from_shape_fn((4, 3, 5), |(d, ch, f)| {
            Complex64::from_polar(1.0, -0.41 * (d + 1) as f64 * ch as f64 * (f + 1) as f64)
        });
        let stft = Array3::from_shape_fn((3, frames, 5), |(ch, t, f)| {
            Complex64::from_polar(1.0 + t as f64, 0.2 * t as f64) * bank[[target, ch, f]]
        });
        (bank, stft)
    }

    #[test]
    fn offline_equals_full_length_online() {
        let frames = 12;
        let (bank, stft) = bank_and_segment(2, frames);
        let grid = DirectionGrid::new(4, 0.0, 360.0, OutputUnit::Angle).unwrap();

        let offline = estimate_utterance(
            stft.view(),
            bank.view(),
            None,
            ChunkMode::Offline,
            &grid,
            EPSILON,
        )
        .unwrap();
        let online = estimate_utterance(
            stft.view(),
            bank.view(),
            None,
            ChunkMode::Online {
                chunk_len: frames,
                look_back: frames,
            },
            &grid,
            EPSILON,
        )
        .unwrap();

        let DoaEstimate::Single(single) = offline else {
            panic!("offline mode must yield a single angle");
        };
        let DoaEstimate::Track(track) = online else {
            panic!("online mode must yield a track");
        };
        assert_eq!(track.len(), 1);
        assert_eq!(track[0], single);
    }

    #[test]
    fn online_emits_one_angle_per_chunk() {
        let (bank, stft) = bank_and_segment(1, 10);
        let grid = DirectionGrid::new(4, 0.0, 360.0, OutputUnit::Angle).unwrap();
        let estimate = estimate_utterance(
            stft.view(),
            bank.view(),
            None,
            ChunkMode::Online {
                chunk_len: 3,
                look_back: 5,
            },
            &grid,
            EPSILON,
        )
        .unwrap();
        let DoaEstimate::Track(track) = estimate else {
            panic!("online mode must yield a track");
        };
        assert_eq!(track.len(), 4);
        for doa in track {
            assert_eq!(doa, 90.0);
        }
    }

    #[test]
    fn estimate_formats_at_four_decimals() {
        assert_eq!(DoaEstimate::Single(180.0).to_string(), "180.0000");
        assert_eq!(
            DoaEstimate::Track(vec![0.0, 90.0, 270.0]).to_string(),
            "0.0000 90.0000 270.0000"
        );
    }
}
