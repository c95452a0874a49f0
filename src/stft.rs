use std::f64::consts::PI;
use std::sync::Arc;

use clap::ValueEnum;
use ndarray::{Array3, ArrayView2};
use num_complex::Complex64;
use realfft::{RealFftPlanner, RealToComplex};

use crate::error::{Result, SslError};

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum WindowKind {
    Hann,
    Hamm,
    Blackman,
    Rect,
}

pub fn window(kind: WindowKind, len: usize) -> Vec<f64> {
    if len < 2 {
        return vec![1.0; len];
    }
    let denom = (len - 1) as f64;
    (0..len)
        .map(|n| {
            let x = 2.0 * PI * n as f64 / denom;
            match kind {
                WindowKind::Hann => 0.5 * (1.0 - x.cos()),
                WindowKind::Hamm => 0.54 - 0.46 * x.cos(),
                WindowKind::Blackman => 0.42 - 0.5 * x.cos() + 0.08 * (2.0 * x).cos(),
                WindowKind::Rect => 1.0,
            }
        })
        .collect()
}

#[derive(Debug, Clone)]
pub struct StftConfig {
    pub frame_len: usize,
    pub frame_hop: usize,
    pub window: WindowKind,
    pub center: bool,
    pub round_power_of_two: bool,
}

impl StftConfig {
    pub fn fft_size(&self) -> usize {
        if self.round_power_of_two {
            self.frame_len.next_power_of_two()
        } else {
            self.frame_len
        }
    }

    pub fn num_bins(&self) -> usize {
        self.fft_size() / 2 + 1
    }

    fn validate(&self) -> Result<()> {
        if self.frame_len == 0 {
            return Err(SslError::config("--frame-len must be at least 1"));
        }
        if self.frame_hop == 0 {
            return Err(SslError::config("--frame-hop must be at least 1"));
        }
        Ok(())
    }
}

/// Multi-channel STFT front-end. Plans the real-input FFT once and reuses
/// it for every channel of every utterance.
pub struct SpectralAnalyzer {
    cfg: StftConfig,
    window: Vec<f64>,
    forward: Arc<dyn RealToComplex<f64>>,
}

impl SpectralAnalyzer {
    pub fn new(cfg: StftConfig) -> Result<Self> {
        cfg.validate()?;
        let mut planner = RealFftPlanner::new();
        let forward = planner.plan_fft_forward(cfg.fft_size());
        Ok(Self {
            window: window(cfg.window, cfg.frame_len),
            cfg,
            forward,
        })
    }

    pub fn num_bins(&self) -> usize {
        self.cfg.num_bins()
    }

    fn num_frames(&self, samples: usize) -> usize {
        let pad = if self.cfg.center {
            self.cfg.fft_size() / 2
        } else {
            0
        };
        let padded = samples + 2 * pad;
        if padded < self.cfg.frame_len {
            0
        } else {
            1 + (padded - self.cfg.frame_len) / self.cfg.frame_hop
        }
    }

    /// (channels x samples) audio to a (channels x frames x bins) complex
    /// spectrogram; frequency is the trailing axis. Centering pads
    /// fft_size/2 zeros on both ends of each channel.
    pub fn process(&self, audio: ArrayView2<f64>) -> Result<Array3<Complex64>> {
        let (channels, samples) = audio.dim();
        if channels == 0 {
            return Err(SslError::data("audio carries no channels"));
        }
        let frame_len = self.cfg.frame_len;
        let hop = self.cfg.frame_hop;
        let pad = if self.cfg.center {
            self.cfg.fft_size() / 2
        } else {
            0
        };
        let pad = pad as isize;
        let frames = self.num_frames(samples);
        let bins = self.num_bins();

        let mut out = Array3::<Complex64>::zeros((channels, frames, bins));
        let mut input = self.forward.make_input_vec();
        let mut spectrum = self.forward.make_output_vec();

        for ch in 0..channels {
            for t in 0..frames {
                let start = (t * hop) as isize - pad;
                for n in 0..frame_len {
                    let pos = start + n as isize;
                    let sample = if pos >= 0 && (pos as usize) < samples {
                        audio[[ch, pos as usize]]
                    } else {
                        0.0
                    };
                    input[n] = sample * self.window[n];
                }
                // Zero-pad up to the FFT size when rounding is on.
                for slot in input.iter_mut().skip(frame_len) {
                    *slot = 0.0;
                }
                self.forward.process(&mut input, &mut spectrum)?;
                for (f, value) in spectrum.iter().enumerate() {
                    out[[ch, t, f]] = *value;
                }
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use ndarray::Array2;

    use super::{window, SpectralAnalyzer, StftConfig, WindowKind};

    fn config(center: bool) -> StftConfig {
        StftConfig {
            frame_len: 512,
            frame_hop: 256,
            window: WindowKind::Hann,
            center,
            round_power_of_two: true,
        }
    }

    #[test]
    fn hann_window_tapers_to_zero() {
        let w = window(WindowKind::Hann, 64);
        assert_eq!(w.len(), 64);
        assert!(w[0].abs() < 1e-12);
        assert!(w[63].abs() < 1e-12);
        assert!((w[32] - 1.0).abs() < 1e-2);
    }

    #[test]
    fn rect_window_is_flat() {
        assert!(window(WindowKind::Rect, 16).iter().all(|&v| v == 1.0));
    }

    #[test]
    fn frame_count_without_centering() {
        let analyzer = SpectralAnalyzer::new(config(false)).unwrap();
        let audio = Array2::<f64>::zeros((2, 1024));
        let stft = analyzer.process(audio.view()).unwrap();
        // 1 + (1024 - 512) / 256 frames, fft 512 -> 257 bins.
        assert_eq!(stft.dim(), (2, 3, 257));
    }

    #[test]
    fn centering_adds_edge_frames() {
        let analyzer = SpectralAnalyzer::new(config(true)).unwrap();
        let audio = Array2::<f64>::zeros((1, 1024));
        let stft = analyzer.process(audio.view()).unwrap();
        // Padded to 1024 + 512 samples.
        assert_eq!(stft.dim(), (1, 5, 257));
    }

    #[test]
    fn tone_peaks_at_matching_bin() {
        let cfg = StftConfig {
            frame_len: 64,
            frame_hop: 64,
            window: WindowKind::Rect,
            center: false,
            round_power_of_two: false,
        };
        let analyzer = SpectralAnalyzer::new(cfg).unwrap();
        let audio = Array2::from_shape_fn((1, 64), |(_, n)| {
            (2.0 * std::f64::consts::PI * 5.0 * n as f64 / 64.0).cos()
        });
        let stft = analyzer.process(audio.view()).unwrap();
        assert_eq!(stft.dim(), (1, 1, 33));
        let peak = (0..33)
            .max_by(|&a, &b| {
                stft[[0, 0, a]]
                    .norm_sqr()
                    .partial_cmp(&stft[[0, 0, b]].norm_sqr())
                    .unwrap()
            })
            .unwrap();
        assert_eq!(peak, 5);
    }

    #[test]
    fn zero_geometry_is_rejected() {
        let mut cfg = config(false);
        cfg.frame_hop = 0;
        assert!(SpectralAnalyzer::new(cfg).is_err());
        let mut cfg = config(false);
        cfg.frame_len = 0;
        assert!(SpectralAnalyzer::new(cfg).is_err());
    }
}
