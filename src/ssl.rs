use ndarray::{Array2, ArrayView2, ArrayView3, Axis};
use num_complex::Complex64;
use rayon::prelude::*;

use crate::error::{Result, SslError};

/// Numerical floor guarding every normalization in the kernel. Matches
/// single-precision machine epsilon, which is the smallest weight the
/// upstream mask estimators emit.
pub const EPSILON: f64 = f32::EPSILON as f64;

/// Maximum-likelihood direction scoring.
///
/// `stft` is an observed complex segment (channels x frames x bins),
/// `steer` the full steering bank (directions x channels x bins) and
/// `mask` an optional per-cell weighting (frames x bins; uniform when
/// omitted). Each candidate direction is scored by pooling, over every
/// (frame, bin) cell, the normalized agreement between the observed
/// cross-channel vector and the steering vector at that bin:
///
///   |v_d(f)^H s(t,f)|^2 / max(||v_d(f)||^2 ||s(t,f)||^2, eps)
///
/// weighted by the mask. Returns the arg-max direction index; exact ties
/// resolve to the lowest index. Stateless: behaves identically per
/// utterance and per chunk.
pub fn ml_doa(
    stft: ArrayView3<Complex64>,
    steer: ArrayView3<Complex64>,
    mask: Option<ArrayView2<f64>>,
    eps: f64,
) -> Result<usize> {
    let (channels, frames, bins) = stft.dim();
    let (num_doa, sv_channels, sv_bins) = steer.dim();
    if frames == 0 || bins == 0 {
        return Err(SslError::numeric(format!(
            "empty spectral segment ({frames} frames x {bins} bins)"
        )));
    }
    if num_doa == 0 {
        return Err(SslError::config("steering bank holds no directions"));
    }
    if sv_channels != channels {
        return Err(SslError::config(format!(
            "steering bank carries {sv_channels} channels, spectrogram has {channels}"
        )));
    }
    if sv_bins != bins {
        return Err(SslError::config(format!(
            "steering bank carries {sv_bins} frequency bins, spectrogram has {bins}"
        )));
    }
    if let Some(weights) = mask {
        if weights.dim() != (frames, bins) {
            return Err(SslError::data(format!(
                "mask shape {:?} does not cover segment {:?}",
                weights.dim(),
                (frames, bins)
            )));
        }
    }

    // ||s(t,f)||^2 over channels, shared by every candidate direction.
    let mut obs_pow = Array2::<f64>::zeros((frames, bins));
    for ch in 0..channels {
        for t in 0..frames {
            for f in 0..bins {
                obs_pow[[t, f]] += stft[[ch, t, f]].norm_sqr();
            }
        }
    }

    let scores: Vec<f64> = (0..num_doa)
        .into_par_iter()
        .map(|d| {
            let sv = steer.index_axis(Axis(0), d);
            let mut sv_pow = vec![0.0_f64; bins];
            for ch in 0..channels {
                for f in 0..bins {
                    sv_pow[f] += sv[[ch, f]].norm_sqr();
                }
            }
            let mut score = 0.0;
            for t in 0..frames {
                for f in 0..bins {
                    let mut dot = Complex64::new(0.0, 0.0);
                    for ch in 0..channels {
                        dot += sv[[ch, f]].conj() * stft[[ch, t, f]];
                    }
                    let denom = (sv_pow[f] * obs_pow[[t, f]]).max(eps);
                    let weight = mask.map_or(1.0, |weights| weights[[t, f]]);
                    score += weight * dot.norm_sqr() / denom;
                }
            }
            score
        })
        .collect();

    // First-seen maximum: exact ties keep the lowest index, so repeated
    // runs over identical input reproduce the same answer.
    let mut best = 0;
    for (idx, &score) in scores.iter().enumerate().skip(1) {
        if score > scores[best] {
            best = idx;
        }
    }
    Ok(best)
}
