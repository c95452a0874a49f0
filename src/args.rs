use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::error::{Result, SslError};
use crate::stft::WindowKind;

#[derive(Parser, Debug, Clone)]
#[command(
    author,
    version,
    about = "Maximum-likelihood sound-source direction estimation",
    long_about = None,
    arg_required_else_help = true,
    after_help = "Examples:\n  array_doa wav.scp steer.npy doa.txt\n  array_doa wav.scp steer.npy doa.txt --mask-scp spk1.scp,spk2.scp --winner-take-all 1e-4\n  array_doa wav.scp steer.npy doa.txt --chunk-len 64 --look-back 125 --output angle\n"
)]
pub struct Args {
    /// Script file listing multi-channel wave inputs (one "key path" per line)
    pub wav_scp: PathBuf,

    /// Pre-computed steering vectors as .npy (shape A x M x F, A: number
    /// of DoAs, M: microphone number, F: FFT bins)
    pub steer_vector: PathBuf,

    /// Output path for estimated DoA lines
    pub doa_out: PathBuf,

    /// Frame length in samples for spectral analysis
    #[arg(long, default_value_t = 512)]
    pub frame_len: usize,

    /// Frame hop in samples for spectral analysis
    #[arg(long, default_value_t = 256)]
    pub frame_hop: usize,

    /// Analysis window applied to each frame
    #[arg(long, value_enum, default_value_t = WindowKind::Hann)]
    pub window: WindowKind,

    /// Pad each frame to the next power of two before the FFT
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    pub round_power_of_two: bool,

    /// Center frames by padding half an FFT size of silence on both ends
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    pub center: bool,

    /// DoA search range as "min,max" in degrees
    #[arg(long, default_value = "0,360")]
    pub doa_range: String,

    /// Comma-separated script files for TF-masks in .npy format, one per
    /// speaker candidate (empty: uniform weighting)
    #[arg(long, default_value = "")]
    pub mask_scp: String,

    /// Unit of the reported DoA
    #[arg(long, value_enum, default_value_t = OutputUnit::Radian)]
    pub output: OutputUnit,

    /// Winner-take-all floor for mask fusion (negative disables fusion)
    #[arg(long, allow_hyphen_values = true, default_value_t = -1.0)]
    pub winner_take_all: f64,

    /// Number of frames per chunk for online processing (non-positive
    /// keeps offline mode)
    #[arg(long, allow_hyphen_values = true, default_value_t = -1)]
    pub chunk_len: i64,

    /// Number of frames of history each online chunk may reuse
    #[arg(long, allow_hyphen_values = true, default_value_t = 125)]
    pub look_back: i64,

    /// Policy when an utterance key is missing from a mask source
    #[arg(long, value_enum, default_value_t = MissingMask::Skip)]
    pub on_missing_mask: MissingMask,

    /// Number of worker threads for direction scoring (0 = automatic)
    #[arg(long, default_value_t = 0)]
    pub cpu: usize,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputUnit {
    /// Report angles in radians
    Radian,
    /// Report angles in degrees
    Angle,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum MissingMask {
    /// Skip the utterance with a warning and continue the batch
    Skip,
    /// Abort the whole run on the first missing key
    Fail,
}

pub fn parse_doa_range(raw: &str) -> Result<(f64, f64)> {
    let parts: Vec<&str> = raw.split(',').map(str::trim).collect();
    if parts.len() != 2 {
        return Err(SslError::config(format!(
            "--doa-range must be \"min,max\", received {raw:?}"
        )));
    }
    let min_doa = parts[0].parse::<f64>().map_err(|_| {
        SslError::config(format!(
            "--doa-range minimum is not a number: {:?}",
            parts[0]
        ))
    })?;
    let max_doa = parts[1].parse::<f64>().map_err(|_| {
        SslError::config(format!(
            "--doa-range maximum is not a number: {:?}",
            parts[1]
        ))
    })?;
    if !min_doa.is_finite() || !max_doa.is_finite() {
        return Err(SslError::config(format!(
            "--doa-range bounds must be finite, received {raw:?}"
        )));
    }
    if min_doa >= max_doa {
        return Err(SslError::config(format!(
            "--doa-range minimum must be below maximum, received {raw:?}"
        )));
    }
    Ok((min_doa, max_doa))
}

pub fn parse_mask_scps(raw: &str) -> Vec<PathBuf> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(PathBuf::from)
        .collect()
}
