use std::io;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, SslError>;

/// Failure taxonomy for a localization run.
///
/// `Config` means the run cannot possibly produce valid results and aborts
/// the whole batch. `Data` and `Numeric` are isolated to the offending
/// utterance (or chunk): the batch logs them with the utterance key and
/// moves on. I/O and decode errors raised while loading per-utterance
/// inputs are likewise isolated; the same errors during startup propagate
/// out of `main` before any utterance is touched.
#[derive(Debug, Error)]
pub enum SslError {
    #[error("configuration: {0}")]
    Config(String),

    #[error("utterance data: {0}")]
    Data(String),

    #[error("numeric: {0}")]
    Numeric(String),

    #[error(transparent)]
    Io(#[from] io::Error),

    #[error("wav: {0}")]
    Wav(#[from] hound::Error),

    #[error("npy: {0}")]
    Npy(#[from] ndarray_npy::ReadNpyError),

    #[error("fft: {0}")]
    Fft(#[from] realfft::FftError),
}

impl SslError {
    pub fn config(msg: impl Into<String>) -> Self {
        SslError::Config(msg.into())
    }

    pub fn data(msg: impl Into<String>) -> Self {
        SslError::Data(msg.into())
    }

    pub fn numeric(msg: impl Into<String>) -> Self {
        SslError::Numeric(msg.into())
    }

    /// Whether this failure must abort the batch instead of skipping the
    /// current utterance.
    pub fn is_fatal(&self) -> bool {
        matches!(self, SslError::Config(_))
    }
}
