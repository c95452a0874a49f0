use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use ndarray::Array2;

use crate::error::{Result, SslError};

/// Decode a WAV stream into a (channels x samples) matrix plus its sample
/// rate. Integer PCM is normalized so that full scale maps to [-1, 1);
/// float payloads pass through unchanged.
pub fn read_wav<R: Read>(reader: R) -> Result<(Array2<f64>, u32)> {
    let mut wav = hound::WavReader::new(reader)?;
    let spec = wav.spec();
    let channels = spec.channels as usize;
    if channels == 0 {
        return Err(SslError::data("wave stream reports zero channels"));
    }

    let interleaved: Vec<f64> = match spec.sample_format {
        hound::SampleFormat::Float => wav
            .samples::<f32>()
            .map(|sample| sample.map(f64::from))
            .collect::<std::result::Result<_, _>>()?,
        hound::SampleFormat::Int => {
            let scale = (1_i64 << (spec.bits_per_sample - 1)) as f64;
            wav.samples::<i32>()
                .map(|sample| sample.map(|value| value as f64 / scale))
                .collect::<std::result::Result<_, _>>()?
        }
    };

    let samples = interleaved.len() / channels;
    let audio = Array2::from_shape_fn((channels, samples), |(ch, n)| {
        interleaved[n * channels + ch]
    });
    Ok((audio, spec.sample_rate))
}

pub fn load_wav(path: &Path) -> Result<(Array2<f64>, u32)> {
    let file = File::open(path).map_err(|err| {
        SslError::data(format!("cannot open wave file {}: {err}", path.display()))
    })?;
    read_wav(BufReader::new(file))
}
