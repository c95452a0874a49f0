use ndarray::{Array2, Zip};

use crate::error::{Result, SslError};

/// Winner-take-all fusion of per-speaker TF-masks.
///
/// For each position the mask(s) equal to the elementwise maximum keep
/// their own value; every other mask is suppressed to `floor`. Ties all
/// retain their value. With fewer than two masks the input passes through
/// unchanged. Output count and shapes always equal the input.
pub fn winner_take_all(masks: &[Array2<f64>], floor: f64) -> Result<Vec<Array2<f64>>> {
    if masks.len() < 2 {
        return Ok(masks.to_vec());
    }
    let shape = masks[0].dim();
    for mask in &masks[1..] {
        if mask.dim() != shape {
            return Err(SslError::data(format!(
                "mask shapes disagree: {:?} vs {:?}",
                shape,
                mask.dim()
            )));
        }
    }

    let mut max_mask = masks[0].clone();
    for mask in &masks[1..] {
        Zip::from(&mut max_mask).and(mask).for_each(|best, &value| {
            if value > *best {
                *best = value;
            }
        });
    }

    Ok(masks
        .iter()
        .map(|mask| {
            let mut fused = mask.clone();
            Zip::from(&mut fused).and(&max_mask).for_each(|value, &best| {
                if *value != best {
                    *value = floor;
                }
            });
            fused
        })
        .collect())
}

/// Masks may be stored frame-major or bin-major; reconcile to
/// frames x bins against the spectrogram's frequency-bin count.
pub fn align_mask(mask: Array2<f64>, num_bins: usize) -> Result<Array2<f64>> {
    if mask.ncols() == num_bins {
        return Ok(mask);
    }
    if mask.nrows() == num_bins {
        return Ok(mask.reversed_axes());
    }
    Err(SslError::config(format!(
        "mask shape {:?} does not match {num_bins} frequency bins in either orientation",
        mask.dim()
    )))
}
