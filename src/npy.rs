use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use ndarray::{Array2, Array3};
use ndarray_npy::ReadNpyExt;
use num_complex::{Complex32, Complex64};

use crate::error::Result;

/// Read a steering bank (directions x channels x bins). Banks are stored
/// as complex128 or complex64 depending on how they were derived; both
/// are accepted and widened to f64.
pub fn read_steer_bank<R: Read + Seek>(mut reader: R) -> Result<Array3<Complex64>> {
    match Array3::<Complex64>::read_npy(&mut reader) {
        Ok(bank) => Ok(bank),
        Err(_) => {
            reader.seek(SeekFrom::Start(0))?;
            let bank = Array3::<Complex32>::read_npy(&mut reader)?;
            Ok(bank.mapv(|z| Complex64::new(f64::from(z.re), f64::from(z.im))))
        }
    }
}

pub fn load_steer_bank(path: &Path) -> Result<Array3<Complex64>> {
    read_steer_bank(BufReader::new(File::open(path)?))
}

/// Read a TF-mask matrix, accepting f64 or f32 payloads.
pub fn read_mask<R: Read + Seek>(mut reader: R) -> Result<Array2<f64>> {
    match Array2::<f64>::read_npy(&mut reader) {
        Ok(mask) => Ok(mask),
        Err(_) => {
            reader.seek(SeekFrom::Start(0))?;
            let mask = Array2::<f32>::read_npy(&mut reader)?;
            Ok(mask.mapv(f64::from))
        }
    }
}

pub fn load_mask(path: &Path) -> Result<Array2<f64>> {
    read_mask(BufReader::new(File::open(path)?))
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use ndarray::{Array2, Array3};
    use ndarray_npy::WriteNpyExt;
    use num_complex::{Complex32, Complex64};

    use super::{read_mask, read_steer_bank};

    #[test]
    fn reads_complex128_banks() {
        let bank = Array3::from_shape_fn((2, 3, 4), |(d, ch, f)| {
            Complex64::new((d + ch) as f64, f as f64)
        });
        let mut bytes = Vec::new();
        bank.write_npy(&mut bytes).unwrap();
        let loaded = read_steer_bank(Cursor::new(bytes)).unwrap();
        assert_eq!(loaded, bank);
    }

    #[test]
    fn widens_complex64_banks() {
        let bank = Array3::from_shape_fn((2, 2, 3), |(d, ch, f)| {
            Complex32::new(d as f32 + 0.5, (ch * f) as f32)
        });
        let mut bytes = Vec::new();
        bank.write_npy(&mut bytes).unwrap();
        let loaded = read_steer_bank(Cursor::new(bytes)).unwrap();
        assert_eq!(loaded.dim(), (2, 2, 3));
        assert!((loaded[[1, 0, 0]].re - 1.5).abs() < 1e-12);
    }

    #[test]
    fn reads_masks_in_both_precisions() {
        let mask64 = Array2::from_shape_fn((3, 5), |(t, f)| (t * 5 + f) as f64 / 15.0);
        let mut bytes = Vec::new();
        mask64.write_npy(&mut bytes).unwrap();
        assert_eq!(read_mask(Cursor::new(bytes)).unwrap(), mask64);

        let mask32 = mask64.mapv(|v| v as f32);
        let mut bytes = Vec::new();
        mask32.write_npy(&mut bytes).unwrap();
        let loaded = read_mask(Cursor::new(bytes)).unwrap();
        assert_eq!(loaded.dim(), (3, 5));
        assert!((loaded[[2, 4]] - f64::from(mask32[[2, 4]])).abs() < 1e-12);
    }

    #[test]
    fn rejects_non_npy_payloads() {
        assert!(read_mask(Cursor::new(b"not an npy file".to_vec())).is_err());
    }
}
