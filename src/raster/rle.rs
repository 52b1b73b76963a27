//! Dense run-length encoding of label buffers.
//!
//! The encoding is a flat list of `label, run length` pairs over the row-major
//! buffer, e.g. `[1, 1, 0, 2]` → `[1, 2, 0, 1, 2, 1]`.

use crate::raster::RasterError;

pub fn encode(buffer: &[u8]) -> Vec<u32> {
    let mut out = Vec::new();
    let mut iter = buffer.iter();
    let Some(&first) = iter.next() else {
        return out;
    };

    let mut current = first;
    let mut run: u32 = 1;
    for &label in iter {
        if label == current {
            run += 1;
        } else {
            out.push(u32::from(current));
            out.push(run);
            current = label;
            run = 1;
        }
    }
    out.push(u32::from(current));
    out.push(run);
    out
}

/// Decode into a buffer of exactly `len` pixels.
pub fn decode(rle: &[u32], len: usize) -> Result<Vec<u8>, RasterError> {
    if rle.len() % 2 != 0 {
        return Err(RasterError::InvalidData(format!(
            "dense RLE has odd length {}",
            rle.len()
        )));
    }

    let mut out = Vec::with_capacity(len);
    for pair in rle.chunks_exact(2) {
        let label = u8::try_from(pair[0])
            .map_err(|_| RasterError::InvalidData(format!("label {} out of range", pair[0])))?;
        let run = pair[1] as usize;
        if out.len() + run > len {
            return Err(RasterError::InvalidData(format!(
                "dense RLE covers more than {len} pixels"
            )));
        }
        out.resize(out.len() + run, label);
    }

    if out.len() != len {
        return Err(RasterError::InvalidData(format!(
            "dense RLE covers {} of {len} pixels",
            out.len()
        )));
    }
    Ok(out)
}
