//! DIGIQ 12-bit sample packing.
//!
//! 12-bit I/Q streams store their samples in 256-bit DIGIQ words: 32 bytes
//! holding 20 real (10 complex) 12-bit values. Both conversions process one
//! 16-byte half word (10 real values) per step; byte 15 of each packed half
//! is slack and always zero.
//!
//! A 16-bit value and its 12-bit form are related bit-exactly: packing keeps
//! the top 12 bits, unpacking restores them into the top 12 bits with the
//! low nibble zero. Converting is therefore idempotent for values whose low
//! nibble is already zero.

use crate::error::{Error, Result};

/// Size of one DIGIQ word in bytes.
pub const DIGIQ_WORD_SIZE: usize = 32;
/// Real (I or Q) 12-bit values per DIGIQ word.
pub const SAMPLES_REAL12_PER_WORD: usize = 20;
/// Complex 12-bit samples per DIGIQ word.
pub const SAMPLES_COMPLEX12_PER_WORD: usize = 10;

const HALF_WORD: usize = DIGIQ_WORD_SIZE / 2;
const VALUES_PER_HALF: usize = SAMPLES_REAL12_PER_WORD / 2;
/// Byte length of the 16-bit form of one DIGIQ word.
const UNPACKED_WORD_SIZE: usize = SAMPLES_REAL12_PER_WORD * 2;

/// Number of 16-bit values produced by unpacking `packed` bytes.
/// `packed` must be a whole number of DIGIQ words.
pub fn unpacked_len(packed: usize) -> Result<usize> {
    if packed % DIGIQ_WORD_SIZE != 0 {
        return Err(Error::SizeNotAligned {
            size: packed,
            unit: DIGIQ_WORD_SIZE,
        });
    }
    Ok(packed / DIGIQ_WORD_SIZE * SAMPLES_REAL12_PER_WORD)
}

/// Number of packed bytes produced from `values` 16-bit values.
/// `values` must be a whole number of half words (10 values).
pub fn packed_len(values: usize) -> Result<usize> {
    if values % VALUES_PER_HALF != 0 {
        return Err(Error::SizeNotAligned {
            size: values * 2,
            unit: VALUES_PER_HALF * 2,
        });
    }
    Ok(values / VALUES_PER_HALF * HALF_WORD)
}

/// Packed byte span covering at least `samples` complex samples, rounded up
/// to a whole number of DIGIQ words.
pub fn packed_span_for_samples(samples: u64) -> u64 {
    samples.div_ceil(SAMPLES_COMPLEX12_PER_WORD as u64) * DIGIQ_WORD_SIZE as u64
}

#[inline]
fn load_u16(src: &[u8], at: usize) -> u16 {
    u16::from_ne_bytes([src[at], src[at + 1]])
}

/// Unpack 12-bit DIGIQ data into 16-bit values.
///
/// `src.len()` must be a whole number of DIGIQ words and `dst` must hold
/// exactly [`unpacked_len`] values.
pub fn unpack_12_to_16(src: &[u8], dst: &mut [i16]) -> Result<()> {
    let values = unpacked_len(src.len())?;
    if dst.len() != values {
        return Err(Error::SizeNotAligned {
            size: dst.len() * 2,
            unit: UNPACKED_WORD_SIZE,
        });
    }
    for (half, out) in src
        .chunks_exact(HALF_WORD)
        .zip(dst.chunks_exact_mut(VALUES_PER_HALF))
    {
        out[0] = (load_u16(half, 0) << 4) as i16;
        out[1] = (load_u16(half, 1) & 0xFFF0) as i16;
        out[2] = (load_u16(half, 3) << 4) as i16;
        out[3] = (load_u16(half, 4) & 0xFFF0) as i16;
        out[4] = (load_u16(half, 6) << 4) as i16;
        out[5] = (load_u16(half, 7) & 0xFFF0) as i16;
        out[6] = (load_u16(half, 9) << 4) as i16;
        out[7] = (load_u16(half, 10) & 0xFFF0) as i16;
        out[8] = (load_u16(half, 12) << 4) as i16;
        out[9] = (load_u16(half, 13) & 0xFFF0) as i16;
    }
    Ok(())
}

/// Pack 16-bit values into 12-bit DIGIQ data, discarding each value's low
/// nibble.
///
/// `src.len()` must be a whole number of half words (10 values) and `dst`
/// must hold exactly [`packed_len`] bytes.
pub fn pack_16_to_12(src: &[i16], dst: &mut [u8]) -> Result<()> {
    let bytes = packed_len(src.len())?;
    if dst.len() != bytes {
        return Err(Error::SizeNotAligned {
            size: dst.len(),
            unit: HALF_WORD,
        });
    }
    for (values, half) in src
        .chunks_exact(VALUES_PER_HALF)
        .zip(dst.chunks_exact_mut(HALF_WORD))
    {
        // Each pair of values packs into 3 bytes; the u32 stores at offsets
        // 0, 3, 6, 9 and 12 overlap by one byte, which is always zero.
        for (i, at) in [0usize, 3, 6, 9, 12].into_iter().enumerate() {
            let lo = (values[2 * i] as u16) >> 4;
            let hi = (values[2 * i + 1] as u16) & 0xFFF0;
            let packed = lo as u32 | (hi as u32) << 8;
            half[at..at + 4].copy_from_slice(&packed.to_ne_bytes());
        }
        half[HALF_WORD - 1] = 0;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_len_calculations() {
        assert_eq!(unpacked_len(32).unwrap(), 20);
        assert_eq!(unpacked_len(96).unwrap(), 60);
        assert!(matches!(
            unpacked_len(33),
            Err(Error::SizeNotAligned { .. })
        ));

        assert_eq!(packed_len(20).unwrap(), 32);
        assert_eq!(packed_len(10).unwrap(), 16);
        assert!(matches!(packed_len(7), Err(Error::SizeNotAligned { .. })));
    }

    #[test]
    fn test_packed_span_for_samples() {
        assert_eq!(packed_span_for_samples(0), 0);
        assert_eq!(packed_span_for_samples(1), 32);
        assert_eq!(packed_span_for_samples(10), 32);
        assert_eq!(packed_span_for_samples(11), 64);
        assert_eq!(packed_span_for_samples(100), 320);
    }

    #[test]
    fn test_pack_unpack_round_trip() {
        // values with a zero low nibble survive the round trip bit-exactly
        let src: Vec<i16> = (0..40)
            .map(|i| ((i * 1103 - 17_000) & !0xF) as i16)
            .collect();
        let mut packed = vec![0u8; packed_len(src.len()).unwrap()];
        pack_16_to_12(&src, &mut packed).unwrap();
        let mut back = vec![0i16; src.len()];
        unpack_12_to_16(&packed, &mut back).unwrap();
        assert_eq!(back, src);
    }

    #[test]
    fn test_pack_discards_low_nibble() {
        let src = vec![0x1234u16 as i16; 10];
        let mut packed = vec![0u8; 16];
        pack_16_to_12(&src, &mut packed).unwrap();
        let mut back = vec![0i16; 10];
        unpack_12_to_16(&packed, &mut back).unwrap();
        assert!(back.iter().all(|&v| v == 0x1230));
    }

    #[test]
    fn test_half_word_slack_byte_zero() {
        let src = vec![-1i16; 20];
        let mut packed = vec![0xFFu8; 32];
        pack_16_to_12(&src, &mut packed).unwrap();
        assert_eq!(packed[15], 0);
        assert_eq!(packed[31], 0);
    }

    #[test]
    fn test_negative_values_survive() {
        let src: Vec<i16> = vec![-32768, -16, 16, 32752, -4096, 4096, -160, 160, 0, -32768];
        let mut packed = vec![0u8; 16];
        pack_16_to_12(&src, &mut packed).unwrap();
        let mut back = vec![0i16; 10];
        unpack_12_to_16(&packed, &mut back).unwrap();
        assert_eq!(back, src);
    }

    #[test]
    fn test_size_mismatch_rejected() {
        let src = [0u8; 32];
        let mut dst = vec![0i16; 19];
        assert!(unpack_12_to_16(&src, &mut dst).is_err());
    }
}
