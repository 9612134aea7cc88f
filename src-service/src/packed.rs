//! Packed-data unpacking.
//!
//! A packed value carries several narrow sub-samples in one 8, 16 or 32 bit
//! container. Sub-samples come out least-significant first, in the order they
//! must be fed to the ingestion path.

use spectrascope_common::PackedFormat;

/// Split `raw` into its sub-samples according to `format`.
pub fn unpack(raw: u32, format: PackedFormat) -> impl Iterator<Item = i32> {
    let bits = u32::from(format.bits_per_sample.clamp(1, 16));
    let container = u32::from(format.value_size.clamp(8, 32));
    let value = if container >= 32 {
        raw
    } else {
        raw & ((1u32 << container) - 1)
    };
    let sub_mask = (1u32 << bits) - 1;

    (0..container / bits).map(move |i| {
        let mut sub = (value >> (i * bits)) & sub_mask;
        if format.alternate {
            sub = sub.reverse_bits() >> (32 - bits);
        }
        if format.signed {
            ((sub << (32 - bits)) as i32) >> (32 - bits)
        } else {
            sub as i32
        }
    })
}
