//! Fixed-width bit packing over 32-bit words.
//!
//! Every operation has a serial reference kernel ([`Scalar`]) and a
//! lane-parallel one ([`Vectorized`]) that must agree bit for bit. The
//! [`ConsistencyChecker`] cross-checks the two and should run before any
//! measurement of either is trusted.
//!
//! Kernels never validate their inputs. Values must fit in the chosen bit
//! width and buffers must have the lengths documented on [`Kernel`];
//! an oversized value silently corrupts its neighbours.

mod check;
mod error;
mod lanes;
mod pack_unpack;
mod planes;
mod vectorized;

pub use check::{ConsistencyChecker, Operation, first_mismatch};
pub use error::{Error, Result};
pub use lanes::LaneWidth;
pub use pack_unpack::{BitWidth, Layout, Scalar};
pub use planes::{PlaneCount, Planes};
pub use vectorized::{Backend, Vectorized};

const fn lane_size<T>() -> usize {
    std::mem::size_of::<T>() * 8
}

/// Bits in one packed word.
pub const WORD_BITS: usize = lane_size::<u32>();

/// One implementation of the packing and plane operations.
///
/// With `p = bit_width.values_per_word()`:
///
/// * `pack` reads `out.len() * p` values and writes every word of `out`.
/// * `unpack` reads every word of `words` and writes `words.len() * p` values.
/// * `collapse` merges the planes into their first `planes.len()` words.
/// * `expand` splits the first `planes.len()` words into the planes.
///
/// Implementations are stateless, so independent calls on distinct buffers
/// may run on any number of threads at once.
pub trait Kernel {
    fn name(&self) -> &'static str;

    fn pack(&self, bit_width: BitWidth, layout: Layout, values: &[u32], out: &mut [u32]);

    fn unpack(&self, bit_width: BitWidth, layout: Layout, words: &[u32], out: &mut [u32]);

    fn collapse(&self, planes: Planes<'_>);

    fn expand(&self, planes: Planes<'_>);
}

/// Pack a slice of values into 32-bit words, most significant slot first.
/// Each value must be less than 2^bit_width. A trailing partial word keeps
/// its unused low slots zeroed. Returns an empty vector for a bit width
/// outside `1..=32`.
///
/// Example:
/// ```
/// use lanepack::bit_pack;
/// let data = vec![1, 2, 3, 4, 5, 6, 7, 8];
/// let bit_width = 4;
/// let packed = bit_pack(&data, bit_width);
/// assert_eq!(packed, vec![0x12345678]);
/// ```
pub fn bit_pack(data: &[u32], bit_width: usize) -> Vec<u32> {
    let Ok(bit_width) = BitWidth::new(bit_width) else {
        return Vec::new();
    };
    let per_word = bit_width.values_per_word();
    let full = data.len() / per_word;

    let mut out = vec![0u32; bit_width.packed_len(data.len())];
    Vectorized::detect().pack(
        bit_width,
        Layout::Horizontal,
        &data[..full * per_word],
        &mut out[..full],
    );

    let rest = &data[full * per_word..];
    if !rest.is_empty() {
        let mut last = vec![0u32; per_word];
        last[..rest.len()].copy_from_slice(rest);
        Scalar.pack(bit_width, Layout::Horizontal, &last, &mut out[full..]);
    }
    out
}

/// Unpack the first `original_count` values from words produced by
/// [`bit_pack`].
///
/// Example:
/// ```
/// use lanepack::bit_unpack;
/// let packed = vec![305419896];
/// let bit_width = 4;
/// let unpacked = bit_unpack(&packed, bit_width, 8);
/// assert_eq!(unpacked, vec![1, 2, 3, 4, 5, 6, 7, 8]);
/// ```
pub fn bit_unpack(packed_data: &[u32], bit_width: usize, original_count: usize) -> Vec<u32> {
    let Ok(bit_width) = BitWidth::new(bit_width) else {
        return Vec::new();
    };

    let mut out = vec![0u32; packed_data.len() * bit_width.values_per_word()];
    Vectorized::detect().unpack(bit_width, Layout::Horizontal, packed_data, &mut out);
    out.truncate(original_count);
    out
}

/// Merge `count` planes stored back to back in `planes` into
/// `planes.len() / count` words.
///
/// Example:
/// ```
/// use lanepack::{PlaneCount, collapse_planes};
/// let planes: Vec<u32> = (0..256).collect();
/// let words = collapse_planes(&planes, PlaneCount::Bytes).unwrap();
/// assert_eq!(words.len(), 64);
/// assert_eq!(words[0], (64 << 16) | (128 << 8) | 192);
/// ```
pub fn collapse_planes(planes: &[u32], count: PlaneCount) -> Result<Vec<u32>> {
    let mut buffer = planes.to_vec();
    let planes = Planes::new(&mut buffer, count)?;
    let words = planes.len();
    Vectorized::detect().collapse(planes);
    buffer.truncate(words);
    Ok(buffer)
}

/// Split every word into `count` planes, returned back to back.
///
/// Example:
/// ```
/// use lanepack::{PlaneCount, expand_planes};
/// let planes = expand_planes(&[0x11223344, 0x55667788], PlaneCount::Halves);
/// assert_eq!(planes, vec![0x1122, 0x5566, 0x3344, 0x7788]);
/// ```
pub fn expand_planes(words: &[u32], count: PlaneCount) -> Vec<u32> {
    let mut buffer = vec![0u32; words.len() * count.get()];
    buffer[..words.len()].copy_from_slice(words);
    let split = buffer.split_at_mut(words.len());
    if let Ok(planes) = Planes::from_parts(split.0, split.1, count) {
        Vectorized::detect().expand(planes);
    }
    buffer
}
