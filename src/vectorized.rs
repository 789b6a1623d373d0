//! Lane-parallel kernels.
//!
//! The vectorization axis is "many output words at the same shift level":
//! one step fills the same slot of `LANES` neighbouring words. Words past
//! the last full lane group go through the scalar code, so any word count
//! is accepted and the result never depends on the lane count.

use std::fmt;

use log::debug;

use crate::lanes::{LaneWidth, Lanes, Portable};
#[cfg(target_arch = "aarch64")]
use crate::lanes::u32x4;
use crate::pack_unpack::{
    BitWidth, Layout, pack_horizontal, pack_vertical_word, unpack_horizontal, unpack_vertical_word,
};
use crate::planes::{PlaneCount, Planes, collapse_range, expand_range};
use crate::{Kernel, WORD_BITS};

#[cfg(target_arch = "x86_64")]
use std::arch::is_x86_feature_detected;

/// Instruction set a [`Vectorized`] kernel runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Backend {
    Portable(LaneWidth),
    #[cfg(target_arch = "x86_64")]
    Avx2,
    #[cfg(target_arch = "aarch64")]
    Neon,
}

impl Backend {
    pub const fn lanes(self) -> usize {
        match self {
            Backend::Portable(width) => width.get(),
            #[cfg(target_arch = "x86_64")]
            Backend::Avx2 => 8,
            #[cfg(target_arch = "aarch64")]
            Backend::Neon => 4,
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Backend::Portable(width) => write!(f, "portable x{}", width.get()),
            #[cfg(target_arch = "x86_64")]
            Backend::Avx2 => f.write_str("avx2 x8"),
            #[cfg(target_arch = "aarch64")]
            Backend::Neon => f.write_str("neon x4"),
        }
    }
}

/// Lane-parallel kernels, bit-for-bit equivalent to [`Scalar`](crate::Scalar).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Vectorized {
    backend: Backend,
}

impl Vectorized {
    /// Picks the widest native backend the running CPU supports, or 8
    /// portable lanes when there is none (or the `simd` feature is off).
    pub fn detect() -> Self {
        let backend = native_backend().unwrap_or(Backend::Portable(LaneWidth::X8));
        debug!("vectorized kernels use {backend}");
        Self { backend }
    }

    pub fn portable(lanes: LaneWidth) -> Self {
        Self {
            backend: Backend::Portable(lanes),
        }
    }

    /// `None` when the CPU lacks AVX2.
    #[cfg(target_arch = "x86_64")]
    pub fn avx2() -> Option<Self> {
        is_x86_feature_detected!("avx2").then_some(Self {
            backend: Backend::Avx2,
        })
    }

    #[cfg(target_arch = "aarch64")]
    pub fn neon() -> Self {
        Self {
            backend: Backend::Neon,
        }
    }

    pub fn backend(&self) -> Backend {
        self.backend
    }

    pub fn lanes(&self) -> usize {
        self.backend.lanes()
    }
}

impl Default for Vectorized {
    fn default() -> Self {
        Self::detect()
    }
}

#[allow(unreachable_code)]
fn native_backend() -> Option<Backend> {
    #[cfg(all(feature = "simd", target_arch = "x86_64"))]
    {
        if is_x86_feature_detected!("avx2") {
            return Some(Backend::Avx2);
        }
    }
    #[cfg(all(feature = "simd", target_arch = "aarch64"))]
    {
        return Some(Backend::Neon);
    }
    None
}

/// Runs `$kernel` monomorphized for the lanes behind `$backend`.
macro_rules! dispatch {
    ($backend:expr, $kernel:ident($($arg:expr),*)) => {
        match $backend {
            Backend::Portable(LaneWidth::X4) => $kernel::<Portable<4>>($($arg),*),
            Backend::Portable(LaneWidth::X8) => $kernel::<Portable<8>>($($arg),*),
            Backend::Portable(LaneWidth::X16) => $kernel::<Portable<16>>($($arg),*),
            // Backend::Avx2 is only ever built after a successful feature check.
            #[cfg(target_arch = "x86_64")]
            Backend::Avx2 => unsafe { avx2::$kernel($($arg),*) },
            #[cfg(target_arch = "aarch64")]
            Backend::Neon => $kernel::<u32x4>($($arg),*),
        }
    };
}

impl Kernel for Vectorized {
    fn name(&self) -> &'static str {
        match self.backend {
            Backend::Portable(LaneWidth::X4) => "vectorized (portable x4)",
            Backend::Portable(LaneWidth::X8) => "vectorized (portable x8)",
            Backend::Portable(LaneWidth::X16) => "vectorized (portable x16)",
            #[cfg(target_arch = "x86_64")]
            Backend::Avx2 => "vectorized (avx2)",
            #[cfg(target_arch = "aarch64")]
            Backend::Neon => "vectorized (neon)",
        }
    }

    fn pack(&self, bit_width: BitWidth, layout: Layout, values: &[u32], out: &mut [u32]) {
        dispatch!(self.backend, pack_lanes(bit_width, layout, values, out))
    }

    fn unpack(&self, bit_width: BitWidth, layout: Layout, words: &[u32], out: &mut [u32]) {
        dispatch!(self.backend, unpack_lanes(bit_width, layout, words, out))
    }

    fn collapse(&self, planes: Planes<'_>) {
        dispatch!(self.backend, collapse_lanes(planes))
    }

    fn expand(&self, planes: Planes<'_>) {
        dispatch!(self.backend, expand_lanes(planes))
    }
}

#[cfg(target_arch = "x86_64")]
mod avx2 {
    use super::*;
    use crate::lanes::u32x8;

    #[target_feature(enable = "avx2")]
    pub(super) unsafe fn pack_lanes(bit_width: BitWidth, layout: Layout, values: &[u32], out: &mut [u32]) {
        super::pack_lanes::<u32x8>(bit_width, layout, values, out)
    }

    #[target_feature(enable = "avx2")]
    pub(super) unsafe fn unpack_lanes(bit_width: BitWidth, layout: Layout, words: &[u32], out: &mut [u32]) {
        super::unpack_lanes::<u32x8>(bit_width, layout, words, out)
    }

    #[target_feature(enable = "avx2")]
    pub(super) unsafe fn collapse_lanes(planes: Planes<'_>) {
        super::collapse_lanes::<u32x8>(planes)
    }

    #[target_feature(enable = "avx2")]
    pub(super) unsafe fn expand_lanes(planes: Planes<'_>) {
        super::expand_lanes::<u32x8>(planes)
    }
}

#[inline(always)]
fn pack_lanes<V: Lanes>(bit_width: BitWidth, layout: Layout, values: &[u32], out: &mut [u32]) {
    match layout {
        Layout::Horizontal => pack_horizontal_lanes::<V>(bit_width, values, out),
        Layout::Vertical => pack_vertical_lanes::<V>(bit_width, values, out),
    }
}

#[inline(always)]
fn unpack_lanes<V: Lanes>(bit_width: BitWidth, layout: Layout, words: &[u32], out: &mut [u32]) {
    match layout {
        Layout::Horizontal => unpack_horizontal_lanes::<V>(bit_width, words, out),
        Layout::Vertical => unpack_vertical_lanes::<V>(bit_width, words, out),
    }
}

/// For each shift level, top first: load `LANES` contiguous values, shift
/// them into place, then store (top level) or OR into what the levels above
/// already wrote.
#[inline(always)]
fn pack_vertical_lanes<V: Lanes>(bit_width: BitWidth, values: &[u32], out: &mut [u32]) {
    let n = out.len();
    debug_assert_eq!(values.len(), n * bit_width.values_per_word());
    let body = n - n % V::LANES;

    for (level, shift) in bit_width.shifts().enumerate() {
        let src = &values[level * n..];
        for i in (0..body).step_by(V::LANES) {
            let shifted = V::load(&src[i..]).shl(shift);
            if level == 0 {
                shifted.store(&mut out[i..]);
            } else {
                shifted.or(V::load(&out[i..])).store(&mut out[i..]);
            }
        }
    }

    for i in body..n {
        out[i] = pack_vertical_word(bit_width, values, n, i);
    }
}

#[inline(always)]
fn unpack_vertical_lanes<V: Lanes>(bit_width: BitWidth, words: &[u32], out: &mut [u32]) {
    let n = words.len();
    debug_assert_eq!(out.len(), n * bit_width.values_per_word());
    let body = n - n % V::LANES;
    let mask = V::splat(bit_width.mask());

    for (level, shift) in bit_width.shifts().enumerate() {
        let dst = &mut out[level * n..];
        for i in (0..body).step_by(V::LANES) {
            V::load(&words[i..]).shr(shift).and(mask).store(&mut dst[i..]);
        }
    }

    for i in body..n {
        unpack_vertical_word(bit_width, words[i], out, n, i);
    }
}

/// Slot `t` of `LANES` neighbouring words sits `values_per_word` apart in
/// the input, so each level is a strided gather.
#[inline(always)]
fn pack_horizontal_lanes<V: Lanes>(bit_width: BitWidth, values: &[u32], out: &mut [u32]) {
    let n = out.len();
    let per_word = bit_width.values_per_word();
    debug_assert_eq!(values.len(), n * per_word);
    let body = n - n % V::LANES;
    let top = (WORD_BITS - bit_width.get()) as u32;

    for i in (0..body).step_by(V::LANES) {
        let block = &values[i * per_word..];
        let mut packed = V::gather(block, per_word).shl(top);
        for (slot, shift) in bit_width.shifts().enumerate().skip(1) {
            packed = packed.or(V::gather(&block[slot..], per_word).shl(shift));
        }
        packed.store(&mut out[i..]);
    }

    pack_horizontal(bit_width, &values[body * per_word..], &mut out[body..]);
}

#[inline(always)]
fn unpack_horizontal_lanes<V: Lanes>(bit_width: BitWidth, words: &[u32], out: &mut [u32]) {
    let n = words.len();
    let per_word = bit_width.values_per_word();
    debug_assert_eq!(out.len(), n * per_word);
    let body = n - n % V::LANES;
    let mask = V::splat(bit_width.mask());

    for i in (0..body).step_by(V::LANES) {
        let packed = V::load(&words[i..]);
        let block = &mut out[i * per_word..];
        for (slot, shift) in bit_width.shifts().enumerate() {
            packed.shr(shift).and(mask).scatter(&mut block[slot..], per_word);
        }
    }

    unpack_horizontal(bit_width, &words[body..], &mut out[body * per_word..]);
}

#[inline(always)]
fn collapse_lanes<V: Lanes>(mut planes: Planes<'_>) {
    match planes.count() {
        PlaneCount::Halves => collapse_k::<V, 2>(planes.split()),
        PlaneCount::Bytes => collapse_k::<V, 4>(planes.split()),
    }
}

#[inline(always)]
fn expand_lanes<V: Lanes>(mut planes: Planes<'_>) {
    match planes.count() {
        PlaneCount::Halves => expand_k::<V, 2>(planes.split()),
        PlaneCount::Bytes => expand_k::<V, 4>(planes.split()),
    }
}

/// Plane 0 is loaded before the merged group is stored over it; planes
/// `1..K` live in `tail` and are never written.
#[inline(always)]
fn collapse_k<V: Lanes, const K: usize>((head, tail): (&mut [u32], &mut [u32])) {
    let n = head.len();
    let bits = WORD_BITS / K;
    let body = n - n % V::LANES;

    for i in (0..body).step_by(V::LANES) {
        let mut merged = V::load(&head[i..]).shl(((K - 1) * bits) as u32);
        for plane in 1..K {
            let lower = V::load(&tail[(plane - 1) * n + i..]);
            merged = merged.or(lower.shl(((K - 1 - plane) * bits) as u32));
        }
        merged.store(&mut head[i..]);
    }

    collapse_range::<K>((head, tail), body);
}

/// All `K` planes of a group are derived from one register loaded up front,
/// so storing plane 0 over the source words is safe.
#[inline(always)]
fn expand_k<V: Lanes, const K: usize>((head, tail): (&mut [u32], &mut [u32])) {
    let n = head.len();
    let bits = WORD_BITS / K;
    let body = n - n % V::LANES;
    let mask = V::splat(u32::MAX >> (WORD_BITS - bits));

    for i in (0..body).step_by(V::LANES) {
        let words = V::load(&head[i..]);
        words.shr(((K - 1) * bits) as u32).and(mask).store(&mut head[i..]);
        for plane in 1..K {
            let shift = ((K - 1 - plane) * bits) as u32;
            words.shr(shift).and(mask).store(&mut tail[(plane - 1) * n + i..]);
        }
    }

    expand_range::<K>((head, tail), body);
}
