//! Fixed-width groups of `u32` lanes.
//!
//! Every vectorized kernel is written once against [`Lanes`] and strides by
//! `Lanes::LANES`, so the lane count only changes how many words one step
//! touches, never what ends up in them.

#[cfg(target_arch = "aarch64")]
use std::arch::aarch64::*;
#[cfg(target_arch = "x86_64")]
use std::arch::x86_64::*;

/// Lane count of the portable backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LaneWidth {
    X4,
    X8,
    X16,
}

impl LaneWidth {
    pub const ALL: [LaneWidth; 3] = [LaneWidth::X4, LaneWidth::X8, LaneWidth::X16];

    pub const fn get(self) -> usize {
        match self {
            Self::X4 => 4,
            Self::X8 => 8,
            Self::X16 => 16,
        }
    }
}

/// A group of `LANES` words processed by one instruction.
///
/// Loads and stores take slices and only touch their first `LANES` words
/// (or `LANES` words at `stride` for gather/scatter); a slice that is too
/// short panics instead of reading out of bounds.
pub(crate) trait Lanes: Copy {
    const LANES: usize;

    fn splat(value: u32) -> Self;

    fn load(src: &[u32]) -> Self;

    /// Lane `l` is `src[l * stride]`.
    fn gather(src: &[u32], stride: usize) -> Self;

    fn store(self, dst: &mut [u32]);

    /// Writes lane `l` to `dst[l * stride]`.
    fn scatter(self, dst: &mut [u32], stride: usize);

    fn shl(self, shift: u32) -> Self;

    fn shr(self, shift: u32) -> Self;

    fn or(self, rhs: Self) -> Self;

    fn and(self, rhs: Self) -> Self;
}

/// Plain arrays. Each operation is a straight per-lane loop that the
/// compiler turns into whatever vector instructions the target has.
#[derive(Clone, Copy)]
pub(crate) struct Portable<const N: usize>([u32; N]);

impl<const N: usize> Lanes for Portable<N> {
    const LANES: usize = N;

    #[inline(always)]
    fn splat(value: u32) -> Self {
        Self([value; N])
    }

    #[inline(always)]
    fn load(src: &[u32]) -> Self {
        let mut lanes = [0u32; N];
        lanes.copy_from_slice(&src[..N]);
        Self(lanes)
    }

    #[inline(always)]
    fn gather(src: &[u32], stride: usize) -> Self {
        Self(std::array::from_fn(|l| src[l * stride]))
    }

    #[inline(always)]
    fn store(self, dst: &mut [u32]) {
        dst[..N].copy_from_slice(&self.0);
    }

    #[inline(always)]
    fn scatter(self, dst: &mut [u32], stride: usize) {
        for (l, &value) in self.0.iter().enumerate() {
            dst[l * stride] = value;
        }
    }

    #[inline(always)]
    fn shl(self, shift: u32) -> Self {
        Self(self.0.map(|v| v << shift))
    }

    #[inline(always)]
    fn shr(self, shift: u32) -> Self {
        Self(self.0.map(|v| v >> shift))
    }

    #[inline(always)]
    fn or(self, rhs: Self) -> Self {
        Self(std::array::from_fn(|l| self.0[l] | rhs.0[l]))
    }

    #[inline(always)]
    fn and(self, rhs: Self) -> Self {
        Self(std::array::from_fn(|l| self.0[l] & rhs.0[l]))
    }
}

/// 8 of `u32` in one 256-bit AVX2 register.
///
/// Only sound to use on a CPU with AVX2; callers check with
/// `is_x86_feature_detected!("avx2")` before reaching any kernel built on it.
#[allow(non_camel_case_types)]
#[cfg(target_arch = "x86_64")]
#[derive(Clone, Copy)]
pub(crate) struct u32x8(__m256i);

#[cfg(target_arch = "x86_64")]
impl Lanes for u32x8 {
    const LANES: usize = 8;

    #[inline(always)]
    fn splat(value: u32) -> Self {
        unsafe { Self(_mm256_set1_epi32(value as i32)) }
    }

    #[inline(always)]
    fn load(src: &[u32]) -> Self {
        let src = &src[..Self::LANES];
        unsafe { Self(_mm256_loadu_si256(src.as_ptr().cast())) }
    }

    #[inline(always)]
    fn gather(src: &[u32], stride: usize) -> Self {
        unsafe {
            Self(_mm256_setr_epi32(
                src[0] as i32,
                src[stride] as i32,
                src[2 * stride] as i32,
                src[3 * stride] as i32,
                src[4 * stride] as i32,
                src[5 * stride] as i32,
                src[6 * stride] as i32,
                src[7 * stride] as i32,
            ))
        }
    }

    #[inline(always)]
    fn store(self, dst: &mut [u32]) {
        let dst = &mut dst[..Self::LANES];
        unsafe { _mm256_storeu_si256(dst.as_mut_ptr().cast(), self.0) }
    }

    #[inline(always)]
    fn scatter(self, dst: &mut [u32], stride: usize) {
        let mut lanes = [0u32; 8];
        self.store(&mut lanes);
        for (l, value) in lanes.into_iter().enumerate() {
            dst[l * stride] = value;
        }
    }

    #[inline(always)]
    fn shl(self, shift: u32) -> Self {
        unsafe { Self(_mm256_sll_epi32(self.0, _mm_cvtsi32_si128(shift as i32))) }
    }

    #[inline(always)]
    fn shr(self, shift: u32) -> Self {
        unsafe { Self(_mm256_srl_epi32(self.0, _mm_cvtsi32_si128(shift as i32))) }
    }

    #[inline(always)]
    fn or(self, rhs: Self) -> Self {
        unsafe { Self(_mm256_or_si256(self.0, rhs.0)) }
    }

    #[inline(always)]
    fn and(self, rhs: Self) -> Self {
        unsafe { Self(_mm256_and_si256(self.0, rhs.0)) }
    }
}

/// 4 of `u32` in one 128-bit NEON register. NEON is part of the aarch64
/// baseline, so this needs no runtime check.
#[allow(non_camel_case_types)]
#[cfg(target_arch = "aarch64")]
#[derive(Clone, Copy)]
pub(crate) struct u32x4(uint32x4_t);

#[cfg(target_arch = "aarch64")]
impl Lanes for u32x4 {
    const LANES: usize = 4;

    #[inline(always)]
    fn splat(value: u32) -> Self {
        unsafe { Self(vdupq_n_u32(value)) }
    }

    #[inline(always)]
    fn load(src: &[u32]) -> Self {
        let src = &src[..Self::LANES];
        unsafe { Self(vld1q_u32(src.as_ptr())) }
    }

    #[inline(always)]
    fn gather(src: &[u32], stride: usize) -> Self {
        let lanes = [src[0], src[stride], src[2 * stride], src[3 * stride]];
        Self::load(&lanes)
    }

    #[inline(always)]
    fn store(self, dst: &mut [u32]) {
        let dst = &mut dst[..Self::LANES];
        unsafe { vst1q_u32(dst.as_mut_ptr(), self.0) }
    }

    #[inline(always)]
    fn scatter(self, dst: &mut [u32], stride: usize) {
        let mut lanes = [0u32; 4];
        self.store(&mut lanes);
        for (l, value) in lanes.into_iter().enumerate() {
            dst[l * stride] = value;
        }
    }

    #[inline(always)]
    fn shl(self, shift: u32) -> Self {
        unsafe { Self(vshlq_u32(self.0, vdupq_n_s32(shift as i32))) }
    }

    #[inline(always)]
    fn shr(self, shift: u32) -> Self {
        // A negative count shifts right.
        unsafe { Self(vshlq_u32(self.0, vdupq_n_s32(-(shift as i32)))) }
    }

    #[inline(always)]
    fn or(self, rhs: Self) -> Self {
        unsafe { Self(vorrq_u32(self.0, rhs.0)) }
    }

    #[inline(always)]
    fn and(self, rhs: Self) -> Self {
        unsafe { Self(vandq_u32(self.0, rhs.0)) }
    }
}
