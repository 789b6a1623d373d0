//! Byte and half-word planes.
//!
//! A set of `k` planes of length `n` lives in `k * n` words. Plane `j`
//! carries the `j`-th most significant `32 / k` bits of every source word.
//! Collapsing merges the planes into `n` words written over plane 0, and
//! expanding splits `n` words (held where plane 0 goes) back into planes.

use std::fmt;

use crate::{Error, Result, WORD_BITS};

/// Number of planes a word is split into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlaneCount {
    /// Two 16-bit planes.
    Halves,
    /// Four 8-bit planes.
    Bytes,
}

impl PlaneCount {
    pub const ALL: [PlaneCount; 2] = [PlaneCount::Halves, PlaneCount::Bytes];

    pub fn new(planes: usize) -> Result<Self> {
        match planes {
            2 => Ok(Self::Halves),
            4 => Ok(Self::Bytes),
            _ => Err(Error::InvalidPlaneCount(planes)),
        }
    }

    pub const fn get(self) -> usize {
        match self {
            Self::Halves => 2,
            Self::Bytes => 4,
        }
    }

    pub const fn bits_per_plane(self) -> usize {
        WORD_BITS / self.get()
    }

    pub const fn mask(self) -> u32 {
        u32::MAX >> (WORD_BITS - self.bits_per_plane())
    }

    /// Left shift applied to plane `plane` when merging.
    pub const fn shift(self, plane: usize) -> u32 {
        ((self.get() - 1 - plane) * self.bits_per_plane()) as u32
    }
}

impl fmt::Display for PlaneCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.get(), self.bits_per_plane())
    }
}

/// Mutable view over a set of planes, split into two disjoint regions.
///
/// `head` holds plane 0, which is also where merged words are read from and
/// written to. `tail` holds planes `1..k` back to back. Every position `i`
/// is read from both regions before `head[i]` is written, so collapsing and
/// expanding in place never observe their own output.
pub struct Planes<'a> {
    head: &'a mut [u32],
    tail: &'a mut [u32],
    count: PlaneCount,
}

impl<'a> Planes<'a> {
    /// Splits one allocation of `k * n` words.
    pub fn new(buffer: &'a mut [u32], count: PlaneCount) -> Result<Self> {
        if buffer.len() % count.get() != 0 {
            return Err(Error::PlaneLayout {
                len: buffer.len(),
                planes: count.get(),
            });
        }
        let (head, tail) = buffer.split_at_mut(buffer.len() / count.get());
        Ok(Self { head, tail, count })
    }

    /// Uses two separate buffers. `tail` must hold exactly `k - 1` planes of
    /// `head.len()` words.
    pub fn from_parts(head: &'a mut [u32], tail: &'a mut [u32], count: PlaneCount) -> Result<Self> {
        if tail.len() != head.len() * (count.get() - 1) {
            return Err(Error::PlaneLayout {
                len: head.len() + tail.len(),
                planes: count.get(),
            });
        }
        Ok(Self { head, tail, count })
    }

    /// Words per plane.
    pub fn len(&self) -> usize {
        self.head.len()
    }

    pub fn is_empty(&self) -> bool {
        self.head.is_empty()
    }

    pub fn count(&self) -> PlaneCount {
        self.count
    }

    pub(crate) fn split(&mut self) -> (&mut [u32], &mut [u32]) {
        (&mut *self.head, &mut *self.tail)
    }
}

pub(crate) fn collapse_scalar(mut planes: Planes<'_>) {
    match planes.count() {
        PlaneCount::Halves => collapse_range::<2>(planes.split(), 0),
        PlaneCount::Bytes => collapse_range::<4>(planes.split(), 0),
    }
}

pub(crate) fn expand_scalar(mut planes: Planes<'_>) {
    match planes.count() {
        PlaneCount::Halves => expand_range::<2>(planes.split(), 0),
        PlaneCount::Bytes => expand_range::<4>(planes.split(), 0),
    }
}

/// Merges positions `start..n`. Input bits above a plane's width are not
/// masked off, so an oversized value in a lower plane bleeds into the ones
/// above it.
#[inline]
pub(crate) fn collapse_range<const K: usize>((head, tail): (&mut [u32], &mut [u32]), start: usize) {
    let n = head.len();
    let bits = WORD_BITS / K;
    for i in start..n {
        let mut merged = head[i] << ((K - 1) * bits);
        for plane in 1..K {
            merged |= tail[(plane - 1) * n + i] << ((K - 1 - plane) * bits);
        }
        head[i] = merged;
    }
}

/// Splits positions `start..n`.
#[inline]
pub(crate) fn expand_range<const K: usize>((head, tail): (&mut [u32], &mut [u32]), start: usize) {
    let n = head.len();
    let bits = WORD_BITS / K;
    let mask = u32::MAX >> (WORD_BITS - bits);
    for i in start..n {
        let word = head[i];
        head[i] = (word >> ((K - 1) * bits)) & mask;
        for plane in 1..K {
            tail[(plane - 1) * n + i] = (word >> ((K - 1 - plane) * bits)) & mask;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plane_count() {
        assert_eq!(PlaneCount::new(2), Ok(PlaneCount::Halves));
        assert_eq!(PlaneCount::new(4), Ok(PlaneCount::Bytes));
        assert_eq!(PlaneCount::new(3), Err(Error::InvalidPlaneCount(3)));
        assert_eq!(PlaneCount::Bytes.shift(0), 24);
        assert_eq!(PlaneCount::Bytes.shift(3), 0);
        assert_eq!(PlaneCount::Halves.mask(), 0xFFFF);
    }

    #[test]
    fn test_layout_checks() {
        let mut buf = vec![0u32; 10];
        assert!(matches!(
            Planes::new(&mut buf, PlaneCount::Bytes),
            Err(Error::PlaneLayout { len: 10, planes: 4 })
        ));
        assert_eq!(Planes::new(&mut buf, PlaneCount::Halves).unwrap().len(), 5);

        let mut head = vec![0u32; 4];
        let mut tail = vec![0u32; 8];
        assert!(Planes::from_parts(&mut head, &mut tail, PlaneCount::Bytes).is_err());
        assert!(Planes::from_parts(&mut head, &mut tail[..4], PlaneCount::Halves).is_ok());
    }

    #[test]
    fn test_collapse_bytes() {
        let mut buf: Vec<u32> = (0..256).collect();
        collapse_scalar(Planes::new(&mut buf, PlaneCount::Bytes).unwrap());
        assert_eq!(buf[0], 4227264);
        assert_eq!(buf[0], (64 << 16) | (128 << 8) | 192);
        assert_eq!(buf[63], (63 << 24) | (127 << 16) | (191 << 8) | 255);
        // Planes 1..4 are left untouched.
        assert_eq!(buf[64..], (64..256).collect::<Vec<u32>>());
    }

    #[test]
    fn test_expand_bytes() {
        let mut buf = vec![0u32; 8];
        buf[0] = 0x11223344;
        buf[1] = 0xAABBCCDD;
        expand_scalar(Planes::new(&mut buf, PlaneCount::Bytes).unwrap());
        assert_eq!(buf, vec![0x11, 0xAA, 0x22, 0xBB, 0x33, 0xCC, 0x44, 0xDD]);
    }

    #[test]
    fn test_halves_round_trip() {
        let words: Vec<u32> = (0..128u32).map(|i| i.wrapping_mul(0x9E3779B9)).collect();
        let mut buf = words.clone();
        buf.resize(256, 0);
        expand_scalar(Planes::new(&mut buf, PlaneCount::Halves).unwrap());
        assert!(buf.iter().all(|&v| v <= 0xFFFF));
        collapse_scalar(Planes::new(&mut buf, PlaneCount::Halves).unwrap());
        assert_eq!(buf[..128], words[..]);
    }

    #[test]
    fn test_separate_buffers() {
        let mut head = vec![0x0102_0304u32];
        let mut tail = vec![0u32; 3];
        expand_scalar(Planes::from_parts(&mut head, &mut tail, PlaneCount::Bytes).unwrap());
        assert_eq!((head[0], tail.clone()), (1, vec![2, 3, 4]));
        collapse_scalar(Planes::from_parts(&mut head, &mut tail, PlaneCount::Bytes).unwrap());
        assert_eq!(head[0], 0x0102_0304);
    }
}
