use std::fmt;

use seq_macro::seq;

use crate::planes::{self, Planes};
use crate::{Error, Kernel, Result, WORD_BITS};

/// Number of bits each packed value occupies, always within `1..=32`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BitWidth(u8);

impl BitWidth {
    /// Packing at full word width is an identity copy.
    pub const MAX: BitWidth = BitWidth(WORD_BITS as u8);

    pub fn new(bits: usize) -> Result<Self> {
        if bits == 0 || bits > WORD_BITS {
            return Err(Error::InvalidBitWidth(bits));
        }
        Ok(Self(bits as u8))
    }

    /// Every supported width, narrowest first.
    pub fn all() -> impl Iterator<Item = BitWidth> {
        (1..=WORD_BITS as u8).map(BitWidth)
    }

    pub const fn get(self) -> usize {
        self.0 as usize
    }

    /// `floor(32 / w)`. Widths that do not divide 32 leave the lowest
    /// `32 % w` bits of every word unused.
    pub const fn values_per_word(self) -> usize {
        WORD_BITS / self.get()
    }

    pub const fn mask(self) -> u32 {
        u32::MAX >> (WORD_BITS - self.get())
    }

    /// Number of words needed for `values` values.
    pub const fn packed_len(self, values: usize) -> usize {
        values.div_ceil(self.values_per_word())
    }

    /// Shift of every slot in a word, most significant slot first.
    pub fn shifts(self) -> impl Iterator<Item = u32> {
        let bits = self.get();
        (0..self.values_per_word()).map(move |slot| (WORD_BITS - bits - slot * bits) as u32)
    }
}

impl fmt::Display for BitWidth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// How a block of values maps onto a block of packed words.
///
/// With `n` output words and `p = values_per_word` slots per word:
///
/// * `Horizontal`: slot `t` of word `i` holds `values[i * p + t]`, so each
///   word packs consecutive values.
/// * `Vertical`: slot `t` of word `i` holds `values[t * n + i]`, so every
///   shift level reads one contiguous run of `n` values. This is the layout
///   that lets a vector kernel fill many words at once with plain loads.
///
/// The two coincide for a single word.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Layout {
    #[default]
    Horizontal,
    Vertical,
}

impl Layout {
    pub const ALL: [Layout; 2] = [Layout::Horizontal, Layout::Vertical];
}

impl fmt::Display for Layout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Layout::Horizontal => f.write_str("horizontal"),
            Layout::Vertical => f.write_str("vertical"),
        }
    }
}

/// Serial reference kernels. Every other kernel is measured against these.
#[derive(Debug, Clone, Copy, Default)]
pub struct Scalar;

impl Kernel for Scalar {
    fn name(&self) -> &'static str {
        "scalar"
    }

    fn pack(&self, bit_width: BitWidth, layout: Layout, values: &[u32], out: &mut [u32]) {
        match layout {
            Layout::Horizontal => pack_horizontal(bit_width, values, out),
            Layout::Vertical => pack_vertical(bit_width, values, out),
        }
    }

    fn unpack(&self, bit_width: BitWidth, layout: Layout, words: &[u32], out: &mut [u32]) {
        match layout {
            Layout::Horizontal => unpack_horizontal(bit_width, words, out),
            Layout::Vertical => unpack_vertical(bit_width, words, out),
        }
    }

    fn collapse(&self, planes: Planes<'_>) {
        planes::collapse_scalar(planes)
    }

    fn expand(&self, planes: Planes<'_>) {
        planes::expand_scalar(planes)
    }
}

/// Monomorphizes `$kernel::<W>` for every width so the slot loop unrolls.
macro_rules! with_const_width {
    ($bit_width:expr, $kernel:ident($($arg:expr),*)) => {
        seq!(W in 1..=32 {
            match $bit_width.get() {
                #(W => $kernel::<W>($($arg),*),)*
                _ => unreachable!("BitWidth is always within 1..=32"),
            }
        })
    };
}

pub(crate) fn pack_horizontal(bit_width: BitWidth, values: &[u32], out: &mut [u32]) {
    debug_assert_eq!(values.len(), out.len() * bit_width.values_per_word());
    with_const_width!(bit_width, pack_horizontal_const(values, out));
}

#[inline(always)]
fn pack_horizontal_const<const W: usize>(values: &[u32], out: &mut [u32]) {
    let per_word = WORD_BITS / W;
    for (word, chunk) in out.iter_mut().zip(values.chunks_exact(per_word)) {
        let mut packed = 0u32;
        for (slot, &value) in chunk.iter().enumerate() {
            packed |= value << (WORD_BITS - W - slot * W);
        }
        *word = packed;
    }
}

pub(crate) fn unpack_horizontal(bit_width: BitWidth, words: &[u32], out: &mut [u32]) {
    debug_assert_eq!(out.len(), words.len() * bit_width.values_per_word());
    with_const_width!(bit_width, unpack_horizontal_const(words, out));
}

#[inline(always)]
fn unpack_horizontal_const<const W: usize>(words: &[u32], out: &mut [u32]) {
    let per_word = WORD_BITS / W;
    let mask = u32::MAX >> (WORD_BITS - W);
    for (&word, chunk) in words.iter().zip(out.chunks_exact_mut(per_word)) {
        for (slot, value) in chunk.iter_mut().enumerate() {
            *value = (word >> (WORD_BITS - W - slot * W)) & mask;
        }
    }
}

pub(crate) fn pack_vertical(bit_width: BitWidth, values: &[u32], out: &mut [u32]) {
    let n = out.len();
    debug_assert_eq!(values.len(), n * bit_width.values_per_word());
    if n == 0 {
        return;
    }

    let mut levels = values.chunks_exact(n).zip(bit_width.shifts());
    // The top level stores, every lower level only ORs in bits below it.
    if let Some((level, shift)) = levels.next() {
        for (word, &value) in out.iter_mut().zip(level) {
            *word = value << shift;
        }
    }
    for (level, shift) in levels {
        for (word, &value) in out.iter_mut().zip(level) {
            *word |= value << shift;
        }
    }
}

pub(crate) fn unpack_vertical(bit_width: BitWidth, words: &[u32], out: &mut [u32]) {
    let n = words.len();
    debug_assert_eq!(out.len(), n * bit_width.values_per_word());
    if n == 0 {
        return;
    }

    let mask = bit_width.mask();
    for (level, shift) in out.chunks_exact_mut(n).zip(bit_width.shifts()) {
        for (value, &word) in level.iter_mut().zip(words) {
            *value = (word >> shift) & mask;
        }
    }
}

/// Packs word `i` of a vertical block on its own.
#[inline]
pub(crate) fn pack_vertical_word(bit_width: BitWidth, values: &[u32], n: usize, i: usize) -> u32 {
    bit_width
        .shifts()
        .enumerate()
        .fold(0, |packed, (level, shift)| packed | values[level * n + i] << shift)
}

/// Unpacks word `i` of a vertical block on its own.
#[inline]
pub(crate) fn unpack_vertical_word(bit_width: BitWidth, word: u32, out: &mut [u32], n: usize, i: usize) {
    let mask = bit_width.mask();
    for (level, shift) in bit_width.shifts().enumerate() {
        out[level * n + i] = (word >> shift) & mask;
    }
}
