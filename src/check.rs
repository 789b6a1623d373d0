//! Cross-checks two kernels before anything they produce is trusted.
//!
//! Both kernels run on identical copies of a seeded pseudo-random input and
//! their outputs are compared word by word. The first disagreement is
//! returned as [`Error::Mismatch`]; callers must treat it as fatal.

use std::fmt;

use log::{debug, info};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::{BitWidth, Error, Kernel, Layout, PlaneCount, Planes, Result, Scalar, Vectorized};

/// One kernel operation under a fixed configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Pack(BitWidth, Layout),
    Unpack(BitWidth, Layout),
    Collapse(PlaneCount),
    Expand(PlaneCount),
}

impl Operation {
    /// Every operation in every supported configuration.
    pub fn all() -> impl Iterator<Item = Operation> {
        let packing = BitWidth::all().flat_map(|bit_width| {
            Layout::ALL.into_iter().flat_map(move |layout| {
                [
                    Operation::Pack(bit_width, layout),
                    Operation::Unpack(bit_width, layout),
                ]
            })
        });
        let planes = PlaneCount::ALL
            .into_iter()
            .flat_map(|count| [Operation::Collapse(count), Operation::Expand(count)]);
        packing.chain(planes)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Pack(bit_width, layout) => write!(f, "pack w={bit_width} {layout}"),
            Operation::Unpack(bit_width, layout) => write!(f, "unpack w={bit_width} {layout}"),
            Operation::Collapse(count) => write!(f, "collapse {count}"),
            Operation::Expand(count) => write!(f, "expand {count}"),
        }
    }
}

/// Index and values of the first position where `expected` and `actual`
/// differ. A length difference counts as a mismatch at the shorter length,
/// with 0 standing in for the missing value.
pub fn first_mismatch(expected: &[u32], actual: &[u32]) -> Option<(usize, u32, u32)> {
    if let Some(index) = expected.iter().zip(actual).position(|(e, a)| e != a) {
        return Some((index, expected[index], actual[index]));
    }
    let index = expected.len().min(actual.len());
    (expected.len() != actual.len()).then(|| {
        (
            index,
            expected.get(index).copied().unwrap_or(0),
            actual.get(index).copied().unwrap_or(0),
        )
    })
}

const DEFAULT_SEED: u64 = 42;
const DEFAULT_WORDS: usize = 256;

/// Runs `reference` and `candidate` side by side on the same input.
///
/// Example:
/// ```
/// use lanepack::{BitWidth, ConsistencyChecker, Layout, Operation};
///
/// let checker = ConsistencyChecker::new();
/// let op = Operation::Pack(BitWidth::new(4).unwrap(), Layout::Vertical);
/// checker.check(op).expect("scalar and vectorized packing disagree");
/// ```
#[derive(Debug, Clone)]
pub struct ConsistencyChecker<R = Scalar, C = Vectorized> {
    reference: R,
    candidate: C,
    seed: u64,
    words: usize,
}

impl ConsistencyChecker {
    /// [`Scalar`] against the detected [`Vectorized`] backend.
    pub fn new() -> Self {
        Self::with_kernels(Scalar, Vectorized::detect())
    }
}

impl Default for ConsistencyChecker {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Kernel, C: Kernel> ConsistencyChecker<R, C> {
    pub fn with_kernels(reference: R, candidate: C) -> Self {
        Self {
            reference,
            candidate,
            seed: DEFAULT_SEED,
            words: DEFAULT_WORDS,
        }
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Output words per packing check, and words per plane for plane checks.
    pub fn words(mut self, words: usize) -> Self {
        self.words = words;
        self
    }

    pub fn check(&self, op: Operation) -> Result<()> {
        let mut rng = StdRng::seed_from_u64(self.seed);
        let (expected, actual) = match op {
            Operation::Pack(bit_width, layout) => {
                let values: Vec<u32> = (0..self.words * bit_width.values_per_word())
                    .map(|_| rng.random::<u32>() & bit_width.mask())
                    .collect();
                let mut expected = vec![0; self.words];
                let mut actual = vec![0; self.words];
                self.reference.pack(bit_width, layout, &values, &mut expected);
                self.candidate.pack(bit_width, layout, &values, &mut actual);
                (expected, actual)
            }
            Operation::Unpack(bit_width, layout) => {
                let words: Vec<u32> = (0..self.words).map(|_| rng.random()).collect();
                let len = self.words * bit_width.values_per_word();
                let mut expected = vec![0; len];
                let mut actual = vec![0; len];
                self.reference.unpack(bit_width, layout, &words, &mut expected);
                self.candidate.unpack(bit_width, layout, &words, &mut actual);
                (expected, actual)
            }
            Operation::Collapse(count) | Operation::Expand(count) => {
                let mut expected: Vec<u32> = (0..self.words * count.get()).map(|_| rng.random()).collect();
                let mut actual = expected.clone();
                let reference = Planes::new(&mut expected, count)?;
                let candidate = Planes::new(&mut actual, count)?;
                if let Operation::Collapse(_) = op {
                    self.reference.collapse(reference);
                    self.candidate.collapse(candidate);
                } else {
                    self.reference.expand(reference);
                    self.candidate.expand(candidate);
                }
                (expected, actual)
            }
        };

        if let Some((index, expected, actual)) = first_mismatch(&expected, &actual) {
            return Err(Error::Mismatch {
                op,
                reference: self.reference.name(),
                candidate: self.candidate.name(),
                index,
                expected,
                actual,
            });
        }
        debug!("{op}: {} matches {}", self.candidate.name(), self.reference.name());
        Ok(())
    }

    /// Checks [`Operation::all`], stopping at the first mismatch. Returns the
    /// number of operations checked.
    pub fn check_all(&self) -> Result<usize> {
        let mut checked = 0;
        for op in Operation::all() {
            self.check(op)?;
            checked += 1;
        }
        info!(
            "{} agrees with {} on {checked} operations",
            self.candidate.name(),
            self.reference.name()
        );
        Ok(checked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::LaneWidth;

    /// Delegates to `Vectorized` but flips the low bit of one output word.
    struct Faulty {
        inner: Vectorized,
        index: usize,
    }

    impl Faulty {
        fn corrupt(&self, out: &mut [u32]) {
            if let Some(word) = out.get_mut(self.index) {
                *word ^= 1;
            }
        }
    }

    impl Kernel for Faulty {
        fn name(&self) -> &'static str {
            "faulty"
        }

        fn pack(&self, bit_width: BitWidth, layout: Layout, values: &[u32], out: &mut [u32]) {
            self.inner.pack(bit_width, layout, values, out);
            self.corrupt(out);
        }

        fn unpack(&self, bit_width: BitWidth, layout: Layout, words: &[u32], out: &mut [u32]) {
            self.inner.unpack(bit_width, layout, words, out);
            self.corrupt(out);
        }

        fn collapse(&self, planes: Planes<'_>) {
            self.inner.collapse(planes);
        }

        fn expand(&self, planes: Planes<'_>) {
            self.inner.expand(planes);
        }
    }

    #[test]
    fn test_all_backends_agree() {
        let checker = ConsistencyChecker::new();
        assert_eq!(checker.check_all(), Ok(32 * 2 * 2 + 2 * 2));

        for lanes in LaneWidth::ALL {
            let checker = ConsistencyChecker::with_kernels(Scalar, Vectorized::portable(lanes))
                .seed(7)
                .words(61);
            checker.check_all().unwrap();
        }
    }

    #[test]
    fn test_mismatch_reports_first_index() {
        let bit_width = BitWidth::new(4).unwrap();
        let op = Operation::Pack(bit_width, Layout::Vertical);
        let faulty = Faulty {
            inner: Vectorized::portable(LaneWidth::X8),
            index: 13,
        };
        let checker = ConsistencyChecker::with_kernels(Scalar, faulty);

        let Err(Error::Mismatch {
            op: reported,
            reference,
            candidate,
            index,
            expected,
            actual,
        }) = checker.check(op)
        else {
            panic!("corrupted output went unnoticed");
        };
        assert_eq!(reported, op);
        assert_eq!((reference, candidate), ("scalar", "faulty"));
        assert_eq!(index, 13);
        assert_eq!(actual, expected ^ 1);

        // The same input regenerated from the seed shows where `expected` came from.
        let mut rng = StdRng::seed_from_u64(DEFAULT_SEED);
        let values: Vec<u32> = (0..DEFAULT_WORDS * 8).map(|_| rng.random::<u32>() & 0xF).collect();
        let mut packed = vec![0; DEFAULT_WORDS];
        Scalar.pack(bit_width, Layout::Vertical, &values, &mut packed);
        assert_eq!(expected, packed[13]);
    }

    #[test]
    fn test_mismatch_stops_check_all() {
        let faulty = Faulty {
            inner: Vectorized::detect(),
            index: 0,
        };
        let err = ConsistencyChecker::with_kernels(Scalar, faulty)
            .check_all()
            .unwrap_err();
        let message = err.to_string();
        assert!(message.starts_with("pack w=1 horizontal: mismatch at index 0"), "{message}");
    }

    #[test]
    fn test_first_mismatch() {
        assert_eq!(first_mismatch(&[1, 2, 3], &[1, 2, 3]), None);
        assert_eq!(first_mismatch(&[1, 2, 3], &[1, 5, 6]), Some((1, 2, 5)));
        assert_eq!(first_mismatch(&[1, 2], &[1, 2, 9]), Some((2, 0, 9)));
        assert_eq!(first_mismatch(&[], &[]), None);
    }

    #[test]
    fn test_operations_display() {
        let names: Vec<String> = Operation::all().map(|op| op.to_string()).collect();
        assert_eq!(names.first().map(String::as_str), Some("pack w=1 horizontal"));
        assert_eq!(names.last().map(String::as_str), Some("expand 4x8"));
    }
}
