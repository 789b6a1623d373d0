use thiserror::Error;

use crate::check::Operation;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error("bit width {0} is outside 1..=32")]
    InvalidBitWidth(usize),

    #[error("plane count {0} is not supported, expected 2 or 4")]
    InvalidPlaneCount(usize),

    #[error("{len} words cannot be laid out as {planes} planes of equal length")]
    PlaneLayout { len: usize, planes: usize },

    /// The two kernels under comparison disagree. This is never recoverable:
    /// one of them is wrong and nothing it produces can be trusted.
    #[error(
        "{op}: mismatch at index {index}: {reference}={expected}, {candidate}={actual}"
    )]
    Mismatch {
        op: Operation,
        reference: &'static str,
        candidate: &'static str,
        index: usize,
        expected: u32,
        actual: u32,
    },
}
