use crate::error::{ReferenceError, Result};

/// Byte range inside the database file.
///
/// A `Pointer` locates one stored content blob: `length` bytes starting at
/// offset `from`. Pointers are created when content is appended during a
/// commit and are never mutated afterwards.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Pointer {
    from: u64,
    length: u64,
}

impl Pointer {
    /// Create a pointer, rejecting empty ranges and ranges past `u64::MAX`.
    pub fn new(from: u64, length: u64) -> Result<Self> {
        if length == 0 {
            return Err(ReferenceError::Validation(
                "a pointer must cover at least one byte".into(),
            ));
        }
        if from.checked_add(length).is_none() {
            return Err(ReferenceError::Validation(format!(
                "pointer range overflows: from={from}, length={length}"
            )));
        }
        Ok(Self { from, length })
    }

    /// Offset of the first byte.
    pub fn from(&self) -> u64 {
        self.from
    }

    /// Number of bytes covered.
    pub fn length(&self) -> u64 {
        self.length
    }

    /// Offset one past the last byte.
    pub fn end(&self) -> u64 {
        self.from + self.length
    }

    /// Returns `true` if the two ranges share at least one byte.
    pub fn overlaps(&self, other: &Pointer) -> bool {
        self.from < other.end() && other.from < self.end()
    }
}
