use crate::{HsaError, TernaryArray};

/// A header rewrite, applied as `(headers ∧ mask) ∨ value`.
///
/// Rewritten positions carry `0` in the mask and the new bit in the value; every other
/// position carries `1` in the mask and `0` in the value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Rewrite {
    mask: TernaryArray,
    value: TernaryArray,
}

impl Rewrite {
    pub fn new(mask: TernaryArray, value: TernaryArray) -> Result<Self, HsaError> {
        HsaError::check_width(mask.width(), value.width())?;
        Ok(Self { mask, value })
    }

    /// A rewrite that leaves every header unchanged.
    pub fn identity(width: usize) -> Self {
        Self { mask: TernaryArray::ones(width), value: TernaryArray::zeros(width) }
    }

    #[inline]
    pub const fn width(&self) -> usize {
        self.mask.width()
    }

    #[inline]
    pub const fn mask(&self) -> &TernaryArray {
        &self.mask
    }

    #[inline]
    pub const fn value(&self) -> &TernaryArray {
        &self.value
    }

    /// Returns `true` if applying this rewrite never changes a header.
    pub fn is_identity(&self) -> bool {
        self.mask == TernaryArray::ones(self.width()) && self.value == TernaryArray::zeros(self.width())
    }

    /// Rewrites the headers of `array`.
    #[inline]
    pub fn apply(&self, array: &TernaryArray) -> Result<TernaryArray, HsaError> {
        array.apply_rewrite(&self.mask, &self.value)
    }
}
