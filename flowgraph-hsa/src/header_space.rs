use std::fmt;

use crate::{HsaError, Rewrite, TernaryArray};

/// A set of headers, kept as the deferred expression `∪ additions \ ∪ subtractions`.
///
/// Subtractions are only folded into the additions when a result depends on them (see
/// [`HeaderSpace::resolve`]), which keeps repeated robbing of a rule's match space cheap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderSpace {
    width: usize,
    additions: Vec<TernaryArray>,
    subtractions: Vec<TernaryArray>,
}

impl HeaderSpace {
    /// Creates an empty header space.
    pub const fn new(width: usize) -> Self {
        Self { width, additions: Vec::new(), subtractions: Vec::new() }
    }

    /// Creates a header space holding every header of the given width.
    pub fn wildcard(width: usize) -> Self {
        Self::from_array(TernaryArray::wildcard(width))
    }

    /// Creates a header space holding exactly the headers of `array`.
    pub fn from_array(array: TernaryArray) -> Self {
        let mut space = Self::new(array.width());
        if !array.is_empty() {
            space.additions.push(array);
        }
        space
    }

    /// Creates a header space holding the union of `arrays`.
    pub fn from_arrays(
        width: usize,
        arrays: impl IntoIterator<Item = TernaryArray>,
    ) -> Result<Self, HsaError> {
        let mut space = Self::new(width);
        for array in arrays {
            space.add(array)?;
        }
        Ok(space)
    }

    #[inline]
    pub const fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn additions(&self) -> &[TernaryArray] {
        &self.additions
    }

    #[inline]
    pub fn subtractions(&self) -> &[TernaryArray] {
        &self.subtractions
    }

    #[inline]
    pub fn addition_count(&self) -> usize {
        self.additions.len()
    }

    #[inline]
    pub fn subtraction_count(&self) -> usize {
        self.subtractions.len()
    }

    fn check_width(&self, found: usize) -> Result<(), HsaError> {
        HsaError::check_width(self.width, found)
    }

    /// Adds the headers of `array`. Pending subtractions are resolved first, so that the new
    /// headers are not subtracted retroactively.
    pub fn add(&mut self, array: TernaryArray) -> Result<(), HsaError> {
        self.check_width(array.width())?;
        self.resolve()?;
        if !array.is_empty() {
            self.additions.push(array);
        }
        Ok(())
    }

    /// Adds every header of `other`.
    pub fn union(&mut self, other: &Self) -> Result<(), HsaError> {
        self.check_width(other.width)?;
        self.resolve()?;
        let mut other = other.clone();
        other.resolve()?;
        self.additions.append(&mut other.additions);
        Ok(())
    }

    /// Removes the headers of `array`. The subtraction is recorded, not applied.
    pub fn subtract(&mut self, array: TernaryArray) -> Result<(), HsaError> {
        self.check_width(array.width())?;
        if !array.is_empty() {
            self.subtractions.push(array);
        }
        Ok(())
    }

    /// Removes every header of `other`.
    pub fn subtract_space(&mut self, other: &Self) -> Result<(), HsaError> {
        self.check_width(other.width)?;
        let mut other = other.clone();
        other.resolve()?;
        self.subtractions.append(&mut other.additions);
        Ok(())
    }

    /// Folds every pending subtraction into the additions.
    pub fn resolve(&mut self) -> Result<(), HsaError> {
        for subtraction in std::mem::take(&mut self.subtractions) {
            let mut remaining = Vec::with_capacity(self.additions.len());
            for addition in &self.additions {
                remaining.extend(addition.difference(&subtraction)?);
            }
            self.additions = remaining;
        }
        Ok(())
    }

    /// Returns the intersection of `self` and `other`. Subtractions of both operands carry
    /// over unresolved.
    pub fn intersect(&self, other: &Self) -> Result<Self, HsaError> {
        self.check_width(other.width)?;

        let mut result = Self::new(self.width);
        for a in &self.additions {
            for b in &other.additions {
                let meet = a.intersect(b)?;
                if !meet.is_empty() {
                    result.additions.push(meet);
                }
            }
        }
        result.subtractions.extend(self.subtractions.iter().cloned());
        result.subtractions.extend(other.subtractions.iter().cloned());
        Ok(result)
    }

    /// Returns `true` if `self` and `other` share at least one header.
    pub fn has_intersection(&self, other: &Self) -> Result<bool, HsaError> {
        Ok(!self.intersect(other)?.is_empty())
    }

    /// Returns the complement of `self`.
    pub fn complement(&self) -> Result<Self, HsaError> {
        let mut resolved = self.clone();
        resolved.resolve()?;

        // ¬(a ∪ b) = ¬a ∩ ¬b, each ¬a being a union of arrays.
        let mut result = Self::wildcard(self.width);
        for addition in &resolved.additions {
            let complement = Self::from_arrays(self.width, addition.complement())?;
            result = result.intersect(&complement)?;
            result.cleanup()?;
            if result.additions.is_empty() {
                break;
            }
        }
        Ok(result)
    }

    /// Resolves every subtraction, then repeatedly drops additions contained in another
    /// addition and merges pairs differing in a single complementary position, until neither
    /// applies.
    pub fn cleanup(&mut self) -> Result<(), HsaError> {
        self.resolve()?;
        self.additions.retain(|array| !array.is_empty());

        'outer: loop {
            for i in 0..self.additions.len() {
                for j in 0..self.additions.len() {
                    if i == j {
                        continue;
                    }
                    if self.additions[i].is_subset_of(&self.additions[j])? {
                        self.additions.swap_remove(i);
                        continue 'outer;
                    }
                    if let Some(merged) = self.additions[i].try_merge(&self.additions[j])? {
                        let (low, high) = if i < j { (i, j) } else { (j, i) };
                        self.additions.swap_remove(high);
                        self.additions[low] = merged;
                        continue 'outer;
                    }
                }
            }
            break;
        }

        Ok(())
    }

    /// Returns `true` if no header remains once subtractions are applied.
    pub fn is_empty(&self) -> bool {
        if self.additions.is_empty() {
            return true;
        }
        if self.subtractions.is_empty() {
            return false;
        }

        let mut resolved = self.clone();
        // Widths are checked on every insertion, so resolving cannot fail.
        resolved.resolve().map(|_| resolved.additions.is_empty()).unwrap_or(false)
    }

    /// Returns `true` if every header of `self` is also in `other`.
    pub fn is_subset_of(&self, other: &Self) -> Result<bool, HsaError> {
        let mut rest = self.clone();
        rest.subtract_space(other)?;
        Ok(rest.is_empty())
    }

    /// Returns `true` if `self` and `other` hold the same headers.
    pub fn equivalent(&self, other: &Self) -> Result<bool, HsaError> {
        Ok(self.is_subset_of(other)? && other.is_subset_of(self)?)
    }

    /// Rewrites every header according to `rewrite`. Subtractions are resolved first, so the
    /// subtracted headers are gone before rewriting.
    pub fn apply_rewrite(&mut self, rewrite: &Rewrite) -> Result<(), HsaError> {
        self.check_width(rewrite.width())?;
        self.resolve()?;
        for addition in &mut self.additions {
            *addition = rewrite.apply(addition)?;
        }
        Ok(())
    }
}

impl From<TernaryArray> for HeaderSpace {
    fn from(array: TernaryArray) -> Self {
        Self::from_array(array)
    }
}

impl fmt::Display for HeaderSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn list(f: &mut fmt::Formatter<'_>, arrays: &[TernaryArray]) -> fmt::Result {
            f.write_str("{")?;
            for (i, array) in arrays.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{array}")?;
            }
            f.write_str("}")
        }

        list(f, &self.additions)?;
        if !self.subtractions.is_empty() {
            f.write_str(" - ")?;
            list(f, &self.subtractions)?;
        }
        Ok(())
    }
}
