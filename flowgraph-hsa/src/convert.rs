//! Conversion between protocol matches and ternary arrays.
//!
//! A [`HeaderSpaceConverter`] projects some protocol-level description of a set of headers
//! onto a [`TernaryArray`] and back. Fields a converter does not know about are treated as
//! wildcards in both directions, so a round trip never narrows a match.
//!
//! [`FieldLayout`] is the stock converter: it lays named fields out as contiguous bit ranges,
//! most significant bit first, and converts [`Match`]es.
use tracing::trace;

use crate::{HeaderSpace, HsaError, Rewrite, TernaryArray, Trit};

/// Converts `T` to and from ternary arrays.
pub trait HeaderSpaceConverter<T> {
    /// Converts `input` into a ternary array.
    fn parse(&self, input: &T) -> Result<TernaryArray, HsaError>;

    /// Converts `input` into a header space.
    fn parse_header_space(&self, input: &T) -> Result<HeaderSpace, HsaError> {
        self.parse(input).map(HeaderSpace::from_array)
    }

    /// Converts `array` back into a `T`.
    fn read(&self, array: &TernaryArray) -> Result<T, HsaError>;

    /// Converts `space` back into one `T` per array of its cleaned up representation.
    fn read_header_space(&self, space: &HeaderSpace) -> Result<Vec<T>, HsaError> {
        let mut space = space.clone();
        space.cleanup()?;
        space.additions().iter().map(|array| self.read(array)).collect()
    }
}

/// A masked match on a single field. Bits set in `mask` must equal the bits of `value`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldMatch {
    pub field: String,
    pub value: u64,
    pub mask: u64,
}

/// A set of headers described by per-field masked matches. Fields that are not mentioned
/// match anything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Match {
    fields: Vec<FieldMatch>,
}

impl Match {
    /// Creates a match on every header.
    pub fn new() -> Self {
        Self::default()
    }

    /// Matches `field` exactly against `value`.
    pub fn exact(self, field: impl Into<String>, value: u64) -> Self {
        self.masked(field, value, u64::MAX)
    }

    /// Matches the bits of `field` selected by `mask` against `value`.
    pub fn masked(mut self, field: impl Into<String>, value: u64, mask: u64) -> Self {
        self.fields.push(FieldMatch { field: field.into(), value, mask });
        self
    }

    #[inline]
    pub fn fields(&self) -> &[FieldMatch] {
        &self.fields
    }

    /// Returns the match on `field`, if any.
    pub fn get(&self, field: &str) -> Option<&FieldMatch> {
        self.fields.iter().find(|m| m.field == field)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Sets `field` to `value`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SetField {
    pub field: String,
    pub value: u64,
}

impl SetField {
    pub fn new(field: impl Into<String>, value: u64) -> Self {
        Self { field: field.into(), value }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Field {
    name: String,
    offset: usize,
    width: usize,
}

impl Field {
    /// Returns the bits of this field covered by the value, most significant first, as
    /// `(position, bit index)` pairs.
    fn positions(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        (0..self.width).map(move |i| (self.offset + i, self.width - 1 - i))
    }

    fn check_value(&self, value: u64) -> Result<(), HsaError> {
        if self.width < 64 && value >> self.width != 0 {
            return Err(HsaError::ValueTooWide { field: self.name.clone(), width: self.width });
        }
        Ok(())
    }
}

/// The VLAN id field of [`FieldLayout::vlan_ipv4`].
pub const VLAN_VID: &str = "vlan_vid";
/// The IPv4 destination field of [`FieldLayout::vlan_ipv4`].
pub const IPV4_DST: &str = "ipv4_dst";

/// Lays named fields out as contiguous bit ranges of a ternary array.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldLayout {
    fields: Vec<Field>,
    width: usize,
}

impl Default for FieldLayout {
    fn default() -> Self {
        Self::vlan_ipv4()
    }
}

impl FieldLayout {
    /// Creates a layout from `(name, width)` pairs in order. Fields are at most 64 bits wide.
    pub fn new<'a>(fields: impl IntoIterator<Item = (&'a str, usize)>) -> Result<Self, HsaError> {
        let mut layout = Self { fields: Vec::new(), width: 0 };
        for (name, width) in fields {
            if width > 64 {
                return Err(HsaError::FieldTooWide { field: name.to_owned(), width });
            }
            layout.fields.push(Field { name: name.to_owned(), offset: layout.width, width });
            layout.width += width;
        }
        Ok(layout)
    }

    /// The 44-bit layout of a 12-bit VLAN id followed by a 32-bit IPv4 destination.
    pub fn vlan_ipv4() -> Self {
        Self {
            fields: vec![
                Field { name: VLAN_VID.to_owned(), offset: 0, width: 12 },
                Field { name: IPV4_DST.to_owned(), offset: 12, width: 32 },
            ],
            width: 44,
        }
    }

    /// Returns the total width in positions.
    #[inline]
    pub const fn width(&self) -> usize {
        self.width
    }

    fn field(&self, name: &str) -> Result<&Field, HsaError> {
        self.fields
            .iter()
            .find(|field| field.name == name)
            .ok_or_else(|| HsaError::UnknownField(name.to_owned()))
    }

    /// Builds the rewrite that applies every `SetField`, in order.
    pub fn rewrite(&self, set_fields: &[SetField]) -> Result<Rewrite, HsaError> {
        let mut mask = TernaryArray::ones(self.width);
        let mut value = TernaryArray::zeros(self.width);

        for set in set_fields {
            let field = self.field(&set.field)?;
            field.check_value(set.value)?;
            for (position, bit) in field.positions() {
                mask.set(position, Trit::Zero)?;
                value.set(position, Trit::from((set.value >> bit) & 1 == 1))?;
            }
        }

        Rewrite::new(mask, value)
    }
}

impl HeaderSpaceConverter<Match> for FieldLayout {
    fn parse(&self, input: &Match) -> Result<TernaryArray, HsaError> {
        let mut array = TernaryArray::wildcard(self.width);

        for m in input.fields() {
            let field = self.field(&m.field)?;
            field.check_value(m.value & m.mask)?;

            for (position, bit) in field.positions() {
                if (m.mask >> bit) & 1 == 0 {
                    continue;
                }
                let trit = Trit::from((m.value >> bit) & 1 == 1);
                match array.get(position)? {
                    Some(current) if current.is_concrete() && current != trit => {
                        trace!(field = m.field.as_str(), "Conflicting matches on field");
                        return Ok(TernaryArray::empty(self.width));
                    }
                    _ => array.set(position, trit)?,
                }
            }
        }

        Ok(array)
    }

    fn read(&self, array: &TernaryArray) -> Result<Match, HsaError> {
        HsaError::check_width(self.width, array.width())?;
        if array.is_empty() {
            return Err(HsaError::EmptyArray);
        }

        let mut result = Match::new();
        for field in &self.fields {
            let (mut value, mut mask) = (0u64, 0u64);
            for (position, bit) in field.positions() {
                match array.get(position)? {
                    Some(Trit::One) => {
                        value |= 1 << bit;
                        mask |= 1 << bit;
                    }
                    Some(Trit::Zero) => mask |= 1 << bit,
                    _ => {}
                }
            }
            if mask != 0 {
                result = result.masked(field.name.clone(), value, mask);
            }
        }

        Ok(result)
    }
}
